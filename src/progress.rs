//! Progress UI (spinner) for crawl runs.

use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use pokedex_core::CrawlStats;

/// Whether a spinner should be drawn: not quiet and stderr is a terminal.
pub(crate) fn spinner_enabled(quiet: bool) -> bool {
    !quiet && std::io::stderr().is_terminal()
}

/// Spawns the crawl spinner when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    stats: Arc<CrawlStats>,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(stats, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_spinner_inner(stats: Arc<CrawlStats>, stop: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            spinner.set_message(progress_message(&stats));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}

fn progress_message(stats: &CrawlStats) -> String {
    if stats.listing_rows() == 0 {
        return "Fetching listing...".to_string();
    }
    format!(
        "[{} pages, {} records, {} failed] Crawling {} listing rows...",
        stats.pages_fetched(),
        stats.records_written(),
        stats.fetch_failures(),
        stats.listing_rows()
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_progress_ui_disabled_returns_stopped() {
        let (handle, stop) = spawn_progress_ui(false, Arc::new(CrawlStats::new()));
        assert!(handle.is_none());
        assert!(stop.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_spawn_progress_ui_stops_on_signal() {
        let (handle, stop) = spawn_progress_ui(true, Arc::new(CrawlStats::new()));
        assert!(handle.is_some());
        stop.store(true, Ordering::SeqCst);
        handle.unwrap().await.unwrap();
    }

    #[test]
    fn test_progress_message_before_listing() {
        assert_eq!(progress_message(&CrawlStats::new()), "Fetching listing...");
    }
}
