//! User-Agent string for crawler traffic.

/// Project URL for User-Agent identification (RFC 9308 good citizenship).
const PROJECT_UA_URL: &str = "https://github.com/fierce/pokedex";

/// Default User-Agent identifying the tool and its version.
#[must_use]
pub fn default_crawler_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("Mozilla/5.0 (compatible; pokedex/{version}; +{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version_and_project_url() {
        let ua = default_crawler_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "missing project URL: {ua}");
        assert!(
            ua.contains(&format!("pokedex/{}", env!("CARGO_PKG_VERSION"))),
            "missing crate version: {ua}"
        );
    }
}
