//! Built-in presets for the two services this SDK talks to.
//!
//! A preset supplies the base URL, the environment variable holding the API
//! key, and the request timeout used when the caller does not set them.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePreset {
    pub name: &'static str,
    pub base_url: &'static str,
    pub default_api_key_env: &'static str,
    pub default_timeout_secs: u64,
}

impl ServicePreset {
    pub const SUPERAGENT: ServicePreset = ServicePreset {
        name: "superagent",
        base_url: "http://localhost:8080",
        default_api_key_env: "SUPERAGENT_API_KEY",
        default_timeout_secs: 60,
    };

    pub const VERIFIER: ServicePreset = ServicePreset {
        name: "verifier",
        base_url: "http://localhost:8081",
        default_api_key_env: "VERIFIER_API_KEY",
        default_timeout_secs: 30,
    };

    #[must_use]
    pub fn from_name(name: &str) -> Option<&'static ServicePreset> {
        PRESETS.iter().find(|p| p.name == name.to_lowercase())
    }

    #[must_use]
    pub fn all() -> &'static [ServicePreset] {
        PRESETS
    }
}

const PRESETS: &[ServicePreset] = &[ServicePreset::SUPERAGENT, ServicePreset::VERIFIER];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_services() {
        assert!(ServicePreset::from_name("superagent").is_some());
        assert!(ServicePreset::from_name("Verifier").is_some()); // case-insensitive
        assert!(ServicePreset::from_name("gateway").is_none());
    }

    #[test]
    fn test_default_ports_differ() {
        assert_eq!(ServicePreset::SUPERAGENT.base_url, "http://localhost:8080");
        assert_eq!(ServicePreset::VERIFIER.base_url, "http://localhost:8081");
        assert_eq!(ServicePreset::SUPERAGENT.default_timeout_secs, 60);
        assert_eq!(ServicePreset::VERIFIER.default_timeout_secs, 30);
    }
}
