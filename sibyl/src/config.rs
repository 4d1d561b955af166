//! Process configuration read from the environment

/// Runtime settings for the Sibyl process.
///
/// Everything is environment-driven with safe defaults; nothing here is
/// persisted. `SIBYL_API_KEY` must be set for the real generative upstream
/// to authenticate, but the process starts without it so that curated
/// knowledge and fallbacks keep working.
#[derive(Debug, Clone)]
pub struct Settings {
    /// API key for the generative upstream
    pub api_key: String,

    /// Base URL of the generative upstream
    pub api_base: String,

    /// Upstream model identifier
    pub model: String,

    /// Secret used to sign session tokens
    pub jwt_secret: String,

    /// Host the API server binds to
    pub host: String,

    /// Port the API server binds to
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.cohere.com".to_string(),
            model: "command".to_string(),
            jwt_secret: "default_secret_change_in_production".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_key: std::env::var("SIBYL_API_KEY").unwrap_or(defaults.api_key),
            api_base: std::env::var("SIBYL_API_BASE").unwrap_or(defaults.api_base),
            model: std::env::var("SIBYL_MODEL").unwrap_or(defaults.model),
            jwt_secret: std::env::var("SIBYL_JWT_SECRET").unwrap_or(defaults.jwt_secret),
            host: std::env::var("SIBYL_HOST").unwrap_or(defaults.host),
            port: std::env::var("SIBYL_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.model, "command");
        assert!(settings.api_key.is_empty());
    }
}
