use thiserror::Error;

pub const ENV_PREFIX: &str = "TRADECHAT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets a dotted config key,
/// e.g. `provider.api_key` -> `TRADECHAT_PROVIDER__API_KEY`
pub fn to_env_var(field: &str) -> String {
    format!(
        "{}_{}",
        ENV_PREFIX,
        field.split('.').collect::<Vec<_>>().join("__").to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("provider"), "TRADECHAT_PROVIDER");
        assert_eq!(to_env_var("provider.api_key"), "TRADECHAT_PROVIDER__API_KEY");
        assert_eq!(
            to_env_var("broker.access_token"),
            "TRADECHAT_BROKER__ACCESS_TOKEN"
        );
    }
}
