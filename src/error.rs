use thiserror::Error;

/// Errors that can occur inside textlens.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Streaming error: {0}")]
    Streaming(String),

    #[error("Malformed analysis: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = Error::provider("OpenAI", "API error: 401");
        assert!(error.to_string().contains("OpenAI"));
        assert!(error.to_string().contains("401"));

        let parse_error = Error::parse("missing field `keywords`");
        assert_eq!(
            parse_error.to_string(),
            "Malformed analysis: missing field `keywords`"
        );

        let config_error = Error::config("AI_API_KEY is not set");
        assert!(config_error.to_string().starts_with("Invalid configuration"));
    }
}
