//! Unit tests for error types

#[cfg(test)]
mod tests {
    use super::super::error::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            BotError::Api("Filter failure: LOT_SIZE".into()).to_string(),
            "Exchange API error: Filter failure: LOT_SIZE"
        );
        assert_eq!(
            BotError::InvalidStrategy("yolo".into()).to_string(),
            "Invalid strategy: yolo"
        );
        assert_eq!(
            BotError::Config("amount_invest must be positive".into()).to_string(),
            "Configuration error: amount_invest must be positive"
        );
    }

    #[test]
    fn test_is_auth() {
        assert!(BotError::Auth("Invalid API-key".into()).is_auth());
        assert!(!BotError::Api("Invalid symbol".into()).is_auth());
        assert!(!BotError::Internal("boom".into()).is_auth());
    }

    #[test]
    fn test_non_http_errors_are_not_network() {
        assert!(!BotError::Auth("x".into()).is_network());
        assert!(!BotError::Api("x".into()).is_network());
    }

    #[test]
    fn test_from_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let bot: BotError = err.into();
        assert!(matches!(bot, BotError::Json(_)));
        assert!(bot.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "lab_data.json");
        let bot: BotError = err.into();
        assert!(matches!(bot, BotError::Io(_)));
    }

    #[test]
    fn test_from_config_error() {
        let err = config::ConfigError::Message("bad section".into());
        let bot: BotError = err.into();
        assert!(matches!(bot, BotError::Config(ref m) if m.contains("bad section")));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network() {
        let client = reqwest::Client::new();
        // nothing listens on port 9 of the loopback interface
        let err = client.get("http://127.0.0.1:9/").send().await.unwrap_err();
        let bot: BotError = err.into();
        assert!(bot.is_network());
        assert!(!bot.is_auth());
    }

    #[test]
    fn test_question_mark_conversion() {
        fn parse(s: &str) -> Result<serde_json::Value> {
            Ok(serde_json::from_str(s)?)
        }
        assert!(parse("[1, 2]").is_ok());
        assert!(parse("[1,").is_err());
    }
}
