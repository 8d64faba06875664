#[cfg(test)]
mod tests {
    use crate::{RedditClient, RedditOAuth2Config};
    use chrono::{TimeZone, Utc};
    use harvest_core::{AppConfig, ConfigError, CoreError, PostQuery};
    use std::time::Duration;

    fn create_test_config() -> RedditOAuth2Config {
        RedditOAuth2Config::new(
            "test_client_id".to_string(),
            "test_client_secret".to_string(),
            "reddit-harvest/1.0 test".to_string(),
        )
    }

    #[test]
    fn test_config_creation() {
        let config = create_test_config();
        assert_eq!(config.client_id, "test_client_id");
        assert_eq!(config.client_secret, "test_client_secret");
        assert_eq!(config.user_agent, "reddit-harvest/1.0 test");
        assert_eq!(
            config.token_url,
            "https://www.reddit.com/api/v1/access_token"
        );
        assert_eq!(config.api_base_url, "https://oauth.reddit.com");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_from_app_config() {
        let app_config = AppConfig {
            reddit_client_id: Some("id".to_string()),
            reddit_client_secret: Some("secret".to_string()),
            api_base_url: "http://localhost:9000".to_string(),
            request_timeout_secs: 5,
            ..AppConfig::default()
        };

        let config = RedditOAuth2Config::from_app_config(&app_config).unwrap();
        assert_eq!(config.client_id, "id");
        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.request_timeout, Duration::from_secs(5));

        let missing_secret = AppConfig {
            reddit_client_id: Some("id".to_string()),
            ..AppConfig::default()
        };
        assert!(matches!(
            RedditOAuth2Config::from_app_config(&missing_secret),
            Err(ConfigError::MissingField { field }) if field == "reddit_client_secret"
        ));
    }

    #[test]
    fn test_client_creation() {
        let client = RedditClient::new(create_test_config());
        assert!(client.is_ok());

        let client = client.unwrap();
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_client_rejects_bad_token_url() {
        let config = create_test_config().with_token_url("::not a url::");
        assert!(matches!(
            RedditClient::new(config),
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_invalid_query_rejected_before_network() {
        // Nothing listens on this port; validation must fail first.
        let config = create_test_config()
            .with_token_url("http://127.0.0.1:9/token")
            .with_api_base_url("http://127.0.0.1:9");
        let client = RedditClient::new(config).unwrap();

        let start = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 3, 5, 0, 0, 0).unwrap();
        let query = PostQuery::new("rust", start, end);

        let result = tokio_test::block_on(client.fetch_posts(&query));
        assert!(matches!(result, Err(CoreError::InvalidInput { .. })));
        assert!(!client.is_authenticated());
    }
}
