#[cfg(test)]
mod test {
    use serial_test::serial;

    use crate::config::proc_loader::{expand_env_vars, parse_config};
    use crate::config::proc_validator::validate_service_config;
    use crate::config::settings::{LogFormat, RetryConfig, SecretsConfig, ServiceConfig, StoreConfig};

    const DEPLOY_CONFIG: &str = include_str!("../../deploy/line-proxy.yaml");

    fn minimal() -> ServiceConfig {
        serde_yaml::from_str(
            r#"
line:
  channel_id: "12345"
secrets:
  type: env
store:
  type: memory
"#,
        )
        .expect("minimal config")
    }

    #[tokio::test]
    #[serial]
    async fn deploy_config_is_valid_with_environment() {
        std::env::set_var("CHANNEL_ID", "1657000000");
        std::env::set_var("GOOGLE_CLOUD_PROJECT", "line-bot-prod");
        std::env::remove_var("PORT");

        let cfg = parse_config(expand_env_vars(DEPLOY_CONFIG).unwrap()).await.unwrap();

        assert_eq!(cfg.line.channel_id, "1657000000");
        assert_eq!(cfg.settings.server.port, "8080");
        assert_eq!(cfg.settings.logging.as_ref().map(|l| l.format.clone()), Some(LogFormat::Json));
        assert!(matches!(cfg.secrets, SecretsConfig::Gcp { ref project_id, .. } if project_id == "line-bot-prod"));
        assert!(matches!(cfg.store, StoreConfig::Datastore { ref namespace, .. } if namespace == "line-bot"));

        std::env::remove_var("CHANNEL_ID");
        std::env::remove_var("GOOGLE_CLOUD_PROJECT");
    }

    #[tokio::test]
    #[serial]
    async fn deploy_config_without_channel_id_is_rejected() {
        std::env::remove_var("CHANNEL_ID");
        std::env::set_var("GOOGLE_CLOUD_PROJECT", "line-bot-prod");

        let err = parse_config(expand_env_vars(DEPLOY_CONFIG).unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("line.channel_id"));

        std::env::remove_var("GOOGLE_CLOUD_PROJECT");
    }

    #[test]
    fn defaults_match_line_endpoints() {
        let cfg = minimal();
        assert!(validate_service_config(&cfg).is_ok());

        assert_eq!(cfg.settings.safety_margin_seconds, 300);
        assert_eq!(cfg.line.token_endpoint, "https://api.line.me/oauth2/v2.1/token");
        assert_eq!(cfg.line.audience, "https://api.line.me/");
        assert_eq!(cfg.line.proxy_prefix, "/line");
        assert_eq!(cfg.line.assertion_ttl_seconds, 1800);
        assert_eq!(cfg.line.access_token_ttl_seconds, 2_592_000);
        assert!(!cfg.line.cache_signing_key);

        let retry = RetryConfig::to_settings(&cfg.settings.retry);
        assert_eq!(retry.attempts, 1);
    }

    #[test]
    fn all_problems_are_reported_together() {
        let mut cfg = minimal();
        cfg.line.channel_id = " ".into();
        cfg.line.proxy_prefix = "/line/".into();
        cfg.line.token_endpoint = "ftp://api.line.me/token".into();
        cfg.settings.http_timeout_ms = 0;
        cfg.settings.server.port = "http".into();
        cfg.settings.retry = Some(RetryConfig { attempts: Some(0), base_delay_ms: Some(500), max_delay_ms: Some(100) });
        cfg.store = StoreConfig::File { path: "".into() };

        let errors = validate_service_config(&cfg).unwrap_err();

        assert_eq!(errors.len(), 8, "{errors:#?}");
        assert!(errors.iter().any(|e| e.contains("line.channel_id")));
        assert!(errors.iter().any(|e| e.contains("line.proxy_prefix")));
        assert!(errors.iter().any(|e| e.contains("unsupported scheme 'ftp'")));
        assert!(errors.iter().any(|e| e.contains("store.path")));
    }

    #[test]
    fn token_lifetime_must_exceed_margin() {
        let mut cfg = minimal();
        cfg.settings.safety_margin_seconds = 3600;
        cfg.line.access_token_ttl_seconds = 3600;

        let errors = validate_service_config(&cfg).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("must exceed settings.safety_margin_seconds"));
    }

    #[test]
    fn unknown_backend_type_fails_to_parse() {
        let result: Result<ServiceConfig, _> = serde_yaml::from_str(
            r#"
line:
  channel_id: "12345"
secrets:
  type: vault
store:
  type: memory
"#,
        );
        assert!(result.is_err());
    }
}
