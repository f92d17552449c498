use std::path::Path;
use crate::config::settings::ServiceConfig;
use crate::observability::metrics::get_metrics;
use anyhow::{anyhow, Result};
use regex::Regex;
use tracing::{debug, error};
use crate::config::proc_validator;

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = tokio::fs::read_to_string(path).await?;

    let expanded = expand_env_vars(&content)?;
    parse_config(expanded).await
}

pub async fn parse_config(content: String) -> Result<ServiceConfig> {
    let metrics = get_metrics().await;
    let service_config: ServiceConfig = serde_yaml::from_str(&content)
        .inspect_err(|e| {
            error!("parse config error: {}", e);
            metrics.config_validation_errors.inc();
        })?;

    debug!("validation config ...");
    proc_validator::validate_service_config(&service_config)
        .map_err(|errors| {
            metrics.config_validation_errors.inc_by(errors.len() as u64);
            anyhow!(errors.join("; "))
        })?;

    Ok(service_config)
}

/// Replace `${VAR}` / `${VAR:default}` with values from the environment.
pub fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]*))?\}")?;
    let expanded = re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    });
    Ok(expanded.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn expands_set_and_default_variables() {
        std::env::set_var("LINE_PROXY_TEST_CHANNEL", "998877");
        std::env::remove_var("LINE_PROXY_TEST_PORT");

        let out = expand_env_vars("id: ${LINE_PROXY_TEST_CHANNEL}\nport: ${LINE_PROXY_TEST_PORT:8080}\nempty: '${LINE_PROXY_TEST_PORT}'").unwrap();

        assert_eq!(out, "id: 998877\nport: 8080\nempty: ''");
        std::env::remove_var("LINE_PROXY_TEST_CHANNEL");
    }

    #[tokio::test]
    #[serial]
    async fn loads_file_with_environment_overrides() {
        std::env::set_var("LINE_PROXY_TEST_PROJECT", "my-project");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line-proxy.yaml");
        std::fs::write(&path, r#"
line:
  channel_id: "12345"
secrets:
  type: gcp
  project_id: ${LINE_PROXY_TEST_PROJECT}
store:
  type: datastore
  project_id: ${LINE_PROXY_TEST_PROJECT}
"#).unwrap();

        let cfg = file_to_config(&path).await.unwrap();
        match cfg.store {
            crate::config::settings::StoreConfig::Datastore { project_id, namespace, .. } => {
                assert_eq!(project_id, "my-project");
                assert_eq!(namespace, "line-bot");
            }
            other => panic!("unexpected store config {:?}", other),
        }
        assert_eq!(cfg.settings.safety_margin_seconds, 300);
        assert_eq!(cfg.line.proxy_prefix, "/line");
        std::env::remove_var("LINE_PROXY_TEST_PROJECT");
    }
}
