use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    /// Traced nodes, injected read-only. The engine only ever takes the count.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub endpoint_base: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    pub ip: String,
    pub port: u16,
}

fn default_history_path() -> String {
    "/trace/history".to_string()
}

fn default_refresh_interval_ms() -> u64 {
    5000
}

impl NodeConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl EngineConfig {
    pub fn history_url(&self) -> String {
        format!(
            "{}{}",
            self.endpoint_base.trim_end_matches('/'),
            self.history_path
        )
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
            [engine]
            endpoint_base = "http://127.0.0.1:7000/api"
            history_path = "/trace/history"
            refresh_interval_ms = 2000

            [[nodes]]
            ip = "127.0.0.1"
            port = 4445

            [[nodes]]
            ip = "127.0.0.1"
            port = 4446
        "#;

        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.engine.endpoint_base, "http://127.0.0.1:7000/api");
        assert_eq!(cfg.engine.refresh_interval_ms, 2000);
        assert_eq!(cfg.nodes.len(), 2);
        assert_eq!(cfg.nodes[1].port, 4446);
        assert_eq!(cfg.nodes[1].address(), "127.0.0.1:4446");
        assert!(cfg.validate().is_ok());
        assert_eq!(
            cfg.engine.history_url(),
            "http://127.0.0.1:7000/api/trace/history"
        );
    }

    #[test]
    fn test_defaults() {
        let toml_str = r#"
            [engine]
            endpoint_base = "http://localhost:7000/api/"
        "#;

        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.engine.history_path, "/trace/history");
        assert_eq!(cfg.engine.refresh_interval_ms, 5000);
        assert!(cfg.nodes.is_empty());
        // trailing slash on the base must not double up
        assert_eq!(
            cfg.engine.history_url(),
            "http://localhost:7000/api/trace/history"
        );
    }

    #[test]
    fn test_zero_refresh_interval_is_rejected() {
        let toml_str = r#"
            [engine]
            endpoint_base = "http://localhost:7000/api"
            refresh_interval_ms = 0
        "#;

        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }
}
