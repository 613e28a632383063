//! Repo Chat
//!
//! A conversational query orchestrator over a repository analytics gateway:
//! - Tool router dispatching LLM tool calls to the gateway (chart / text)
//! - Result shaping: head+tail row samples and chart classification
//! - Import readiness polling with a bounded, cancellable wait
//! - Feedback relay with an observable remediation state
//! - Registry of user-opened repositories

pub mod conversation;
pub mod error;
pub mod feedback;
pub mod gateway;
pub mod readiness;
pub mod registry;
pub mod shaper;
pub mod tools;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use feedback::FeedbackRelay;
use gateway::{HttpGateway, QueryGateway, RepoId};
use readiness::{PollerConfig, ReadinessPoller};
use registry::{JsonFileStore, RepositoryRegistry};
use shaper::{ChartClassifier, HttpChartClassifier};
use tools::ToolRouter;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub gateway: GatewayYamlConfig,
    pub classifier: ClassifierYamlConfig,
    pub readiness: ReadinessYamlConfig,
    pub registry: RegistryYamlConfig,
}

/// Analytics gateway section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayYamlConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for GatewayYamlConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".into(),
            timeout_secs: 30,
        }
    }
}

/// Chart classifier section (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierYamlConfig {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Optional cap on rows sent to the model; unset sends the full result
    pub max_rows: Option<usize>,
}

impl Default for ClassifierYamlConfig {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-4o".into(),
            api_key: None,
            max_rows: None,
        }
    }
}

/// Readiness poller section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReadinessYamlConfig {
    pub budget_secs: u64,
    pub interval_ms: u64,
    pub margin_secs: u64,
}

impl Default for ReadinessYamlConfig {
    fn default() -> Self {
        Self {
            budget_secs: 60,
            interval_ms: 1000,
            margin_secs: 5,
        }
    }
}

/// Registry section; no path means the platform data directory
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RegistryYamlConfig {
    pub path: Option<String>,
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_url: String,
    pub gateway_timeout: Duration,
    pub classifier_url: String,
    pub classifier_model: String,
    pub classifier_api_key: Option<String>,
    pub classifier_max_rows: Option<usize>,
    pub readiness: PollerConfig,
    pub registry_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let readiness = PollerConfig {
            budget: Duration::from_secs(
                env_parse("READINESS_BUDGET_SECS")?.unwrap_or(yaml.readiness.budget_secs),
            ),
            interval: Duration::from_millis(
                env_parse("READINESS_INTERVAL_MS")?.unwrap_or(yaml.readiness.interval_ms),
            ),
            margin: Duration::from_secs(
                env_parse("READINESS_MARGIN_SECS")?.unwrap_or(yaml.readiness.margin_secs),
            ),
        };
        if let Err(reason) = readiness.validate() {
            anyhow::bail!("Invalid readiness config: {}", reason);
        }

        let registry_path = std::env::var("REGISTRY_PATH")
            .ok()
            .or(yaml.registry.path)
            .map(PathBuf::from)
            .unwrap_or_else(registry::default_registry_path);

        Ok(Self {
            gateway_url: std::env::var("GATEWAY_URL").unwrap_or(yaml.gateway.url),
            gateway_timeout: Duration::from_secs(
                env_parse("GATEWAY_TIMEOUT_SECS")?.unwrap_or(yaml.gateway.timeout_secs),
            ),
            classifier_url: std::env::var("CLASSIFIER_URL").unwrap_or(yaml.classifier.url),
            classifier_model: std::env::var("CLASSIFIER_MODEL").unwrap_or(yaml.classifier.model),
            classifier_api_key: std::env::var("CLASSIFIER_API_KEY")
                .ok()
                .or(yaml.classifier.api_key),
            classifier_max_rows: yaml.classifier.max_rows,
            readiness,
            registry_path,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Read a numeric env var; unset is `None`, unparseable is an error
fn env_parse<T>(var: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", var, raw)),
        Err(_) => Ok(None),
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn QueryGateway>,
    pub classifier: Arc<dyn ChartClassifier>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state with all services initialized
    pub fn new(config: Config) -> Result<Self> {
        let gateway = Arc::new(
            HttpGateway::new(&config.gateway_url, config.gateway_timeout)
                .context("Failed to build gateway client")?,
        );

        let classifier = Arc::new(
            HttpChartClassifier::new(
                &config.classifier_url,
                &config.classifier_model,
                config.classifier_api_key.clone(),
                config.classifier_max_rows,
                config.gateway_timeout,
            )
            .context("Failed to build chart classifier")?,
        );

        Ok(Self::with_services(gateway, classifier, config))
    }

    /// State over already-built services (mocks in tests)
    pub fn with_services(
        gateway: Arc<dyn QueryGateway>,
        classifier: Arc<dyn ChartClassifier>,
        config: Config,
    ) -> Self {
        Self {
            gateway,
            classifier,
            config: Arc::new(config),
        }
    }

    pub fn router(&self, repo: RepoId) -> ToolRouter {
        ToolRouter::new(self.gateway.clone(), self.classifier.clone(), repo)
    }

    pub fn poller(&self) -> ReadinessPoller {
        ReadinessPoller::new(self.gateway.clone(), self.config.readiness)
    }

    pub fn feedback_relay(&self, repo: RepoId) -> FeedbackRelay {
        FeedbackRelay::new(self.gateway.clone(), repo)
    }

    /// Registry backed by the configured file
    pub fn registry(&self) -> RepositoryRegistry {
        RepositoryRegistry::new(Box::new(JsonFileStore::new(&self.config.registry_path)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
gateway:
  url: http://gateway:9000
  timeout_secs: 10

classifier:
  model: gpt-4o-mini
  api_key: sk-test
  max_rows: 20

readiness:
  budget_secs: 120
  interval_ms: 500

registry:
  path: /tmp/repos.json
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.gateway.url, "http://gateway:9000");
        assert_eq!(config.gateway.timeout_secs, 10);
        assert_eq!(config.classifier.model, "gpt-4o-mini");
        assert_eq!(config.classifier.api_key, Some("sk-test".into()));
        assert_eq!(config.classifier.max_rows, Some(20));
        // Unset fields of a present section keep their defaults
        assert_eq!(
            config.classifier.url,
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(config.readiness.budget_secs, 120);
        assert_eq!(config.readiness.margin_secs, 5);
        assert_eq!(config.registry.path, Some("/tmp/repos.json".into()));
    }

    #[test]
    fn test_yaml_defaults() {
        let config = YamlConfig::default();
        assert_eq!(config.gateway.url, "http://localhost:8000");
        assert_eq!(config.gateway.timeout_secs, 30);
        assert_eq!(config.classifier.model, "gpt-4o");
        assert!(config.classifier.api_key.is_none());
        assert!(config.classifier.max_rows.is_none());
        assert_eq!(config.readiness.budget_secs, 60);
        assert_eq!(config.readiness.interval_ms, 1000);
        assert!(config.registry.path.is_none());
    }

    /// Combined test for YAML file loading and env var overrides.
    /// Runs as a single test to avoid parallel env var race conditions.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &[
                "GATEWAY_URL",
                "GATEWAY_TIMEOUT_SECS",
                "CLASSIFIER_URL",
                "CLASSIFIER_MODEL",
                "CLASSIFIER_API_KEY",
                "READINESS_BUDGET_SECS",
                "READINESS_INTERVAL_MS",
                "READINESS_MARGIN_SECS",
                "REGISTRY_PATH",
            ] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
gateway:
  url: http://yaml-gateway:8000
readiness:
  budget_secs: 30
  margin_secs: 2
registry:
  path: /tmp/yaml-repos.json
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.gateway_url, "http://yaml-gateway:8000");
        assert_eq!(config.readiness.budget, Duration::from_secs(30));
        assert_eq!(config.readiness.deadline(), Duration::from_secs(28));
        assert_eq!(config.registry_path, PathBuf::from("/tmp/yaml-repos.json"));

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("GATEWAY_URL", "http://env-gateway:8000");
        std::env::set_var("READINESS_INTERVAL_MS", "250");
        std::env::set_var("CLASSIFIER_API_KEY", "sk-env");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.gateway_url, "http://env-gateway:8000");
        assert_eq!(config.readiness.interval, Duration::from_millis(250));
        assert_eq!(config.classifier_api_key, Some("sk-env".into()));
        // YAML value still used where no env override
        assert_eq!(config.readiness.budget, Duration::from_secs(30));

        // --- Phase 3: Unparseable number is an error ---
        std::env::set_var("GATEWAY_TIMEOUT_SECS", "soon");
        assert!(Config::from_yaml_and_env(Some(&file_path)).is_err());
        std::env::remove_var("GATEWAY_TIMEOUT_SECS");

        // --- Phase 4: A budget not larger than the margin is rejected ---
        std::env::set_var("READINESS_BUDGET_SECS", "2");
        let err = Config::from_yaml_and_env(Some(&file_path)).unwrap_err();
        assert!(err.to_string().contains("readiness"));
        std::env::set_var("READINESS_BUDGET_SECS", "30");
        std::env::set_var("READINESS_INTERVAL_MS", "0");
        assert!(Config::from_yaml_and_env(Some(&file_path)).is_err());

        clear_env();

        // --- Phase 5: No YAML file → defaults ---
        let nonexistent = Path::new("/tmp/nonexistent-repo-chat-config-12345.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert_eq!(config.gateway_url, "http://localhost:8000");
        assert_eq!(config.gateway_timeout, Duration::from_secs(30));
        assert_eq!(config.readiness, PollerConfig::default());
        assert!(config.registry_path.ends_with("repositories.json"));
    }

    #[test]
    fn test_app_state_builds_from_defaults() {
        let config = Config {
            gateway_url: "http://localhost:8000".into(),
            gateway_timeout: Duration::from_secs(5),
            classifier_url: "http://localhost:8001/v1/chat/completions".into(),
            classifier_model: "gpt-4o".into(),
            classifier_api_key: None,
            classifier_max_rows: None,
            readiness: PollerConfig::default(),
            registry_path: PathBuf::from("/tmp/repo-chat-test-repositories.json"),
        };
        let state = AppState::new(config).unwrap();
        let router = state.router(RepoId::new("openai", "whisper"));
        assert_eq!(router.repo().to_string(), "openai/whisper");
    }
}
