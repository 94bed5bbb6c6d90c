use crate::error::ConfigError;
use crate::options::BridgeOptions;
use crate::types::ClientCredentials;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub options: BridgeOptions,

    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_engine")]
    pub engine: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            engine: default_engine(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub secret: String,
}

impl ClientConfig {
    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials {
            client_id: self.id.clone(),
            client_secret: self.secret.clone(),
        }
    }
}

/// Scripted calls the demo binary issues after initialization.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_true")]
    pub activate: bool,

    #[serde(default)]
    pub speak: Option<String>,

    #[serde(default)]
    pub synthesize: Option<String>,

    #[serde(default)]
    pub classify: Option<String>,

    #[serde(default)]
    pub voice: Option<String>,

    /// Markup code for speak/synthesize text: 0 text, 1 SSML, 2 Speech Markdown.
    #[serde(default)]
    pub format: i64,

    #[serde(default = "default_listen_ms")]
    pub listen_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            activate: default_true(),
            speak: None,
            synthesize: None,
            classify: None,
            voice: None,
            format: 0,
            listen_ms: default_listen_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_engine() -> String {
    "null".to_string()
}

fn default_true() -> bool {
    true
}

fn default_listen_ms() -> u64 {
    500
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static pattern is valid"))
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = input.to_string();

    for cap in env_var_pattern().captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
        }
    }

    Ok(result)
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PipelineProfile;

    #[test]
    fn test_config_parse_valid_toml() {
        let toml_str = r#"
[general]
log_level = "debug"
engine = "null"

[client]
id = "client-id"
secret = "client-secret"

[options]
traceLevel = 10

[options.wakeword]
detect = "https://cdn.example.com/detect.tflite"
encode = "https://cdn.example.com/encode.tflite"
filter = "https://cdn.example.com/filter.tflite"
wakewords = ["hey bridge"]

[options.pipeline]
profile = "TFLITE_WAKEWORD_NATIVE_ASR"

[session]
speak = "hello there"
format = 1
listen_ms = 250
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.client.credentials().client_id, "client-id");
        assert_eq!(config.options.trace_level, Some(10));
        assert!(config.options.wakeword.is_some());
        assert_eq!(
            config.options.pipeline.unwrap().profile,
            Some(PipelineProfile::TfliteWakewordNativeAsr)
        );
        assert_eq!(config.session.speak.as_deref(), Some("hello there"));
        assert_eq!(config.session.listen_ms, 250);
        assert_eq!(
            crate::types::SynthesisFormat::from_code(config.session.format),
            crate::types::SynthesisFormat::Ssml
        );
        assert!(config.session.activate);
    }

    #[test]
    fn test_config_default_values() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.engine, "null");
        assert!(config.client.id.is_empty());
        assert!(config.options.nlu.is_none());
        assert_eq!(config.session.listen_ms, 500);
        assert_eq!(config.session.format, 0);
    }

    #[test]
    fn test_config_env_var_interpolation() {
        std::env::set_var("VOXBRIDGE_TEST_SECRET", "secret123");
        let toml_str = r#"
[client]
secret = "${VOXBRIDGE_TEST_SECRET}"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.client.secret, "secret123");
        std::env::remove_var("VOXBRIDGE_TEST_SECRET");
    }

    #[test]
    fn test_config_missing_env_var_error() {
        let toml_str = r#"
[client]
id = "${DEFINITELY_DOES_NOT_EXIST_12345}"
"#;
        let err = AppConfig::from_toml_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("DEFINITELY_DOES_NOT_EXIST_12345"));
    }

    #[test]
    fn test_config_invalid_toml_error() {
        let result = AppConfig::from_toml_str("this is not valid toml [[[");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = std::env::temp_dir().join("voxbridge_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(
            &path,
            r#"
[general]
log_level = "warn"

[options.nlu]
model = "file:///models/nlu.tflite"
metadata = "file:///models/metadata.json"
vocab = "file:///models/vocab.txt"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert!(config.options.nlu.is_some());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_config_load_from_file_not_found() {
        let result = AppConfig::load_from_file(std::path::Path::new("/nonexistent/path.toml"));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("failed to read config file"));
    }
}
