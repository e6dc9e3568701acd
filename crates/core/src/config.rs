use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub registry: RegistryConfig,
    pub output: OutputConfig,
    pub sessions: SessionsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub write_drafts: bool,
}

#[derive(Clone, Debug)]
pub struct SessionsConfig {
    pub dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub registry_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub sessions_dir: Option<PathBuf>,
    pub write_drafts: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["specwright.toml", "config/specwright.toml"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig { path: PathBuf::from("requirements_context.json") },
            output: OutputConfig { dir: PathBuf::from("outputs"), write_drafts: true },
            sessions: SessionsConfig { dir: PathBuf::from("outputs/sessions") },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Precedence: defaults < file < `SPECWRIGHT_*` environment < overrides.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(registry) = patch.registry {
            if let Some(path) = registry.path {
                self.registry.path = path;
            }
        }

        if let Some(output) = patch.output {
            if let Some(dir) = output.dir {
                self.output.dir = dir;
            }
            if let Some(write_drafts) = output.write_drafts {
                self.output.write_drafts = write_drafts;
            }
        }

        if let Some(sessions) = patch.sessions {
            if let Some(dir) = sessions.dir {
                self.sessions.dir = dir;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SPECWRIGHT_REGISTRY_PATH") {
            self.registry.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("SPECWRIGHT_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("SPECWRIGHT_OUTPUT_WRITE_DRAFTS") {
            self.output.write_drafts = parse_bool("SPECWRIGHT_OUTPUT_WRITE_DRAFTS", &value)?;
        }
        if let Some(value) = read_env("SPECWRIGHT_SESSIONS_DIR") {
            self.sessions.dir = PathBuf::from(value);
        }

        let log_level =
            read_env("SPECWRIGHT_LOGGING_LEVEL").or_else(|| read_env("SPECWRIGHT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SPECWRIGHT_LOGGING_FORMAT").or_else(|| read_env("SPECWRIGHT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(registry_path) = overrides.registry_path {
            self.registry.path = registry_path;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.output.dir = output_dir;
        }
        if let Some(sessions_dir) = overrides.sessions_dir {
            self.sessions.dir = sessions_dir;
        }
        if let Some(write_drafts) = overrides.write_drafts {
            self.output.write_drafts = write_drafts;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_registry(&self.registry)?;
        validate_dir("output.dir", &self.output.dir)?;
        validate_dir("sessions.dir", &self.sessions.dir)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// First existing config file, either the explicit one or a default candidate.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_registry(registry: &RegistryConfig) -> Result<(), ConfigError> {
    let path = registry.path.to_string_lossy();
    if path.trim().is_empty() {
        return Err(ConfigError::Validation("registry.path must not be empty".to_string()));
    }
    let is_json = registry
        .path
        .extension()
        .map(|extension| extension.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if !is_json {
        return Err(ConfigError::Validation(format!(
            "registry.path must point to a `.json` requirement schema file (got `{path}`)"
        )));
    }
    Ok(())
}

fn validate_dir(key: &str, dir: &Path) -> Result<(), ConfigError> {
    if dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(format!("{key} must not be empty")));
    }
    if dir.is_file() {
        return Err(ConfigError::Validation(format!(
            "{key} points to a file, expected a directory: `{}`",
            dir.display()
        )));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    registry: Option<RegistryPatch>,
    output: Option<OutputPatch>,
    sessions: Option<SessionsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputPatch {
    dir: Option<PathBuf>,
    write_drafts: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionsPatch {
    dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
