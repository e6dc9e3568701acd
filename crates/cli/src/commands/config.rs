use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use specwright_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let sources = SourceLookup { doc: config_file_doc.as_ref(), path: config_file_path };

    let entries: [(&str, String, &[&str]); 6] = [
        ("registry.path", display_path(&config.registry.path), &["SPECWRIGHT_REGISTRY_PATH"]),
        ("output.dir", display_path(&config.output.dir), &["SPECWRIGHT_OUTPUT_DIR"]),
        (
            "output.write_drafts",
            config.output.write_drafts.to_string(),
            &["SPECWRIGHT_OUTPUT_WRITE_DRAFTS"],
        ),
        ("sessions.dir", display_path(&config.sessions.dir), &["SPECWRIGHT_SESSIONS_DIR"]),
        (
            "logging.level",
            config.logging.level.clone(),
            &["SPECWRIGHT_LOGGING_LEVEL", "SPECWRIGHT_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["SPECWRIGHT_LOGGING_FORMAT", "SPECWRIGHT_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in entries {
        lines.push(format!("- {key} = {value} (source: {})", sources.source_of(key, env_keys)));
    }
    lines.join("\n")
}

struct SourceLookup<'a> {
    doc: Option<&'a Value>,
    path: Option<PathBuf>,
}

impl SourceLookup<'_> {
    fn source_of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
