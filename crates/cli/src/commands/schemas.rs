use specwright_core::config::{AppConfig, LoadOptions};
use specwright_core::errors::ApplicationError;
use specwright_core::registry::SchemaRegistry;

use super::{config_failure, CommandResult};

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    match list(options, json_output) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::from_error("schemas", &error),
    }
}

fn list(options: &LoadOptions, json_output: bool) -> Result<String, ApplicationError> {
    let config = AppConfig::load(options.clone()).map_err(config_failure)?;
    let registry = SchemaRegistry::load(&config.registry.path)?;
    let configurations = registry.available_configurations();

    if json_output {
        return serde_json::to_string_pretty(&configurations)
            .map_err(|error| ApplicationError::Persistence(error.to_string()));
    }

    let mut lines = vec![format!(
        "{} requirement schema(s) registered in `{}`:",
        configurations.len(),
        config.registry.path.display()
    )];
    for entry in &configurations {
        let schema = registry.lookup_key(&entry.key)?;
        let fields = schema.fields().len();
        let mandatory = schema.mandatory_fields().count();
        lines.push(format!(
            "- {} (purpose: {}, model type: {}, fields: {fields}, mandatory: {mandatory})",
            entry.key, entry.purpose, entry.model_type
        ));
    }
    Ok(lines.join("\n"))
}
