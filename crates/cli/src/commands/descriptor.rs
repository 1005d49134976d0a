use crate::commands::CommandResult;
use voicepay_core::config::{AppConfig, LoadOptions};

/// Prints the agent descriptor exactly as `/ai` would serve it.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "descriptor",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let descriptor = match config.agent_descriptor() {
        Ok(descriptor) => descriptor,
        Err(error) => {
            return CommandResult::failure("descriptor", "config_validation", error.to_string(), 2);
        }
    };

    match serde_json::to_string_pretty(&descriptor.build()) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("descriptor", "serialization", error.to_string(), 7),
    }
}
