//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::CaptureBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    sensors: Vec<String>,
    video: bool,
    recording: bool,
    container: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    sensors: blueprint
                        .streams
                        .sensors
                        .iter()
                        .map(|k| k.friendly_name().to_string())
                        .collect(),
                    video: blueprint.streams.video,
                    recording: blueprint.recording.enabled,
                    container: format!("{:?}", blueprint.recording.container),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal configuration issues
fn collect_warnings(blueprint: &CaptureBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if !blueprint.recording.enabled {
        warnings.push("Recording disabled - frames are only available to consumers".to_string());
    }

    if blueprint.depth_sensor().is_none() && blueprint.grayscale_sensors().next().is_none() {
        warnings.push("No research-mode sensor enabled - only color video will stream".to_string());
    }

    if blueprint.engine.transient_retry_limit == 0 {
        warnings.push(
            "engine.transient_retry_limit is 0 - a single dropped request stops the stream"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Sensors: {}", summary.sensors.join(", "));
            println!("  Video: {}", summary.video);
            println!("  Recording: {} ({})", summary.recording, summary.container);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_file(content: &str) -> ValidationResult {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.toml");
        std::fs::write(&path, content).unwrap();
        validate_config(&ValidateArgs {
            config: path,
            json: true,
        })
    }

    #[test]
    fn test_valid_config_summary() {
        let result = validate_file(
            "[streams]\nsensors = [\"left_front\", \"depth_ahat\"]\nvideo = true\n\n[recording]\nenabled = true\n",
        );
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.sensors, vec!["VLC LF", "AHAT"]);
        assert!(summary.video && summary.recording);
        assert!(result.warnings.is_none());
    }

    #[test]
    fn test_both_depth_modes_rejected() {
        let result =
            validate_file("[streams]\nsensors = [\"depth_long_throw\", \"depth_ahat\"]\n");
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("mutually exclusive"));
    }

    #[test]
    fn test_video_only_warns() {
        let result = validate_file("[streams]\nvideo = true\n");
        assert!(result.valid);
        assert_eq!(result.warnings.unwrap().len(), 2);
    }
}
