//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use driftpad_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str =
    "data_dir, remote_url, debounce_ms, quiet_period_ms, poll_interval_ms, probe_interval_secs, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "remote_url": config.remote_url,
                    "debounce_ms": config.debounce_ms,
                    "quiet_period_ms": config.quiet_period_ms,
                    "poll_interval_ms": config.poll_interval_ms,
                    "probe_interval_secs": config.probe_interval_secs,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:            {}", config.data_dir.display());
            println!(
                "  remote_url:          {}",
                config.remote_url.as_deref().unwrap_or("(not set)")
            );
            println!("  debounce_ms:         {}", config.debounce_ms);
            println!("  quiet_period_ms:     {}", config.quiet_period_ms);
            println!("  poll_interval_ms:    {}", config.poll_interval_ms);
            println!("  probe_interval_secs: {}", config.probe_interval_secs);
            println!(
                "  log_file:            {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Apply one `key = value` assignment
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let unset = value.is_empty() || value == "none";

    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "remote_url" => {
            config.remote_url = if unset { None } else { Some(value.to_string()) };
        }
        "debounce_ms" => {
            config.debounce_ms = parse_number(key, value)?;
        }
        "quiet_period_ms" => {
            config.quiet_period_ms = parse_number(key, value)?;
        }
        "poll_interval_ms" => {
            config.poll_interval_ms = parse_number(key, value)?;
        }
        "probe_interval_secs" => {
            config.probe_interval_secs = parse_number(key, value)?;
        }
        "log_file" => {
            config.log_file = if unset { None } else { Some(value.into()) };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }

    Ok(())
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}. Use a whole number.", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_apply() {
        let mut config = Config::default();

        apply(&mut config, "remote_url", "https://pad.example.com").unwrap();
        assert_eq!(
            config.remote_url.as_deref(),
            Some("https://pad.example.com")
        );
        apply(&mut config, "remote_url", "none").unwrap();
        assert!(config.remote_url.is_none());

        apply(&mut config, "debounce_ms", "250").unwrap();
        assert_eq!(config.debounce_ms, 250);
        assert!(apply(&mut config, "debounce_ms", "soon").is_err());

        assert!(apply(&mut config, "sync_url", "x").is_err());
    }

    #[test]
    fn test_set_writes_to_cli_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let data_dir = temp_dir.path().join("data");
        std::fs::write(&path, format!("data_dir = {:?}\n", data_dir)).unwrap();
        let output = Output::new(OutputFormat::Quiet);

        set(
            "quiet_period_ms".to_string(),
            "750".to_string(),
            Some(&path),
            &output,
        )
        .unwrap();

        let saved = Config::load_from_path(&path).unwrap();
        assert_eq!(saved.quiet_period_ms, 750);
        assert_eq!(saved.data_dir, data_dir);
    }
}
