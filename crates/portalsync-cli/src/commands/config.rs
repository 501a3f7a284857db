//! Config command handlers

use anyhow::{Context, Result};

use portalsync_core::Config;

use crate::output::{Output, OutputFormat};

fn or_unset(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(not set)")
}

/// Show current configuration, secrets masked
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load()
        .context("Failed to load configuration")?
        .redacted();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config": config,
                    "instance_url": config.instance_url(),
                    "configured": config.is_configured(),
                    "config_file": Config::config_file_path()
                })
            );
        }
        OutputFormat::Quiet => {
            if let Some(url) = config.instance_url() {
                println!("{}", url);
            }
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  instance_name:         {}", or_unset(&config.instance_name));
            println!("  crm_region:            {}", or_unset(&config.crm_region));
            println!("  tenant_id:             {}", or_unset(&config.tenant_id));
            println!("  client_id:             {}", or_unset(&config.client_id));
            println!("  client_secret:         {}", or_unset(&config.client_secret));
            println!("  access_token:          {}", or_unset(&config.access_token));
            println!("  use_folders_for_files: {}", config.use_folders_for_files);
            println!("  periodic_refresh:      {}", config.periodic_refresh);
            println!("  refresh_interval_secs: {}", config.refresh_interval_secs);
            println!("  request_timeout_ms:    {}", config.request_timeout_ms);
            println!(
                "  ignored_extensions:    {}",
                config.ignored_extensions.join(", ")
            );
            println!();
            if !config.is_configured() {
                println!("Not ready: set instance_name, crm_region and credentials.");
            }
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    config.set(&key, &value)?;
    config.save().context("Failed to save configuration")?;

    let shown = if matches!(key.as_str(), "client_secret" | "access_token") {
        "********"
    } else {
        value.as_str()
    };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}
