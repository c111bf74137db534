//! Handler functions for `warden config {path,init,show}`.

use std::path::PathBuf;

use warden_core::{Error, Result};

use crate::cli::ConfigAction;
use crate::config::WardenConfig;

/// Handle a config subcommand.
///
/// Receives the raw `--config` path because `path` and `init` work before a
/// config file exists.
pub fn handle_config_command(config_path: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path(config_path),
        ConfigAction::Init { file, force } => cmd_config_init(file.as_deref(), force).map(|_| ()),
        ConfigAction::Show { env } => {
            let config = WardenConfig::load(config_path)?;
            println!("{}", render_config(&config, env)?);
            Ok(())
        }
    }
}

fn cmd_config_path(config_path: Option<&str>) -> Result<()> {
    let path = WardenConfig::resolve_config_path(config_path).ok_or_else(|| {
        Error::config("Could not determine config directory for this platform")
    })?;
    println!("{}", path.display());
    if !path.exists() {
        eprintln!("(file does not exist, run `warden config init` to create it)");
    }
    Ok(())
}

/// Writes the default configuration and returns where it went.
fn cmd_config_init(file: Option<&str>, force: bool) -> Result<PathBuf> {
    let path = match file {
        Some(p) => PathBuf::from(p),
        None => WardenConfig::default_config_path()
            .ok_or_else(|| Error::config("Could not determine config directory"))?,
    };

    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let toml_str = WardenConfig::default().to_toml_string()?;
    std::fs::write(&path, &toml_str).map_err(|e| Error::io_with_path(e, &path))?;

    println!("Config file created at {}", path.display());
    Ok(path)
}

/// Effective configuration as TOML or as `KEY=value` lines.
fn render_config(config: &WardenConfig, as_env: bool) -> Result<String> {
    if !as_env {
        return config.to_toml_string();
    }
    let lines: Vec<String> = config
        .to_env_vars()?
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    Ok(lines.join("\n"))
}
