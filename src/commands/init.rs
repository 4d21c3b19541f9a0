//! Init command implementation

use crate::config::{render_config_toml, Config};
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub config_path: PathBuf,
    pub force: bool,
}

/// Write a commented default configuration file
pub fn cmd_init(options: InitOptions) -> Result<PathBuf> {
    let InitOptions { config_path, force } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.init_paths(config_path.parent().map(PathBuf::from));
    config.paths.config_file = config_path.clone();
    config.validate()?;

    let rendered = render_config_toml(&config)?;
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config_path, rendered)?;
    info!("Created config at {:?}", config_path);

    Ok(config_path)
}

pub fn print_init(path: &std::path::Path) {
    println!("✓ Wrote configuration to {}", path.display());
    println!("  Next: kbctl index reconcile, then kbctl status");
}
