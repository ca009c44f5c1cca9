//! Config command

use std::path::Path;

use anyhow::Result;
use clevert_core::HostConfig;

use crate::cli::ConfigCommands;

pub fn run(cmd: ConfigCommands, config_dir: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(config_dir),
        ConfigCommands::Path => {
            println!("{}", super::loader(config_dir)?.config_path().display());
            Ok(())
        }
    }
}

fn show(config_dir: Option<&Path>) -> Result<()> {
    let (_, config) = super::load_config(config_dir)?;
    print!("{}", render(&config)?);
    Ok(())
}

fn render(config: &HostConfig) -> Result<String> {
    Ok(serde_yaml_ng::to_string(config)?)
}
