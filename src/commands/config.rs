use anyhow::Result;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::SousVideConfig;
use crate::{paths, ui};

pub fn run(_ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(),
        ConfigCommand::Path => path(),
        ConfigCommand::Validate => validate(),
    }
}

fn show() -> Result<()> {
    let file = paths::config_file()?;
    let config = SousVideConfig::load_from(&file)?;

    ui::header("Configuration");
    ui::kv("Config file", &file.display().to_string());
    if !file.exists() {
        ui::dim("Not found, showing defaults");
    }
    println!();
    print!("{}", config.to_toml()?);

    Ok(())
}

fn path() -> Result<()> {
    println!("{}", paths::config_file()?.display());
    Ok(())
}

fn validate() -> Result<()> {
    let file = paths::config_file()?;

    let config = match SousVideConfig::load_from(&file) {
        Ok(config) => config,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            anyhow::bail!("Configuration is invalid");
        }
    };

    match config.validate() {
        Ok(()) => {
            ui::success(&format!("{} is valid", file.display()));
            Ok(())
        }
        Err(e) => {
            ui::error(&e.to_string());
            anyhow::bail!("Configuration is invalid");
        }
    }
}
