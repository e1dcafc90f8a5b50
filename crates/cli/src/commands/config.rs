//! The `check-config` command.

use anyhow::{Context, Result};
use chainwatch_core::AppConfig;
use std::path::Path;

pub fn run_check_config(path: &Path) -> Result<()> {
    let app = AppConfig::load(Some(path)).context("configuration is invalid")?;
    println!("{}", serde_json::to_string_pretty(&app)?);
    Ok(())
}
