//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `catalog_core` linkage, configuration and storage bootstrap.
//! - Keep output deterministic for quick local sanity checks.

use catalog_core::db::migrations::latest_version;
use catalog_core::{CoreConfig, SqliteCatalogStore};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("catalog_core error={message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    catalog_core::init_from_config(&config).map_err(|err| err.to_string())?;

    let conn = catalog_core::db::open_configured(&config).map_err(|err| err.to_string())?;
    SqliteCatalogStore::try_new(&conn).map_err(|err| err.to_string())?;
    info!("event=cli_probe module=cli status=ok");

    println!("catalog_core ping={}", catalog_core::ping());
    println!("catalog_core version={}", catalog_core::core_version());
    println!("catalog_core schema_version={}", latest_version());
    Ok(())
}
