pub mod checkin;
pub mod config;
pub mod contact;
pub mod history;
pub mod notify;
pub mod status;

use vigil_core::{CheckInService, Config, Database, SystemClock};

/// Service over the on-disk database, using the configured calendar offset.
pub(crate) fn open_service() -> Result<CheckInService<Database, SystemClock>, Box<dyn std::error::Error>> {
    open_service_with(&Config::load()?)
}

pub(crate) fn open_service_with(
    config: &Config,
) -> Result<CheckInService<Database, SystemClock>, Box<dyn std::error::Error>> {
    let db = Database::open()?;
    Ok(CheckInService::new(db, SystemClock, config.streak_engine()))
}
