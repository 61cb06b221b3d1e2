pub mod balances;
pub mod config;
pub mod context;
pub mod db;
pub mod enrichment;
pub mod farms;
pub mod ledger;
#[cfg(test)]
mod memory;
pub mod players;
mod postgres;
pub mod signature;
pub mod store;
pub mod sync;
pub mod tokens;
pub mod uploads;

pub fn parse_dur(dur: &str) -> anyhow::Result<std::time::Duration> {
    use anyhow::Context;
    duration_str::parse_std(dur).context("Failed to parse duration string")
}
