pub mod balances;
pub mod players;
pub mod schema;
pub mod tokens;
pub mod uploads;
