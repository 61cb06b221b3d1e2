pub mod balance;
pub mod player;
pub mod quantity;
pub mod token;
pub mod upload;

pub use orm;
