pub mod amount;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod store;
pub mod types;

pub use amount::Amount;
pub use error::Error;
