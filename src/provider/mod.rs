pub mod engine;
pub mod quote;
pub mod signer;

pub use engine::ReservationEngine;
pub use quote::{Clock, QuoteFactory, SystemClock};
pub use signer::{LocalSigner, Signer};
