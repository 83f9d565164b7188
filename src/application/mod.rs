// Application layer: the ledger writer and snapshot reader every client
// (CLI, HTTP) goes through.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
