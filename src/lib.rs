pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod http;
pub mod logging;
pub mod storage;

pub use application::{LedgerError, LedgerService};
pub use config::StoreConfig;
pub use domain::*;
pub use storage::Repository;
