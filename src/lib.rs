pub mod commands;
pub mod config;
pub mod error;
pub mod harness;
pub mod parser;
pub mod report;
pub mod ui;
pub mod utils;

pub use error::{HarnessError, Result};
