//! CLI module for blindprice

pub mod app;
pub mod commands;

pub use app::{BlindPriceApp, DemoParams, DemoReport};
pub use commands::{Cli, Commands};
