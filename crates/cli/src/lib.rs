pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;

pub use taskflow_core as core;
pub use taskflow_core::model;

pub use taskflow_core::AppConfig;
