pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, toml_config::TomlConfig, CliConfig};
pub use crate::core::{engine::RagEngine, pipeline::RagPipeline};
pub use utils::error::{RagError, Result};
