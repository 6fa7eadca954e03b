pub mod config;
pub mod types;

pub use config::{PoolgateConfig, StoreBackend, StoreConfig, ValidationConfig};
pub use types::*;
