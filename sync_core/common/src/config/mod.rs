pub mod components;
pub mod error;
pub mod loader;

pub use components::global::EngineConfig;
pub use loader::{load_config_or_default, read_config, CONFIG_DIR_ENV, CONFIG_FILE_NAME};
