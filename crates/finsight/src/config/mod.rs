pub mod loader;
pub mod schema;

pub use loader::{load_settings, load_settings_from_str, load_settings_with, CONFIG_PATH_ENV};
pub use schema::{AzureConfig, SearchConfig, Settings, DEFAULT_QUERY};
