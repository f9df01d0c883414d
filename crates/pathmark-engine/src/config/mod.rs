pub mod loader;
pub mod schema;

pub use loader::{CONFIG_ENV, ConfigError, ConfigLoader};
pub use schema::{CaptureConfig, GroupingConfig, HighlightConfig, PathmarkConfig, StoreConfig};
