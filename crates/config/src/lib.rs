// Configuration loading

pub mod compare;
pub mod error;
pub mod settings;

pub use compare::{CompareConfig, SideConfig};
pub use error::ConfigError;
pub use settings::Settings;
