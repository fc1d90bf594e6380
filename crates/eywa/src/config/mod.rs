mod dirs;
mod settings;
mod validation;

pub use dirs::{CONFIG_ENV_VAR, Directories, default_config_path};
pub use settings::{Config, RpcConfig, StorageConfig};
pub use validation::warn_unknown_fields;
