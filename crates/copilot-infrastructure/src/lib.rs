//! Filesystem and host-facing services for copilot-shell.

pub mod config_storage;
pub mod env_info;
pub mod paths;
pub mod script_storage;

pub use config_storage::{ConfigStorage, apply_env_overrides, apply_process_env};
pub use env_info::HostInfo;
pub use paths::CopilotPaths;
pub use script_storage::ScriptStorage;
