//! Persistence seam for plugin-generated scripts.

use std::path::PathBuf;

use crate::error::Result;

/// Writes a script body somewhere executable and returns its path.
pub trait ScriptWriter: Send + Sync {
    fn write_script(&self, body: &str) -> Result<PathBuf>;
}

/// The command offered to the user for a persisted script.
pub fn script_invocation(path: &std::path::Path) -> String {
    format!("bash {}", path.display())
}
