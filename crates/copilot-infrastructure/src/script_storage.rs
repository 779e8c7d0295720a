//! Persists plugin-generated scripts as executable files.

use std::fs;
use std::path::{Path, PathBuf};

use copilot_core::{Result, ScriptWriter};

use crate::paths::CopilotPaths;

const SCRIPT_PREFIX: &str = "plugin_gen_script_";

/// Writes scripts under a single directory as `plugin_gen_script_<8 hex>.sh`.
#[derive(Debug, Clone)]
pub struct ScriptStorage {
    dir: PathBuf,
}

impl ScriptStorage {
    /// Storage under the default scripts directory.
    pub fn new() -> Result<Self> {
        Ok(Self::with_dir(CopilotPaths::scripts_dir()?))
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&self) -> PathBuf {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.dir.join(format!("{SCRIPT_PREFIX}{}.sh", &id[..8]))
    }
}

impl ScriptWriter for ScriptStorage {
    fn write_script(&self, body: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.next_path();
        fs::write(&path, body)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o700))?;
        }

        tracing::info!(path = %path.display(), "saved plugin script");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_script_name_and_content() {
        let dir = TempDir::new().unwrap();
        let storage = ScriptStorage::with_dir(dir.path().join("scripts"));
        let path = storage.write_script("#!/bin/bash\necho ok\n").unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(SCRIPT_PREFIX));
        assert!(name.ends_with(".sh"));
        assert_eq!(name.len(), SCRIPT_PREFIX.len() + 8 + 3);
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/bash\necho ok\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_script_is_owner_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = ScriptStorage::with_dir(dir.path());
        let path = storage.write_script("true").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_each_script_gets_a_new_file() {
        let dir = TempDir::new().unwrap();
        let storage = ScriptStorage::with_dir(dir.path());
        let a = storage.write_script("echo a").unwrap();
        let b = storage.write_script("echo b").unwrap();
        assert_ne!(a, b);
    }
}
