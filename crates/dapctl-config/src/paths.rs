//! Filesystem locations used by dapctl

use crate::constants::{DEFAULT_STATE_FILENAME, ENV_DAPCTL_HOME};
use std::path::{Path, PathBuf};

/// dapctl home directory (`$DAPCTL_HOME` or `~/.dapctl`)
pub fn dapctl_home() -> PathBuf {
    if let Ok(home) = std::env::var(ENV_DAPCTL_HOME) {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dapctl")
}

/// Default key-value state file in the dapctl home
pub fn default_state_path() -> PathBuf {
    dapctl_home().join(DEFAULT_STATE_FILENAME)
}

/// Launch file of a workspace root
pub fn launch_file_path(root: &Path, launch_file: &str) -> PathBuf {
    root.join(launch_file)
}

/// Create the parent directory of `path` if it does not exist
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_file_path_is_relative_to_root() {
        let path = launch_file_path(Path::new("/work/app"), ".dapctl/launch.json");
        assert_eq!(path, PathBuf::from("/work/app/.dapctl/launch.json"));
    }

    #[test]
    fn test_ensure_parent_dir_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a/b/state.json");
        ensure_parent_dir(&file).unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }
}
