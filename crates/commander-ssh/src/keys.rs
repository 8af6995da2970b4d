//! Identity file lookup

use crate::SessionError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default directory holding the user's SSH keys
pub fn ssh_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh"))
}

/// Resolve an identity file given on the command line.
///
/// A path that exists is used as is. A bare file name that does not exist
/// in the working directory is looked up in `~/.ssh`.
pub fn resolve_identity_file(path: &Path) -> Result<PathBuf, SessionError> {
    resolve_in(path, ssh_dir().as_deref())
}

fn resolve_in(path: &Path, ssh_dir: Option<&Path>) -> Result<PathBuf, SessionError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    let is_bare_name = path.components().count() == 1;
    if is_bare_name {
        if let Some(dir) = ssh_dir {
            let candidate = dir.join(path);
            if candidate.is_file() {
                debug!("Using identity file {}", candidate.display());
                return Ok(candidate);
            }
        }
    }

    Err(SessionError::Configuration(format!(
        "identity file not found: {}",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_existing_path_is_used_as_is() {
        let dir = tempdir().unwrap();
        let key = dir.path().join("deploy_key");
        fs::write(&key, "key").unwrap();

        let resolved = resolve_in(&key, None).unwrap();
        assert_eq!(resolved, key);
    }

    #[test]
    fn test_bare_name_falls_back_to_ssh_dir() {
        let ssh = tempdir().unwrap();
        fs::write(ssh.path().join("id_commander_test"), "key").unwrap();

        let resolved = resolve_in(Path::new("id_commander_test"), Some(ssh.path())).unwrap();
        assert_eq!(resolved, ssh.path().join("id_commander_test"));
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let ssh = tempdir().unwrap();

        let err = resolve_in(Path::new("id_missing"), Some(ssh.path())).unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
    }

    #[test]
    fn test_nested_path_is_not_looked_up_in_ssh_dir() {
        let ssh = tempdir().unwrap();
        fs::create_dir(ssh.path().join("keys")).unwrap();
        fs::write(ssh.path().join("keys").join("id"), "key").unwrap();

        let result = resolve_in(Path::new("keys/id"), Some(ssh.path()));
        assert!(result.is_err());
    }
}
