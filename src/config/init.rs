//! Config directory bootstrap
//!
//! The base directory holds `config.toml` and a `secrets/` directory for
//! encrypted password files. Both are restricted to the owner.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::ConfigError;

/// Config file name inside the base directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory for secrets inside the base directory
pub const SECRETS_DIR_NAME: &str = "secrets";

const APP_DIR_NAME: &str = "wrestic";

/// The default base config directory: the platform config directory
/// (`$XDG_CONFIG_HOME` or `~/.config` on Linux) joined with `wrestic`.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| ConfigError::NoConfigDir("no home directory found".to_string()))
}

/// Create the base directory and its secrets directory, restricting access
/// to the owner. Existing directories have their permissions reset.
pub fn init_config_dir(config_dir: &Path) -> Result<(), ConfigError> {
    for dir in [config_dir.to_path_buf(), config_dir.join(SECRETS_DIR_NAME)] {
        prepare_directory(&dir)?;
    }
    info!(dir = %config_dir.display(), "config directory initialized");
    Ok(())
}

fn prepare_directory(dir: &Path) -> Result<(), ConfigError> {
    let init_err = |source| ConfigError::Init {
        path: dir.to_path_buf(),
        source,
    };

    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(ConfigError::NotADirectory(dir.to_path_buf())),
        Ok(_) => debug!(dir = %dir.display(), "directory exists"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(init_err)?;
            debug!(dir = %dir.display(), "created directory");
        }
        Err(e) => return Err(init_err(e)),
    }

    restrict_permissions(dir).map_err(init_err)
}

#[cfg(unix)]
fn restrict_permissions(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict_permissions(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_dir_under_platform_dir() {
        match dirs::config_dir() {
            Some(base) => assert_eq!(default_config_dir().unwrap(), base.join("wrestic")),
            None => assert!(matches!(default_config_dir(), Err(ConfigError::NoConfigDir(_)))),
        }
    }

    #[test]
    fn test_init_creates_directories() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("wrestic");

        init_config_dir(&dir).unwrap();

        assert!(dir.is_dir());
        assert!(dir.join(SECRETS_DIR_NAME).is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_init_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("wrestic");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();

        init_config_dir(&dir).unwrap();

        for path in [dir.clone(), dir.join(SECRETS_DIR_NAME)] {
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700, "{}", path.display());
        }
    }

    #[test]
    fn test_init_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not_a_dir");
        fs::write(&file, "x").unwrap();

        let err = init_config_dir(&file).unwrap_err();
        assert!(matches!(err, ConfigError::NotADirectory(_)));
    }

    #[test]
    fn test_init_is_repeatable() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("wrestic");
        init_config_dir(&dir).unwrap();
        init_config_dir(&dir).unwrap();
        assert!(dir.join(SECRETS_DIR_NAME).is_dir());
    }
}
