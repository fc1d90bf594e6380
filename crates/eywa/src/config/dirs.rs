use directories::ProjectDirs;
use std::path::PathBuf;

/// Environment variable that points at an explicit config file
pub const CONFIG_ENV_VAR: &str = "EYWA_CONFIG";

/// Per-user directories for the client
#[derive(Debug, Clone)]
pub struct Directories {
    /// Config directory (~/.config/eywa)
    pub config: PathBuf,

    /// Cache directory (~/.cache/eywa), used for debug logs
    pub cache: PathBuf,

    /// Config file path
    pub config_file: PathBuf,
}

impl Directories {
    /// Standard platform paths, or `None` when no home directory can be found.
    #[must_use]
    pub fn new() -> Option<Self> {
        let project = ProjectDirs::from("", "", "eywa")?;
        let config = project.config_dir().to_path_buf();

        Some(Self {
            config_file: config.join("config.json"),
            config,
            cache: project.cache_dir().to_path_buf(),
        })
    }

    #[must_use]
    pub fn with_base(base: PathBuf) -> Self {
        Self {
            config_file: base.join("config.json"),
            cache: base.join("cache"),
            config: base,
        }
    }

    /// Ensure all directories exist.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn ensure_exists(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config)?;
        std::fs::create_dir_all(&self.cache)?;
        Ok(())
    }
}

/// Config file to load when none is given on the command line.
///
/// `EYWA_CONFIG` wins when set and non-empty, then the platform config dir.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    resolve_config_path(std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

fn resolve_config_path(from_env: Option<PathBuf>) -> Option<PathBuf> {
    match from_env {
        Some(path) if !path.as_os_str().is_empty() => Some(path),
        _ => Directories::new().map(|dirs| dirs.config_file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_sets_all_paths() {
        let base = PathBuf::from("/tmp/test-eywa");
        let dirs = Directories::with_base(base.clone());

        assert_eq!(dirs.config, base);
        assert_eq!(dirs.cache, base.join("cache"));
        assert_eq!(dirs.config_file, base.join("config.json"));
    }

    #[test]
    fn test_ensure_exists_creates_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dirs = Directories::with_base(temp_dir.path().join("eywa-test-subdir"));

        assert!(!dirs.cache.exists());
        dirs.ensure_exists().unwrap();
        dirs.ensure_exists().unwrap();

        assert!(dirs.config.exists());
        assert!(dirs.cache.exists());
    }

    #[test]
    fn test_env_path_wins() {
        let path = resolve_config_path(Some(PathBuf::from("/etc/eywa/task.json")));
        assert_eq!(path, Some(PathBuf::from("/etc/eywa/task.json")));
    }

    #[test]
    fn test_empty_env_path_falls_back() {
        let path = resolve_config_path(Some(PathBuf::new()));
        assert_eq!(path, Directories::new().map(|d| d.config_file));
    }

    #[test]
    fn test_platform_paths_mention_eywa() {
        if let Some(dirs) = Directories::new() {
            assert!(dirs.config.to_string_lossy().contains("eywa"));
            assert!(dirs.config_file.to_string_lossy().ends_with("config.json"));
        }
    }
}
