use std::path::{Path, PathBuf};
use std::fs;
use directories::ProjectDirs;
use crate::common::{Config, FaceAuthError, Result};

pub const SYSTEM_SOCKET_PATH: &str = "/run/faceid/service.sock";
pub const DEV_SOCKET_PATH: &str = "/tmp/faceid.sock";
const USERS_FILE_NAME: &str = "users.json";

#[derive(Debug, Clone)]
pub enum RunMode {
    Development(PathBuf),  // Base directory for dev mode
    System,                // Use system paths
    User(PathBuf),         // Per-user data directory
}

#[derive(Debug, Clone)]
pub struct Paths {
    mode: RunMode,
}

impl Paths {
    pub fn new(dev: bool, system: bool) -> Result<Self> {
        match (dev, system) {
            (true, true) => Err(FaceAuthError::Config(
                "Cannot use both --dev and --system flags".into()
            )),
            (true, false) => Self::development(PathBuf::from("./dev_data")),
            (false, true) => {
                tracing::info!("System mode - using /var/lib/faceid");
                Ok(Self { mode: RunMode::System })
            }
            (false, false) => {
                let dirs = ProjectDirs::from("org", "faceid", "faceid")
                    .ok_or_else(|| FaceAuthError::Config("Could not find home directory".into()))?;
                let base_dir = dirs.data_dir().to_path_buf();
                fs::create_dir_all(&base_dir)?;

                tracing::info!("User mode - using {}", base_dir.display());
                Ok(Self { mode: RunMode::User(base_dir) })
            }
        }
    }

    pub fn development(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        fs::create_dir_all(base_dir.join("captures"))?;

        tracing::debug!("Development mode - using local directory: {}", base_dir.display());
        Ok(Self { mode: RunMode::Development(base_dir) })
    }

    pub fn mode(&self) -> &RunMode {
        &self.mode
    }

    pub fn is_development(&self) -> bool {
        matches!(self.mode, RunMode::Development(_))
    }

    pub fn config_file(&self) -> PathBuf {
        match &self.mode {
            RunMode::Development(base) => base.join("configs/face-auth.toml"),
            RunMode::System => PathBuf::from("/etc/faceid/face-auth.toml"),
            RunMode::User(_) => {
                let user_config = ProjectDirs::from("org", "faceid", "faceid")
                    .map(|dirs| dirs.config_dir().join("face-auth.toml"));
                match user_config {
                    Some(path) if path.exists() => path,
                    _ => PathBuf::from("/etc/faceid/face-auth.toml"),
                }
            }
        }
    }

    /// Location of the identity store, honouring `storage.users_file`.
    pub fn users_file(&self, config: &Config) -> PathBuf {
        if let Some(path) = &config.storage.users_file {
            return path.clone();
        }
        match &self.mode {
            RunMode::Development(base) | RunMode::User(base) => base.join(USERS_FILE_NAME),
            RunMode::System => Path::new("/var/lib/faceid").join(USERS_FILE_NAME),
        }
    }

    pub fn models_dir(&self) -> PathBuf {
        match &self.mode {
            RunMode::Development(_) => PathBuf::from("./models"),
            RunMode::System | RunMode::User(_) => PathBuf::from("/usr/share/faceid/models"),
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        if self.is_development() {
            PathBuf::from(DEV_SOCKET_PATH)
        } else {
            PathBuf::from(SYSTEM_SOCKET_PATH)
        }
    }

    /// Where enrollment pictures are kept, one `<username>.jpg` each.
    pub fn pictures_dir(&self) -> PathBuf {
        match &self.mode {
            RunMode::Development(base) | RunMode::User(base) => base.join("pictures"),
            RunMode::System => PathBuf::from("/var/lib/faceid/pictures"),
        }
    }

    pub fn capture_path(&self, prefix: &str) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        match &self.mode {
            RunMode::Development(base) => {
                base.join("captures").join(format!("{}_{}.jpg", prefix, timestamp))
            }
            RunMode::System | RunMode::User(_) => {
                std::env::temp_dir().join(format!("faceid_{}_{}.jpg", prefix, timestamp))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn dev_and_system_flags_are_exclusive() {
        assert!(Paths::new(true, true).is_err());
    }

    #[test]
    fn development_paths_live_under_base_dir() {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::development(tmp.path().to_path_buf()).unwrap();

        assert!(paths.is_development());
        assert_eq!(paths.users_file(&Config::default()), tmp.path().join("users.json"));
        assert!(paths.capture_path("enroll").starts_with(tmp.path().join("captures")));
        assert_eq!(paths.pictures_dir(), tmp.path().join("pictures"));
        assert_eq!(paths.socket_path(), PathBuf::from(DEV_SOCKET_PATH));
    }

    #[test]
    fn configured_users_file_overrides_mode() {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::development(tmp.path().to_path_buf()).unwrap();
        let mut config = Config::default();
        config.storage.users_file = Some(PathBuf::from("/srv/faceid/users.json"));

        assert_eq!(paths.users_file(&config), PathBuf::from("/srv/faceid/users.json"));
    }
}
