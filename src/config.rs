use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted pacing preferences. The script itself is never stored here;
/// only how it is paced and presented.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub speed_lines_per_sec: f64,
    pub words_per_minute: u32,
    pub wrap_limit: usize,
    pub page_overlap: f64,
    pub mode: String,
    pub locale: String,
    pub transcript_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speed_lines_per_sec: 1.0,
            words_per_minute: 300,
            wrap_limit: 0,
            page_overlap: 0.10,
            mode: "continuous".to_string(),
            locale: "en-US".to_string(),
            transcript_path: None,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "cueline") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("cueline_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
