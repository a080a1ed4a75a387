use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use reader_logging::{reader_info, reader_warn};
use serde::Deserialize;
use thiserror::Error;

use crate::extract::ExtractSettings;
use crate::flat_text::FlatTextSettings;

/// Wall clock in milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub const DEFAULT_DATA_DIR: &str = "reader_data";
pub const PROGRESS_DIRNAME: &str = "progress";
pub const LIBRARY_FILENAME: &str = "library.json";
pub const LOG_FILENAME: &str = "reader.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    /// Bytes sniffed for encoding detection.
    pub sample_window: usize,
    pub virtual_chapter_chars: usize,
    pub max_resource_bytes: usize,
    pub page_capacity: usize,
    pub min_page_capacity: usize,
    pub clock: Clock,
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("data_dir", &self.data_dir)
            .field("sample_window", &self.sample_window)
            .field("virtual_chapter_chars", &self.virtual_chapter_chars)
            .field("max_resource_bytes", &self.max_resource_bytes)
            .field("page_capacity", &self.page_capacity)
            .field("min_page_capacity", &self.min_page_capacity)
            .finish_non_exhaustive()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            sample_window: 4096,
            virtual_chapter_chars: 20_000,
            max_resource_bytes: 16 * 1024 * 1024,
            page_capacity: 1200,
            min_page_capacity: 500,
            clock: Arc::new(|| Utc::now().timestamp_millis()),
        }
    }
}

/// On-disk overlay; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    sample_window: Option<usize>,
    virtual_chapter_chars: Option<usize>,
    max_resource_bytes: Option<usize>,
    page_capacity: Option<usize>,
    min_page_capacity: Option<usize>,
}

impl EngineConfig {
    pub fn default_with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Self::default()
        }
    }

    /// Parses a RON overlay on top of the defaults.
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = ron::from_str(content)?;
        let mut config = Self::default();
        if let Some(data_dir) = file.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(value) = file.sample_window {
            config.sample_window = value.max(4);
        }
        if let Some(value) = file.virtual_chapter_chars {
            config.virtual_chapter_chars = value.max(1);
        }
        if let Some(value) = file.max_resource_bytes {
            config.max_resource_bytes = value;
        }
        if let Some(value) = file.min_page_capacity {
            config.min_page_capacity = value.max(1);
        }
        if let Some(value) = file.page_capacity {
            config.page_capacity = value;
        }
        config.page_capacity = config.page_capacity.max(config.min_page_capacity);
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Missing file: defaults. Malformed file: defaults and a warning.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                reader_info!("Loaded config from {:?}", path);
                config
            }
            Err(ConfigError::Io(err)) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                reader_warn!("Ignoring config {:?}: {}", path, err);
                Self::default()
            }
        }
    }

    pub fn progress_dir(&self) -> PathBuf {
        self.data_dir.join(PROGRESS_DIRNAME)
    }

    pub fn library_path(&self) -> PathBuf {
        self.data_dir.join(LIBRARY_FILENAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILENAME)
    }

    /// Applies the capacity floor to a host-supplied value.
    pub fn effective_capacity(&self, requested: usize) -> usize {
        requested.max(self.min_page_capacity).max(1)
    }

    pub fn extract_settings(&self) -> ExtractSettings {
        ExtractSettings {
            sample_window: self.sample_window,
            max_resource_bytes: self.max_resource_bytes,
        }
    }

    pub fn flat_text_settings(&self) -> FlatTextSettings {
        FlatTextSettings {
            sample_window: self.sample_window,
            virtual_chapter_chars: self.virtual_chapter_chars,
        }
    }
}

/// Stamps that strictly increase even if the wall clock stalls or steps back.
pub struct MonotonicStamper {
    clock: Clock,
    last: Mutex<i64>,
}

impl MonotonicStamper {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            last: Mutex::new(i64::MIN),
        }
    }

    /// Starts after `floor`, e.g. the newest timestamp already persisted.
    pub fn raise_floor(&self, floor: i64) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        *last = (*last).max(floor);
    }

    pub fn stamp(&self) -> i64 {
        let now = (self.clock)();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let next = if now > *last { now } else { last.saturating_add(1) };
        *last = next;
        next
    }
}
