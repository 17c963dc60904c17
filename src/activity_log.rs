use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Failed to create log directory '{path}': {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to open log file '{path}': {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

/// Append-only record of one run, mirrored to the `log` facade.
///
/// Clones share the same file, so the UI thread and the worker can both write.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl ActivityLog {
    /// Creates `<dir>/activity_log_<YYYYmmdd_HHMMSS>.log` for a run started at `started`.
    pub fn create(dir: &Path, started: DateTime<Local>) -> Result<Self, LogError> {
        fs::create_dir_all(dir).map_err(|e| LogError::CreateDir {
            path: dir.display().to_string(),
            source: e,
        })?;

        let path = dir.join(format!(
            "activity_log_{}.log",
            started.format("%Y%m%d_%H%M%S")
        ));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LogError::Open {
                path: path.display().to_string(),
                source: e,
            })?;

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: &str) {
        self.write(Level::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.write(Level::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.write(Level::Error, message);
    }

    pub fn write(&self, level: Level, message: &str) {
        match level {
            Level::Info => log::info!("{}", message),
            Level::Warning => log::warn!("{}", message),
            Level::Error => log::error!("{}", message),
        }

        let line = format!(
            "{} [{}] {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level.as_str(),
            message
        );
        let result = match self.file.lock() {
            Ok(mut file) => file.write_all(line.as_bytes()),
            Err(poisoned) => poisoned.into_inner().write_all(line.as_bytes()),
        };
        if let Err(e) = result {
            log::error!("Failed to write activity log {}: {}", self.path.display(), e);
        }
    }
}
