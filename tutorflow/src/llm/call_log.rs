//! Append-only record of generative calls.

use crate::utils::{day_stamp, log_timestamp};
use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes every prompt and response to `llm_calls_YYYYMMDD.log`.
///
/// Lines look like `2024-03-09 07:05:01,000 - INFO - PROMPT: ...`. The file
/// for the current day is opened in append mode for each record. Write
/// failures are logged through `tracing` and otherwise ignored, so the log
/// can never fail a call.
#[derive(Debug)]
pub struct CallLog {
    dir: Option<PathBuf>,
    lock: Mutex<()>,
}

impl CallLog {
    /// A log writing into `dir`, created on first use.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            lock: Mutex::new(()),
        }
    }

    /// A log that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            dir: None,
            lock: Mutex::new(()),
        }
    }

    /// Directory the log writes to, if enabled.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// File that records made now would land in.
    #[must_use]
    pub fn current_file(&self) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("llm_calls_{}.log", day_stamp(&Local::now()))))
    }

    /// Records an outgoing prompt.
    pub fn prompt(&self, prompt: &str) {
        self.write("INFO", "PROMPT", prompt);
    }

    /// Records a response, from the provider or the cache.
    pub fn response(&self, response: &str) {
        self.write("INFO", "RESPONSE", response);
    }

    /// Records a failed call.
    pub fn failure(&self, error: &str) {
        self.write("ERROR", "FAILURE", error);
    }

    fn write(&self, level: &str, label: &str, body: &str) {
        let (Some(dir), Some(path)) = (self.dir.as_ref(), self.current_file()) else {
            return;
        };
        let line = format!("{} - {level} - {label}: {body}\n", log_timestamp(&Local::now()));

        let _guard = self.lock.lock();
        let result = fs::create_dir_all(dir).and_then(|()| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?
                .write_all(line.as_bytes())
        });
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write call log");
        }
    }
}
