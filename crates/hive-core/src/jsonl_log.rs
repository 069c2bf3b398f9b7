use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

/// Append-only JSONL file for activity trails. Each `append` writes one JSON
/// object per line and flushes so tail readers see events promptly.
#[derive(Clone)]
pub struct JsonlLog {
    path: PathBuf,
    file: Arc<Mutex<std::fs::File>>,
}

impl JsonlLog {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn append(&self, event: &Value) -> Result<()> {
        let line = serde_json::to_string(event).context("failed to encode log event")?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("jsonl log mutex is poisoned"))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}
