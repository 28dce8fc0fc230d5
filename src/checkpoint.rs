//! Per-channel scrape checkpoints.
//!
//! A checkpoint is a tiny JSON file `<dir>/<channel>.json` holding the id of
//! the last fully handled message for that channel. It is read at scrape
//! start to resume and overwritten after every processed message, so a crash
//! resumes just after the last message that completed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    last_message_id: i64,
}

/// File-backed store of per-channel cursors.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, channel: &str) -> PathBuf {
        self.dir.join(format!("{channel}.json"))
    }

    /// Returns the last processed message id for `channel`, or `None` when
    /// no checkpoint exists. A corrupt file is treated as absent, not fatal.
    pub fn load(&self, channel: &str) -> Option<i64> {
        let path = self.path_for(channel);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CheckpointFile>(&content) {
            Ok(cp) => Some(cp.last_message_id),
            Err(e) => {
                warn!(channel, path = %path.display(), "ignoring corrupt checkpoint: {e}");
                None
            }
        }
    }

    /// Overwrites the channel's checkpoint. Written to a temp file and then
    /// renamed into place so a crash mid-write cannot corrupt the previous
    /// value.
    pub fn save(&self, channel: &str, last_message_id: i64) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating checkpoint dir {}", self.dir.display()))?;

        let path = self.path_for(channel);
        let tmp = self.dir.join(format!("{channel}.json.tmp"));
        let body = serde_json::to_string(&CheckpointFile { last_message_id })?;
        std::fs::write(&tmp, body)
            .with_context(|| format!("writing checkpoint temp file {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("renaming checkpoint into place at {}", path.display()))?;

        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
