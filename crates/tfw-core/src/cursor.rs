//! Durable "last forwarded message id" checkpoint.
//!
//! On disk this is a single JSON record: `{"last_message_id": 123}` (or `null`).

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::{domain::MessageId, errors::Error, Result};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct CursorFileData {
    #[serde(default)]
    last_message_id: Option<MessageId>,
}

#[derive(Clone, Debug)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored cursor. A missing or empty file means "no cursor".
    pub fn load(&self) -> Result<Option<MessageId>> {
        let txt = match fs::read_to_string(&self.path) {
            Ok(txt) => txt,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if txt.trim().is_empty() {
            return Ok(None);
        }
        let data: CursorFileData = serde_json::from_str(&txt)?;
        Ok(data.last_message_id)
    }

    /// Overwrite the stored cursor.
    ///
    /// Writes a sibling temp file, fsyncs it and renames it over the target, so a
    /// crash leaves either the previous or the new record on disk.
    pub fn save(&self, last_message_id: Option<MessageId>) -> Result<()> {
        let txt = serde_json::to_string(&CursorFileData { last_message_id })?;
        atomic_write(&self.path, &txt).map_err(|e| Error::CursorPersistence {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "cursor path has no file name"))?;

    let tmp_path = dir.join(format!(
        ".{}.tmp.{}",
        file_name,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ));

    let write_result = (|| -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Ok(parent_dir) = fs::File::open(&dir) {
            let _ = parent_dir.sync_all();
        }
        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    write_result
}
