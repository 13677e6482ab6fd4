//! File-backed storage implementation
//!
//! Persists the key -> bytes map as a single opaque blob at `<path>.simk`
//! (spec §6). Writes go to `<path>.tmp` then an atomic rename so a crash
//! mid-write leaves either the prior intact file or the new one, never a
//! partial file. `close` removes any leftover `.tmp`.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{BackendError, Result, StorageBackend};

/// A single-file, crash-safe storage backend.
pub struct FileBackend {
    path: PathBuf,
    // Concurrent `save` calls serialize at the backend per spec §4.1,
    // even though a higher layer (the save chain) normally prevents them
    // from overlapping in the first place.
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Open (or prepare to create) a file-backed store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension(
            self.path
                .extension()
                .map(|e| format!("{}.tmp", e.to_string_lossy()))
                .unwrap_or_else(|| "tmp".to_string()),
        )
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> Result<HashMap<String, Vec<u8>>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let bytes = fs::read(&self.path)?;
        Ok(decode_map(&bytes))
    }

    fn save(&self, map: &HashMap<String, Vec<u8>>) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let encoded = encode_map(map);
        let tmp = self.tmp_path();

        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&encoded)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let tmp = self.tmp_path();
        if tmp.exists() {
            let _ = fs::remove_file(&tmp);
        }
        Ok(())
    }
}

/// Path this backend persists to, for callers that need to know it (e.g.
/// tests reopening a second `FileBackend` on the same path).
impl FileBackend {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn encode_map(map: &HashMap<String, Vec<u8>>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(map.len() as u32).to_le_bytes());
    for (k, v) in map {
        out.extend_from_slice(&(k.len() as u32).to_le_bytes());
        out.extend_from_slice(k.as_bytes());
        out.extend_from_slice(&(v.len() as u32).to_le_bytes());
        out.extend_from_slice(v);
    }
    out
}

fn decode_map(bytes: &[u8]) -> HashMap<String, Vec<u8>> {
    let mut map = HashMap::new();
    let mut pos = 0usize;
    let Some(count) = read_u32(bytes, &mut pos) else {
        return map;
    };
    for _ in 0..count {
        let Some(klen) = read_u32(bytes, &mut pos) else {
            break;
        };
        if pos + klen as usize > bytes.len() {
            break;
        }
        let key = match std::str::from_utf8(&bytes[pos..pos + klen as usize]) {
            Ok(s) => s.to_string(),
            Err(_) => break,
        };
        pos += klen as usize;

        let Some(vlen) = read_u32(bytes, &mut pos) else {
            break;
        };
        if pos + vlen as usize > bytes.len() {
            break;
        }
        let value = bytes[pos..pos + vlen as usize].to_vec();
        pos += vlen as usize;

        map.insert(key, value);
    }
    map
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> Option<u32> {
    if *pos + 4 > bytes.len() {
        return None;
    }
    let v = u32::from_le_bytes(bytes[*pos..*pos + 4].try_into().ok()?);
    *pos += 4;
    Some(v)
}

impl From<BackendError> for crate::error::LibraryError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Io(io) => crate::error::LibraryError::Io(io),
            BackendError::Closed => crate::error::LibraryError::Other("backend closed".into()),
        }
    }
}
