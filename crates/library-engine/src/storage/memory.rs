//! In-memory storage implementation, for tests and embedders that don't
//! want a disk-backed store.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{BackendError, Result, StorageBackend};

#[derive(Default)]
pub struct InMemoryBackend {
    data: Mutex<Option<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(Some(HashMap::new())),
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn load(&self) -> Result<HashMap<String, Vec<u8>>> {
        let guard = self.data.lock().unwrap_or_else(|p| p.into_inner());
        match guard.as_ref() {
            Some(map) => Ok(map.clone()),
            None => Err(BackendError::Closed),
        }
    }

    fn save(&self, map: &HashMap<String, Vec<u8>>) -> Result<()> {
        let mut guard = self.data.lock().unwrap_or_else(|p| p.into_inner());
        match guard.as_mut() {
            Some(existing) => {
                *existing = map.clone();
                Ok(())
            }
            None => Err(BackendError::Closed),
        }
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.data.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let backend = InMemoryBackend::new();
        let mut map = HashMap::new();
        map.insert("k".to_string(), vec![9, 9]);
        backend.save(&map).unwrap();
        assert_eq!(backend.load().unwrap(), map);
    }

    #[test]
    fn operations_fail_after_close() {
        let backend = InMemoryBackend::new();
        backend.close().unwrap();
        assert!(backend.load().is_err());
        assert!(backend.save(&HashMap::new()).is_err());
    }
}
