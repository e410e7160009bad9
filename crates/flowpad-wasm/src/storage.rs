use crate::mermaid::js_message;
use flowpad_editor::storage::{KeyValueStore, StorageError};
use web_sys::Storage;

/// `window.localStorage`.
pub struct LocalStore(Storage);

impl LocalStore {
    pub fn open() -> Result<Self, StorageError> {
        let window = web_sys::window().ok_or_else(|| StorageError::Unavailable("no window".into()))?;
        window
            .local_storage()
            .map_err(|e| StorageError::Unavailable(js_message(&e)))?
            .map(Self)
            .ok_or_else(|| StorageError::Unavailable("localStorage is disabled".into()))
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(js_message(&e)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.0.set_item(key, value).map_err(|e| {
            let message = js_message(&e);
            if message.contains("Quota") || message.contains("quota") {
                StorageError::QuotaExceeded
            } else {
                StorageError::Unavailable(message)
            }
        })
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let unavailable = |e| StorageError::Unavailable(js_message(&e));
        let length = self.0.length().map_err(unavailable)?;
        let mut keys = Vec::with_capacity(length as usize);
        for i in 0..length {
            if let Some(key) = self.0.key(i).map_err(unavailable)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
