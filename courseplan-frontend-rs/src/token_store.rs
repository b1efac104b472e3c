use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::StorageError;

pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Never written by this app, but older builds did, so logout still clears it.
pub const LEGACY_ID_TOKEN_KEY: &str = "id_token";

/// Persistent string key/value storage (the browser's `localStorage`, or a stand-in).
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<BTreeMap<String, String>>,
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::LocalStorage;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::KeyValueStorage;
    use crate::error::StorageError;

    pub struct LocalStorage {
        storage: web_sys::Storage,
    }

    impl LocalStorage {
        pub fn new() -> Result<Self, StorageError> {
            let window = web_sys::window()
                .ok_or_else(|| StorageError::Unavailable("no window".to_string()))?;
            let storage = window
                .local_storage()
                .map_err(|e| StorageError::Unavailable(format!("{e:?}")))?
                .ok_or_else(|| StorageError::Unavailable("localStorage is disabled".to_string()))?;
            Ok(Self { storage })
        }
    }

    impl KeyValueStorage for LocalStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.storage
                .get_item(key)
                .map_err(|e| StorageError::Unavailable(format!("{e:?}")))
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.storage
                .set_item(key, value)
                .map_err(|e| StorageError::Write {
                    key: key.to_string(),
                    message: format!("{e:?}"),
                })
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.storage
                .remove_item(key)
                .map_err(|e| StorageError::Write {
                    key: key.to_string(),
                    message: format!("{e:?}"),
                })
        }
    }
}

/// The canonical copy of the bearer token. Anything else holding the token is a cache of this.
#[derive(Clone)]
pub struct TokenStore {
    storage: Rc<dyn KeyValueStorage>,
}

impl TokenStore {
    pub fn new(storage: Rc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Unreadable storage is treated the same as having no token.
    pub fn access_token(&self) -> Option<String> {
        self.storage
            .get_item(ACCESS_TOKEN_KEY)
            .inspect_err(|e| log::error!("Error reading access token: {e}"))
            .ok()
            .flatten()
            .filter(|token| !token.is_empty())
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set_item(ACCESS_TOKEN_KEY, token)
    }

    pub fn clear(&self) {
        for key in [LEGACY_ID_TOKEN_KEY, ACCESS_TOKEN_KEY] {
            if let Err(e) = self.storage.remove_item(key) {
                log::error!("Error removing {key} from storage: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_and_clear() {
        let storage = Rc::new(MemoryStorage::default());
        let tokens = TokenStore::new(storage.clone());
        assert_eq!(tokens.access_token(), None);

        tokens.set_access_token("abc").unwrap();
        storage.set_item(LEGACY_ID_TOKEN_KEY, "old").unwrap();
        assert_eq!(tokens.access_token().as_deref(), Some("abc"));

        tokens.clear();
        assert_eq!(tokens.access_token(), None);
        assert_eq!(storage.get_item(LEGACY_ID_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_empty_token_counts_as_absent() {
        let tokens = TokenStore::new(Rc::new(MemoryStorage::default()));
        tokens.set_access_token("").unwrap();
        assert_eq!(tokens.access_token(), None);
    }
}
