//! Durable storage for the session access token.
//!
//! The token is a single string value. The keychain store uses the OS
//! keychain when available, with a file-based fallback for systems where
//! the keychain is not accessible. An in-memory store backs tests and hosts
//! that manage persistence themselves.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use keyring::Entry;

use super::{ApiError, KEYRING_ACCESS_TOKEN_USER, KEYRING_SERVICE};

/// Key-value store holding the access token across launches.
pub trait TokenStore: Send + Sync {
    /// Loads the stored token, if any.
    fn load(&self) -> Result<Option<String>, ApiError>;

    /// Stores the token, replacing any previous value.
    fn store(&self, token: &str) -> Result<(), ApiError>;

    /// Removes the stored token. Succeeds if nothing was stored.
    fn clear(&self) -> Result<(), ApiError>;
}

/// Token store backed by the OS keychain, falling back to a file.
pub struct KeychainTokenStore {
    /// Whether keyring is available on this system.
    keyring_available: bool,
    fallback: FileTokenStore,
}

impl KeychainTokenStore {
    /// Creates a new keychain store with the default fallback file.
    ///
    /// Automatically detects whether the OS keychain is available.
    pub fn new() -> Result<Self, ApiError> {
        Ok(Self::with_fallback(FileTokenStore::default_location()?))
    }

    /// Creates a keychain store with a custom fallback file store.
    pub fn with_fallback(fallback: FileTokenStore) -> Self {
        Self {
            keyring_available: Self::test_keyring_available(),
            fallback,
        }
    }

    /// Tests whether the keyring is available by attempting a dummy operation.
    fn test_keyring_available() -> bool {
        match Entry::new(KEYRING_SERVICE, "test-availability") {
            Ok(entry) => match entry.get_password() {
                Ok(_) => true,
                Err(keyring::Error::NoEntry) => true,
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    fn entry() -> Result<Entry, ApiError> {
        Entry::new(KEYRING_SERVICE, KEYRING_ACCESS_TOKEN_USER)
            .map_err(|e| ApiError::TokenStore(e.to_string()))
    }
}

impl TokenStore for KeychainTokenStore {
    fn load(&self) -> Result<Option<String>, ApiError> {
        if self.keyring_available {
            match Self::entry()?.get_password() {
                Ok(token) => return Ok(Some(token)),
                Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(ApiError::TokenStore(e.to_string())),
            }
        }

        self.fallback.load()
    }

    fn store(&self, token: &str) -> Result<(), ApiError> {
        if self.keyring_available {
            Self::entry()?
                .set_password(token)
                .map_err(|e| ApiError::TokenStore(e.to_string()))
        } else {
            self.fallback.store(token)
        }
    }

    fn clear(&self) -> Result<(), ApiError> {
        if self.keyring_available {
            match Self::entry()?.delete_credential() {
                Ok(()) => {}
                Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(ApiError::TokenStore(e.to_string())),
            }
        }

        // Also delete from file
        self.fallback.clear()
    }
}

/// Token store backed by a single file with owner-only permissions.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Creates a store writing to the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.pin-center/access_token`.
    pub fn default_location() -> Result<Self, ApiError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| ApiError::TokenStore("Could not find home directory".to_string()))?
            .join(".pin-center");

        Ok(Self::new(dir.join("access_token")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, ApiError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let token = fs::read_to_string(&self.path)
            .map_err(|e| ApiError::TokenStore(format!("Failed to read token file: {e}")))?;
        let token = token.trim();

        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    fn store(&self, token: &str) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ApiError::TokenStore(format!("Failed to create token directory: {e}"))
            })?;
        }

        fs::write(&self.path, token)
            .map_err(|e| ApiError::TokenStore(format!("Failed to write token file: {e}")))?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, perms).map_err(|e| {
                ApiError::TokenStore(format!("Failed to set file permissions: {e}"))
            })?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), ApiError> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| ApiError::TokenStore(format!("Failed to delete token file: {e}")))?;
        }

        Ok(())
    }
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds a token, as after a previous launch.
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, ApiError> {
        Ok(self.slot().clone())
    }

    fn store(&self, token: &str) -> Result<(), ApiError> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ApiError> {
        *self.slot() = None;
        Ok(())
    }
}
