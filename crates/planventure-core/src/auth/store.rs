use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Fixed key for the access token, shared by every sign-in flow
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Fixed key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Token file name in the data directory
const TOKEN_FILE: &str = "tokens.json";

/// Keychain service name
const SERVICE_NAME: &str = "planventure";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Token storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored tokens are corrupt: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Keychain access failed: {0}")]
    Keyring(#[from] keyring::Error),
}

/// The persisted token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl StoredTokens {
    fn new(access: &str, refresh: Option<&str>) -> Self {
        Self {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            saved_at: Some(Utc::now()),
        }
    }
}

/// Persistent home of the current token pair.
///
/// Holds at most one pair: `set` replaces both tokens. Nothing here checks
/// expiry; only the server decides whether a token is still good.
pub trait TokenStore: Send + Sync {
    /// Read the stored pair, if any
    fn load(&self) -> Result<Option<StoredTokens>, StoreError>;

    /// Persist both tokens, replacing whatever was stored
    fn set(&self, access: &str, refresh: Option<&str>) -> Result<(), StoreError>;

    /// Remove both tokens
    fn clear(&self) -> Result<(), StoreError>;

    /// The stored access token
    fn get(&self) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.map(|t| t.access_token))
    }

    fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.and_then(|t| t.refresh_token))
    }
}

/// Tokens kept in `tokens.json` under the user's data directory.
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredTokens>, StoreError> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let tokens: StoredTokens = serde_json::from_str(&contents)?;
        Ok(Some(tokens))
    }

    fn set(&self, access: &str, refresh: Option<&str>) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.token_path();
        let contents = serde_json::to_string_pretty(&StoredTokens::new(access, refresh))?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            // Owner-only from the moment the file exists
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;

        // Files written before the mode was set on creation keep their old bits
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(contents.as_bytes())?;

        debug!(path = %path.display(), "Tokens saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(&path)?;
            debug!(path = %path.display(), "Tokens cleared");
        }
        Ok(())
    }
}

/// Secret storage keyed by token name.
trait Keychain: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, keyring::Error>;
    fn write(&self, key: &str, value: &str) -> Result<(), keyring::Error>;
    fn remove(&self, key: &str) -> Result<(), keyring::Error>;
}

/// The platform credential store (macOS Keychain, Windows Credential
/// Manager, Secret Service on Linux).
struct OsKeychain {
    service: String,
}

impl Keychain for OsKeychain {
    fn read(&self, key: &str) -> Result<Option<String>, keyring::Error> {
        match Entry::new(&self.service, key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), keyring::Error> {
        Entry::new(&self.service, key)?.set_password(value)
    }

    fn remove(&self, key: &str) -> Result<(), keyring::Error> {
        match Entry::new(&self.service, key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Tokens kept in the OS keychain, one entry per token name.
pub struct KeyringTokenStore {
    keychain: Box<dyn Keychain>,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a different keychain service name, e.g. to keep profiles apart
    pub fn with_service(service: &str) -> Self {
        Self {
            keychain: Box::new(OsKeychain {
                service: service.to_string(),
            }),
        }
    }

    #[cfg(test)]
    fn with_keychain(keychain: impl Keychain + 'static) -> Self {
        Self {
            keychain: Box::new(keychain),
        }
    }

    fn write_pair(&self, access: &str, refresh: Option<&str>) -> Result<(), keyring::Error> {
        self.keychain.write(ACCESS_TOKEN_KEY, access)?;
        match refresh {
            Some(refresh) => self.keychain.write(REFRESH_TOKEN_KEY, refresh),
            None => self.keychain.remove(REFRESH_TOKEN_KEY),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<StoredTokens>, StoreError> {
        let Some(access_token) = self.keychain.read(ACCESS_TOKEN_KEY)? else {
            return Ok(None);
        };
        Ok(Some(StoredTokens {
            access_token,
            refresh_token: self.keychain.read(REFRESH_TOKEN_KEY)?,
            saved_at: None,
        }))
    }

    fn set(&self, access: &str, refresh: Option<&str>) -> Result<(), StoreError> {
        if let Err(e) = self.write_pair(access, refresh) {
            // A half-written pair must not outlive the failure
            if let Err(cleanup) = self.clear() {
                warn!(error = %cleanup, "Failed to clear keychain after partial write");
            }
            return Err(e.into());
        }
        debug!("Tokens saved to keychain");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let access = self.keychain.remove(ACCESS_TOKEN_KEY);
        let refresh = self.keychain.remove(REFRESH_TOKEN_KEY);
        access?;
        refresh?;
        debug!("Tokens cleared from keychain");
        Ok(())
    }
}

/// Process-local tokens; gone when the process exits.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<StoredTokens>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<StoredTokens>> {
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredTokens>, StoreError> {
        Ok(self.slot().clone())
    }

    fn set(&self, access: &str, refresh: Option<&str>) -> Result<(), StoreError> {
        *self.slot() = Some(StoredTokens::new(access, refresh));
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot() = None;
        Ok(())
    }
}
