use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token file name in the data directory
const TOKEN_FILE: &str = "tokens.json";

/// An access/refresh token pair as issued by `/user/login/` and
/// `/user/refresh_tokens/`.
///
/// Both tokens are opaque bearer strings; the client never parses
/// claims. A pair is always replaced as a unit - there is no state
/// where only one of the two is current.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Persisted storage for the session's token pair.
///
/// `SessionManager` is the only writer. Implementations must treat
/// `save` as replacing both tokens at once and `clear` as removing
/// both.
pub trait TokenStore: Send {
    fn load(&self) -> Result<Option<TokenPair>>;
    fn save(&self, pair: &TokenPair) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    access_token: String,
    refresh_token: String,
    saved_at: DateTime<Utc>,
}

/// Token storage backed by `tokens.json` in the application data
/// directory.
pub struct FileTokenStore {
    data_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn token_path(&self) -> PathBuf {
        self.data_dir.join(TOKEN_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read token file")?;
        let file: TokenFile =
            serde_json::from_str(&contents).context("Failed to parse token file")?;
        Ok(Some(TokenPair {
            access_token: file.access_token,
            refresh_token: file.refresh_token,
        }))
    }

    fn save(&self, pair: &TokenPair) -> Result<()> {
        let path = self.token_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = TokenFile {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, contents).context("Failed to write token file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove token file")?;
        }
        Ok(())
    }
}

/// In-process token storage for tests and embedders that manage their
/// own persistence.
#[derive(Default)]
pub struct MemoryTokenStore {
    pair: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        Ok(self.pair.lock().unwrap().clone())
    }

    fn save(&self, pair: &TokenPair) -> Result<()> {
        *self.pair.lock().unwrap() = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.pair.lock().unwrap() = None;
        Ok(())
    }
}
