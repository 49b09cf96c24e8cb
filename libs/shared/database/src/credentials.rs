use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use shared_utils::Clock;

/// Entries the display keeps between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialKey {
    #[serde(rename = "accessToken")]
    AccessToken,
    #[serde(rename = "refreshToken")]
    RefreshToken,
    #[serde(rename = "userID")]
    UserId,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 3] = [
        CredentialKey::AccessToken,
        CredentialKey::RefreshToken,
        CredentialKey::UserId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::AccessToken => "accessToken",
            CredentialKey::RefreshToken => "refreshToken",
            CredentialKey::UserId => "userID",
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent key-value store for credentials. Every entry carries its own
/// expiry; expired entries read as absent.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: CredentialKey) -> Result<Option<String>>;

    async fn set(&self, key: CredentialKey, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: CredentialKey) -> Result<()>;

    async fn clear(&self) -> Result<()> {
        for key in CredentialKey::ALL {
            self.delete(key).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    expires_at: NaiveDateTime,
}

type Entries = HashMap<CredentialKey, StoredEntry>;

fn live_value(entries: &Entries, key: CredentialKey, now: NaiveDateTime) -> Option<String> {
    entries
        .get(&key)
        .filter(|entry| entry.expires_at > now)
        .map(|entry| entry.value.clone())
}

pub struct InMemoryCredentialStore {
    entries: Mutex<Entries>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCredentialStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(live_value(&entries, key, self.clock.now()))
    }

    async fn set(&self, key: CredentialKey, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            StoredEntry {
                value: value.to_string(),
                expires_at: self.clock.now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: CredentialKey) -> Result<()> {
        self.entries.lock().await.remove(&key);
        Ok(())
    }
}

/// JSON file backed store. The file is re-read on every access so several
/// processes sharing it see each other's refreshes.
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Entries> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    warn!("Discarding unreadable credential file {}: {}", self.path.display(), e);
                    Ok(HashMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    async fn save(&self, entries: &Entries) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        // Readers only ever see a complete file.
        let contents = serde_json::to_string_pretty(entries)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, contents)
            .await
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;
        Ok(live_value(&entries, key, self.clock.now()))
    }

    async fn set(&self, key: CredentialKey, value: &str, ttl: Duration) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(
            key,
            StoredEntry {
                value: value.to_string(),
                expires_at: self.clock.now() + ttl,
            },
        );
        self.save(&entries).await?;
        debug!("Stored {} in {}", key, self.path.display());
        Ok(())
    }

    async fn delete(&self, key: CredentialKey) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(&key).is_some() {
            self.save(&entries).await?;
            debug!("Removed {} from {}", key, self.path.display());
        }
        Ok(())
    }
}
