use crate::json_doc;
use crate::{AssociationError, Result};
use async_trait::async_trait;
use paramlink_protocol::{PathKey, DONT_ASK_STATE_KEY};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Durable key → value store that outlives the process.
#[async_trait]
pub trait GlobalState: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// `None` deletes the key.
    async fn set(&self, key: &str, value: Option<Value>) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryState {
    values: Mutex<Map<String, Value>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl GlobalState for MemoryState {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Option<Value>) -> Result<()> {
        let mut values = self.lock();
        match value {
            Some(value) => {
                values.insert(key.to_string(), value);
            }
            None => {
                values.remove(key);
            }
        }
        Ok(())
    }
}

/// Global state kept in a JSON file (same atomic write path as file-backed scopes).
pub struct JsonFileState {
    path: PathBuf,
}

impl JsonFileState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl GlobalState for JsonFileState {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        json_doc::read_key_blocking(self.path.clone(), key.to_string()).await
    }

    async fn set(&self, key: &str, value: Option<Value>) -> Result<()> {
        json_doc::update_key_blocking(self.path.clone(), key.to_string(), value).await
    }
}

/// Templates the user permanently declined to be prompted about.
#[derive(Clone)]
pub struct DontAskList {
    state: Arc<dyn GlobalState>,
}

impl DontAskList {
    pub fn new(state: Arc<dyn GlobalState>) -> Self {
        Self { state }
    }

    /// Stored template paths; unreadable or malformed state counts as empty.
    pub async fn entries(&self) -> Vec<String> {
        match self.state.get(DONT_ASK_STATE_KEY).await {
            Ok(Some(Value::Array(items))) => items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Ok(Some(other)) => {
                log::warn!("Ignoring malformed {DONT_ASK_STATE_KEY} value: {other}");
                Vec::new()
            }
            Ok(None) => Vec::new(),
            Err(err) => {
                log::warn!("Failed to read {DONT_ASK_STATE_KEY}: {err}");
                Vec::new()
            }
        }
    }

    pub async fn contains(&self, template: &Path) -> bool {
        let key = PathKey::new(template);
        self.entries()
            .await
            .iter()
            .any(|entry| PathKey::from_raw(entry) == key)
    }

    /// Records a permanent decline. Read failures and malformed state are returned
    /// instead of overwriting earlier decisions.
    pub async fn add(&self, template: &Path) -> Result<()> {
        let key = PathKey::new(template);
        let mut items = match self.state.get(DONT_ASK_STATE_KEY).await? {
            None => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(AssociationError::Malformed {
                    location: DONT_ASK_STATE_KEY.to_string(),
                    detail: format!("expected an array of template paths, found {other}"),
                })
            }
        };
        if items
            .iter()
            .filter_map(Value::as_str)
            .any(|entry| PathKey::from_raw(entry) == key)
        {
            return Ok(());
        }
        items.push(Value::String(template.to_string_lossy().into_owned()));
        self.state
            .set(DONT_ASK_STATE_KEY, Some(Value::Array(items)))
            .await
    }

    pub async fn reset(&self) -> Result<()> {
        self.state.set(DONT_ASK_STATE_KEY, None).await?;
        log::info!("Cleared the list of templates excluded from parameter file prompts");
        Ok(())
    }
}
