use crate::json_doc;
use crate::{AssociationError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Read-modify-write step for one key. `None` on either side means the key is absent.
pub type ValueUpdate = Box<dyn FnOnce(Option<Value>) -> Result<Option<Value>> + Send>;

/// One named layer of configuration (user-global, workspace, ...).
#[async_trait]
pub trait ConfigScope: Send + Sync {
    fn name(&self) -> &str;

    fn is_writable(&self) -> bool {
        true
    }

    async fn read(&self, key: &str) -> Result<Option<Value>>;

    /// `None` removes the key.
    async fn write(&self, key: &str, value: Option<Value>) -> Result<()>;

    /// Rewrites `key` from its current value. Implementations that can should hold their
    /// write lock across the read and the write so concurrent updates are not lost.
    async fn update(&self, key: &str, apply: ValueUpdate) -> Result<()> {
        let current = self.read(key).await?;
        self.write(key, apply(current)?).await
    }
}

/// Which scope receives writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WritableScope {
    /// The highest-precedence scope that accepts writes.
    #[default]
    MostSpecific,
    Named(String),
}

/// Scopes ordered lowest precedence first, with a single designated writer.
pub struct ScopeStack {
    scopes: Vec<Arc<dyn ConfigScope>>,
    writer: Option<usize>,
}

impl ScopeStack {
    pub fn new(scopes: Vec<Arc<dyn ConfigScope>>, writable: WritableScope) -> Self {
        let writer = match &writable {
            WritableScope::MostSpecific => scopes.iter().rposition(|scope| scope.is_writable()),
            WritableScope::Named(name) => scopes
                .iter()
                .position(|scope| scope.name() == name && scope.is_writable()),
        };
        if writer.is_none() {
            log::warn!("No writable configuration scope for {writable:?}; associations will not be saved");
        }
        Self { scopes, writer }
    }

    pub fn scopes(&self) -> &[Arc<dyn ConfigScope>] {
        &self.scopes
    }

    pub fn writer(&self) -> Result<&Arc<dyn ConfigScope>> {
        self.writer
            .and_then(|idx| self.scopes.get(idx))
            .ok_or(AssociationError::NoWritableScope)
    }

    /// Values defined for `key`, highest precedence first. Unreadable scopes are skipped.
    pub async fn read_layers(&self, key: &str) -> Vec<(Arc<dyn ConfigScope>, Value)> {
        let mut layers = Vec::new();
        for scope in self.scopes.iter().rev() {
            match scope.read(key).await {
                Ok(Some(value)) => layers.push((Arc::clone(scope), value)),
                Ok(None) => {}
                Err(err) => log::warn!("Failed to read '{key}' from scope {}: {err}", scope.name()),
            }
        }
        layers
    }

    /// The highest-precedence value for `key`.
    pub async fn read_merged(&self, key: &str) -> Option<Value> {
        self.read_layers(key)
            .await
            .into_iter()
            .next()
            .map(|(_, value)| value)
    }
}

/// In-process scope.
pub struct MemoryScope {
    name: String,
    writable: bool,
    values: Mutex<Map<String, Value>>,
}

impl MemoryScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            writable: true,
            values: Mutex::new(Map::new()),
        }
    }

    pub fn read_only(name: impl Into<String>) -> Self {
        Self {
            writable: false,
            ..Self::new(name)
        }
    }

    pub fn with_value(self, key: &str, value: Value) -> Self {
        self.lock().insert(key.to_string(), value);
        self
    }

    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConfigScope for MemoryScope {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    async fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.snapshot(key))
    }

    async fn write(&self, key: &str, value: Option<Value>) -> Result<()> {
        if !self.writable {
            return Err(AssociationError::ReadOnlyScope(self.name.clone()));
        }
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

    async fn update(&self, key: &str, apply: ValueUpdate) -> Result<()> {
        if !self.writable {
            return Err(AssociationError::ReadOnlyScope(self.name.clone()));
        }
        let mut values = self.lock();
        let current = values.get(key).cloned();
        match apply(current)? {
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

/// A JSON-with-comments settings document on disk.
pub struct JsonFileScope {
    name: String,
    path: PathBuf,
}

impl JsonFileScope {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigScope for JsonFileScope {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> Result<Option<Value>> {
        json_doc::read_key_blocking(self.path.clone(), key.to_string()).await
    }

    async fn write(&self, key: &str, value: Option<Value>) -> Result<()> {
        json_doc::update_key_blocking(self.path.clone(), key.to_string(), value).await
    }

    async fn update(&self, key: &str, apply: ValueUpdate) -> Result<()> {
        json_doc::modify_key_blocking(self.path.clone(), key.to_string(), apply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn stack(scopes: Vec<Arc<dyn ConfigScope>>, writable: WritableScope) -> ScopeStack {
        ScopeStack::new(scopes, writable)
    }

    #[test]
    fn most_specific_writer_is_highest_writable_scope() {
        let user: Arc<dyn ConfigScope> = Arc::new(MemoryScope::new("user"));
        let workspace: Arc<dyn ConfigScope> = Arc::new(MemoryScope::new("workspace"));
        let policy: Arc<dyn ConfigScope> = Arc::new(MemoryScope::read_only("policy"));

        let scopes = stack(vec![user, workspace, policy], WritableScope::MostSpecific);
        assert_eq!(scopes.writer().unwrap().name(), "workspace");
    }

    #[test]
    fn named_writer_must_exist_and_be_writable() {
        let user: Arc<dyn ConfigScope> = Arc::new(MemoryScope::new("user"));
        let policy: Arc<dyn ConfigScope> = Arc::new(MemoryScope::read_only("policy"));

        let named = stack(
            vec![Arc::clone(&user), Arc::clone(&policy)],
            WritableScope::Named("user".to_string()),
        );
        assert_eq!(named.writer().unwrap().name(), "user");

        let read_only = stack(vec![user, policy], WritableScope::Named("policy".to_string()));
        assert!(matches!(
            read_only.writer(),
            Err(AssociationError::NoWritableScope)
        ));
    }

    #[tokio::test]
    async fn merged_read_prefers_higher_scope() {
        let user: Arc<dyn ConfigScope> =
            Arc::new(MemoryScope::new("user").with_value("k", json!(1)));
        let workspace: Arc<dyn ConfigScope> =
            Arc::new(MemoryScope::new("workspace").with_value("k", json!(2)));
        let scopes = stack(vec![user, workspace], WritableScope::MostSpecific);

        assert_eq!(scopes.read_merged("k").await, Some(json!(2)));
        let names: Vec<String> = scopes
            .read_layers("k")
            .await
            .iter()
            .map(|(scope, _)| scope.name().to_string())
            .collect();
        assert_eq!(names, vec!["workspace", "user"]);
    }

    #[tokio::test]
    async fn read_only_memory_scope_refuses_writes() {
        let scope = MemoryScope::read_only("policy");
        assert!(matches!(
            scope.write("k", Some(json!(true))).await,
            Err(AssociationError::ReadOnlyScope(_))
        ));
    }

    #[tokio::test]
    async fn json_file_scope_round_trips_values() {
        let temp = tempdir().unwrap();
        let scope = JsonFileScope::new("workspace", temp.path().join(".paramlink/settings.json"));

        assert_eq!(scope.read("k").await.unwrap(), None);
        scope.write("k", Some(json!({"a": "b"}))).await.unwrap();
        assert_eq!(scope.read("k").await.unwrap(), Some(json!({"a": "b"})));
        scope.write("k", None).await.unwrap();
        assert_eq!(scope.read("k").await.unwrap(), None);
    }
}
