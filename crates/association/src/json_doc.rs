//! Whole-document JSON persistence shared by file-backed scopes and global state.
//!
//! Every update re-reads the document under an exclusive lock file, replaces one key and
//! renames a fully written temp file into place, so readers never observe a torn document.

use crate::scope::ValueUpdate;
use crate::{AssociationError, Result};
use fs2::FileExt;
use paramlink_protocol::jsonc;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub(crate) fn read_document(path: &Path) -> Result<Map<String, Value>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(err) => return Err(err.into()),
    };
    let raw = raw.trim_start_matches('\u{feff}');
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match jsonc::parse(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(AssociationError::Malformed {
            location: path.display().to_string(),
            detail: "expected a JSON object at the top level".to_string(),
        }),
    }
}

pub(crate) fn read_key(path: &Path, key: &str) -> Result<Option<Value>> {
    Ok(read_document(path)?.remove(key))
}

/// Sets (`Some`) or removes (`None`) one top-level key.
pub(crate) fn update_key(path: &Path, key: &str, value: Option<Value>) -> Result<()> {
    modify_key(path, key, Box::new(move |_| Ok(value)))
}

/// Replaces one top-level key with `apply(current)`, all under the document lock.
pub(crate) fn modify_key(path: &Path, key: &str, apply: ValueUpdate) -> Result<()> {
    let _lock = DocumentLock::acquire(&lock_path_for(path))?;
    let mut document = read_document(path)?;
    let current = document.remove(key);
    let had_key = current.is_some();
    match apply(current)? {
        Some(value) => {
            document.insert(key.to_string(), value);
        }
        None if !had_key && !path.exists() => return Ok(()),
        None => {}
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(&Value::Object(document))?;
    write_atomic(path, &bytes)
}

pub(crate) async fn read_key_blocking(path: PathBuf, key: String) -> Result<Option<Value>> {
    tokio::task::spawn_blocking(move || read_key(&path, &key))
        .await
        .map_err(|err| AssociationError::Other(format!("join settings read task: {err}")))?
}

pub(crate) async fn update_key_blocking(
    path: PathBuf,
    key: String,
    value: Option<Value>,
) -> Result<()> {
    tokio::task::spawn_blocking(move || update_key(&path, &key, value))
        .await
        .map_err(|err| AssociationError::Other(format!("join settings write task: {err}")))?
}

pub(crate) async fn modify_key_blocking(
    path: PathBuf,
    key: String,
    apply: ValueUpdate,
) -> Result<()> {
    tokio::task::spawn_blocking(move || modify_key(&path, &key, apply))
        .await
        .map_err(|err| AssociationError::Other(format!("join settings update task: {err}")))?
}

fn lock_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("settings");
    path.with_file_name(format!(".{name}.lock"))
}

struct DocumentLock {
    #[allow(dead_code)]
    file: File,
}

impl DocumentLock {
    fn acquire(lock_path: &Path) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;
        file.lock_exclusive().map_err(|err| {
            AssociationError::Other(format!("lock {}: {err}", lock_path.display()))
        })?;
        Ok(Self { file })
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| AssociationError::Other(format!("{} has no parent", path.display())))?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn update_key_preserves_other_keys() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(
            &path,
            "{\n  // editor prefs\n  \"editor.tabSize\": 2,\n}\n",
        )
        .unwrap();

        update_key(&path, "paramlink.parameterFiles", Some(json!({"a.json": "b.json"}))).unwrap();

        let document = read_document(&path).unwrap();
        assert_eq!(document.get("editor.tabSize"), Some(&json!(2)));
        assert_eq!(
            document.get("paramlink.parameterFiles"),
            Some(&json!({"a.json": "b.json"}))
        );
    }

    #[test]
    fn removing_a_key_from_a_missing_file_creates_nothing() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("settings.json");
        update_key(&path, "k", None).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn non_object_document_is_malformed() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            read_document(&path),
            Err(AssociationError::Malformed { .. })
        ));
    }

    #[test]
    fn modify_key_sees_the_current_value() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        update_key(&path, "counter", Some(json!(1))).unwrap();

        modify_key(
            &path,
            "counter",
            Box::new(|current| {
                let n = current.and_then(|v| v.as_i64()).unwrap_or(0);
                Ok(Some(json!(n + 1)))
            }),
        )
        .unwrap();
        assert_eq!(read_key(&path, "counter").unwrap(), Some(json!(2)));

        let err = modify_key(
            &path,
            "counter",
            Box::new(|_| Err(AssociationError::Other("refused".to_string()))),
        );
        assert!(err.is_err());
        assert_eq!(read_key(&path, "counter").unwrap(), Some(json!(2)));
    }

    #[test]
    fn writes_leave_no_temp_files_behind() {
        let temp = tempdir().unwrap();
        let a = temp.path().join("a.json");
        let b = temp.path().join("b.json");
        update_key(&a, "k", Some(json!(1))).unwrap();
        update_key(&b, "k", Some(json!(2))).unwrap();
        update_key(&a, "k", Some(json!(3))).unwrap();

        let mut names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| !name.ends_with(".lock"))
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.json".to_string(), "b.json".to_string()]);
        assert_eq!(read_key(&a, "k").unwrap(), Some(json!(3)));
    }

    #[test]
    fn empty_file_reads_as_empty_document() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "  \n").unwrap();
        assert!(read_document(&path).unwrap().is_empty());
    }
}
