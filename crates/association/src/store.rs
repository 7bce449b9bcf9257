use crate::scope::ScopeStack;
use crate::{AssociationError, Result};
use paramlink_protocol::{relative_under, PathKey, PARAMETER_FILES_SETTING};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An effective association and the scope that supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAssociation {
    pub template: PathBuf,
    pub parameters: PathBuf,
    pub scope: String,
}

/// Persists template → parameters mappings across the scope stack.
///
/// Reads merge every scope (highest precedence wins, keys compared as [`PathKey`]s);
/// writes go to the stack's single writable scope.
#[derive(Clone)]
pub struct AssociationStore {
    scopes: Arc<ScopeStack>,
}

impl AssociationStore {
    pub fn new(scopes: Arc<ScopeStack>) -> Self {
        Self { scopes }
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    pub async fn resolve(&self, template: &Path) -> Option<PathBuf> {
        let key = PathKey::new(template);
        for (scope, value) in self.scopes.read_layers(PARAMETER_FILES_SETTING).await {
            let Some(mapping) = value.as_object() else {
                log::warn!(
                    "Ignoring non-object {PARAMETER_FILES_SETTING} in scope {}",
                    scope.name()
                );
                continue;
            };
            let found = mapping
                .iter()
                .find(|(stored_key, _)| PathKey::from_raw(stored_key) == key)
                .and_then(|(_, stored)| stored_value(stored));
            if let Some(raw) = found {
                return Some(resolve_stored_path(template, raw));
            }
        }
        None
    }

    /// Associates `template` with `parameters`, or clears the association when `None`.
    pub async fn set(&self, template: &Path, parameters: Option<&Path>) -> Result<()> {
        let writer = self.scopes.writer()?;
        let key = PathKey::new(template);
        let scope_name = writer.name().to_string();
        let entry = parameters.map(|parameters| {
            (
                template.to_string_lossy().into_owned(),
                stored_form(template, parameters),
            )
        });

        writer
            .update(
                PARAMETER_FILES_SETTING,
                Box::new(move |current| {
                    let mut mapping = match current {
                        None => Map::new(),
                        Some(Value::Object(mapping)) => mapping,
                        Some(other) => {
                            return Err(AssociationError::Malformed {
                                location: format!("scope {scope_name}"),
                                detail: format!(
                                    "{PARAMETER_FILES_SETTING} is not an object: {other}"
                                ),
                            })
                        }
                    };
                    mapping.retain(|stored_key, _| PathKey::from_raw(stored_key) != key);
                    if let Some((template_key, stored)) = entry {
                        mapping.insert(template_key, Value::String(stored));
                    }
                    Ok((!mapping.is_empty()).then_some(Value::Object(mapping)))
                }),
            )
            .await?;

        match parameters {
            Some(parameters) => log::info!(
                "Associated {} with parameter file {} (scope {})",
                template.display(),
                parameters.display(),
                writer.name()
            ),
            None => log::info!(
                "Cleared parameter file association for {} (scope {})",
                template.display(),
                writer.name()
            ),
        }
        Ok(())
    }

    /// Every effective association, one per logical template key.
    pub async fn entries(&self) -> Vec<ResolvedAssociation> {
        let mut merged: BTreeMap<PathKey, ResolvedAssociation> = BTreeMap::new();
        for (scope, value) in self.scopes.read_layers(PARAMETER_FILES_SETTING).await {
            let Some(mapping) = value.as_object() else {
                continue;
            };
            for (stored_key, stored) in mapping {
                let key = PathKey::from_raw(stored_key);
                if merged.contains_key(&key) {
                    continue;
                }
                let Some(raw) = stored_value(stored) else {
                    continue;
                };
                let template = PathBuf::from(stored_key);
                merged.insert(
                    key,
                    ResolvedAssociation {
                        parameters: resolve_stored_path(&template, raw),
                        template,
                        scope: scope.name().to_string(),
                    },
                );
            }
        }
        merged.into_values().collect()
    }

    /// Reverse lookup: the template whose association points at `parameters`.
    pub async fn find_template_for_parameters(&self, parameters: &Path) -> Option<PathBuf> {
        let key = PathKey::new(parameters);
        self.entries()
            .await
            .into_iter()
            .find(|entry| PathKey::new(&entry.parameters) == key)
            .map(|entry| entry.template)
    }
}

fn stored_value(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|raw| !raw.is_empty())
}

/// Relative to the template's folder when nested under it, absolute otherwise.
fn stored_form(template: &Path, parameters: &Path) -> String {
    template
        .parent()
        .and_then(|dir| relative_under(dir, parameters))
        .unwrap_or_else(|| parameters.to_string_lossy().into_owned())
}

fn resolve_stored_path(template: &Path, raw: &str) -> PathBuf {
    if is_absolute_like(raw) {
        return PathBuf::from(raw);
    }
    match template.parent() {
        Some(dir) => dir.join(raw),
        None => PathBuf::from(raw),
    }
}

/// Absolute on this platform, or a rooted / drive-letter path written on another one.
fn is_absolute_like(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    Path::new(raw).is_absolute()
        || raw.starts_with('/')
        || raw.starts_with('\\')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}
