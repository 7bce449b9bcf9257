use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod jsonc;
pub mod path_key;

pub use path_key::{relative_under, PathKey};

/// Settings key holding the template → parameters mapping in every scope.
pub const PARAMETER_FILES_SETTING: &str = "paramlink.parameterFiles";

/// Settings key that turns the "found a matching parameter file" prompt on or off.
pub const CHECK_FOR_MATCHING_SETTING: &str = "paramlink.checkForMatchingParameterFiles";

/// Global state key for templates the user never wants to be asked about again.
pub const DONT_ASK_STATE_KEY: &str = "paramlink.dontAskAboutParameterFiles";

/// Extensions a parameters document may carry (compared case-insensitively).
pub const SUPPORTED_PARAMETER_EXTENSIONS: &[&str] = &["json", "jsonc"];

pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_PARAMETER_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

/// A file in the template's folder that looks like a parameters document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CandidateParametersFile {
    pub path: PathBuf,
    pub is_close_name_match: bool,
}

/// Identity of an editor document. Only `file` documents take part in association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub scheme: String,
    pub path: PathBuf,
}

impl DocumentRef {
    pub const FILE_SCHEME: &'static str = "file";

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            scheme: Self::FILE_SCHEME.to_string(),
            path: path.into(),
        }
    }

    pub fn is_file_backed(&self) -> bool {
        self.scheme.eq_ignore_ascii_case(Self::FILE_SCHEME)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentEvent {
    Opened,
    Saved,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_gate_is_case_insensitive() {
        assert!(has_supported_extension(Path::new("a/b/params.JSON")));
        assert!(has_supported_extension(Path::new("params.dev.jsonc")));
        assert!(!has_supported_extension(Path::new("params.txt")));
        assert!(!has_supported_extension(Path::new("json")));
    }

    #[test]
    fn only_file_documents_are_file_backed() {
        assert!(DocumentRef::file("/tmp/t.json").is_file_backed());
        let untitled = DocumentRef {
            scheme: "untitled".to_string(),
            path: PathBuf::from("Untitled-1"),
        };
        assert!(!untitled.is_file_backed());
    }
}
