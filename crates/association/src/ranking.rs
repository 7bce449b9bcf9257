use paramlink_discovery::is_likely_match;
use paramlink_protocol::{relative_under, CandidateParametersFile, PathKey};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

pub const NONE_LABEL: &str = "None";
pub const BROWSE_LABEL: &str = "Browse...";
pub const CURRENT_DESCRIPTION: &str = "(Current)";
pub const SIMILAR_NAME_DESCRIPTION: &str = "Similar filename";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PickKind {
    Parameters { path: PathBuf, is_current: bool },
    None,
    Browse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickItem {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: PickKind,
}

/// Orders the manual selection list:
/// current association, `None`, close name matches, other candidates, `Browse...`.
///
/// A current association that is not among `candidates` is added so it still ranks first.
pub fn rank_selection(
    template: &Path,
    candidates: &[CandidateParametersFile],
    current: Option<&Path>,
) -> Vec<PickItem> {
    let current_key = current.map(PathKey::new);
    let mut current_candidate: Option<CandidateParametersFile> = None;
    let mut rest: Vec<&CandidateParametersFile> = Vec::new();
    for candidate in candidates {
        if current_key.as_ref() == Some(&PathKey::new(&candidate.path)) {
            current_candidate.get_or_insert_with(|| candidate.clone());
        } else {
            rest.push(candidate);
        }
    }
    if current_candidate.is_none() {
        current_candidate = current.map(|path| CandidateParametersFile {
            path: path.to_path_buf(),
            is_close_name_match: is_likely_match(template, path),
        });
    }

    rest.sort_by(|a, b| compare_candidates(a, b));

    let template_dir = template.parent();
    let mut items = Vec::with_capacity(rest.len() + 3);
    if let Some(candidate) = current_candidate {
        items.push(PickItem {
            label: display_label(template_dir, &candidate.path),
            description: Some(CURRENT_DESCRIPTION.to_string()),
            kind: PickKind::Parameters {
                path: candidate.path,
                is_current: true,
            },
        });
    }
    items.push(PickItem {
        label: NONE_LABEL.to_string(),
        description: current.is_none().then(|| CURRENT_DESCRIPTION.to_string()),
        kind: PickKind::None,
    });
    items.extend(rest.into_iter().map(|candidate| PickItem {
        label: display_label(template_dir, &candidate.path),
        description: candidate
            .is_close_name_match
            .then(|| SIMILAR_NAME_DESCRIPTION.to_string()),
        kind: PickKind::Parameters {
            path: candidate.path.clone(),
            is_current: false,
        },
    }));
    items.push(PickItem {
        label: BROWSE_LABEL.to_string(),
        description: None,
        kind: PickKind::Browse,
    });
    items
}

fn compare_candidates(a: &CandidateParametersFile, b: &CandidateParametersFile) -> Ordering {
    b.is_close_name_match
        .cmp(&a.is_close_name_match)
        .then_with(|| case_insensitive(&a.path).cmp(&case_insensitive(&b.path)))
}

fn case_insensitive(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

fn display_label(template_dir: Option<&Path>, path: &Path) -> String {
    template_dir
        .and_then(|dir| relative_under(dir, path))
        .unwrap_or_else(|| path.display().to_string())
}
