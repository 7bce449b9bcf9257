use crate::name_match::is_likely_match;
use crate::sniffer::ContentSniffer;
use crate::{DiscoveryError, Result, SniffOptions};
use paramlink_protocol::{CandidateParametersFile, PathKey};
use std::path::Path;

/// Finds parameters documents next to a template (non-recursive).
#[derive(Debug, Clone, Default)]
pub struct CandidateFinder {
    sniffer: ContentSniffer,
}

impl CandidateFinder {
    pub fn new(sniffer: ContentSniffer) -> Self {
        Self { sniffer }
    }

    pub fn with_options(options: SniffOptions) -> Self {
        Self::new(ContentSniffer::new(options))
    }

    pub fn sniffer(&self) -> &ContentSniffer {
        &self.sniffer
    }

    /// Lists the template's folder and keeps files that sniff as parameters documents.
    ///
    /// An unreadable folder yields no candidates.
    pub async fn find_candidates(&self, template_path: &Path) -> Vec<CandidateParametersFile> {
        match self.scan(template_path).await {
            Ok(candidates) => {
                log::debug!(
                    "Found {} parameter file candidates for {}",
                    candidates.len(),
                    template_path.display()
                );
                candidates
            }
            Err(err) => {
                log::warn!(
                    "Failed to list parameter file candidates for {}: {err}",
                    template_path.display()
                );
                Vec::new()
            }
        }
    }

    async fn scan(&self, template_path: &Path) -> Result<Vec<CandidateParametersFile>> {
        let dir = match template_path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
            Some(parent) => parent,
            None => {
                return Err(DiscoveryError::InvalidPath(
                    template_path.display().to_string(),
                ))
            }
        };
        let template_key = PathKey::new(template_path);

        let mut candidates = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            // Follows symlinks so linked parameter files still count.
            let is_file = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.is_file(),
                Err(err) => {
                    log::debug!("Skipping unreadable entry {}: {err}", path.display());
                    false
                }
            };
            if !is_file || PathKey::new(&path) == template_key {
                continue;
            }
            if !self.sniffer.is_parameters_file(&path).await {
                continue;
            }
            let is_close_name_match = is_likely_match(template_path, &path);
            candidates.push(CandidateParametersFile {
                path,
                is_close_name_match,
            });
        }

        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(candidates)
    }
}
