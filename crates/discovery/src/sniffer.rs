use crate::limits::{SniffOptions, SNIFF_CHUNK_BYTES};
use crate::Result;
use paramlink_protocol::{has_supported_extension, jsonc};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Literal that every deployment parameters schema URI contains, compared ASCII
/// case-insensitively (`tenantDeploymentParameters.json` has a capital `D`).
pub const SCHEMA_MARKER: &str = "deploymentParameters.json";

/// `$schema` values accepted in strict mode.
pub const RECOGNIZED_SCHEMA_URIS: &[&str] = &[
    "https://schema.management.azure.com/schemas/2015-01-01/deploymentParameters.json#",
    "https://schema.management.azure.com/schemas/2019-04-01/deploymentParameters.json#",
    "https://schema.management.azure.com/schemas/2019-08-01/tenantDeploymentParameters.json#",
    "https://schema.management.azure.com/schemas/2019-08-01/managementGroupDeploymentParameters.json#",
    "https://schema.management.azure.com/schemas/2018-05-01/subscriptionDeploymentParameters.json#",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffOutcome {
    pub is_parameters: bool,
    pub bytes_read: u64,
}

impl SniffOutcome {
    const fn rejected(bytes_read: u64) -> Self {
        Self {
            is_parameters: false,
            bytes_read,
        }
    }
}

/// Decides whether a file is a parameters document by streaming it and looking for
/// the schema marker, never reading more than the configured ceiling.
#[derive(Debug, Clone, Default)]
pub struct ContentSniffer {
    options: SniffOptions,
}

impl ContentSniffer {
    pub fn new(options: SniffOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> SniffOptions {
        self.options
    }

    pub async fn is_parameters_file(&self, path: &Path) -> bool {
        self.sniff(path).await.is_parameters
    }

    pub async fn sniff(&self, path: &Path) -> SniffOutcome {
        if !has_supported_extension(path) {
            return SniffOutcome::rejected(0);
        }
        match self.sniff_stream(path).await {
            Ok(outcome) => {
                log::debug!(
                    "Sniffed {} (parameters={}, {} bytes read)",
                    path.display(),
                    outcome.is_parameters,
                    outcome.bytes_read
                );
                outcome
            }
            Err(err) => {
                log::debug!("Failed to sniff {}: {err}", path.display());
                SniffOutcome::rejected(0)
            }
        }
    }

    async fn sniff_stream(&self, path: &Path) -> Result<SniffOutcome> {
        let mut file = File::open(path).await?;
        let mut buffer: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; SNIFF_CHUNK_BYTES];

        loop {
            let Some(read) = self.read_chunk(&mut file, &mut chunk, buffer.len()).await? else {
                return Ok(SniffOutcome::rejected(buffer.len() as u64));
            };
            if read == 0 {
                return Ok(SniffOutcome::rejected(buffer.len() as u64));
            }

            // Only the new bytes (plus a marker-sized overlap) can hold a fresh match.
            let scan_from = buffer.len().saturating_sub(SCHEMA_MARKER.len() - 1);
            buffer.extend_from_slice(&chunk[..read]);
            if !contains_marker(&buffer[scan_from..]) {
                continue;
            }

            if !self.options.strict_schema {
                return Ok(SniffOutcome {
                    is_parameters: true,
                    bytes_read: buffer.len() as u64,
                });
            }
            return self.strict_check(&mut file, &mut chunk, buffer).await;
        }
    }

    /// Reads the next chunk, or `None` once the byte ceiling is exhausted.
    async fn read_chunk(
        &self,
        file: &mut File,
        chunk: &mut [u8],
        already_read: usize,
    ) -> Result<Option<usize>> {
        let remaining = self.options.max_bytes.saturating_sub(already_read as u64);
        if remaining == 0 {
            return Ok(None);
        }
        let want = usize::try_from(remaining)
            .unwrap_or(usize::MAX)
            .min(chunk.len());
        Ok(Some(file.read(&mut chunk[..want]).await?))
    }

    async fn strict_check(
        &self,
        file: &mut File,
        chunk: &mut [u8],
        mut buffer: Vec<u8>,
    ) -> Result<SniffOutcome> {
        // A document past the ceiling cannot be parsed whole.
        if file.metadata().await?.len() > self.options.max_bytes {
            return Ok(SniffOutcome::rejected(buffer.len() as u64));
        }
        while let Some(read) = self.read_chunk(file, chunk, buffer.len()).await? {
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
        }

        let bytes_read = buffer.len() as u64;
        let text = String::from_utf8_lossy(&buffer);
        let value = jsonc::parse(text.trim_start_matches('\u{feff}'))?;
        let is_parameters = value
            .get("$schema")
            .and_then(|schema| schema.as_str())
            .is_some_and(is_recognized_schema);
        Ok(SniffOutcome {
            is_parameters,
            bytes_read,
        })
    }
}

pub fn is_recognized_schema(uri: &str) -> bool {
    let uri = uri.trim().trim_end_matches('#');
    RECOGNIZED_SCHEMA_URIS
        .iter()
        .any(|known| known.trim_end_matches('#').eq_ignore_ascii_case(uri))
}

fn contains_marker(haystack: &[u8]) -> bool {
    let marker = SCHEMA_MARKER.as_bytes();
    haystack.len() >= marker.len()
        && haystack
            .windows(marker.len())
            .any(|w| w.eq_ignore_ascii_case(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const PARAMS: &str = r#"{
    "$schema": "https://schema.management.azure.com/schemas/2019-04-01/deploymentParameters.json#",
    "contentVersion": "1.0.0.0",
    "parameters": {}
}"#;

    #[tokio::test]
    async fn detects_marker_and_rejects_plain_json() {
        let temp = tempdir().unwrap();
        let params = temp.path().join("t.params.json");
        let other = temp.path().join("package.json");
        fs::write(&params, PARAMS).unwrap();
        fs::write(&other, r#"{"name": "web"}"#).unwrap();

        let sniffer = ContentSniffer::default();
        assert!(sniffer.is_parameters_file(&params).await);
        assert!(!sniffer.is_parameters_file(&other).await);
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_without_reading() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("t.params.txt");
        fs::write(&path, PARAMS).unwrap();

        let outcome = ContentSniffer::default().sniff(&path).await;
        assert_eq!(outcome, SniffOutcome::rejected(0));
    }

    #[tokio::test]
    async fn uppercase_extension_is_supported() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("T.PARAMS.JSONC");
        fs::write(&path, PARAMS).unwrap();
        assert!(ContentSniffer::default().is_parameters_file(&path).await);
    }

    #[tokio::test]
    async fn missing_file_is_not_a_parameters_file() {
        let temp = tempdir().unwrap();
        let sniffer = ContentSniffer::default();
        assert!(!sniffer.is_parameters_file(&temp.path().join("gone.json")).await);
    }

    #[tokio::test]
    async fn stops_reading_once_marker_is_found() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("huge.json");
        let mut content = SCHEMA_MARKER.as_bytes().to_vec();
        content.resize(10 * 1_048_576, b'x');
        fs::write(&path, &content).unwrap();

        let outcome = ContentSniffer::default().sniff(&path).await;
        assert!(outcome.is_parameters);
        assert!(outcome.bytes_read <= SNIFF_CHUNK_BYTES as u64);
    }

    #[tokio::test]
    async fn marker_split_across_chunks_is_found() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("split.json");
        let mut content = vec![b' '; SNIFF_CHUNK_BYTES - 5];
        content.extend_from_slice(SCHEMA_MARKER.as_bytes());
        fs::write(&path, &content).unwrap();

        assert!(ContentSniffer::default().is_parameters_file(&path).await);
    }

    #[tokio::test]
    async fn byte_ceiling_bounds_the_search() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("late.json");
        let mut content = vec![b' '; 64 * 1024];
        content.extend_from_slice(SCHEMA_MARKER.as_bytes());
        fs::write(&path, &content).unwrap();

        let sniffer = ContentSniffer::new(SniffOptions {
            max_bytes: 32 * 1024,
            strict_schema: false,
        });
        let outcome = sniffer.sniff(&path).await;
        assert!(!outcome.is_parameters);
        assert_eq!(outcome.bytes_read, 32 * 1024);
    }

    #[tokio::test]
    async fn strict_mode_ignores_marker_in_comments() {
        let temp = tempdir().unwrap();
        let commented = temp.path().join("commented.jsonc");
        fs::write(
            &commented,
            "// copied from deploymentParameters.json\n{\"name\": \"web\"}",
        )
        .unwrap();
        let real = temp.path().join("real.jsonc");
        fs::write(&real, format!("// dev values\n{PARAMS}")).unwrap();

        let loose = ContentSniffer::default();
        let strict = ContentSniffer::new(SniffOptions::default().strict(true));
        assert!(loose.is_parameters_file(&commented).await);
        assert!(!strict.is_parameters_file(&commented).await);
        assert!(strict.is_parameters_file(&real).await);
    }

    #[tokio::test]
    async fn strict_mode_rejects_unknown_schema_uri() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("odd.json");
        fs::write(
            &path,
            r#"{"$schema": "https://example.com/deploymentParameters.json#"}"#,
        )
        .unwrap();
        let strict = ContentSniffer::new(SniffOptions::default().strict(true));
        assert!(!strict.is_parameters_file(&path).await);
    }

    fn params_with_schema(uri: &str) -> String {
        format!("{{\n  \"$schema\": \"{uri}\",\n  \"parameters\": {{}}\n}}")
    }

    #[tokio::test]
    async fn every_recognized_schema_is_detected_in_both_modes() {
        let temp = tempdir().unwrap();
        let loose = ContentSniffer::default();
        let strict = ContentSniffer::new(SniffOptions::default().strict(true));

        for (idx, uri) in RECOGNIZED_SCHEMA_URIS.iter().enumerate() {
            let path = temp.path().join(format!("p{idx}.json"));
            fs::write(&path, params_with_schema(uri)).unwrap();
            assert!(loose.is_parameters_file(&path).await, "loose: {uri}");
            assert!(strict.is_parameters_file(&path).await, "strict: {uri}");
        }
    }

    #[tokio::test]
    async fn capitalized_marker_split_across_chunks_is_found() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("tenant.json");
        let mut content = vec![b' '; SNIFF_CHUNK_BYTES - 7];
        content.extend_from_slice(b"tenantDeploymentParameters.json");
        fs::write(&path, &content).unwrap();

        assert!(ContentSniffer::default().is_parameters_file(&path).await);
    }

    #[test]
    fn schema_comparison_ignores_fragment_and_case() {
        assert!(is_recognized_schema(
            "https://schema.management.azure.com/schemas/2015-01-01/deploymentParameters.json"
        ));
        assert!(is_recognized_schema(
            "HTTPS://SCHEMA.management.azure.com/schemas/2015-01-01/deploymentParameters.json#"
        ));
        assert!(!is_recognized_schema(
            "https://schema.management.azure.com/schemas/2015-01-01/deploymentTemplate.json#"
        ));
    }
}
