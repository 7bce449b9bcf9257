pub const DEFAULT_SNIFF_MAX_BYTES: u64 = 1_048_576; // 1 MB
const MIN_SNIFF_MAX_BYTES: u64 = 4 * 1024;
const MAX_SNIFF_MAX_BYTES: u64 = 64 * 1_048_576;

/// Bytes pulled from the file per read while looking for the schema marker.
pub const SNIFF_CHUNK_BYTES: usize = 16 * 1024;

/// Budget and strictness for content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffOptions {
    /// Hard ceiling on bytes read per file.
    pub max_bytes: u64,
    /// Also require a recognized `$schema` URI after the marker is found.
    pub strict_schema: bool,
}

impl Default for SniffOptions {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_SNIFF_MAX_BYTES,
            strict_schema: false,
        }
    }
}

impl SniffOptions {
    /// Reads `PARAMLINK_SNIFF_MAX_BYTES` and `PARAMLINK_STRICT_SCHEMA`.
    pub fn from_env() -> Self {
        let raw = std::env::var("PARAMLINK_SNIFF_MAX_BYTES").ok();
        Self {
            max_bytes: parse_sniff_max_bytes(raw.as_deref(), DEFAULT_SNIFF_MAX_BYTES),
            strict_schema: env_truthy("PARAMLINK_STRICT_SCHEMA"),
        }
    }

    pub fn strict(mut self, strict_schema: bool) -> Self {
        self.strict_schema = strict_schema;
        self
    }
}

fn parse_sniff_max_bytes(raw: Option<&str>, default_value: u64) -> u64 {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_value)
        .clamp(MIN_SNIFF_MAX_BYTES, MAX_SNIFF_MAX_BYTES)
}

fn env_truthy(var: &str) -> bool {
    std::env::var(var)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
