//! Path normalization shared by the association store and the reconciliation workflow.
//!
//! Rules, applied in order:
//! 1. `\` becomes `/`
//! 2. repeated separators collapse, `.` segments are dropped
//! 3. `..` pops its parent lexically (symlinks are not resolved, the filesystem is not touched)
//! 4. no trailing separator
//! 5. lower-case
//!
//! A UNC prefix (`\\server\share`) therefore keys like `/server/share`.

use std::fmt;
use std::path::Path;

/// Case- and separator-insensitive identity of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathKey {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::from_raw(&path.as_ref().to_string_lossy())
    }

    pub fn from_raw(raw: &str) -> Self {
        let (rooted, segments) = lexical_segments(raw);
        let mut out = String::with_capacity(raw.len());
        if rooted {
            out.push('/');
        }
        out.push_str(&segments.join("/"));
        if out.is_empty() {
            out.push('.');
        }
        Self(out.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns `target` relative to `dir` (with `/` separators) when `target` lies under `dir`.
///
/// The prefix test follows [`PathKey`] rules; the returned remainder keeps the caller's casing.
pub fn relative_under(dir: &Path, target: &Path) -> Option<String> {
    let dir_raw = dir.to_string_lossy();
    let target_raw = target.to_string_lossy();
    let (dir_rooted, dir_segments) = lexical_segments(&dir_raw);
    let (target_rooted, target_segments) = lexical_segments(&target_raw);
    if dir_rooted != target_rooted || target_segments.len() <= dir_segments.len() {
        return None;
    }
    let prefix_matches = dir_segments
        .iter()
        .zip(target_segments.iter())
        .all(|(a, b)| a.to_lowercase() == b.to_lowercase());
    if !prefix_matches || target_segments[dir_segments.len()..].contains(&"..") {
        return None;
    }
    Some(target_segments[dir_segments.len()..].join("/"))
}

fn lexical_segments(raw: &str) -> (bool, Vec<&str>) {
    let raw = raw.trim();
    let rooted = raw.starts_with('/') || raw.starts_with('\\');
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => match segments.last().copied() {
                Some(last) if last != ".." && !is_drive(last) => {
                    segments.pop();
                }
                // `..` above a root or drive has nowhere to go.
                Some(last) if is_drive(last) => {}
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
    (rooted, segments)
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
