use paramlink_protocol::has_supported_extension;
use std::path::Path;

/// True when the candidate's stem starts with the template's stem.
///
/// Stems drop every extension (`t.params.dev.json` → `t`) and are compared lower-cased,
/// so trailing qualifiers such as `.params`, `.parameters` or `.dev` still match while
/// names that merely contain the template stem elsewhere do not.
pub fn is_likely_match(
    template_file_name: impl AsRef<Path>,
    candidate_file_name: impl AsRef<Path>,
) -> bool {
    let candidate = candidate_file_name.as_ref();
    if !has_supported_extension(candidate) {
        return false;
    }
    let (Some(template_stem), Some(candidate_stem)) = (
        stem_without_extensions(template_file_name.as_ref()),
        stem_without_extensions(candidate),
    ) else {
        return false;
    };
    candidate_stem.starts_with(&template_stem)
}

/// Lower-cased file name with all extensions removed. Leading dots belong to the stem.
pub fn stem_without_extensions(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let undotted = name.trim_start_matches('.');
    let leading = name.len() - undotted.len();
    let stem = match undotted.find('.') {
        Some(idx) => &name[..leading + idx],
        None => &name[..],
    };
    Some(stem.to_lowercase())
}
