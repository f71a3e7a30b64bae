/// Auto-detection of coverage file formats.
///
/// Strategy:
///   1. Check file extension for strong hints
///   2. Peek at the first bytes of the file content
///   3. Fall back to CLI --format override (handled by caller)
use std::path::Path;

pub use crate::model::Format;

/// Detect the coverage format from filename and file content.
pub fn detect_format(path: &Path, content: &[u8]) -> Option<Format> {
    if let Some(fmt) = detect_by_extension(path) {
        return Some(fmt);
    }
    detect_by_content(content)
}

fn detect_by_extension(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "info" | "lcov" => Some(Format::Lcov),
        // .xml may be any XML dialect; the content decides.
        _ => None,
    }
}

fn detect_by_content(content: &[u8]) -> Option<Format> {
    // We only need to look at the first few KB
    let head_len = content.len().min(4096);
    let head = String::from_utf8_lossy(&content[..head_len]);

    // LCOV: require lines that actually start with the record tags to avoid
    // false positives on files that merely contain these strings.
    let has_sf = head.lines().any(|l| l.trim_start().starts_with("SF:"));
    let has_da_or_fn = head.lines().any(|l| {
        let l = l.trim_start();
        l.starts_with("DA:") || l.starts_with("FN:")
    });
    if has_sf && has_da_or_fn {
        return Some(Format::Lcov);
    }

    let trimmed = head.trim_start_matches('\u{feff}').trim_start();
    if (trimmed.starts_with("<?xml") || trimmed.starts_with('<')) && head.contains("<coverage") {
        return Some(Format::Cobertura);
    }

    None
}
