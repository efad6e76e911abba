use once_cell::sync::Lazy;
use regex::Regex;

// @module: SRT line classification and WebVTT conversion

// @const: Header every WebVTT document starts with
pub const WEBVTT_HEADER: &str = "WEBVTT\n\n";

// @const: SRT timestamp (comma before milliseconds)
static SRT_TIMESTAMP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}):(\d{2}):(\d{2}),(\d{3})").unwrap());

// @const: Cue sequence index line
static INDEX_LINE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

/// Marker separating start and end time in a cue timing line
pub const CUE_TIMING_MARKER: &str = "-->";

const BOM: char = '\u{feff}';

/// Convert SRT text into a WebVTT document.
///
/// Prefixes the header and rewrites every `HH:MM:SS,mmm` timestamp to
/// `HH:MM:SS.mmm`. Nothing else is touched. A leading byte order mark is dropped.
pub fn to_webvtt(raw: &str) -> String {
    let body = raw.strip_prefix(BOM).unwrap_or(raw);
    let converted = SRT_TIMESTAMP_REGEX.replace_all(body, "$1:$2:$3.$4");

    let mut vtt = String::with_capacity(WEBVTT_HEADER.len() + converted.len());
    vtt.push_str(WEBVTT_HEADER);
    vtt.push_str(&converted);
    vtt
}

/// Whether a subtitle line carries dialogue that should be translated.
///
/// Blank lines, cue sequence numbers and cue timing lines are structural.
pub fn is_translatable_line(line: &str) -> bool {
    let trimmed = line.trim();

    !trimmed.is_empty() && !INDEX_LINE_REGEX.is_match(trimmed) && !trimmed.contains(CUE_TIMING_MARKER)
}

/// Normalize CRLF and lone CR line endings to LF
pub fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Prepare downloaded subtitle text for classification: drop a leading byte
/// order mark and normalize line endings
pub fn normalize_source(text: &str) -> String {
    normalize_line_endings(text.strip_prefix(BOM).unwrap_or(text))
}
