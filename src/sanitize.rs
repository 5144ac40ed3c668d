//! Identifier sanitization for table and column names.
//!
//! [`sanitize()`] maps arbitrary header or file-name text onto
//! `[a-z0-9_]`, never longer than [`MAX_IDENTIFIER_BYTES`]. It is total and
//! idempotent, so its output can be fed straight into DDL after quoting.
//! [`unique_identifiers()`] adds deterministic disambiguation for headers that
//! collapse onto the same name.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

pub const MAX_IDENTIFIER_BYTES: usize = 63;
pub const EMPTY_COLUMN_FALLBACK: &str = "unnamed_column";
pub const TRUNCATED_COLUMN_FALLBACK: &str = "truncated_column";
pub const EMPTY_TABLE_FALLBACK: &str = "unnamed_table";

static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \-./]+").expect("separator pattern"));
static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]+").expect("invalid char pattern"));
static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("underscore pattern"));

pub fn sanitize(raw: &str) -> String {
    sanitize_with_fallback(raw, EMPTY_COLUMN_FALLBACK)
}

pub fn sanitize_table_name(raw: &str) -> String {
    sanitize_with_fallback(raw, EMPTY_TABLE_FALLBACK)
}

fn sanitize_with_fallback(raw: &str, empty_fallback: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let separated = SEPARATOR_RUNS.replace_all(&lowered, "_");
    let stripped = INVALID_CHARS.replace_all(&separated, "");
    let collapsed = UNDERSCORE_RUNS.replace_all(&stripped, "_");
    let trimmed = collapsed.trim_matches('_');

    if trimmed.is_empty() {
        return empty_fallback.to_string();
    }
    let mut name = if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    };
    if name.len() > MAX_IDENTIFIER_BYTES {
        // Only ASCII survives the stripping above, so any byte index is a char boundary.
        name.truncate(MAX_IDENTIFIER_BYTES);
        let kept = name.trim_end_matches('_').len();
        name.truncate(kept);
        if name.is_empty() {
            return TRUNCATED_COLUMN_FALLBACK.to_string();
        }
    }
    name
}

/// Sanitizes every name and resolves collisions case-insensitively.
///
/// The first occurrence keeps its sanitized name. Later duplicates get the
/// 1-based column position as suffix (`name_2`), then `name_2_1`, `name_2_2`
/// and so on while that is still taken.
pub fn unique_identifiers<S: AsRef<str>>(raw_names: &[S]) -> Vec<String> {
    let sanitized = raw_names
        .iter()
        .map(|raw| sanitize(raw.as_ref()))
        .collect::<Vec<_>>();
    disambiguate(sanitized)
}

pub(crate) fn disambiguate(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut resolved = Vec::with_capacity(names.len());
    for (idx, name) in names.into_iter().enumerate() {
        if taken.insert(name.to_ascii_lowercase()) {
            resolved.push(name);
            continue;
        }
        let position = idx + 1;
        let mut candidate = with_suffix(&name, &position.to_string());
        let mut attempt = 1usize;
        while !taken.insert(candidate.to_ascii_lowercase()) {
            candidate = with_suffix(&name, &format!("{position}_{attempt}"));
            attempt += 1;
        }
        resolved.push(candidate);
    }
    resolved
}

fn with_suffix(base: &str, suffix: &str) -> String {
    let budget = MAX_IDENTIFIER_BYTES.saturating_sub(suffix.len() + 1);
    let mut end = base.len().min(budget);
    while !base.is_char_boundary(end) {
        end -= 1;
    }
    let head = base[..end].trim_end_matches('_');
    format!("{head}_{suffix}")
}
