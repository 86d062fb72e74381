//! Candidate store addresses for a logical path.
//!
//! Versioned mounts list directories under `<mount>/metadata/...` and read or
//! write values under `<mount>/data/...`, while flat mounts use the plain path
//! for both. Callers try the candidates in order and stop at the first one that
//! yields something, so the plain form always comes first.

pub const SEPARATOR: char = '/';
const METADATA_SEGMENT: &str = "metadata";
const DATA_SEGMENT: &str = "data";

/// Collapse separator runs and drop a trailing separator.
pub fn normalize(path: &str) -> String {
    let collapsed = collapse_separators(path);
    match collapsed.strip_suffix(SEPARATOR) {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
        _ => collapsed,
    }
}

/// Collapse every run of consecutive separators into a single one.
pub fn collapse_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_was_separator = false;
    for ch in path.chars() {
        if ch == SEPARATOR {
            if previous_was_separator {
                continue;
            }
            previous_was_separator = true;
        } else {
            previous_was_separator = false;
        }
        out.push(ch);
    }
    out
}

/// Join a container address and an entry name with a single separator.
pub fn join(parent: &str, name: &str) -> String {
    collapse_separators(&format!("{parent}{SEPARATOR}{name}"))
}

/// Addresses to try when listing the children of `path`.
pub fn container_variants(path: &str) -> Vec<String> {
    let mut variants = vec![path.to_string(), format!("{path}{SEPARATOR}")];
    if let Some((mount, rest)) = path.split_once(SEPARATOR) {
        let metadata = format!("{mount}{SEPARATOR}{METADATA_SEGMENT}{SEPARATOR}{rest}");
        let metadata_dir = format!("{metadata}{SEPARATOR}");
        variants.extend([metadata, metadata_dir]);
    }
    variants.iter().map(|v| collapse_separators(v)).collect()
}

/// Addresses to try when reading or writing the secret at `path`.
pub fn leaf_variants(path: &str) -> Vec<String> {
    let mut variants = vec![path.to_string()];
    if let Some((mount, rest)) = path.split_once(SEPARATOR) {
        if let Some(data_path) = replace_inner_segment(path, METADATA_SEGMENT, DATA_SEGMENT) {
            variants.push(data_path);
        } else if !has_inner_segment(path, DATA_SEGMENT) {
            variants.push(format!("{mount}{SEPARATOR}{DATA_SEGMENT}{SEPARATOR}{rest}"));
        }
    }
    variants.iter().map(|v| collapse_separators(v)).collect()
}

/// A segment that is neither the first nor the last one.
fn inner_segments(path: &str) -> impl Iterator<Item = (usize, &str)> {
    let segments: Vec<&str> = path.split(SEPARATOR).collect();
    let last = segments.len().saturating_sub(1);
    segments
        .into_iter()
        .enumerate()
        .filter(move |(idx, _)| *idx > 0 && *idx < last)
}

fn has_inner_segment(path: &str, segment: &str) -> bool {
    inner_segments(path).any(|(_, value)| value == segment)
}

fn replace_inner_segment(path: &str, from: &str, to: &str) -> Option<String> {
    let (position, _) = inner_segments(path).find(|(_, value)| *value == from)?;
    let rebuilt: Vec<&str> = path
        .split(SEPARATOR)
        .enumerate()
        .map(|(idx, value)| if idx == position { to } else { value })
        .collect();
    Some(rebuilt.join(&SEPARATOR.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_and_trims() {
        assert_eq!(normalize("secret//app///db/"), "secret/app/db");
        assert_eq!(normalize("secret"), "secret");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn container_variants_prefer_plain_path() {
        assert_eq!(
            container_variants("secret/app/team"),
            vec![
                "secret/app/team",
                "secret/app/team/",
                "secret/metadata/app/team",
                "secret/metadata/app/team/",
            ]
        );
    }

    #[test]
    fn container_variants_single_segment_has_no_metadata_form() {
        assert_eq!(container_variants("secret"), vec!["secret", "secret/"]);
    }

    #[test]
    fn container_variants_collapse_separators() {
        assert_eq!(
            container_variants("secret//app"),
            vec![
                "secret/app",
                "secret/app/",
                "secret/metadata/app",
                "secret/metadata/app/",
            ]
        );
    }

    #[test]
    fn leaf_variants_add_data_prefix() {
        assert_eq!(
            leaf_variants("secret/app/db"),
            vec!["secret/app/db", "secret/data/app/db"]
        );
    }

    #[test]
    fn leaf_variants_swap_metadata_for_data() {
        assert_eq!(
            leaf_variants("secret/metadata/app/db"),
            vec!["secret/metadata/app/db", "secret/data/app/db"]
        );
    }

    #[test]
    fn leaf_variants_keep_existing_data_path() {
        assert_eq!(leaf_variants("secret/data/app/db"), vec!["secret/data/app/db"]);
    }

    #[test]
    fn leaf_variants_ignore_trailing_data_name() {
        // a leaf literally named `data` is not a data prefix
        assert_eq!(
            leaf_variants("kv/app/data"),
            vec!["kv/app/data", "kv/data/app/data"]
        );
        assert_eq!(leaf_variants("secret"), vec!["secret"]);
    }
}
