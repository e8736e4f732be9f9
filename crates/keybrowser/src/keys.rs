//! Pure functions over flat, slash-delimited item keys
//!
//! A key ending in [`SEPARATOR`] names a folder, any other key names a file.
//! Nothing here stores parent/child links: hierarchy is always derived from
//! the keys themselves.

/// Path separator used inside keys
pub const SEPARATOR: char = '/';

/// Reserved segment naming a folder that is still being created
pub const DRAFT_SEGMENT: &str = "__new__";

/// True iff `key` names a folder (ends with the separator)
pub fn is_folder(key: &str) -> bool {
    key.ends_with(SEPARATOR)
}

/// Folder containing `key`, including its trailing separator.
///
/// Root-level keys (and the empty key) yield the empty prefix.
pub fn parent(key: &str) -> &str {
    let trimmed = key.strip_suffix(SEPARATOR).unwrap_or(key);
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => &key[..=idx],
        None => "",
    }
}

/// Last segment of `key`, without a trailing separator
pub fn name(key: &str) -> &str {
    let trimmed = key.strip_suffix(SEPARATOR).unwrap_or(key);
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Partition keys into `(folders, files)`, preserving relative order
pub fn split_by_kind<S: AsRef<str> + Clone>(keys: &[S]) -> (Vec<S>, Vec<S>) {
    keys.iter().cloned().partition(|k| is_folder(k.as_ref()))
}

/// True iff `key` lives somewhere below the folder `ancestor`
pub fn is_ancestor(ancestor: &str, key: &str) -> bool {
    is_folder(ancestor) && key.len() > ancestor.len() && key.starts_with(ancestor)
}

/// True iff `key` sits directly inside `folder` (the empty folder is the root)
pub fn is_direct_child(folder: &str, key: &str) -> bool {
    if !folder.is_empty() && !is_folder(folder) {
        return false;
    }
    match key.strip_prefix(folder) {
        Some(rest) if !rest.is_empty() => {
            let rest = rest.strip_suffix(SEPARATOR).unwrap_or(rest);
            !rest.is_empty() && !rest.contains(SEPARATOR)
        }
        _ => false,
    }
}

/// Replace the literal prefix `old` of `key` with `new`
pub fn rebase(key: &str, old: &str, new: &str) -> Option<String> {
    key.strip_prefix(old).map(|rest| format!("{new}{rest}"))
}

/// True iff `key` is a placeholder for an item still being named
pub fn is_draft_key(key: &str) -> bool {
    !key.is_empty() && name(key) == DRAFT_SEGMENT
}

/// Drop every key that lies inside another folder key of the same list.
///
/// Moving or deleting a folder already carries its descendants along, so
/// those descendants must not receive a command of their own.
pub fn without_nested(keys: &[String]) -> Vec<String> {
    keys.iter()
        .filter(|key| !keys.iter().any(|other| is_ancestor(other, key)))
        .cloned()
        .collect()
}
