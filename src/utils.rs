/// Suffix marking an array block (`# items list`) or a list header (`tags list:`).
pub const LIST_SUFFIX: &str = " list";

/// Case-folds and trims an attribute key or block name. Every name is folded
/// exactly once, when its node is created.
pub fn fold_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Returns true for block names that map to a sequence of records.
pub fn is_array_name(name: &str) -> bool {
    name.ends_with(LIST_SUFFIX)
}

/// Strips a trailing ` list` so `tags list` and `tags` address the same field.
pub fn strip_list_suffix(name: &str) -> &str {
    name.strip_suffix(LIST_SUFFIX).unwrap_or(name)
}

/// Normalises a name for field lookup: case-folded, with `_` and runs of
/// whitespace treated as a single space.
pub fn field_lookup_key(name: &str) -> String {
    name.to_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
