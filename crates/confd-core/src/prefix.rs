//! Prefix helpers shared by DID and normalization-rule lookups

/// Longest lookup prefix considered when indexing rules by number
pub const MAX_LOOKUP_PREFIX: usize = 10;

/// Derive the index prefix of a matching regex: its leading run of digits
/// once any leading `^` anchors are removed.
///
/// `^39[0-9]+$` yields `"39"`, `^(0|39)` yields `""`.
pub fn prefix_from_regex(regex: &str) -> String {
    regex
        .trim_start_matches('^')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect()
}

/// All candidate prefixes `number[0..i]` for `i` in `0..min(10, len)`.
///
/// The empty prefix is always part of the set for a non-empty number, so rules
/// whose regex starts with a metacharacter are still selected.
pub fn lookup_prefixes(number: &str) -> Vec<String> {
    let len = number.len().min(MAX_LOOKUP_PREFIX);
    (0..len)
        .filter_map(|i| number.get(..i))
        .map(str::to_string)
        .collect()
}
