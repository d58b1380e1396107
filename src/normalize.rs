//! Name normalization shared by both pipelines.
//!
//! The inbound join and the outbound feed must normalize names identically
//! or matches silently fail, so every rule lives here: the match-key form
//! used for joining, ASCII folding for accented names, and the character
//! cleanup applied during variant expansion.

use deunicode::deunicode;

/// Surname particles excluded when a space-delimited surname is split into
/// candidate variants. Suffix-like single letters are included because the
/// external system never registers a person under them.
pub const SURNAME_PARTICLES: &[&str] = &[
    "LA", "MC", "DE", "ST", "ST.", "DEL", "JR", "JR.", "A", "O",
];

/// Minimum length of a given-name token after splitting; shorter fragments
/// (initials, particles) are discarded.
pub const MIN_GIVEN_NAME_LEN: usize = 3;

/// Normalizes a name into the join-key form: trimmed, all internal spaces
/// removed, uppercased. Both sides of the identity join must pass through
/// this exact function.
pub fn match_key(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Strips diacritics by transliterating to ASCII ("JOSÉ" -> "JOSE").
pub fn fold_ascii(name: &str) -> String {
    deunicode(name)
}

/// Removes every character outside `[A-Za-z0-9 ]`. Spaces survive so that
/// space-splitting can run afterwards.
pub fn strip_non_alphanumeric(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect()
}

/// Splits `value` on `delimiter` into at most `max_parts` leading parts,
/// mirroring how the submission feed fans a compound name out into
/// matchable variants. Blank parts are dropped; parts beyond `max_parts`
/// are ignored rather than merged.
pub fn split_parts(value: &str, delimiter: char, max_parts: usize) -> Vec<String> {
    value
        .split(delimiter)
        .take(max_parts)
        .map(str::to_string)
        .filter(|p| !p.trim().is_empty())
        .collect()
}
