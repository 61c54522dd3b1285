//! Crude suffix stripping to approximate Czech inflection.
//!
//! Czech inflects heavily ("obsah", "obsahu", "obsahem"), so an exact
//! substring match misses most occurrences. Instead of a real stemmer we try
//! the keyword and up to three truncations of it, never going below
//! [`MIN_STEM_CHARS`] characters.

/// Shortest variant that will ever be produced by truncation.
pub const MIN_STEM_CHARS: usize = 3;

/// Maximum number of trailing characters removed from a keyword.
pub const MAX_STRIPPED_CHARS: usize = 3;

/// The keyword followed by its progressively shorter prefixes.
///
/// # Examples
///
/// ```
/// use docask::stemming::stem_variants;
///
/// assert_eq!(
///     stem_variants("obsahem"),
///     vec!["obsahem", "obsahe", "obsah", "obsa"]
/// );
/// assert_eq!(stem_variants("lis"), vec!["lis"]);
/// ```
pub fn stem_variants(keyword: &str) -> Vec<String> {
    let boundaries: Vec<usize> = keyword
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .collect();
    let len = boundaries.len();
    let floor = MIN_STEM_CHARS.max(len.saturating_sub(MAX_STRIPPED_CHARS));

    let mut variants = vec![keyword.to_string()];
    for keep in (floor..len).rev() {
        variants.push(keyword[..boundaries[keep]].to_string());
    }
    variants
}
