//! Domain synonym expansion for Czech technical manuals.
//!
//! Manuals name the same section in many ways ("technické údaje",
//! "specifikace", "parametry"). When any keyword looks like a word of a group
//! (shared 3-character prefix, either direction), every word of that group is
//! added to the query so chunks written with a different vocabulary still
//! score.

use std::collections::HashSet;

use crate::keywords::is_significant;

/// Length of the prefix compared when deciding whether a group matches.
pub const MATCH_PREFIX_CHARS: usize = 3;

/// Interchangeable phrases, one group per manual topic.
pub const SYNONYM_GROUPS: &[&[&str]] = &[
    &[
        "obsah balení",
        "rozsah dodávky",
        "součásti balení",
        "příslušenství",
        "dodávané příslušenství",
        "obsah dodávky",
    ],
    &[
        "technické údaje",
        "specifikace",
        "parametry",
        "technická data",
        "technické parametry",
    ],
    &["údržba", "servis", "ošetřování", "čištění", "péče"],
    &[
        "bezpečnost",
        "bezpečnostní pokyny",
        "varování",
        "nebezpečí",
        "výstraha",
    ],
    &[
        "uvedení do provozu",
        "spuštění",
        "zapnutí",
        "první použití",
        "start",
    ],
    &["vypnutí", "zastavení", "odstavení"],
    &[
        "závada",
        "porucha",
        "chyba",
        "problém",
        "řešení problémů",
        "odstraňování závad",
        "troubleshooting",
    ],
    &[
        "návod k obsluze",
        "návod k použití",
        "uživatelská příručka",
        "manuál",
    ],
    &["záruka", "záruční podmínky", "reklamace"],
    &["instalace", "montáž", "sestavení", "připojení"],
    &["rozměry", "hmotnost", "váha", "velikost"],
];

/// The first `MATCH_PREFIX_CHARS` characters, or the whole word if shorter.
fn prefix(word: &str) -> &str {
    match word.char_indices().nth(MATCH_PREFIX_CHARS) {
        Some((byte_idx, _)) => &word[..byte_idx],
        None => word,
    }
}

fn words_match(keyword: &str, candidate: &str) -> bool {
    keyword.starts_with(prefix(candidate))
        || candidate.starts_with(prefix(keyword))
}

fn group_words<'a>(group: &'a [&'a str]) -> impl Iterator<Item = &'a str> {
    group.iter().copied().flat_map(|phrase| phrase.split(' '))
}

fn group_matches<S: AsRef<str>>(group: &[&str], keywords: &[S]) -> bool {
    group_words(group).any(|candidate| {
        keywords
            .iter()
            .any(|keyword| words_match(keyword.as_ref(), candidate))
    })
}

/// Expand keywords with the words of every matching synonym group.
///
/// The result keeps the original keywords first (deduplicated, in order),
/// followed by new synonym words in group, phrase and word order.
///
/// # Examples
///
/// ```
/// use docask::synonyms::expand_with_synonyms;
///
/// let expanded = expand_with_synonyms(&["specifikace".to_string()]);
/// assert_eq!(expanded[0], "specifikace");
/// assert!(expanded.contains(&"parametry".to_string()));
/// ```
pub fn expand_with_synonyms<S: AsRef<str>>(keywords: &[S]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut expanded = Vec::new();

    for keyword in keywords {
        let keyword = keyword.as_ref();
        if seen.insert(keyword.to_string()) {
            expanded.push(keyword.to_string());
        }
    }

    for group in SYNONYM_GROUPS {
        if !group_matches(group, keywords) {
            continue;
        }
        for word in group_words(group) {
            if is_significant(word) && seen.insert(word.to_string()) {
                expanded.push(word.to_string());
            }
        }
    }

    expanded
}
