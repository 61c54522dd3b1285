//! Question → keyword extraction.
//!
//! The extractor is purely lexical: lowercase, drop punctuation, split on
//! whitespace, then discard short tokens and stop words. Inflection and
//! synonyms are handled later by [`crate::stemming`] and [`crate::synonyms`].

use std::{collections::HashSet, sync::LazyLock};

/// Minimum token length (exclusive) for a keyword.
pub const MIN_KEYWORD_CHARS: usize = 2;

/// Accented letters of Czech kept by the extractor alongside ASCII.
const CZECH_LETTERS: &str = "áčďéěíňóřšťúůýž";

/// Czech function words, pronouns and question/instruction words that carry
/// no retrieval signal.
const STOP_WORDS: &[&str] = &[
    "a", "aby", "aj", "ale", "ani", "asi", "az", "až", "bez", "bude",
    "budem", "budes", "budete", "budou", "by", "byl", "byla", "byli", "bylo",
    "být", "co", "ci", "což", "další", "do", "ho", "i", "ja", "já", "jak",
    "jako", "jaký", "je", "jeho", "jej", "její", "jejich", "jen", "jenž",
    "jest", "jeste", "ještě", "ji", "jinak", "jine", "jiné", "jiný", "jiz",
    "již", "jsem", "jses", "jsi", "jsme", "jsou", "jste", "k", "kam", "kde",
    "kdo", "kdyz", "když", "ke", "ktera", "která", "ktere", "které", "kteri",
    "kteří", "který", "kvůli", "ma", "má", "mate", "máte", "me", "mě",
    "mezi", "mi", "mit", "mít", "mne", "mnou", "moc", "moje", "může", "muze",
    "my", "na", "nad", "nam", "nám", "nas", "nás", "náš", "ne", "nebo",
    "nebyl", "necht", "nechť", "nejsou", "neni", "není", "nez", "než", "nic",
    "nich", "ním", "no", "o", "od", "on", "ona", "oni", "ono", "ony", "pak",
    "po", "pod", "podle", "pokud", "potom", "pouze", "prave", "právě", "pred",
    "před", "přes", "přese", "pri", "při", "pro", "proc", "proč", "proto",
    "protoze", "protože", "re", "s", "se", "si", "sice", "sve", "své", "svůj",
    "svym", "svým", "ta", "tak", "take", "také", "takze", "takže", "tam",
    "tato", "te", "tě", "tedy", "ten", "tento", "ti", "tim", "tím", "to",
    "toho", "tohoto", "tom", "tomto", "tomu", "tomuto", "tu", "tuto", "ty",
    "tyto", "u", "uz", "už", "v", "ve", "vam", "vám", "vas", "vás", "váš",
    "vice", "více", "vsak", "však", "vy", "z", "za", "ze", "že",
    // question and instruction words
    "jaké", "jaká", "kolik", "kdy", "řekni", "popiš", "vysvětli", "najdi",
    "ukaž",
];

static STOP_WORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

/// Whether `word` (already lowercased) is on the stop-word list.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORD_SET.contains(word)
}

fn is_kept_char(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        || c.is_whitespace()
        || CZECH_LETTERS.contains(c)
}

/// Whether a token is long enough and meaningful enough to be a keyword.
pub(crate) fn is_significant(word: &str) -> bool {
    word.chars().count() > MIN_KEYWORD_CHARS && !is_stop_word(word)
}

/// Extract significant lowercase terms from a question.
///
/// Order is preserved and duplicates are kept; callers that need set
/// semantics dedupe themselves.
///
/// # Examples
///
/// ```
/// use docask::keywords::extract_keywords;
///
/// assert_eq!(
///     extract_keywords("Jaké jsou technické údaje výrobku?"),
///     vec!["technické", "údaje", "výrobku"],
/// );
/// ```
pub fn extract_keywords(question: &str) -> Vec<String> {
    let cleaned: String = question
        .to_lowercase()
        .chars()
        .filter(|&c| is_kept_char(c))
        .collect();

    cleaned
        .split_whitespace()
        .filter(|word| is_significant(word))
        .map(str::to_string)
        .collect()
}
