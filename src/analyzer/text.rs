//! Lyric cleaning, language filtering, stop-word removal and lemmatization.
//!
//! Tokenization is naive: after cleaning, only letters, digits,
//! spaces, line breaks, `$` and `/` survive, and tokens are whatever sits
//! between runs of whitespace.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

// `[Verse 1: Someone]` style section headers, including their line break
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[.*?\]\n").unwrap());

static NON_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^ \nA-Za-z0-9$/]+").unwrap());

/// Language detection seam. Returns an ISO 639-3 code, or `None` when undecidable.
pub trait LanguageClassifier: Send + Sync {
    fn detect(&self, text: &str) -> Option<&'static str>;
}

/// Trigram-based detection via `whatlang`.
pub struct WhatlangClassifier;

impl LanguageClassifier for WhatlangClassifier {
    fn detect(&self, text: &str) -> Option<&'static str> {
        whatlang::detect(text).map(|info| info.lang().code())
    }
}

/// Lyrics that passed the language filter.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLyrics {
    /// Every token, before stop-word removal.
    pub tokens: Vec<String>,
    /// Stop-word-filtered, lemmatized tokens in original order.
    pub lemmas: Vec<String>,
}

impl NormalizedLyrics {
    /// Word count used for normalization. Counts stop-words too.
    pub fn n_words(&self) -> usize {
        self.tokens.len()
    }
}

pub struct TextNormalizer {
    classifier: Box<dyn LanguageClassifier>,
    target_language: String,
}

impl TextNormalizer {
    pub fn new(classifier: Box<dyn LanguageClassifier>, target_language: &str) -> Self {
        Self {
            classifier,
            target_language: target_language.to_string(),
        }
    }

    /// Clean, language-check and tokenize lyrics.
    /// `None` means the song is excluded from word/affect aggregation.
    pub fn normalize(&self, lyrics: &str) -> Option<NormalizedLyrics> {
        let cleaned = clean_lyrics(lyrics);

        match self.classifier.detect(&cleaned) {
            Some(lang) if lang == self.target_language => {}
            other => {
                log::trace!("Skipping lyrics classified as {:?}", other);
                return None;
            }
        }

        let tokens = tokenize(&cleaned);
        if tokens.is_empty() {
            return None;
        }
        let lemmas = tokens
            .iter()
            .filter(|t| !is_stop_word(t))
            .map(|t| lemmatize(t))
            .collect();

        Some(NormalizedLyrics { tokens, lemmas })
    }
}

/// Strip section markers, collapse blank lines, drop punctuation, lowercase.
pub fn clean_lyrics(raw: &str) -> String {
    let text = SECTION_RE.replace_all(raw, "");
    let text = text.replace("\n\n", "\n");
    let text = NON_TEXT_RE.replace_all(&text, "");
    text.to_lowercase()
}

/// Split cleaned text into tokens. Line breaks count as boundaries.
/// Words on adjacent lines are never glued into one token, and no empty
/// tokens are produced, so `n_words` is the count of visible words.
pub fn tokenize(cleaned: &str) -> Vec<String> {
    cleaned.split_whitespace().map(str::to_string).collect()
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(token)
}

/// Noun lemmatization by rule: irregular plurals first, then suffix stripping.
/// Tokens with digits or symbols pass through untouched.
pub fn lemmatize(token: &str) -> String {
    if !token.chars().all(|c| c.is_ascii_alphabetic()) {
        return token.to_string();
    }
    if let Some(lemma) = IRREGULAR_PLURALS.get(token) {
        return (*lemma).to_string();
    }
    if token.len() < 4
        || NOT_PLURAL.contains(token)
        || token.ends_with("ss")
        || token.ends_with("us")
        || token.ends_with("is")
    {
        return token.to_string();
    }
    if token.len() > 4 {
        if let Some(stem) = token.strip_suffix("ies") {
            return format!("{stem}y");
        }
    }
    // ache, cache, headache: the "e" belongs to the stem
    if let Some(stem) = token.strip_suffix("aches") {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ache");
        }
    }
    // buzz/buzzes, but size/sizes
    if token.ends_with("zes") && !token.ends_with("zzes") {
        return token[..token.len() - 1].to_string();
    }
    for suffix in ["sses", "ches", "shes", "xes", "zzes"] {
        if token.ends_with(suffix) {
            return token[..token.len() - 2].to_string();
        }
    }
    match token.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => token.to_string(),
    }
}

// NLTK's English list. Entries with apostrophes can never match cleaned text
// but are kept so the list stays the recognizable one.
static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're",
        "you've", "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him",
        "his", "himself", "she", "she's", "her", "hers", "herself", "it", "it's", "its",
        "itself", "they", "them", "their", "theirs", "themselves", "what", "which", "who",
        "whom", "this", "that", "that'll", "these", "those", "am", "is", "are", "was", "were",
        "be", "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing",
        "a", "an", "the", "and", "but", "if", "or", "because", "as", "until", "while", "of",
        "at", "by", "for", "with", "about", "against", "between", "into", "through",
        "during", "before", "after", "above", "below", "to", "from", "up", "down", "in",
        "out", "on", "off", "over", "under", "again", "further", "then", "once", "here",
        "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
        "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so",
        "than", "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should",
        "should've", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't",
        "couldn", "couldn't", "didn", "didn't", "doesn", "doesn't", "hadn", "hadn't",
        "hasn", "hasn't", "haven", "haven't", "isn", "isn't", "ma", "mightn", "mightn't",
        "mustn", "mustn't", "needn", "needn't", "shan", "shan't", "shouldn", "shouldn't",
        "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn", "wouldn't",
    ]
    .into_iter()
    .collect()
});

static IRREGULAR_PLURALS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("men", "man"),
        ("women", "woman"),
        ("children", "child"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("mice", "mouse"),
        ("geese", "goose"),
        ("wolves", "wolf"),
        ("knives", "knife"),
        ("lives", "life"),
        ("wives", "wife"),
        ("leaves", "leaf"),
        ("selves", "self"),
        ("thieves", "thief"),
        ("halves", "half"),
        ("shelves", "shelf"),
        ("heroes", "hero"),
        ("echoes", "echo"),
        ("potatoes", "potato"),
        ("tomatoes", "tomato"),
        ("goes", "go"),
        ("quizzes", "quiz"),
        ("movies", "movie"),
        ("lies", "lie"),
        ("ties", "tie"),
        ("pies", "pie"),
        ("cookies", "cookie"),
        ("zombies", "zombie"),
        ("hippies", "hippie"),
    ]
    .into_iter()
    .collect()
});

// Common lyric words that end in "s" but are not plurals
static NOT_PLURAL: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "always", "perhaps", "sometimes", "towards", "afterwards", "besides", "upstairs",
        "downstairs", "whereas", "nowadays", "chaos", "news", "series", "species", "lens",
        "yes", "less", "unless", "whats", "thats", "lets",
    ]
    .into_iter()
    .collect()
});
