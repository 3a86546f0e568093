//! Compiled rule tables
//!
//! A `RuleSet` is everything the scanner and renderer need to know about
//! one language. It is produced by the rule compiler, never mutated after
//! that, and shared behind an `Arc`.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::style::{default_colors, Style};
use super::tokens::TokenClass;

/// Bucket for keywords whose first character is not a letter
pub const OTHER_BUCKET: &str = "#";

/// Keyword bucket for a (normalized) word
///
/// Letter-initial words are bucketed by their first character, everything
/// else shares `OTHER_BUCKET`.
pub fn bucket_of(word: &str) -> &str {
    match word.chars().next() {
        Some(c) if c.is_alphabetic() => &word[..c.len_utf8()],
        _ => OTHER_BUCKET,
    }
}

/// Scalar preferences of a rule file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Spaces per tab
    pub indentation: usize,
    /// Character escaping a quote terminator
    pub escape: Option<char>,
    /// When false, keywords are matched against the lower-cased word
    pub case_sensitive: bool,
    /// Source starts as host markup and only `script_begin` enters code
    pub html_embedded: bool,
    pub script_begin: String,
    pub script_end: String,
    /// Human-readable language name
    pub name: Option<String>,
    /// Preferences with no meaning to the highlighter
    pub extra: BTreeMap<String, String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            indentation: 4,
            escape: None,
            case_sensitive: true,
            html_embedded: false,
            script_begin: String::new(),
            script_end: String::new(),
            name: None,
            extra: BTreeMap::new(),
        }
    }
}

/// The compiled rule table for one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Canonical language id (rule file stem)
    pub language_id: String,
    pub preferences: Preferences,
    /// Class name to `#rrggbb`
    pub colors: BTreeMap<String, String>,
    pub delimiters: BTreeSet<char>,
    /// Class name to bucket to keywords
    pub keywords: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
    pub line_comments: Vec<String>,
    /// Block comment openers, index-aligned with `comment_off`
    pub comment_on: Vec<String>,
    pub comment_off: Vec<String>,
    pub quotes: BTreeSet<char>,
    /// Sigil to class name
    pub prefixes: BTreeMap<char, String>,
    pub style_open: BTreeMap<String, String>,
    pub style_close: BTreeMap<String, String>,
}

impl RuleSet {
    /// Create an empty rule set with the built-in palette
    pub fn new(language_id: &str) -> Self {
        Self {
            colors: default_colors(),
            ..Self::plain(language_id)
        }
    }

    /// Create a rule set with no rules and no colors at all
    ///
    /// Scanning with it classifies every word as plain text.
    pub fn plain(language_id: &str) -> Self {
        Self {
            language_id: language_id.to_string(),
            preferences: Preferences::default(),
            colors: BTreeMap::new(),
            delimiters: BTreeSet::new(),
            keywords: BTreeMap::new(),
            line_comments: Vec::new(),
            comment_on: Vec::new(),
            comment_off: Vec::new(),
            quotes: BTreeSet::new(),
            prefixes: BTreeMap::new(),
            style_open: BTreeMap::new(),
            style_close: BTreeMap::new(),
        }
    }

    /// Human-readable language name
    pub fn display_name(&self) -> &str {
        self.preferences.name.as_deref().unwrap_or(&self.language_id)
    }

    /// Apply case folding for case-insensitive languages
    pub fn normalize_word<'w>(&self, word: &'w str) -> Cow<'w, str> {
        if self.preferences.case_sensitive {
            Cow::Borrowed(word)
        } else {
            Cow::Owned(word.to_lowercase())
        }
    }

    /// Register a keyword under `class`
    ///
    /// A single leading `^` is stripped so rule files can list keywords
    /// that would otherwise read as directives. Returns false for empty
    /// keywords and duplicates.
    pub fn add_keyword(&mut self, class: &str, keyword: &str) -> bool {
        let keyword = keyword.strip_prefix('^').unwrap_or(keyword);
        if keyword.is_empty() {
            return false;
        }
        let keyword = self.normalize_word(keyword).into_owned();
        let bucket = bucket_of(&keyword).to_string();
        self.keywords
            .entry(class.to_string())
            .or_default()
            .entry(bucket)
            .or_default()
            .insert(keyword)
    }

    /// Keyword class of a word, if any
    ///
    /// Only the bucket matching the word's first character is searched.
    /// Classes are tried in name order.
    pub fn classify_word(&self, word: &str) -> Option<&str> {
        let word = self.normalize_word(word);
        let bucket = bucket_of(&word);
        self.keywords
            .iter()
            .find(|(_, buckets)| {
                buckets
                    .get(bucket)
                    .is_some_and(|words| words.contains(&*word))
            })
            .map(|(class, _)| class.as_str())
    }

    /// Total keywords across all classes
    pub fn keyword_count(&self) -> usize {
        self.keywords
            .values()
            .flat_map(|buckets| buckets.values())
            .map(BTreeSet::len)
            .sum()
    }

    pub fn is_delimiter(&self, c: char) -> bool {
        self.delimiters.contains(&c)
    }

    pub fn is_quote(&self, c: char) -> bool {
        self.quotes.contains(&c)
    }

    /// Class given to words starting with sigil `c`
    pub fn prefix_class(&self, c: char) -> Option<&str> {
        self.prefixes.get(&c).map(String::as_str)
    }

    /// Block comment (open, close) pairs in declaration order
    pub fn block_comments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.comment_on
            .iter()
            .zip(&self.comment_off)
            .map(|(on, off)| (on.as_str(), off.as_str()))
    }

    /// Display color of a class
    ///
    /// Rule-file classes without their own color use `reserved_words`,
    /// then `default`.
    pub fn color_for(&self, class: &TokenClass) -> Option<&str> {
        if class.is_unstyled() {
            return None;
        }
        if let Some(color) = self.colors.get(class.name()) {
            return Some(color.as_str());
        }
        if class.is_named() {
            return self
                .colors
                .get("reserved_words")
                .or_else(|| self.colors.get("default"))
                .map(String::as_str);
        }
        None
    }

    /// Complete style (color plus decoration) of a class
    pub fn style_for(&self, class: &TokenClass) -> Style<'_> {
        if class.is_unstyled() {
            return Style::default();
        }
        let name = class.name();
        Style {
            color: self.color_for(class),
            ..Default::default()
        }
        .with_decoration(
            self.style_open.get(name).map(String::as_str),
            self.style_close.get(name).map(String::as_str),
        )
    }
}
