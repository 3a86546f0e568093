//! Rule file compiler
//!
//! Rule files are line oriented:
//!
//! ```text
//! ; comment
//! #name=PHP
//! #escape=\
//! #linecomment=//
//! #linecomment2=#
//! #commenton=/*
//! #commentoff=*/
//! #quotation1="
//! #prefix_variable=$
//! #DELIMITER=(){}[];,.
//! #COLOR_variable=2040a0
//! #KEYWORD=reserved_words
//! if
//! else
//! ^#include
//! ```
//!
//! `#COLOR_`, `#KEYWORD` and `#DELIMITER` are structural directives; every
//! other `#key=value` is a preference, and the `linecomment*`,
//! `commenton*`/`commentoff*`, `quotation*`, `prefix*` and
//! `style_open_*`/`style_close_*` families are folded into typed fields
//! here so the scanner never looks at raw keys.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, info, warn};

use super::cache::{self, RuleCache};
use super::rules::RuleSet;
use super::style::normalize_color;
use crate::error::{HighlightError, Result};

/// Extension of rule-definition files
pub const RULE_EXTENSION: &str = "txt";

/// Extension of compiled cache artifacts
pub const CACHE_EXTENSION: &str = "json";

/// Language used when no rule file exists for the requested one
pub const FALLBACK_LANGUAGE: &str = "none";

/// Smallest and largest accepted tab width
pub const TAB_WIDTH_RANGE: (usize, usize) = (1, 16);

/// Clamp a tab width into `TAB_WIDTH_RANGE`
pub fn clamp_tab_width(n: usize) -> usize {
    n.clamp(TAB_WIDTH_RANGE.0, TAB_WIDTH_RANGE.1)
}

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^#([A-Za-z][A-Za-z0-9_]*)=(.*)$").expect("directive pattern is valid")
    })
}

/// Parse a boolean preference value
fn parse_bool(s: &str) -> bool {
    let s = s.to_lowercase();
    matches!(s.as_str(), "true" | "yes" | "on" | "1")
}

/// Class name for a `prefix*` key suffix
fn prefix_class(suffix: &str) -> String {
    let suffix = suffix.trim_start_matches('_');
    if suffix.is_empty() || suffix.chars().all(|c| c.is_ascii_digit()) {
        "prefix".to_string()
    } else {
        suffix.to_string()
    }
}

/// Parse rule-definition text into a rule set
///
/// Unrecognized lines are skipped. Keywords are registered after all
/// preferences are known, so `#case_sensitive` may appear anywhere.
pub fn parse_rules(language_id: &str, source: &str) -> RuleSet {
    let mut rules = RuleSet::new(language_id);
    let mut preferences: Vec<(String, String)> = Vec::new();
    let mut keywords: Vec<(String, String)> = Vec::new();
    let mut section: Option<String> = None;

    for (idx, line) in source.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with(';') {
            continue;
        }

        if let Some(caps) = directive_pattern().captures(line) {
            let key = caps[1].to_ascii_lowercase();
            let value = &caps[2];
            section = None;

            if key == "keyword" {
                let class = value.trim().to_lowercase();
                if !class.is_empty() {
                    section = Some(class);
                }
            } else if key == "delimiter" {
                rules.delimiters = value.chars().collect();
            } else if let Some(class) = key.strip_prefix("color_") {
                if !class.is_empty() && !value.trim().is_empty() {
                    rules.colors.insert(class.to_string(), normalize_color(value));
                }
            } else {
                preferences.push((key, value.trim().to_string()));
            }
            continue;
        }

        match &section {
            Some(class) => keywords.push((class.clone(), line.trim().to_string())),
            None => debug!(language = language_id, line = idx + 1, "skipping rule line"),
        }
    }

    apply_preferences(&mut rules, preferences);

    for (class, keyword) in keywords {
        rules.add_keyword(&class, &keyword);
    }

    rules
}

/// Fold raw preferences into the typed fields of `rules`
fn apply_preferences(rules: &mut RuleSet, preferences: Vec<(String, String)>) {
    let mut comment_on: Vec<String> = Vec::new();
    let mut comment_off: Vec<String> = Vec::new();

    for (key, value) in preferences {
        let prefs = &mut rules.preferences;
        match key.as_str() {
            "indentation" => {
                if let Ok(n) = value.parse::<usize>() {
                    prefs.indentation = clamp_tab_width(n);
                }
            }
            "escape" => {
                prefs.escape = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    value.chars().next()
                };
            }
            "case_sensitive" | "casesensitive" => prefs.case_sensitive = parse_bool(&value),
            "html_embedded" | "htmlembedded" => prefs.html_embedded = parse_bool(&value),
            "script_begin" => prefs.script_begin = value,
            "script_end" => prefs.script_end = value,
            "name" => prefs.name = Some(value).filter(|name| !name.is_empty()),
            _ => {
                if key.starts_with("linecomment") {
                    if !value.is_empty() && !rules.line_comments.contains(&value) {
                        rules.line_comments.push(value);
                    }
                } else if key.starts_with("commenton") {
                    if !value.is_empty() {
                        comment_on.push(value);
                    }
                } else if key.starts_with("commentoff") {
                    if !value.is_empty() {
                        comment_off.push(value);
                    }
                } else if key.starts_with("quotation") {
                    rules.quotes.extend(value.chars());
                } else if let Some(class) = key.strip_prefix("style_open_") {
                    rules.style_open.insert(class.to_string(), value);
                } else if let Some(class) = key.strip_prefix("style_close_") {
                    rules.style_close.insert(class.to_string(), value);
                } else if let Some(suffix) = key.strip_prefix("prefix") {
                    if let Some(sigil) = value.chars().next() {
                        rules.prefixes.insert(sigil, prefix_class(suffix));
                    }
                } else {
                    prefs.extra.insert(key, value);
                }
            }
        }
    }

    // Openers and closers pair up by declaration order
    let pairs = comment_on.len().min(comment_off.len());
    for extra in comment_on.iter().skip(pairs) {
        debug!(opener = %extra, "block comment opener without a closer");
    }
    for extra in comment_off.iter().skip(pairs) {
        debug!(closer = %extra, "block comment closer without an opener");
    }
    comment_on.truncate(pairs);
    comment_off.truncate(pairs);
    rules.comment_on = comment_on;
    rules.comment_off = comment_off;
}

/// Where a compiled rule set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The compiler's in-memory cache
    Memory,
    /// A cache artifact on disk
    DiskCache,
    /// Freshly parsed from the rule file
    Parsed,
}

/// Result of a compile request
#[derive(Debug)]
pub struct Compiled {
    pub rules: Arc<RuleSet>,
    pub origin: Origin,
    /// Set when the rule file was parsed but the artifact could not be saved
    pub cache_error: Option<HighlightError>,
}

/// Compiles rule files into rule sets, with in-memory and on-disk caching
pub struct RuleCompiler {
    rules_dir: PathBuf,
    cache_dir: Option<PathBuf>,
    fallback: String,
    memory: RuleCache,
}

impl RuleCompiler {
    /// Create a compiler reading `<rules_dir>/<language>.txt`, with no disk cache
    pub fn new(rules_dir: impl Into<PathBuf>) -> Self {
        Self {
            rules_dir: rules_dir.into(),
            cache_dir: None,
            fallback: FALLBACK_LANGUAGE.to_string(),
            memory: RuleCache::new(),
        }
    }

    /// Builder: persist compiled rules under `cache_dir`
    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    /// Builder: language substituted for missing rule files
    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = fallback.to_string();
        self
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Path of the rule file for a language
    pub fn rule_path(&self, language_id: &str) -> PathBuf {
        self.rules_dir
            .join(format!("{}.{}", language_id, RULE_EXTENSION))
    }

    /// Path of the cache artifact for a language
    pub fn cache_path(&self, language_id: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", language_id, CACHE_EXTENSION)))
    }

    /// Find the rule file for a language, or for the fallback language
    fn locate(&self, language_id: &str) -> Result<(String, PathBuf)> {
        for id in [language_id, self.fallback.as_str()] {
            if !is_valid_id(id) {
                continue;
            }
            let path = self.rule_path(id);
            if path.is_file() {
                if id != language_id {
                    debug!(requested = language_id, fallback = id, "using fallback rules");
                }
                return Ok((id.to_string(), path));
            }
        }

        Err(HighlightError::RuleFileNotFound {
            language: language_id.to_string(),
            rules_dir: self.rules_dir.clone(),
        })
    }

    /// Compile the rules for a language
    ///
    /// Reuses the in-memory entry or the disk artifact while the rule file
    /// is unmodified. A failure to write the artifact is logged and
    /// reported in `Compiled::cache_error` but does not fail the call.
    pub fn compile(&mut self, language_id: &str) -> Result<Compiled> {
        let (id, path) = self.locate(language_id)?;
        let modified = fs::metadata(&path)?.modified()?;

        if let Some(rules) = self.memory.get(&id, modified) {
            return Ok(Compiled {
                rules,
                origin: Origin::Memory,
                cache_error: None,
            });
        }

        let cache_path = self.cache_path(&id);

        if let Some(rules) = cache_path
            .as_deref()
            .and_then(|cache_path| cache::load(cache_path, &id, modified))
        {
            debug!(language = %id, "loaded rules from cache");
            let rules = Arc::new(rules);
            self.memory.insert(&id, modified, Arc::clone(&rules));
            return Ok(Compiled {
                rules,
                origin: Origin::DiskCache,
                cache_error: None,
            });
        }

        let text = fs::read_to_string(&path)?;
        let rules = parse_rules(&id, &text);
        info!(
            language = %id,
            keywords = rules.keyword_count(),
            path = %path.display(),
            "compiled rule file"
        );

        let cache_error = cache_path.and_then(|cache_path| {
            cache::store(&cache_path, &rules, modified).err()
        });
        if let Some(err) = &cache_error {
            warn!("{}", err);
        }

        let rules = Arc::new(rules);
        self.memory.insert(&id, modified, Arc::clone(&rules));
        Ok(Compiled {
            rules,
            origin: Origin::Parsed,
            cache_error,
        })
    }

    /// Drop all in-memory rule sets
    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    /// Languages with a rule file, sorted
    pub fn available_languages(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.rules_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.rules_dir.display(), error = %e, "cannot list rule files");
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == RULE_EXTENSION))
            .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }
}

/// Language ids are file stems; reject anything that could leave the rules directory
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.starts_with('.') && !id.contains(|c: char| c == '/' || c == '\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    const DEMO_RULES: &str = "\
; demo language
#name=Demo
#escape=\\
#case_sensitive=false
#linecomment=//
#linecomment2=#
#commenton1=/*
#commentoff1=*/
#commenton2={-
#commentoff2=-}
#commenton3=<!--
#quotation1=\"
#quotation2='
#prefix_variable=$
#prefix1=@
#style_open_reserved_words=<b>
#style_close_reserved_words=</b>
#DELIMITER=(){};,
#COLOR_variable=2040a0
#COLOR_quote=#00aa00
#KEYWORD=reserved_words
IF
else
^#include
;not a keyword
#KEYWORD=built_in_functions
echo
#tab_behaviour=keep
orphan line
";

    fn write_rules(dir: &Path, language: &str, text: &str) -> PathBuf {
        let path = dir.join(format!("{}.txt", language));
        fs::write(&path, text).expect("Failed to write rule file");
        path
    }

    fn touch(path: &Path, offset: Duration) {
        let file = File::options()
            .write(true)
            .open(path)
            .expect("Failed to open rule file");
        file.set_modified(SystemTime::now() + offset)
            .expect("Failed to set mtime");
    }

    #[test]
    fn test_parse_preferences() {
        let rules = parse_rules("demo", DEMO_RULES);
        let prefs = &rules.preferences;

        assert_eq!(prefs.name.as_deref(), Some("Demo"));
        assert_eq!(prefs.escape, Some('\\'));
        assert!(!prefs.case_sensitive);
        assert!(!prefs.html_embedded);
        assert_eq!(prefs.indentation, 4);
        assert_eq!(prefs.extra.get("tab_behaviour").map(String::as_str), Some("keep"));
        assert_eq!(rules.display_name(), "Demo");
    }

    #[test]
    fn test_parse_collections() {
        let rules = parse_rules("demo", DEMO_RULES);

        assert_eq!(rules.line_comments, vec!["//", "#"]);
        assert_eq!(rules.comment_on, vec!["/*", "{-"]);
        assert_eq!(rules.comment_off, vec!["*/", "-}"]);
        assert!(rules.is_quote('"') && rules.is_quote('\''));
        assert_eq!(rules.prefix_class('$'), Some("variable"));
        assert_eq!(rules.prefix_class('@'), Some("prefix"));
        assert_eq!(rules.delimiters.len(), 6);
        assert!(rules.is_delimiter(';'));
        assert_eq!(rules.style_open.get("reserved_words").map(String::as_str), Some("<b>"));
        assert_eq!(rules.style_close.get("reserved_words").map(String::as_str), Some("</b>"));
    }

    #[test]
    fn test_parse_colors() {
        let rules = parse_rules("demo", DEMO_RULES);

        assert_eq!(rules.colors.get("variable").map(String::as_str), Some("#2040a0"));
        assert_eq!(rules.colors.get("quote").map(String::as_str), Some("#00aa00"));
        // Untouched defaults survive
        assert_eq!(rules.colors.get("numeric").map(String::as_str), Some("#dd0000"));
    }

    #[test]
    fn test_parse_keywords() {
        let rules = parse_rules("demo", DEMO_RULES);

        // Case-insensitive rules lower-case keywords even when listed first
        assert_eq!(rules.classify_word("if"), Some("reserved_words"));
        assert_eq!(rules.classify_word("If"), Some("reserved_words"));
        assert_eq!(rules.classify_word("ELSE"), Some("reserved_words"));
        assert_eq!(rules.classify_word("#include"), Some("reserved_words"));
        assert_eq!(rules.classify_word("echo"), Some("built_in_functions"));
        assert_eq!(rules.classify_word("orphan"), None);
        assert_eq!(rules.classify_word(";not"), None);
        assert_eq!(rules.keyword_count(), 4);
    }

    #[test]
    fn test_block_comments_pair_by_order() {
        let rules = parse_rules("demo", "#commenton=/*\n#commentoff1=*/\n");
        assert_eq!(rules.comment_on, vec!["/*"]);
        assert_eq!(rules.comment_off, vec!["*/"]);

        let rules = parse_rules(
            "demo",
            "#commentonA=/*\n#commenton_b=(*\n#commentoff9=*/\n#commentoff=*)\n#commentoff2=-->\n",
        );
        assert_eq!(rules.comment_on, vec!["/*", "(*"]);
        assert_eq!(rules.comment_off, vec!["*/", "*)"]);
        assert_eq!(rules.block_comments().count(), 2);
    }

    #[test]
    fn test_indentation_is_clamped() {
        let rules = parse_rules("demo", "#indentation=50000000\n");
        assert_eq!(rules.preferences.indentation, 16);
        let rules = parse_rules("demo", "#indentation=0\n");
        assert_eq!(rules.preferences.indentation, 1);
        let rules = parse_rules("demo", "#indentation=2\n");
        assert_eq!(rules.preferences.indentation, 2);
    }

    #[test]
    fn test_delimiter_value_is_not_trimmed() {
        let rules = parse_rules("demo", "#DELIMITER=; \n");
        assert!(rules.is_delimiter(' '));
        assert!(rules.is_delimiter(';'));
    }

    #[test]
    fn test_escape_none() {
        let rules = parse_rules("demo", "#escape=none\n");
        assert_eq!(rules.preferences.escape, None);
        let rules = parse_rules("demo", "#escape=\n");
        assert_eq!(rules.preferences.escape, None);
    }

    #[test]
    fn test_compile_missing_uses_fallback() {
        let dir = tempdir().expect("Failed to create temp dir");
        write_rules(dir.path(), "none", "#name=Plain text\n");

        let mut compiler = RuleCompiler::new(dir.path());
        let compiled = compiler.compile("cobol").expect("fallback should compile");
        assert_eq!(compiled.rules.language_id, "none");
        assert_eq!(compiled.rules.display_name(), "Plain text");
    }

    #[test]
    fn test_compile_without_any_rules_fails() {
        let dir = tempdir().expect("Failed to create temp dir");
        let mut compiler = RuleCompiler::new(dir.path());

        let err = compiler.compile("cobol").expect_err("compile should fail");
        assert!(err.is_missing_rules());
        assert!(compiler.compile("../etc/passwd").is_err());
    }

    #[test]
    fn test_compile_is_idempotent_and_cached() {
        let dir = tempdir().expect("Failed to create temp dir");
        let cache_dir = dir.path().join("cache");
        write_rules(dir.path(), "demo", DEMO_RULES);

        let mut compiler = RuleCompiler::new(dir.path()).with_cache_dir(Some(cache_dir.clone()));
        let first = compiler.compile("demo").unwrap();
        assert_eq!(first.origin, Origin::Parsed);
        assert!(first.cache_error.is_none());
        assert!(cache_dir.join("demo.json").is_file());

        let second = compiler.compile("demo").unwrap();
        assert_eq!(second.origin, Origin::Memory);
        assert!(Arc::ptr_eq(&first.rules, &second.rules));

        // A fresh compiler picks up the artifact
        let mut other = RuleCompiler::new(dir.path()).with_cache_dir(Some(cache_dir));
        let third = other.compile("demo").unwrap();
        assert_eq!(third.origin, Origin::DiskCache);
        assert_eq!(*third.rules, *first.rules);

        // Parsing the same text twice yields byte-identical artifacts
        let now = SystemTime::now();
        let a = cache::to_bytes(&parse_rules("demo", DEMO_RULES), now).unwrap();
        let b = cache::to_bytes(&parse_rules("demo", DEMO_RULES), now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_touching_rule_file_recompiles() {
        let dir = tempdir().expect("Failed to create temp dir");
        let cache_dir = dir.path().join("cache");
        let path = write_rules(dir.path(), "demo", "#KEYWORD=reserved_words\nfoo\n");

        let mut compiler = RuleCompiler::new(dir.path()).with_cache_dir(Some(cache_dir.clone()));
        let first = compiler.compile("demo").unwrap();
        assert_eq!(first.rules.classify_word("bar"), None);

        fs::write(&path, "#KEYWORD=reserved_words\nfoo\nbar\n").unwrap();
        touch(&path, Duration::from_secs(10));

        let second = compiler.compile("demo").unwrap();
        assert_eq!(second.origin, Origin::Parsed);
        assert_eq!(second.rules.classify_word("bar"), Some("reserved_words"));

        // The refreshed artifact is valid for a new compiler too
        let mut other = RuleCompiler::new(dir.path()).with_cache_dir(Some(cache_dir));
        let third = other.compile("demo").unwrap();
        assert_eq!(third.origin, Origin::DiskCache);
        assert_eq!(third.rules.classify_word("bar"), Some("reserved_words"));
    }

    #[test]
    fn test_truncated_artifact_recompiles() {
        let dir = tempdir().expect("Failed to create temp dir");
        let cache_dir = dir.path().join("cache");
        write_rules(dir.path(), "demo", DEMO_RULES);
        fs::create_dir_all(&cache_dir).unwrap();
        fs::write(cache_dir.join("demo.json"), "{\"version\":1,\"sou").unwrap();

        let mut compiler = RuleCompiler::new(dir.path()).with_cache_dir(Some(cache_dir));
        let compiled = compiler.compile("demo").unwrap();
        assert_eq!(compiled.origin, Origin::Parsed);
        assert!(compiled.cache_error.is_none());
    }

    #[test]
    fn test_cache_write_failure_is_not_fatal() {
        let dir = tempdir().expect("Failed to create temp dir");
        write_rules(dir.path(), "demo", DEMO_RULES);
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let mut compiler =
            RuleCompiler::new(dir.path()).with_cache_dir(Some(blocker.join("cache")));
        let compiled = compiler.compile("demo").expect("compile should still succeed");
        assert_eq!(compiled.origin, Origin::Parsed);
        assert!(matches!(
            compiled.cache_error,
            Some(HighlightError::CacheWrite { .. })
        ));
        assert_eq!(compiled.rules.classify_word("echo"), Some("built_in_functions"));
    }

    #[test]
    fn test_available_languages() {
        let dir = tempdir().expect("Failed to create temp dir");
        write_rules(dir.path(), "php", "");
        write_rules(dir.path(), "c", "");
        fs::write(dir.path().join("README.md"), "").unwrap();

        let compiler = RuleCompiler::new(dir.path());
        assert_eq!(compiler.available_languages(), vec!["c", "php"]);
    }
}
