//! Highlighting front end
//!
//! The Highlighter ties language resolution, rule compilation, scanning and
//! rendering together behind a single `highlight` call.

use tracing::{debug, warn};

use super::compiler::{Compiled, RuleCompiler};
use super::render::{render, render_plain, HighlightResult, LineWrap};
use super::resolver::LanguageResolver;
use super::scanner::{ScanSettings, Scanner};
use crate::config::Config;
use crate::error::Result;

/// Per-call highlighting options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightOptions {
    /// Force html-embedded scanning on or off regardless of the rule file
    pub embedded_override: Option<bool>,
    pub line_wrap: LineWrap,
    /// Spaces per tab, overriding the rule file's `indentation`
    pub tab_width: Option<usize>,
}

impl HighlightOptions {
    fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            embedded: self.embedded_override,
            tab_width: self.tab_width,
        }
    }
}

/// Main highlighting entry point
pub struct Highlighter {
    compiler: RuleCompiler,
    resolver: LanguageResolver,
}

impl Highlighter {
    /// Create a highlighter with the built-in language aliases
    pub fn new(compiler: RuleCompiler) -> Self {
        Self {
            compiler,
            resolver: LanguageResolver::new(),
        }
    }

    /// Create a highlighter from configuration settings
    pub fn from_config(config: &Config) -> Self {
        let compiler = RuleCompiler::new(&config.rules_dir)
            .with_cache_dir(config.effective_cache_dir())
            .with_fallback(&config.fallback_language);

        let mut highlighter = Self::new(compiler);
        for (alias, id) in &config.aliases {
            highlighter.register_language_alias(alias, id);
        }
        for (program, id) in &config.interpreters {
            highlighter.resolver.register_interpreter(program, id);
        }
        highlighter
    }

    pub fn compiler(&self) -> &RuleCompiler {
        &self.compiler
    }

    pub fn compiler_mut(&mut self) -> &mut RuleCompiler {
        &mut self.compiler
    }

    pub fn resolver(&self) -> &LanguageResolver {
        &self.resolver
    }

    /// Map a file extension or interpreter name to a canonical language id
    pub fn register_language_alias(&mut self, alias: &str, canonical_id: &str) {
        self.resolver.register_language_alias(alias, canonical_id);
    }

    /// Canonical language id for a language name or file path
    pub fn resolve_language(&self, language_id_or_path: &str, source: &str) -> String {
        self.resolver.resolve(language_id_or_path, source)
    }

    /// Compiled rules for a language name or file path
    pub fn rules_for(&mut self, language_id_or_path: &str, source: &str) -> Result<Compiled> {
        let language = self.resolve_language(language_id_or_path, source);
        self.compiler.compile(&language)
    }

    /// Highlight `source` as the language named by `language_id_or_path`
    ///
    /// Fails only when neither the language's rule file nor the fallback
    /// exists (or cannot be read). A failed cache write is reported in
    /// `HighlightResult::warnings`.
    pub fn highlight(
        &mut self,
        language_id_or_path: &str,
        source: &str,
        options: &HighlightOptions,
    ) -> Result<HighlightResult> {
        let compiled = self.rules_for(language_id_or_path, source)?;
        debug!(
            language = %compiled.rules.language_id,
            origin = ?compiled.origin,
            bytes = source.len(),
            "highlighting"
        );

        let scan = Scanner::with_settings(&compiled.rules, options.scan_settings()).scan(source);
        let mut result = render(&scan, &compiled.rules, &options.line_wrap);
        if let Some(err) = compiled.cache_error {
            result.warnings.push(err.to_string());
        }
        Ok(result)
    }

    /// Like `highlight`, but falls back to unhighlighted output when no
    /// rules can be loaded
    pub fn highlight_or_plain(
        &mut self,
        language_id_or_path: &str,
        source: &str,
        options: &HighlightOptions,
    ) -> HighlightResult {
        match self.highlight(language_id_or_path, source, options) {
            Ok(result) => result,
            Err(e) => {
                warn!("{}; rendering without highlighting", e);
                let language = self.resolve_language(language_id_or_path, source);
                let mut result = render_plain(&language, source, &options.line_wrap);
                result.warnings.push(e.to_string());
                result
            }
        }
    }

    /// List available languages
    pub fn list_languages(&self) -> Vec<String> {
        self.compiler.available_languages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::compiler::Origin;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::{tempdir, TempDir};

    const PHP_RULES: &str = "\
#name=PHP
#html_embedded=true
#script_begin=<?
#script_end=?>
#escape=\\
#linecomment=//
#quotation=\"
#prefix_variable=$
#DELIMITER=();
#KEYWORD=reserved_words
echo
";

    fn setup() -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let rules_dir = dir.path().join("rules");
        fs::create_dir(&rules_dir).unwrap();
        fs::write(rules_dir.join("php.txt"), PHP_RULES).unwrap();
        fs::write(rules_dir.join("none.txt"), "#name=Text\n").unwrap();
        (dir, rules_dir)
    }

    fn highlighter(rules_dir: &Path, cache_dir: &Path) -> Highlighter {
        Highlighter::new(RuleCompiler::new(rules_dir).with_cache_dir(Some(cache_dir.to_path_buf())))
    }

    #[test]
    fn test_highlight_embedded_php() {
        let (dir, rules_dir) = setup();
        let mut hl = highlighter(&rules_dir, &dir.path().join("cache"));

        let result = hl
            .highlight("index.php", "<b><?echo $x;?></b>", &HighlightOptions::default())
            .unwrap();

        assert_eq!(result.language_display_name, "PHP");
        assert_eq!(result.line_count, 1);
        assert!(result.rendered.starts_with("<li>&lt;b&gt;"));
        assert!(result.rendered.contains("<span style=\"color: #0000bb\">echo</span>"));
        assert!(result.rendered.contains("$x"));
        assert!(result.rendered.ends_with("&lt;/b&gt;</li>"));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_embedded_override() {
        let (dir, rules_dir) = setup();
        let mut hl = highlighter(&rules_dir, &dir.path().join("cache"));
        let options = HighlightOptions {
            embedded_override: Some(false),
            ..HighlightOptions::default()
        };

        let result = hl.highlight("php", "echo 1", &options).unwrap();
        assert!(result.rendered.contains("<span style=\"color: #0000bb\">echo</span>"));

        let result = hl.highlight("php", "echo 1", &HighlightOptions::default()).unwrap();
        assert!(!result.rendered.contains("<span"));
    }

    #[test]
    fn test_second_call_hits_cache() {
        let (dir, rules_dir) = setup();
        let cache_dir = dir.path().join("cache");

        let mut hl = highlighter(&rules_dir, &cache_dir);
        assert_eq!(hl.rules_for("php", "").unwrap().origin, Origin::Parsed);
        assert_eq!(hl.rules_for("php", "").unwrap().origin, Origin::Memory);
        assert!(cache_dir.join("php.json").is_file());

        let mut fresh = highlighter(&rules_dir, &cache_dir);
        assert_eq!(fresh.rules_for("php", "").unwrap().origin, Origin::DiskCache);
    }

    #[test]
    fn test_unknown_language_uses_fallback() {
        let (dir, rules_dir) = setup();
        let mut hl = highlighter(&rules_dir, &dir.path().join("cache"));

        let result = hl
            .highlight("notes.xyz", "a < b", &HighlightOptions::default())
            .unwrap();
        assert_eq!(result.language_display_name, "Text");
        assert_eq!(result.rendered, "<li>a&nbsp;&lt;&nbsp;b</li>");
    }

    #[test]
    fn test_missing_rules_fall_back_to_plain() {
        let dir = tempdir().unwrap();
        let mut hl = Highlighter::new(RuleCompiler::new(dir.path()));
        let options = HighlightOptions {
            line_wrap: LineWrap::new("", "\n"),
            ..HighlightOptions::default()
        };

        let err = hl.highlight("main.rs", "fn main", &options).unwrap_err();
        assert!(err.is_missing_rules());

        let result = hl.highlight_or_plain("main.rs", "fn main", &options);
        assert_eq!(result.rendered, "fn&nbsp;main\n");
        assert_eq!(result.language_display_name, "rust");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_cache_write_failure_is_a_warning() {
        let (dir, rules_dir) = setup();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let mut hl = highlighter(&rules_dir, &blocker.join("cache"));

        let result = hl.highlight("php", "<?echo?>", &HighlightOptions::default()).unwrap();
        assert_eq!(result.line_count, 1);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_aliases_from_config() {
        let (dir, rules_dir) = setup();
        let config = Config {
            rules_dir,
            cache_dir: Some(dir.path().join("cache")),
            use_cache: false,
            aliases: [("tpl".to_string(), "php".to_string())].into_iter().collect(),
            ..Config::default()
        };

        let mut hl = Highlighter::from_config(&config);
        assert!(hl.compiler().cache_dir().is_none());
        assert_eq!(hl.resolve_language("page.tpl", ""), "php");

        hl.register_language_alias("view", "php");
        let result = hl.highlight("home.view", "<?echo?>", &HighlightOptions::default()).unwrap();
        assert_eq!(result.language_display_name, "PHP");
        assert_eq!(hl.list_languages(), vec!["none".to_string(), "php".to_string()]);
    }

    #[test]
    fn test_bundled_rules_compile() {
        let rules_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("rules");
        let mut hl = Highlighter::new(RuleCompiler::new(&rules_dir));

        let languages = hl.list_languages();
        assert!(languages.iter().any(|l| l == "none"));
        assert!(languages.iter().any(|l| l == "php"));

        for language in languages {
            let compiled = hl.rules_for(&language, "").unwrap();
            assert_eq!(compiled.rules.language_id, language);
        }
    }
}
