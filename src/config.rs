//! Configuration file support
//!
//! Loads settings from ~/.rulelight.toml (or %USERPROFILE%\.rulelight.toml on Windows)
//!
//! Example:
//! ```toml
//! rules_dir = "/usr/share/rulelight/rules"
//! cache_dir = "/var/cache/rulelight"
//! fallback_language = "none"
//! tab_width = 4
//! line_prefix = "<li>"
//! line_suffix = "</li>"
//!
//! [aliases]
//! tpl = "php"
//!
//! [interpreters]
//! lua = "lua"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

use crate::error::{HighlightError, Result};
use crate::syntax::{clamp_tab_width, HighlightOptions, LineWrap, FALLBACK_LANGUAGE};

/// Configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `<language>.txt` rule files
    pub rules_dir: PathBuf,
    /// Directory for compiled rule artifacts
    pub cache_dir: Option<PathBuf>,
    /// Whether compiled rules are read from and written to `cache_dir`
    pub use_cache: bool,
    /// Language used when no rule file matches
    pub fallback_language: String,
    /// Spaces per tab; unset means the rule file's `indentation`
    pub tab_width: Option<usize>,
    pub line_prefix: String,
    pub line_suffix: String,
    /// Extension or name to canonical language id
    pub aliases: BTreeMap<String, String>,
    /// Shebang program to canonical language id
    pub interpreters: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let wrap = LineWrap::default();
        Self {
            rules_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("rules"),
            cache_dir: home_dir().map(|home| home.join(".cache").join("rulelight")),
            use_cache: true,
            fallback_language: FALLBACK_LANGUAGE.to_string(),
            tab_width: None,
            line_prefix: wrap.prefix,
            line_suffix: wrap.suffix,
            aliases: BTreeMap::new(),
            interpreters: BTreeMap::new(),
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }

    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".rulelight.toml"))
    }

    /// Load configuration from file
    ///
    /// A missing file gives the defaults; an invalid one is logged and
    /// also gives the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Parse config file contents
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).map_err(|e| HighlightError::Config(e.to_string()))?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.tab_width = self.tab_width.map(clamp_tab_width);
        if self.fallback_language.trim().is_empty() {
            self.fallback_language = FALLBACK_LANGUAGE.to_string();
        }
        self
    }

    /// Cache directory, if caching is enabled
    pub fn effective_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir.clone().filter(|_| self.use_cache)
    }

    pub fn line_wrap(&self) -> LineWrap {
        LineWrap::new(&self.line_prefix, &self.line_suffix)
    }

    /// Highlight options carrying this configuration's defaults
    pub fn highlight_options(&self) -> HighlightOptions {
        HighlightOptions {
            embedded_override: None,
            line_wrap: self.line_wrap(),
            tab_width: self.tab_width,
        }
    }
}
