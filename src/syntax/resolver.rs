//! Language resolution
//!
//! Maps whatever the caller has (a language name, a file name, a path to
//! a script without an extension) to the canonical language id that names
//! a rule file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::compiler::FALLBACK_LANGUAGE;

/// Built-in extension and name aliases
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("php3", "php"),
    ("php4", "php"),
    ("php5", "php"),
    ("phtml", "php"),
    ("inc", "php"),
    ("h", "c"),
    ("cc", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("c++", "cpp"),
    ("rs", "rust"),
    ("py", "python"),
    ("pyw", "python"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("pl", "perl"),
    ("pm", "perl"),
    ("rb", "ruby"),
    ("js", "javascript"),
    ("mjs", "javascript"),
    ("htm", "html"),
    ("xhtml", "html"),
];

/// Built-in interpreter (shebang program) mapping
const DEFAULT_INTERPRETERS: &[(&str, &str)] = &[
    ("php", "php"),
    ("python", "python"),
    ("perl", "perl"),
    ("ruby", "ruby"),
    ("node", "javascript"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("dash", "shell"),
    ("ksh", "shell"),
];

fn shebang_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#!\s*(\S+)(.*)$").expect("shebang pattern is valid"))
}

/// Interpreter named by a shebang line, without directory or version
///
/// `#!/usr/bin/env -S python3.11 -u` yields `python`.
pub fn interpreter_of(source: &str) -> Option<String> {
    let first = source.lines().next()?;
    let caps = shebang_pattern().captures(first)?;

    let program = caps[1].rsplit('/').next().unwrap_or(&caps[1]);
    let program = if program == "env" {
        caps[2]
            .split_whitespace()
            .find(|arg| !arg.starts_with('-') && !arg.contains('='))?
    } else {
        program
    };

    let name = program.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

/// Maps names, extensions and interpreters to canonical language ids
pub struct LanguageResolver {
    aliases: HashMap<String, String>,
    interpreters: HashMap<String, String>,
}

impl LanguageResolver {
    /// Create a resolver with the built-in aliases
    pub fn new() -> Self {
        let mut resolver = Self {
            aliases: HashMap::new(),
            interpreters: HashMap::new(),
        };
        for (alias, id) in DEFAULT_ALIASES {
            resolver.register_language_alias(alias, id);
        }
        for (program, id) in DEFAULT_INTERPRETERS {
            resolver.register_interpreter(program, id);
        }
        resolver
    }

    /// Map an extension or name to a canonical language id
    pub fn register_language_alias(&mut self, alias: &str, canonical_id: &str) {
        self.aliases
            .insert(alias.trim().to_lowercase(), canonical_id.trim().to_string());
    }

    /// Map a shebang program to a canonical language id
    pub fn register_interpreter(&mut self, program: &str, canonical_id: &str) {
        self.interpreters
            .insert(program.trim().to_lowercase(), canonical_id.trim().to_string());
    }

    /// Canonical id for an alias, if one is registered
    pub fn alias(&self, alias: &str) -> Option<&str> {
        self.aliases.get(&alias.to_lowercase()).map(String::as_str)
    }

    /// Resolve a language name or file path
    ///
    /// In order: a registered alias, the file extension (through the alias
    /// map), a bare language name, the shebang of `source`, and finally
    /// the fallback language.
    pub fn resolve(&self, name_or_path: &str, source: &str) -> String {
        let name_or_path = name_or_path.trim();
        let lower = name_or_path.to_lowercase();

        if let Some(id) = self.aliases.get(&lower) {
            return id.clone();
        }

        if let Some(ext) = Path::new(name_or_path).extension().and_then(|ext| ext.to_str()) {
            let ext = ext.to_lowercase();
            return self.aliases.get(&ext).cloned().unwrap_or(ext);
        }

        let is_path = lower.contains(|c: char| c == '/' || c == '\\');
        if !lower.is_empty() && !is_path {
            return lower;
        }

        interpreter_of(source)
            .and_then(|program| self.interpreters.get(&program).cloned())
            .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string())
    }
}

impl Default for LanguageResolver {
    fn default() -> Self {
        Self::new()
    }
}
