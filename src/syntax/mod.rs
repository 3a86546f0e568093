//! Rule-driven syntax highlighting
//!
//! This module provides:
//! - Rule files compiled into rule sets, cached in memory and on disk
//! - A single-pass scanner producing classified tokens per line
//! - HTML rendering with per-class colors and decorations
//! - Language resolution from names, extensions and shebang lines

mod cache;
mod compiler;
mod manager;
mod render;
mod resolver;
mod rules;
mod scanner;
mod style;
mod tokens;

pub use cache::{RuleCache, CACHE_VERSION};
pub use compiler::{
    clamp_tab_width, parse_rules, Compiled, Origin, RuleCompiler, FALLBACK_LANGUAGE,
};
pub use manager::{HighlightOptions, Highlighter};
pub use render::{escape_markup, render, render_plain, HighlightResult, LineWrap};
pub use resolver::{interpreter_of, LanguageResolver};
pub use rules::{Preferences, RuleSet};
pub use scanner::{scan, Scan, ScanSettings, Scanner};
pub use style::Style;
pub use tokens::{Token, TokenClass};
