//! HTML rendering of scanned tokens
//!
//! Each token is escaped, decorated with its class's `style_open` /
//! `style_close` strings, then wrapped in a color span. Each line is
//! wrapped in a caller-supplied prefix and suffix.

use super::rules::RuleSet;
use super::scanner::{self, Scan};
use super::tokens::{Token, TokenClass};

/// Rendered stand-in for an empty line, so the line wrapper keeps its height
pub const EMPTY_LINE: &str = "&nbsp;";

/// Markup placed around every rendered line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineWrap {
    pub prefix: String,
    pub suffix: String,
}

impl LineWrap {
    pub fn new(prefix: &str, suffix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }
}

impl Default for LineWrap {
    fn default() -> Self {
        Self::new("<li>", "</li>")
    }
}

/// Rendered output plus counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightResult {
    pub rendered: String,
    pub line_count: usize,
    /// Length of the source before escaping
    pub byte_count: usize,
    pub language_display_name: String,
    /// Recoverable problems met while preparing the rules
    pub warnings: Vec<String>,
}

/// Append `text` to `out` with markup characters escaped
pub fn escape_markup(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn render_token(token: &Token, rules: &RuleSet, out: &mut String) {
    if token.class == TokenClass::Whitespace {
        for _ in token.text.chars() {
            out.push_str("&nbsp;");
        }
        return;
    }

    let mut escaped = String::with_capacity(token.text.len());
    escape_markup(&token.text, &mut escaped);
    rules.style_for(&token.class).write(&escaped, out);
}

/// Render a scan with the colors and decorations of `rules`
pub fn render(scan: &Scan, rules: &RuleSet, wrap: &LineWrap) -> HighlightResult {
    let mut rendered = String::with_capacity(scan.byte_count * 2);

    for line in &scan.lines {
        rendered.push_str(&wrap.prefix);
        if line.is_empty() {
            rendered.push_str(EMPTY_LINE);
        }
        for token in line {
            render_token(token, rules, &mut rendered);
        }
        rendered.push_str(&wrap.suffix);
    }

    HighlightResult {
        rendered,
        line_count: scan.line_count(),
        byte_count: scan.byte_count,
        language_display_name: rules.display_name().to_string(),
        warnings: Vec::new(),
    }
}

/// Render source with no highlighting at all, only escaping and line wrapping
pub fn render_plain(language_id: &str, source: &str, wrap: &LineWrap) -> HighlightResult {
    let rules = RuleSet::plain(language_id);
    render(&scanner::scan(&rules, source), &rules, wrap)
}
