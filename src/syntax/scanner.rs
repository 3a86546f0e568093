//! Rule-driven source scanner
//!
//! Walks source text once with a single cursor and splits it into
//! classified tokens grouped by line. At every cursor position the first
//! matching rule wins, in this order: whitespace, line comment, block
//! comment, quoted literal, sigil-prefixed word, delimiter, word.
//!
//! For languages embedded in markup the scanner starts outside the code
//! region and only applies the rules between `script_begin` and
//! `script_end`. Scanning never fails; unmatched text is plain.

use std::mem;

use super::compiler::clamp_tab_width;
use super::rules::RuleSet;
use super::tokens::{Token, TokenClass};

/// Per-call overrides of rule set preferences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSettings {
    /// Force html-embedded scanning on or off
    pub embedded: Option<bool>,
    /// Spaces per tab
    pub tab_width: Option<usize>,
}

/// Output of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    /// Tokens of each line, newlines themselves are not tokens
    pub lines: Vec<Vec<Token>>,
    /// Length of the scanned source in bytes
    pub byte_count: usize,
}

impl Scan {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// All tokens in source order
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.lines.iter().flatten()
    }
}

/// Length of the run of `escape` characters at the end of `text`
///
/// A quote preceded by an odd run is escaped; an even run (including
/// zero) escapes only itself.
pub fn escape_run(text: &str, escape: char) -> usize {
    text.chars().rev().take_while(|&c| c == escape).count()
}

/// Whether a word is a numeric literal
///
/// Decimal digits with at most one `.`, or `0x` followed by hex digits.
pub fn is_numeric(word: &str) -> bool {
    if let Some(hex) = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    let mut digits = 0;
    let mut dots = 0;
    for c in word.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Scan `source` with the rule set's own preferences
pub fn scan(rules: &RuleSet, source: &str) -> Scan {
    Scanner::new(rules).scan(source)
}

/// Single-use scanner state
pub struct Scanner<'r> {
    rules: &'r RuleSet,
    embedded: bool,
    tab_width: usize,
    lines: Vec<Vec<Token>>,
    line: Vec<Token>,
}

impl<'r> Scanner<'r> {
    pub fn new(rules: &'r RuleSet) -> Self {
        Self::with_settings(rules, ScanSettings::default())
    }

    pub fn with_settings(rules: &'r RuleSet, settings: ScanSettings) -> Self {
        let prefs = &rules.preferences;
        Self {
            rules,
            embedded: settings.embedded.unwrap_or(prefs.html_embedded),
            tab_width: clamp_tab_width(settings.tab_width.unwrap_or(prefs.indentation)),
            lines: Vec::new(),
            line: Vec::new(),
        }
    }

    /// Consume the scanner and tokenize `source`
    pub fn scan(mut self, source: &str) -> Scan {
        let rules = self.rules;
        let prefs = &rules.preferences;
        let mut active = !self.embedded;
        let mut pos = 0;

        while pos < source.len() {
            let rest = &source[pos..];

            if self.embedded {
                let (boundary, class) = if active {
                    (prefs.script_end.as_str(), TokenClass::ScriptEnd)
                } else {
                    (prefs.script_begin.as_str(), TokenClass::ScriptBegin)
                };
                if !boundary.is_empty() && rest.starts_with(boundary) {
                    self.push(class, boundary);
                    active = !active;
                    pos += boundary.len();
                    continue;
                }
            }

            let Some(c) = rest.chars().next() else {
                break;
            };

            pos = if is_space(c) {
                self.whitespace(source, pos)
            } else if active {
                self.code(source, pos, c)
            } else {
                self.host_text(source, pos)
            };
        }

        if !self.line.is_empty() {
            self.new_line();
        }

        Scan {
            lines: self.lines,
            byte_count: source.len(),
        }
    }

    fn push(&mut self, class: TokenClass, text: &str) {
        let mut token = Token::new(class, text);
        token.line_start = self.line.is_empty();
        self.line.push(token);
    }

    /// Push a span that may contain newlines, one token per line
    fn push_lines(&mut self, class: TokenClass, text: &str) {
        for (idx, segment) in text.split('\n').enumerate() {
            if idx > 0 {
                self.new_line();
            }
            let segment = segment.trim_end_matches('\r');
            if !segment.is_empty() {
                self.push(class.clone(), segment);
            }
        }
    }

    fn new_line(&mut self) {
        self.lines.push(mem::take(&mut self.line));
    }

    /// Whether an embedded-mode `script_end` starts at `pos`
    fn at_script_end(&self, source: &str, pos: usize) -> bool {
        let end = &self.rules.preferences.script_end;
        self.embedded && !end.is_empty() && source[pos..].starts_with(end.as_str())
    }

    /// Spaces, tabs and newlines; returns the position after the run
    fn whitespace(&mut self, source: &str, start: usize) -> usize {
        let mut spaces = String::new();
        let mut end = start;

        for c in source[start..].chars() {
            match c {
                ' ' => spaces.push(' '),
                '\t' => spaces.extend(std::iter::repeat(' ').take(self.tab_width)),
                '\r' => {}
                '\n' => {
                    if !spaces.is_empty() {
                        self.push(TokenClass::Whitespace, &mem::take(&mut spaces));
                    }
                    self.new_line();
                }
                _ => break,
            }
            end += c.len_utf8();
        }

        if !spaces.is_empty() {
            self.push(TokenClass::Whitespace, &spaces);
        }
        end
    }

    /// Host markup outside the code region, up to whitespace or `script_begin`
    fn host_text(&mut self, source: &str, start: usize) -> usize {
        let begin = self.rules.preferences.script_begin.as_str();
        let mut end = start;

        for (idx, c) in source[start..].char_indices() {
            let at = start + idx;
            if at > start && (is_space(c) || (!begin.is_empty() && source[at..].starts_with(begin)))
            {
                break;
            }
            end = at + c.len_utf8();
        }

        self.push(TokenClass::Plain, &source[start..end]);
        end
    }

    /// End of a word starting at `start`: the next whitespace, delimiter or script end
    fn word_end(&self, source: &str, start: usize) -> usize {
        source[start..]
            .char_indices()
            .find(|&(idx, c)| {
                is_space(c) || self.rules.is_delimiter(c) || self.at_script_end(source, start + idx)
            })
            .map_or(source.len(), |(idx, _)| start + idx)
    }

    /// Apply the code rules at `pos`, where `c` is not whitespace
    fn code(&mut self, source: &str, pos: usize, c: char) -> usize {
        let rules = self.rules;
        let rest = &source[pos..];

        if let Some(opener) = rules
            .line_comments
            .iter()
            .find(|opener| rest.starts_with(opener.as_str()))
        {
            return self.line_comment(source, pos, opener.len());
        }

        if let Some((on, off)) = rules.block_comments().find(|(on, _)| rest.starts_with(on)) {
            let search = pos + on.len();
            let end = source[search..]
                .find(off)
                .map_or(source.len(), |idx| search + idx + off.len());
            self.push_lines(TokenClass::BlockComment, &source[pos..end]);
            return end;
        }

        if rules.is_quote(c) && !self.is_escaped(source, pos) {
            return self.quote(source, pos, c);
        }

        if let Some(class) = rules.prefix_class(c) {
            let mut end = self.word_end(source, pos + c.len_utf8());
            self.push(TokenClass::from_name(class), &source[pos..end]);
            if let Some(stop) = source[end..].chars().next() {
                if rules.is_delimiter(stop) && !self.at_script_end(source, end) {
                    let stop_end = end + stop.len_utf8();
                    self.push(TokenClass::Delimiter, &source[end..stop_end]);
                    end = stop_end;
                }
            }
            return end;
        }

        if rules.is_delimiter(c) {
            let end = pos + c.len_utf8();
            self.push(TokenClass::Delimiter, &source[pos..end]);
            return end;
        }

        let end = self.word_end(source, pos + c.len_utf8());
        let word = &source[pos..end];
        let class = if is_numeric(word) {
            TokenClass::Numeric
        } else {
            rules
                .classify_word(word)
                .map_or(TokenClass::Plain, TokenClass::from_name)
        };
        self.push(class, word);
        end
    }

    /// Comment to end of line; in embedded mode `script_end` also ends it
    fn line_comment(&mut self, source: &str, pos: usize, opener_len: usize) -> usize {
        let mut end = source[pos..].find('\n').map_or(source.len(), |idx| pos + idx);

        if self.embedded {
            let script_end = self.rules.preferences.script_end.as_str();
            let body = pos + opener_len;
            if !script_end.is_empty() && body <= end {
                if let Some(idx) = source[body..end].find(script_end) {
                    end = body + idx;
                }
            }
        }

        self.push(
            TokenClass::LineComment,
            source[pos..end].trim_end_matches('\r'),
        );
        end
    }

    /// Whether the character at `pos` is escaped by the text before it
    fn is_escaped(&self, source: &str, pos: usize) -> bool {
        self.rules
            .preferences
            .escape
            .is_some_and(|escape| escape_run(&source[..pos], escape) % 2 == 1)
    }

    /// Quoted literal opened by `quote` at `pos`, up to the matching unescaped quote
    ///
    /// An unterminated literal runs to the end of the source, or in
    /// embedded mode to the next `script_end`.
    fn quote(&mut self, source: &str, pos: usize, quote: char) -> usize {
        let content = pos + quote.len_utf8();
        let escape = self.rules.preferences.escape;

        let closed = source[content..]
            .char_indices()
            .find(|&(idx, c)| {
                c == quote
                    && escape.map_or(true, |escape| {
                        escape_run(&source[content..content + idx], escape) % 2 == 0
                    })
            })
            .map(|(idx, c)| content + idx + c.len_utf8());

        let end = closed.unwrap_or_else(|| {
            let script_end = self.rules.preferences.script_end.as_str();
            if self.embedded && !script_end.is_empty() {
                source[content..]
                    .find(script_end)
                    .map_or(source.len(), |idx| content + idx)
            } else {
                source.len()
            }
        });

        self.push_lines(TokenClass::Quote, &source[pos..end]);
        end
    }
}
