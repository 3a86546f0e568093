//! Token classes for syntax highlighting
//!
//! This module defines the semantic classes the scanner assigns to
//! lexical spans and the token type that carries them.

/// Semantic token classes
///
/// The fixed variants are the classes the scanner produces on its own.
/// Keyword sections and sigil prefixes in a rule file introduce their own
/// class names, which are carried by `Named`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenClass {
    /// Unclassified text (unknown words, host markup outside script regions)
    Plain,
    /// Spaces, with tabs already expanded
    Whitespace,
    /// Comment running to end of line
    LineComment,
    /// One line's worth of a block comment
    BlockComment,
    /// One line's worth of a quoted literal
    Quote,
    /// Numeric literal
    Numeric,
    /// Single delimiter character
    Delimiter,
    /// Sequence entering an embedded script region
    ScriptBegin,
    /// Sequence leaving an embedded script region
    ScriptEnd,
    /// Keyword or sigil class declared by the rule file
    Named(String),
}

impl TokenClass {
    /// Class name used for color and decoration lookup
    pub fn name(&self) -> &str {
        match self {
            TokenClass::Plain => "plain",
            TokenClass::Whitespace => "whitespace",
            TokenClass::LineComment => "linecomment",
            TokenClass::BlockComment => "blockcomment",
            TokenClass::Quote => "quote",
            TokenClass::Numeric => "numeric",
            TokenClass::Delimiter => "delimiter",
            TokenClass::ScriptBegin => "script_begin",
            TokenClass::ScriptEnd => "script_end",
            TokenClass::Named(name) => name,
        }
    }

    /// Parse a class from its name (as written in a rule file)
    pub fn from_name(name: &str) -> Self {
        match name {
            "plain" => TokenClass::Plain,
            "whitespace" => TokenClass::Whitespace,
            "linecomment" => TokenClass::LineComment,
            "blockcomment" => TokenClass::BlockComment,
            "quote" => TokenClass::Quote,
            "numeric" => TokenClass::Numeric,
            "delimiter" => TokenClass::Delimiter,
            "script_begin" => TokenClass::ScriptBegin,
            "script_end" => TokenClass::ScriptEnd,
            other => TokenClass::Named(other.to_string()),
        }
    }

    /// Rule-file classes fall back to the keyword colors when uncolored
    pub fn is_named(&self) -> bool {
        matches!(self, TokenClass::Named(_))
    }

    /// Classes that never receive color or decoration
    pub fn is_unstyled(&self) -> bool {
        matches!(self, TokenClass::Plain | TokenClass::Whitespace)
    }
}

/// A classified span of source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub class: TokenClass,
    /// Raw (unescaped) text of the span, never containing a newline
    pub text: String,
    /// First token of its line
    pub line_start: bool,
}

impl Token {
    pub fn new(class: TokenClass, text: impl Into<String>) -> Self {
        Self {
            class,
            text: text.into(),
            line_start: false,
        }
    }
}
