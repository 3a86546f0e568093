//! Style types for rendered output
//!
//! Colors are kept as `#rrggbb` strings exactly as the rule file wrote
//! them; this module supplies the built-in palette and the resolved
//! per-class style the renderer applies.

use std::collections::BTreeMap;

/// Built-in colors, overridable by `#COLOR_<class>=` directives
pub const DEFAULT_COLORS: &[(&str, &str)] = &[
    ("default", "#000000"),
    ("reserved_words", "#0000bb"),
    ("built_in_functions", "#007700"),
    ("linecomment", "#ff8000"),
    ("blockcomment", "#ff8000"),
    ("delimiter", "#007700"),
    ("quote", "#dd0000"),
    ("numeric", "#dd0000"),
];

/// Fresh copy of the built-in palette
pub fn default_colors() -> BTreeMap<String, String> {
    DEFAULT_COLORS
        .iter()
        .map(|(class, color)| (class.to_string(), color.to_string()))
        .collect()
}

/// Add the leading `#` to a hex color if the rule file left it out
pub fn normalize_color(value: &str) -> String {
    let value = value.trim();
    if value.starts_with('#') {
        value.to_string()
    } else {
        format!("#{}", value)
    }
}

/// Resolved style for one token class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style<'a> {
    /// Display color
    pub color: Option<&'a str>,
    /// Decoration emitted before the text
    pub open: Option<&'a str>,
    /// Decoration emitted after the text
    pub close: Option<&'a str>,
}

impl<'a> Style<'a> {
    /// Create a style with just a color
    pub fn color(color: &'a str) -> Self {
        Self {
            color: Some(color),
            ..Default::default()
        }
    }

    /// Builder: set the open/close decoration
    pub fn with_decoration(mut self, open: Option<&'a str>, close: Option<&'a str>) -> Self {
        self.open = open;
        self.close = close;
        self
    }

    /// Check if this is the default (no styling)
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Append already-escaped text to `out`, decorated then colored
    pub fn write(&self, escaped: &str, out: &mut String) {
        if let Some(color) = self.color {
            out.push_str("<span style=\"color: ");
            out.push_str(color);
            out.push_str("\">");
        }
        if let Some(open) = self.open {
            out.push_str(open);
        }
        out.push_str(escaped);
        if let Some(close) = self.close {
            out.push_str(close);
        }
        if self.color.is_some() {
            out.push_str("</span>");
        }
    }
}
