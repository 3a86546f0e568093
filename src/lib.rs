//! rulelight - rule-driven source highlighting to HTML
//!
//! Languages are described by plain-text rule files; see
//! [`syntax::parse_rules`] for the format.

pub mod config;
pub mod error;
pub mod syntax;

pub use config::Config;
pub use error::{HighlightError, Result};
pub use syntax::{HighlightOptions, HighlightResult, Highlighter, LineWrap};
