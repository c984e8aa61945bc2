//! # mediagraph subtitle
//!
//! SSA/ASS helpers for mediagraph: a section splitter that reads script
//! headers, styles and dialogue lines, and a parser for the override-code
//! blocks embedded in dialogue text.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod codes;
pub mod split;

// Re-export main types
pub use codes::{
    filter_override_codes, parse_tag, plain_text, split_override_codes, try_split_override_codes,
    Components, Fade, OverrideHandler, OverrideTag,
};
pub use split::{Ass, AssSplit, Dialog, ScriptInfo, Style};
