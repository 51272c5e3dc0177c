//! HTML beautifier and SVG sprite assembly.
//!
//! This crate provides the pure text-processing steps of the build pipeline:
//! reindenting rendered markup and combining icon files into a single symbol
//! sprite document.

pub mod beautify;
pub mod sprite;

pub use beautify::{beautify_html, BeautifyOptions};
pub use sprite::{build_sprite, SpriteError, SpriteIcon, SpriteOptions};
