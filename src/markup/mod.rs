//! Markup handling: namespace normalization, the owned element tree, and the
//! path selectors the reader is configured with.
//!
//! ```text
//! raw TEI ──▶ normalize ──▶ Element tree ──▶ Selector::select ──▶ &Element…
//! ```

pub mod normalize;
pub mod selector;
pub mod tree;

pub use normalize::normalize;
pub use selector::Selector;
pub use tree::{Element, Node};
