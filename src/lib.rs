pub mod blueprint;
pub mod error;
pub mod html;
pub mod preprocess;
pub mod registry;
pub mod sections;
pub mod tree;
mod trie;
pub mod uri;

pub use blueprint::{Blueprint, Lookup};
pub use error::{MergeError, ParseError, ParseOptions, SectionError, Warning};
