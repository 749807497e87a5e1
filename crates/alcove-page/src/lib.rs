//! Page source parsing for alcove.
//!
//! This crate splits page templates into YAML frontmatter and body, classifies
//! template files by format, and renders markdown to HTML.

pub mod format;
pub mod frontmatter;
pub mod parser;

pub use format::TemplateFormat;
pub use frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError, Permalink};
pub use parser::{parse_page, render_markdown, slugify, ParseError, ParsedPage};
