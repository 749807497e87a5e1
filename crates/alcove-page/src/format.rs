//! Template format detection.

use std::path::Path;

/// Format of a page template, derived from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFormat {
    /// `.html`, rendered through the template engine
    Html,
    /// `.jinja`, `.njk`, `.j2`, rendered through the template engine
    Jinja,
    /// `.md`, rendered through the template engine and then as markdown
    Markdown,
}

impl TemplateFormat {
    /// Parse a format from a bare extension or format name.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "html" | "htm" => Some(Self::Html),
            "jinja" | "njk" | "j2" => Some(Self::Jinja),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detect the format of a file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether the rendered body still has to go through markdown.
    pub fn is_markdown(&self) -> bool {
        matches!(self, Self::Markdown)
    }
}
