//! Page template parser and markdown rendering.

use pulldown_cmark::{html, Options, Parser};

use crate::frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError};

/// A page template split into frontmatter and body.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// Parsed frontmatter (if present)
    pub frontmatter: Option<Frontmatter>,

    /// Template body (without frontmatter)
    pub body: String,
}

impl ParsedPage {
    /// Frontmatter, or the empty default when the page had none.
    pub fn frontmatter_or_default(&self) -> Frontmatter {
        self.frontmatter.clone().unwrap_or_default()
    }
}

/// Errors that can occur when parsing a page.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] FrontmatterError),
}

/// Parse a page template.
pub fn parse_page(source: &str) -> Result<ParsedPage, ParseError> {
    let (frontmatter, body) = extract_frontmatter(source)?;

    Ok(ParsedPage {
        frontmatter,
        body: body.to_string(),
    })
}

/// Render markdown to HTML.
pub fn render_markdown(content: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let parser = Parser::new_ext(content, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    html_output
}

/// Convert text to a URL-safe slug.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
