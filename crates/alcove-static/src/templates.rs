//! Template engine for rendering pages and layouts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use alcove_cms::records::dates;
use alcove_page::{extract_frontmatter, render_markdown, slugify, Frontmatter, FrontmatterError};
use chrono::{DateTime, Utc};
use minijinja::value::ValueKind;
use minijinja::{Environment, Error, ErrorKind, Value};
use serde::Serialize;

/// Extensions tried for a layout named without one.
const LAYOUT_EXTENSIONS: &[&str] = &["html", "njk", "jinja"];

/// Errors rendering templates.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Failed to render {name}: {source:#}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("Layout not found: {0}")]
    LayoutNotFound(String),

    #[error("Failed to read layout {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid frontmatter in layout {name}: {source}")]
    Frontmatter {
        name: String,
        #[source]
        source: FrontmatterError,
    },
}

/// A layout template and its own frontmatter.
#[derive(Debug, Clone)]
pub struct Layout {
    /// File name relative to the layouts directory
    pub name: String,
    pub frontmatter: Frontmatter,
    pub body: String,
}

/// Template engine using minijinja.
pub struct TemplateEngine {
    env: Environment<'static>,
    layouts_dir: PathBuf,
}

impl TemplateEngine {
    /// Create an engine that resolves `{% include %}` and `{% extends %}`
    /// against the includes directory first, then the layouts directory.
    pub fn new(includes_dir: &Path, layouts_dir: &Path) -> Self {
        let mut env = Environment::new();

        let mut search = vec![includes_dir.to_path_buf()];
        if layouts_dir != includes_dir {
            search.push(layouts_dir.to_path_buf());
        }
        env.set_loader(move |name| load_template(&search, name));

        env.add_filter("date", date_filter);
        env.add_filter("markdown", markdown_filter);
        env.add_filter("slugify", slugify_filter);

        Self {
            env,
            layouts_dir: layouts_dir.to_path_buf(),
        }
    }

    /// Render template source. `name` selects auto-escaping by extension
    /// and appears in error messages.
    pub fn render_str<S: Serialize>(
        &self,
        name: &str,
        source: &str,
        ctx: S,
    ) -> Result<String, TemplateError> {
        self.env
            .render_named_str(name, source, ctx)
            .map_err(|source| TemplateError::Render {
                name: name.to_string(),
                source,
            })
    }

    /// Load a layout by name from the layouts directory.
    pub fn load_layout(&self, name: &str) -> Result<Layout, TemplateError> {
        let path = self
            .find_layout(name)
            .ok_or_else(|| TemplateError::LayoutNotFound(name.to_string()))?;

        let source = fs::read_to_string(&path).map_err(|source| TemplateError::Read {
            path: path.clone(),
            source,
        })?;
        let (frontmatter, body) =
            extract_frontmatter(&source).map_err(|source| TemplateError::Frontmatter {
                name: name.to_string(),
                source,
            })?;

        let name = path
            .strip_prefix(&self.layouts_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();

        Ok(Layout {
            name,
            frontmatter: frontmatter.unwrap_or_default(),
            body: body.to_string(),
        })
    }

    /// Render a loaded layout.
    pub fn render_layout<S: Serialize>(&self, layout: &Layout, ctx: S) -> Result<String, TemplateError> {
        self.render_str(&layout.name, &layout.body, ctx)
    }

    fn find_layout(&self, name: &str) -> Option<PathBuf> {
        if !is_safe_name(name) {
            return None;
        }

        let exact = self.layouts_dir.join(name);
        if exact.is_file() {
            return Some(exact);
        }
        if Path::new(name).extension().is_some() {
            return None;
        }

        LAYOUT_EXTENSIONS
            .iter()
            .map(|ext| self.layouts_dir.join(format!("{}.{}", name, ext)))
            .find(|p| p.is_file())
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && !name.split(['/', '\\']).any(|part| part == "..")
}

/// Loader for included templates; frontmatter is stripped.
fn load_template(search: &[PathBuf], name: &str) -> Result<Option<String>, Error> {
    if !is_safe_name(name) {
        return Ok(None);
    }

    for dir in search {
        let path = dir.join(name);
        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(Error::new(
                    ErrorKind::InvalidOperation,
                    format!("could not read template {}", path.display()),
                )
                .with_source(e))
            }
        };

        let (_, body) = extract_frontmatter(&source).map_err(|e| {
            Error::new(
                ErrorKind::SyntaxError,
                format!("invalid frontmatter in {}", path.display()),
            )
            .with_source(e)
        })?;
        return Ok(Some(body.to_string()));
    }

    Ok(None)
}

/// `date(value, format)`: `YYYY-MM-DD`, `MMMM D, YYYY`, or en-US `M/D/YYYY`.
fn date_filter(value: Value, format: Option<String>) -> Result<String, Error> {
    let Some(date) = coerce_date(&value)? else {
        return Ok(String::new());
    };

    let pattern = match format.as_deref() {
        Some("YYYY-MM-DD") => "%Y-%m-%d",
        Some("MMMM D, YYYY") => "%B %-d, %Y",
        _ => "%-m/%-d/%Y",
    };
    Ok(date.format(pattern).to_string())
}

fn coerce_date(value: &Value) -> Result<Option<DateTime<Utc>>, Error> {
    match value.kind() {
        ValueKind::Undefined | ValueKind::None => Ok(None),
        ValueKind::String => {
            let text = value.as_str().unwrap_or_default().trim();
            if text.is_empty() {
                return Ok(None);
            }
            dates::parse(text).map(Some).ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("date filter: cannot parse {:?}", text),
                )
            })
        }
        ValueKind::Number => {
            let millis = i64::try_from(value.clone()).map_err(|_| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    "date filter: timestamp must be an integer of milliseconds",
                )
            })?;
            DateTime::from_timestamp_millis(millis).map(Some).ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("date filter: timestamp {} out of range", millis),
                )
            })
        }
        ValueKind::Bool if !value.is_true() => Ok(None),
        _ => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("date filter: unsupported value {}", value),
        )),
    }
}

/// `markdown(value)`: rendered HTML, marked safe.
fn markdown_filter(value: Value) -> Value {
    match value.as_str() {
        Some(text) if !text.trim().is_empty() => Value::from_safe_string(render_markdown(text)),
        _ => Value::from(""),
    }
}

fn slugify_filter(value: String) -> String {
    slugify(&value)
}
