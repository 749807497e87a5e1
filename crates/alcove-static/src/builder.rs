//! Static site builder.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use alcove_cms::{ClientError, ContentResolver, ContentStatus, DirectusSource, FixtureSource};
use alcove_page::{parse_page, render_markdown, Frontmatter, TemplateFormat};
use minijinja::Value;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::assets::Passthrough;
use crate::config::{CmsSettings, CollectionPages, SiteConfig, SitePaths};
use crate::data::{DataError, GlobalData};
use crate::templates::TemplateEngine;

/// Layouts may wrap layouts, up to this depth.
const MAX_LAYOUT_DEPTH: usize = 10;

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages written
    pub pages: usize,

    /// Number of files copied verbatim
    pub passthrough: usize,

    /// How the CMS content was obtained
    pub status: ContentStatus,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read input: {0}")]
    ReadError(String),

    #[error("Failed to parse {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Failed to render {path}: {message}")]
    TemplateError { path: String, message: String },

    #[error("Layout chain of {path} is deeper than {max} levels")]
    LayoutDepth { path: String, max: usize },

    #[error("{first} and {second} both write {path}")]
    DuplicateOutput {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Failed to write output: {0}")]
    WriteError(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Invalid CMS settings: {0}")]
    Cms(#[from] ClientError),
}

/// A page template discovered in the input directory.
#[derive(Debug)]
struct PageInfo {
    /// Relative path from the input dir
    relative_path: PathBuf,

    format: TemplateFormat,

    frontmatter: Frontmatter,

    body: String,
}

/// A rendered page ready to be written.
#[derive(Debug)]
struct RenderedPage {
    /// Where the page came from, for error messages
    origin: String,

    /// Relative path under the output dir
    output_path: PathBuf,

    html: String,
}

/// Build the content resolver described by the `[cms]` settings.
pub fn content_resolver(
    settings: &CmsSettings,
    root: &Path,
    force_offline: bool,
) -> Result<ContentResolver, BuildError> {
    let fixtures = match &settings.sample_dir {
        Some(dir) => FixtureSource::from_dir(&root.join(dir)),
        None => FixtureSource::bundled(),
    };

    if force_offline || settings.offline {
        return Ok(ContentResolver::offline(fixtures));
    }

    let config = settings.to_cms_config(|key| std::env::var(key).ok());
    tracing::debug!(?config, "CMS settings");
    let source = DirectusSource::new(config)?;
    Ok(ContentResolver::new(source, fixtures).with_cache(settings.cache))
}

/// Static site builder.
pub struct StaticBuilder {
    config: SiteConfig,
    paths: SitePaths,
    resolver: ContentResolver,
}

impl StaticBuilder {
    /// Create a builder for the project at `root`.
    pub fn new(config: SiteConfig, root: &Path, resolver: ContentResolver) -> Self {
        let paths = config.paths(root);
        Self {
            config,
            paths,
            resolver,
        }
    }

    /// Write to `dir` instead of the configured output directory.
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.paths.output = dir;
        self
    }

    pub fn paths(&self) -> &SitePaths {
        &self.paths
    }

    /// Build the static site.
    pub async fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        if !self.paths.input.is_dir() {
            return Err(BuildError::ReadError(format!(
                "Input directory not found: {}",
                self.paths.input.display()
            )));
        }

        let data = GlobalData::load(&self.paths.data, &self.resolver, &self.config.site).await?;
        let globals = data.to_context();
        let engine = TemplateEngine::new(&self.paths.includes, &self.paths.layouts);

        let pages = self.discover_pages()?;
        tracing::debug!("Discovered {} templates", pages.len());

        // Render pages in parallel
        let mut rendered: Vec<RenderedPage> = pages
            .par_iter()
            .map(|page| self.render_page(page, &engine, &globals))
            .collect::<Result<_, _>>()?;

        for pages_config in &self.config.collection_pages {
            rendered.extend(self.render_collection(pages_config, &data, &engine, &globals)?);
        }

        check_unique_outputs(&rendered)?;

        fs::create_dir_all(&self.paths.output)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;
        for page in &rendered {
            let target = self.paths.output.join(&page.output_path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(e.to_string()))?;
            }
            fs::write(&target, &page.html)
                .map_err(|e| BuildError::WriteError(format!("{}: {}", target.display(), e)))?;
        }

        let passthrough = self
            .passthrough()
            .copy_all()
            .map_err(|e| BuildError::WriteError(format!("passthrough copy: {}", e)))?;

        let duration = start.elapsed();

        Ok(BuildResult {
            pages: rendered.len(),
            passthrough,
            status: data.status().unwrap_or(ContentStatus::Unavailable),
            duration_ms: duration.as_millis() as u64,
            output_dir: self.paths.output.clone(),
        })
    }

    fn passthrough(&self) -> Passthrough {
        Passthrough::new(&self.paths.input, &self.paths.output, &self.config.passthrough)
    }

    /// Find every template under the input directory.
    fn discover_pages(&self) -> Result<Vec<PageInfo>, BuildError> {
        let passthrough = self.passthrough();
        let skipped_dirs = [
            &self.paths.includes,
            &self.paths.layouts,
            &self.paths.data,
            &self.paths.output,
        ];
        let mut pages = Vec::new();

        for entry in WalkDir::new(&self.paths.input)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !skipped_dirs.iter().any(|d| e.path().starts_with(d)))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }

            let relative_path = path.strip_prefix(&self.paths.input).unwrap_or(path);
            let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

            if filename.starts_with('.')
                || self.config.templates.ignores.iter().any(|i| i == filename)
                || passthrough.covers(relative_path)
            {
                continue;
            }

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !self.config.templates.formats.iter().any(|f| f == ext) {
                continue;
            }
            let Some(format) = TemplateFormat::from_path(path) else {
                tracing::warn!("Unsupported template format: {}", path.display());
                continue;
            };

            let content = fs::read_to_string(path)
                .map_err(|e| BuildError::ReadError(format!("{}: {}", path.display(), e)))?;
            let parsed = parse_page(&content).map_err(|e| BuildError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

            let frontmatter = parsed.frontmatter_or_default();
            if !frontmatter.writes_output() {
                tracing::debug!("Excluded {}", relative_path.display());
                continue;
            }

            pages.push(PageInfo {
                relative_path: relative_path.to_path_buf(),
                format,
                frontmatter,
                body: parsed.body,
            });
        }

        Ok(pages)
    }

    /// Render one page through its template, markdown and layout chain.
    fn render_page(
        &self,
        page: &PageInfo,
        engine: &TemplateEngine,
        globals: &BTreeMap<String, Value>,
    ) -> Result<RenderedPage, BuildError> {
        let origin = page.relative_path.display().to_string();
        let template_error = |e: crate::templates::TemplateError| BuildError::TemplateError {
            path: origin.clone(),
            message: e.to_string(),
        };

        let mut ctx = globals.clone();
        merge_frontmatter(&mut ctx, &page.frontmatter);

        let output_path = match page.frontmatter.permalink_template() {
            Some(permalink) => {
                let url = engine
                    .render_str("permalink", permalink, &ctx)
                    .map_err(template_error)?;
                permalink_to_path(url.trim()).ok_or_else(|| BuildError::TemplateError {
                    path: origin.clone(),
                    message: format!("invalid permalink {:?}", url),
                })?
            }
            None => default_output_path(&page.relative_path),
        };
        ctx.insert("page".to_string(), page_value(&origin, &output_path));

        let mut html = engine
            .render_str(&origin, &page.body, &ctx)
            .map_err(template_error)?;
        if page.format.is_markdown() {
            html = render_markdown(&html);
        }

        let html = self.apply_layouts(
            page.frontmatter.layout.clone(),
            html,
            &mut ctx,
            engine,
            &origin,
        )?;

        Ok(RenderedPage {
            origin,
            output_path,
            html,
        })
    }

    /// Wrap `html` in `layout` and every layout that layout names in turn.
    fn apply_layouts(
        &self,
        mut layout: Option<String>,
        mut html: String,
        ctx: &mut BTreeMap<String, Value>,
        engine: &TemplateEngine,
        origin: &str,
    ) -> Result<String, BuildError> {
        let mut depth = 0;

        while let Some(name) = layout {
            if depth >= MAX_LAYOUT_DEPTH {
                return Err(BuildError::LayoutDepth {
                    path: origin.to_string(),
                    max: MAX_LAYOUT_DEPTH,
                });
            }

            let loaded = engine
                .load_layout(&name)
                .map_err(|e| BuildError::TemplateError {
                    path: origin.to_string(),
                    message: e.to_string(),
                })?;

            // Page data wins over layout data
            for (key, value) in frontmatter_entries(&loaded.frontmatter) {
                ctx.entry(key).or_insert(value);
            }
            ctx.insert("content".to_string(), Value::from_safe_string(html));

            html = engine
                .render_layout(&loaded, &*ctx)
                .map_err(|e| BuildError::TemplateError {
                    path: origin.to_string(),
                    message: e.to_string(),
                })?;

            layout = loaded.frontmatter.layout;
            depth += 1;
        }

        Ok(html)
    }

    /// One page per record of a global data collection.
    fn render_collection(
        &self,
        pages: &CollectionPages,
        data: &GlobalData,
        engine: &TemplateEngine,
        globals: &BTreeMap<String, Value>,
    ) -> Result<Vec<RenderedPage>, BuildError> {
        let Some(records) = data.get(&pages.collection).and_then(|v| v.as_array()) else {
            tracing::warn!("No collection {} for generated pages", pages.collection);
            return Ok(Vec::new());
        };

        records
            .par_iter()
            .filter_map(|record| {
                let slug = record.get("slug").and_then(|s| s.as_str())?;
                (!slug.is_empty()).then_some((record, slug))
            })
            .map(|(record, slug)| {
                let origin = format!("{}/{}", pages.collection, slug);
                let url = pages.permalink.replace("{slug}", slug);
                let output_path =
                    permalink_to_path(&url).ok_or_else(|| BuildError::TemplateError {
                        path: origin.clone(),
                        message: format!("invalid permalink {:?}", url),
                    })?;

                let mut ctx = globals.clone();
                ctx.insert(pages.alias.clone(), Value::from_serialize(record));
                if let Some(title) = record.get("title") {
                    ctx.insert("title".to_string(), Value::from_serialize(title));
                }
                ctx.insert("page".to_string(), page_value(&origin, &output_path));

                let html = self.apply_layouts(
                    Some(pages.layout.clone()),
                    String::new(),
                    &mut ctx,
                    engine,
                    &origin,
                )?;

                Ok(RenderedPage {
                    origin,
                    output_path,
                    html,
                })
            })
            .collect()
    }
}

fn check_unique_outputs(pages: &[RenderedPage]) -> Result<(), BuildError> {
    let mut seen: HashMap<&Path, &str> = HashMap::new();
    for page in pages {
        if let Some(first) = seen.insert(page.output_path.as_path(), page.origin.as_str()) {
            return Err(BuildError::DuplicateOutput {
                path: page.output_path.clone(),
                first: first.to_string(),
                second: page.origin.clone(),
            });
        }
    }
    Ok(())
}

fn frontmatter_entries(frontmatter: &Frontmatter) -> Vec<(String, Value)> {
    let Ok(serde_json::Value::Object(map)) = serde_json::to_value(frontmatter) else {
        return Vec::new();
    };
    map.into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, Value::from_serialize(&v)))
        .collect()
}

fn merge_frontmatter(ctx: &mut BTreeMap<String, Value>, frontmatter: &Frontmatter) {
    ctx.extend(frontmatter_entries(frontmatter));
}

fn page_value(input: &str, output_path: &Path) -> Value {
    minijinja::context! {
        url => path_to_url(output_path),
        input_path => input,
        output_path => output_path.to_string_lossy(),
    }
}

/// `index.*` maps to `index.html` in the same directory, any other name to
/// `name/index.html`.
fn default_output_path(relative: &Path) -> PathBuf {
    let stem = relative
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("index");
    let parent = relative.parent().unwrap_or(Path::new(""));

    if stem == "index" {
        parent.join("index.html")
    } else {
        parent.join(stem).join("index.html")
    }
}

/// Output path for a permalink URL. A URL ending in `/` (or without an
/// extension) gets an `index.html`. Returns `None` for URLs escaping the
/// output directory.
fn permalink_to_path(url: &str) -> Option<PathBuf> {
    let trimmed = url.trim_start_matches('/');
    let path = Path::new(trimmed);

    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    if trimmed.is_empty() || trimmed.ends_with('/') || path.extension().is_none() {
        Some(path.join("index.html"))
    } else {
        Some(path.to_path_buf())
    }
}

/// Site-relative URL for an output path.
fn path_to_url(path: &Path) -> String {
    let url = path.to_string_lossy().replace('\\', "/");
    match url.strip_suffix("index.html") {
        Some(dir) => format!("/{}", dir),
        None => format!("/{}", url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alcove_cms::FixtureSource;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn builder(root: &Path, config: SiteConfig) -> StaticBuilder {
        StaticBuilder::new(config, root, ContentResolver::offline(FixtureSource::bundled()))
    }

    fn no_collection_pages() -> SiteConfig {
        SiteConfig {
            collection_pages: vec![],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn builds_simple_site() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/index.html", "---\ntitle: Home\n---\n<h1>{{ title }}</h1>");
        write(temp.path(), "src/about.md", "# About {{ site.title }}");

        let result = builder(temp.path(), no_collection_pages()).build().await.unwrap();

        assert_eq!(result.pages, 2);
        assert_eq!(result.status, ContentStatus::Unavailable);
        let out = temp.path().join("_site");
        assert_eq!(fs::read_to_string(out.join("index.html")).unwrap(), "<h1>Home</h1>");
        assert!(fs::read_to_string(out.join("about/index.html"))
            .unwrap()
            .contains("<h1>About AlternaDevStudio</h1>"));
    }

    #[tokio::test]
    async fn applies_layout_chain() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "src/_includes/base.html",
            "<html><title>{{ title }}</title>{{ content }}</html>",
        );
        write(
            temp.path(),
            "src/_includes/post.html",
            "---\nlayout: base.html\n---\n<article>{{ content }}</article>",
        );
        write(temp.path(), "src/blog/first.md", "---\ntitle: First\nlayout: post\n---\n*hi*");

        builder(temp.path(), no_collection_pages()).build().await.unwrap();

        let html = fs::read_to_string(temp.path().join("_site/blog/first/index.html")).unwrap();
        assert!(html.starts_with("<html><title>First</title><article><p><em>hi</em></p>"));
        assert!(html.ends_with("</article></html>"));
    }

    #[tokio::test]
    async fn layout_cycle_is_an_error() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/_includes/a.html", "---\nlayout: a.html\n---\n{{ content }}");
        write(temp.path(), "src/index.html", "---\nlayout: a.html\n---\nx");

        let result = builder(temp.path(), no_collection_pages()).build().await;

        assert!(matches!(result, Err(BuildError::LayoutDepth { .. })));
    }

    #[tokio::test]
    async fn renders_permalinks_as_templates() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "src/feed.njk",
            "---\npermalink: \"/{{ 'feed' }}.xml\"\n---\n<feed>{{ page.url }}</feed>",
        );

        builder(temp.path(), no_collection_pages()).build().await.unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("_site/feed.xml")).unwrap(),
            "<feed>/feed.xml</feed>"
        );
    }

    #[tokio::test]
    async fn skips_ignored_excluded_and_special_dirs() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/README.md", "# readme");
        write(temp.path(), "src/draft.html", "---\nexclude: true\n---\ndraft");
        write(temp.path(), "src/_includes/partial.html", "partial");
        write(temp.path(), "src/_data/site_meta.json", "{}");
        write(temp.path(), "src/notes.txt", "plain");
        write(temp.path(), "src/index.html", "home");

        let result = builder(temp.path(), no_collection_pages()).build().await.unwrap();

        assert_eq!(result.pages, 1);
        let out = temp.path().join("_site");
        assert!(!out.join("README/index.html").exists());
        assert!(!out.join("draft/index.html").exists());
        assert!(!out.join("partial/index.html").exists());
    }

    #[tokio::test]
    async fn permalink_false_writes_nothing() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/index.html", "home");
        write(temp.path(), "src/fragment.html", "---\npermalink: false\ntags: partial\n---\nbits");

        let result = builder(temp.path(), no_collection_pages()).build().await.unwrap();

        assert_eq!(result.pages, 1);
        assert!(!temp.path().join("_site/fragment/index.html").exists());
    }

    #[tokio::test]
    async fn duplicate_outputs_are_an_error() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/about.html", "one");
        write(temp.path(), "src/about/index.html", "two");

        let result = builder(temp.path(), no_collection_pages()).build().await;

        assert!(matches!(result, Err(BuildError::DuplicateOutput { .. })));
    }

    #[tokio::test]
    async fn exposes_cms_data_to_templates() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "src/index.html",
            "{{ directus.directus_status }}|{% for p in projects %}{{ p.title }}:{{ p.date_completed | date('YYYY-MM-DD') }};{% endfor %}",
        );

        builder(temp.path(), no_collection_pages()).build().await.unwrap();

        let html = fs::read_to_string(temp.path().join("_site/index.html")).unwrap();
        assert!(html.starts_with("unavailable|"));
        assert!(html.contains(":2025-04-10;"));
    }

    #[tokio::test]
    async fn generates_stream_recap_pages() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "src/_includes/stream_recap.html",
            "<h1>{{ recap.title }}</h1>{{ recap.summary | markdown }}",
        );
        write(temp.path(), "src/index.html", "home");

        let result = builder(temp.path(), SiteConfig::default()).build().await.unwrap();

        assert_eq!(result.pages, 3);
        let html = fs::read_to_string(
            temp.path()
                .join("_site/streams/building-headless-cms-directus/index.html"),
        )
        .unwrap();
        assert!(html.starts_with("<h1>"));
        assert!(temp
            .path()
            .join("_site/streams/advanced-static-site-techniques/index.html")
            .exists());
    }

    #[tokio::test]
    async fn copies_passthrough_paths() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/index.html", "home");
        write(temp.path(), "src/assets/site.css", "body {}");
        write(temp.path(), "src/assets/raw.html", "{{ not rendered }}");

        let config = SiteConfig {
            passthrough: vec!["assets".to_string()],
            ..no_collection_pages()
        };
        let result = builder(temp.path(), config).build().await.unwrap();

        assert_eq!(result.pages, 1);
        assert_eq!(result.passthrough, 2);
        assert_eq!(
            fs::read_to_string(temp.path().join("_site/assets/raw.html")).unwrap(),
            "{{ not rendered }}"
        );
    }

    #[tokio::test]
    async fn missing_input_dir_is_an_error() {
        let temp = tempdir().unwrap();

        let result = builder(temp.path(), no_collection_pages()).build().await;

        assert!(matches!(result, Err(BuildError::ReadError(_))));
    }

    #[test]
    fn output_paths() {
        assert_eq!(default_output_path(Path::new("index.html")), PathBuf::from("index.html"));
        assert_eq!(
            default_output_path(Path::new("blog/index.md")),
            PathBuf::from("blog/index.html")
        );
        assert_eq!(
            default_output_path(Path::new("about.njk")),
            PathBuf::from("about/index.html")
        );
    }

    #[test]
    fn permalink_paths() {
        assert_eq!(permalink_to_path("/"), Some(PathBuf::from("index.html")));
        assert_eq!(
            permalink_to_path("/streams/x/"),
            Some(PathBuf::from("streams/x/index.html"))
        );
        assert_eq!(permalink_to_path("/feed.xml"), Some(PathBuf::from("feed.xml")));
        assert_eq!(permalink_to_path("/../etc/passwd"), None);
    }

    #[test]
    fn urls_from_paths() {
        assert_eq!(path_to_url(Path::new("index.html")), "/");
        assert_eq!(path_to_url(Path::new("about/index.html")), "/about/");
        assert_eq!(path_to_url(Path::new("feed.xml")), "/feed.xml");
    }
}
