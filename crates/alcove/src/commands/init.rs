//! Scaffold a new site in the current directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Files written by `init`, relative to the project root.
const SCAFFOLD: &[(&str, &str)] = &[
    ("site.toml", DEFAULT_CONFIG),
    (".env.example", DEFAULT_ENV),
    ("src/_includes/base.html", DEFAULT_BASE_LAYOUT),
    ("src/_includes/stream_recap.html", DEFAULT_RECAP_LAYOUT),
    ("src/index.html", DEFAULT_INDEX),
    ("src/assets/site.css", DEFAULT_CSS),
];

/// Run the init command.
pub async fn run(yes: bool) -> Result<()> {
    tracing::info!("Initializing alcove site...");

    let written = scaffold(Path::new("."), yes)?;

    if written == 0 {
        tracing::warn!("Site files already exist. Use --yes to overwrite.");
        return Ok(());
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'alcove dev' to start the development server.");

    Ok(())
}

/// Write the scaffold under `root`. Existing files are kept unless
/// `overwrite` is set. Returns the number of files written.
fn scaffold(root: &Path, overwrite: bool) -> Result<usize> {
    let mut written = 0;

    for (relative, content) in SCAFFOLD {
        let path = root.join(relative);
        if path.exists() && !overwrite {
            tracing::debug!("Keeping existing {}", relative);
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", relative))?;
        tracing::info!("Created {}", relative);
        written += 1;
    }

    Ok(written)
}

const DEFAULT_CONFIG: &str = r#"passthrough = ["assets"]

[site]
title = "My Site"
base_url = "/"

[dirs]
input = "src"
output = "_site"

[[collection_pages]]
collection = "stream_pages"
layout = "stream_recap.html"
permalink = "/streams/{slug}/"
alias = "recap"

[cms]
# Connection details come from DIRECTUS_URL, DIRECTUS_EMAIL and
# DIRECTUS_PASSWORD (or .env) and override anything set here.
published_only = true
timeout_secs = 10
"#;

const DEFAULT_ENV: &str = r#"DIRECTUS_URL=http://localhost:8055
DIRECTUS_EMAIL=admin@example.com
DIRECTUS_PASSWORD=change-me-please
"#;

const DEFAULT_BASE_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{% if title %}{{ title }} | {% endif %}{{ site.title }}</title>
  <link rel="stylesheet" href="/assets/site.css">
</head>
<body>
  {% if directus.directus_status != "connected" %}
  <p class="notice">Showing sample content ({{ directus.directus_status }}).</p>
  {% endif %}
  <main>
    {{ content }}
  </main>
</body>
</html>
"#;

const DEFAULT_RECAP_LAYOUT: &str = r#"---
layout: base.html
---
<article>
  <h1>{{ recap.title }}</h1>
  <time>{{ recap.stream_date | date("MMMM D, YYYY") }}</time>
  {{ recap.summary | markdown }}
  {% if recap.resources %}
  <h2>Resources</h2>
  <ul>
    {% for resource in recap.resources %}
    <li><a href="{{ resource.url }}">{{ resource.title }}</a></li>
    {% endfor %}
  </ul>
  {% endif %}
</article>
"#;

const DEFAULT_INDEX: &str = r#"---
title: Home
layout: base.html
---
<h1>{{ site.title }}</h1>

<h2>Blog</h2>
<ul>
  {% for post in blog_posts %}
  <li>{{ post.title }} <time>{{ post.date_published | date("YYYY-MM-DD") }}</time></li>
  {% endfor %}
</ul>

<h2>Projects</h2>
<ul>
  {% for project in projects %}
  <li>{{ project.title }}</li>
  {% endfor %}
</ul>

<h2>Streams</h2>
<ul>
  {% for recap in stream_recaps %}
  <li><a href="/streams/{{ recap.slug }}/">{{ recap.title }}</a></li>
  {% endfor %}
</ul>
"#;

const DEFAULT_CSS: &str = r#"body {
  font-family: system-ui, sans-serif;
  max-width: 48rem;
  margin: 0 auto;
  padding: 1rem;
}

.notice {
  background: #fff3cd;
  padding: 0.5rem 1rem;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use alcove_static::SiteConfig;
    use tempfile::tempdir;

    #[test]
    fn writes_every_file() {
        let temp = tempdir().unwrap();

        let written = scaffold(temp.path(), false).unwrap();

        assert_eq!(written, SCAFFOLD.len());
        assert!(temp.path().join("src/_includes/base.html").exists());
        assert!(temp.path().join("src/assets/site.css").exists());
    }

    #[test]
    fn keeps_existing_files_without_overwrite() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("site.toml"), "# mine").unwrap();

        let written = scaffold(temp.path(), false).unwrap();

        assert_eq!(written, SCAFFOLD.len() - 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("site.toml")).unwrap(),
            "# mine"
        );
    }

    #[test]
    fn overwrites_when_asked() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("site.toml"), "# mine").unwrap();

        scaffold(temp.path(), true).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("site.toml")).unwrap(),
            DEFAULT_CONFIG
        );
    }

    #[test]
    fn default_config_parses() {
        let config = SiteConfig::parse(DEFAULT_CONFIG).unwrap();

        assert_eq!(config.passthrough, vec!["assets".to_string()]);
        assert_eq!(config.collection_pages[0].alias, "recap");
    }
}
