//! Bundled sample records used when the CMS cannot be used.

use std::fs;
use std::path::Path;

use async_trait::async_trait;

use crate::records::{BlogPost, Collection, Project, StreamRecap};
use crate::source::{ContentSource, SourceError};

const BLOG_POSTS_JSON: &str = include_str!("../fixtures/blog_posts.json");
const PROJECTS_JSON: &str = include_str!("../fixtures/projects.json");
const STREAM_RECAPS_JSON: &str = include_str!("../fixtures/stream_recaps.json");

/// Sample records, in fixture order.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureSource {
    pub blog_posts: Vec<BlogPost>,
    pub projects: Vec<Project>,
    pub stream_recaps: Vec<StreamRecap>,
}

impl FixtureSource {
    /// The sample records compiled into this crate.
    pub fn bundled() -> Self {
        Self {
            blog_posts: parse_fixture("blog_posts.json", BLOG_POSTS_JSON),
            projects: parse_fixture("projects.json", PROJECTS_JSON),
            stream_recaps: parse_fixture("stream_recaps.json", STREAM_RECAPS_JSON),
        }
    }

    /// Sample records read from a directory.
    ///
    /// Each collection reads `<dir>/<data key>.json`. A missing file falls back
    /// to the bundled sample; a file that cannot be read or parsed yields no
    /// records for that collection.
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            blog_posts: load_fixture(dir, BLOG_POSTS_JSON),
            projects: load_fixture(dir, PROJECTS_JSON),
            stream_recaps: load_fixture(dir, STREAM_RECAPS_JSON),
        }
    }

    /// Build a source from explicit records.
    pub fn from_records(
        blog_posts: Vec<BlogPost>,
        projects: Vec<Project>,
        stream_recaps: Vec<StreamRecap>,
    ) -> Self {
        Self {
            blog_posts,
            projects,
            stream_recaps,
        }
    }
}

impl Default for FixtureSource {
    fn default() -> Self {
        Self::bundled()
    }
}

fn load_fixture<C: Collection>(dir: &Path, bundled: &str) -> Vec<C> {
    let filename = format!("{}.json", C::DATA_KEY);
    let path = dir.join(&filename);

    if !path.exists() {
        tracing::debug!("No {} in {}, using bundled sample", filename, dir.display());
        return parse_fixture(&filename, bundled);
    }

    match fs::read_to_string(&path) {
        Ok(content) => parse_fixture(&path.display().to_string(), &content),
        Err(e) => {
            tracing::error!("Error loading sample data from {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn parse_fixture<C: Collection>(name: &str, content: &str) -> Vec<C> {
    match serde_json::from_str(content) {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Error parsing sample data from {}: {}", name, e);
            Vec::new()
        }
    }
}

#[async_trait]
impl ContentSource for FixtureSource {
    fn name(&self) -> &'static str {
        "fixtures"
    }

    async fn blog_posts(&self) -> Result<Vec<BlogPost>, SourceError> {
        Ok(self.blog_posts.clone())
    }

    async fn projects(&self) -> Result<Vec<Project>, SourceError> {
        Ok(self.projects.clone())
    }

    async fn stream_recaps(&self) -> Result<Vec<StreamRecap>, SourceError> {
        Ok(self.stream_recaps.clone())
    }
}
