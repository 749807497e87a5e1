//! Sample content for a fresh CMS.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::client::{ClientError, DirectusClient};
use crate::records::{BlogPost, Collection, ItemId, Project, StreamRecap};

/// Ids of the items created by [`seed_sample_content`].
#[derive(Debug, Clone, PartialEq)]
pub struct SeedReport {
    pub blog_post: ItemId,
    pub project: ItemId,
    pub stream_recap: ItemId,
}

/// Create one published blog post, project and stream recap, dated now.
///
/// The client must be logged in.
pub async fn seed_sample_content(client: &DirectusClient) -> Result<SeedReport, ClientError> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    tracing::info!("Creating a sample blog post...");
    let blog_post = create::<BlogPost>(client, sample_blog_post(&now)).await?;

    tracing::info!("Creating a sample project...");
    let project = create::<Project>(client, sample_project(&now)).await?;

    tracing::info!("Creating a sample stream recap...");
    let stream_recap = create::<StreamRecap>(client, sample_stream_recap(&now)).await?;

    Ok(SeedReport {
        blog_post,
        project,
        stream_recap,
    })
}

async fn create<C: Collection>(client: &DirectusClient, item: Value) -> Result<ItemId, ClientError> {
    let stored = client.create_item(C::NAME, &item).await?;
    let id = stored
        .get("id")
        .cloned()
        .ok_or_else(|| ClientError::Decode(format!("created {} item has no id", C::NAME)))?;
    let id: ItemId =
        serde_json::from_value(id).map_err(|e| ClientError::Decode(e.to_string()))?;

    tracing::info!("{} item created with ID: {}", C::NAME, id);
    Ok(id)
}

fn sample_blog_post(now: &str) -> Value {
    json!({
        "status": "published",
        "title": "Getting Started with Directus and alcove",
        "slug": "getting-started-with-directus-and-alcove",
        "date_published": now,
        "author": "AlternaDevStudio",
        "content": "# Getting Started\n\nThis post was created through the API to show how \
                    CMS content flows into the static site.\n\n## Why a headless CMS?\n\n\
                    Editors work in the admin interface while the site stays a set of \
                    static files.\n",
        "excerpt": "Learn how the site pulls its content from a headless CMS.",
        "tags": ["directus", "static-site", "headless-cms"]
    })
}

fn sample_project(now: &str) -> Value {
    json!({
        "status": "published",
        "title": "AlternaDevStudio Website",
        "slug": "alternadevstudio-website",
        "date_completed": now,
        "description": "# AlternaDevStudio Website\n\nThe site you are reading, built from \
                        templates and CMS content.\n",
        "short_description": "The studio website, built with alcove and Directus.",
        "technologies": ["Rust", "Directus", "Docker"],
        "github_url": "https://github.com/alternadev/alternadevstudio.com",
        "live_url": "https://alternadevstudio.com",
        "featured": true,
        "sort_order": 1
    })
}

fn sample_stream_recap(now: &str) -> Value {
    json!({
        "status": "published",
        "title": "Building a Headless CMS with Directus",
        "slug": "building-headless-cms-directus",
        "stream_date": now,
        "video_url": "https://www.youtube.com/watch?v=example",
        "summary": "# Stream Recap\n\nWe set up Directus and wired it into the site build.\n",
        "topics_covered": ["Directus", "Docker", "Static sites"],
        "code_repository": "https://github.com/alternadev/alternadevstudio.com",
        "resources": [
            {
                "title": "Directus Documentation",
                "url": "https://docs.directus.io/",
                "description": "Official documentation"
            }
        ],
        "duration_minutes": 120,
        "featured": true
    })
}
