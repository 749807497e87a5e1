//! Typed collection records.
//!
//! Live CMS items and bundled sample fixtures deserialize through the same
//! types, so date fields are always real `DateTime<Utc>` values by the time
//! they reach a template.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// A record type stored in one CMS collection.
pub trait Collection: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name in the CMS
    const NAME: &'static str;

    /// Key under which the records are exposed to templates
    const DATA_KEY: &'static str;

    /// Field holding the record's recency date
    const DATE_FIELD: &'static str;

    /// Sort applied when fetching (`-` prefix for descending)
    const SORT: &'static [&'static str];

    /// Fields requested when fetching
    const FIELDS: &'static [&'static str];

    /// URL slug of the record (may be empty)
    fn slug(&self) -> &str;

    /// Display title of the record
    fn title(&self) -> &str;
}

/// Primary key of a CMS item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(id) => write!(f, "{}", id),
            ItemId::Text(id) => f.write_str(id),
        }
    }
}

/// A blog post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: ItemId,
    #[serde(default)]
    pub status: Option<String>,
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub slug: String,
    #[serde(default, deserialize_with = "dates::optional")]
    pub date_published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub seo_title: Option<String>,
    #[serde(default)]
    pub seo_description: Option<String>,
    #[serde(default, deserialize_with = "dates::optional")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "dates::optional")]
    pub date_updated: Option<DateTime<Utc>>,
}

impl Collection for BlogPost {
    const NAME: &'static str = "blog_posts";
    const DATA_KEY: &'static str = "blog_posts";
    const DATE_FIELD: &'static str = "date_published";
    const SORT: &'static [&'static str] = &["-date_published"];
    const FIELDS: &'static [&'static str] = &[
        "id",
        "status",
        "title",
        "slug",
        "date_published",
        "author",
        "featured_image",
        "content",
        "excerpt",
        "tags",
        "seo_title",
        "seo_description",
    ];

    fn slug(&self) -> &str {
        &self.slug
    }

    fn title(&self) -> &str {
        &self.title
    }
}

/// A portfolio project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ItemId,
    #[serde(default)]
    pub status: Option<String>,
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub slug: String,
    #[serde(default, deserialize_with = "dates::optional")]
    pub date_completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub live_url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub featured: bool,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub gallery_images: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "dates::optional")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "dates::optional")]
    pub date_updated: Option<DateTime<Utc>>,
}

impl Collection for Project {
    const NAME: &'static str = "projects";
    const DATA_KEY: &'static str = "projects";
    const DATE_FIELD: &'static str = "date_completed";
    const SORT: &'static [&'static str] = &["sort_order", "-date_completed"];
    const FIELDS: &'static [&'static str] = &[
        "id",
        "status",
        "title",
        "slug",
        "date_completed",
        "featured_image",
        "short_description",
        "description",
        "technologies",
        "github_url",
        "live_url",
        "featured",
        "sort_order",
        "gallery_images",
    ];

    fn slug(&self) -> &str {
        &self.slug
    }

    fn title(&self) -> &str {
        &self.title
    }
}

/// A link attached to a stream recap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A recap of a live stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecap {
    pub id: ItemId,
    #[serde(default)]
    pub status: Option<String>,
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub slug: String,
    #[serde(default, deserialize_with = "dates::optional")]
    pub stream_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub summary: String,
    #[serde(default, deserialize_with = "nullable")]
    pub topics_covered: Vec<String>,
    #[serde(default)]
    pub code_repository: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub featured: bool,
    #[serde(default, deserialize_with = "dates::optional")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "dates::optional")]
    pub date_updated: Option<DateTime<Utc>>,
}

impl Collection for StreamRecap {
    const NAME: &'static str = "stream_recap";
    const DATA_KEY: &'static str = "stream_recaps";
    const DATE_FIELD: &'static str = "stream_date";
    const SORT: &'static [&'static str] = &["-stream_date"];
    const FIELDS: &'static [&'static str] = &[
        "id",
        "status",
        "title",
        "slug",
        "stream_date",
        "thumbnail",
        "video_url",
        "summary",
        "topics_covered",
        "code_repository",
        "resources",
        "duration_minutes",
        "featured",
    ];

    fn slug(&self) -> &str {
        &self.slug
    }

    fn title(&self) -> &str {
        &self.title
    }
}

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Date parsing shared by every record type.
pub mod dates {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    /// Parse a CMS or fixture date.
    ///
    /// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (UTC) and `YYYY-MM-DD` (midnight UTC).
    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }

        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
                return Some(naive.and_utc());
            }
        }

        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    /// Deserialize an optional date, rejecting strings that do not parse.
    pub fn optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", s))),
        }
    }
}
