//! Frontmatter extraction and parsing.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Parsed frontmatter from a page template.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Frontmatter {
    /// Page title
    #[serde(default)]
    pub title: Option<String>,

    /// Layout template to wrap this page in (looked up in the layouts directory)
    #[serde(default)]
    pub layout: Option<String>,

    /// Output URL override, or `false` to render nothing for this page
    #[serde(default)]
    pub permalink: Option<Permalink>,

    /// Free-form tags. A single string is one tag.
    #[serde(default, deserialize_with = "one_or_many")]
    pub tags: Vec<String>,

    /// Skip this file when building
    #[serde(default)]
    pub exclude: bool,

    /// Every other key, exposed to the template as-is
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Frontmatter {
    /// Whether the page produces an output file.
    pub fn writes_output(&self) -> bool {
        !self.exclude && self.permalink != Some(Permalink::Disabled)
    }

    /// The permalink template, when one is set.
    pub fn permalink_template(&self) -> Option<&str> {
        match &self.permalink {
            Some(Permalink::Url(url)) => Some(url),
            _ => None,
        }
    }
}

/// The `permalink` frontmatter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permalink {
    /// URL template for the output path
    Url(String),
    /// `permalink: false`
    Disabled,
}

impl Serialize for Permalink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Url(url) => serializer.serialize_str(url),
            Self::Disabled => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for Permalink {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Url(String),
            Flag(bool),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Url(url) => Ok(Self::Url(url)),
            Raw::Flag(false) => Ok(Self::Disabled),
            Raw::Flag(true) => Err(serde::de::Error::custom(
                "permalink must be a URL or false",
            )),
        }
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Tags>::deserialize(deserializer)? {
        Some(Tags::One(tag)) => vec![tag],
        Some(Tags::Many(tags)) => tags,
        None => Vec::new(),
    })
}

/// Split a page into its YAML frontmatter and body.
///
/// The block opens with a `---` line at the start of the page and closes at
/// the next line that is exactly `---`. The returned body starts after the
/// closing fence, with leading whitespace removed.
pub fn extract_frontmatter(source: &str) -> Result<(Option<Frontmatter>, &str), FrontmatterError> {
    let trimmed = source.trim_start();

    let Some(after_open) = strip_fence(trimmed) else {
        return Ok((None, source));
    };

    let mut offset = 0;
    let mut close = None;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            close = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let Some((yaml_end, body_start)) = close else {
        return Err(FrontmatterError::Unclosed);
    };

    let yaml = after_open[..yaml_end].trim();
    let frontmatter = if yaml.is_empty() {
        Frontmatter::default()
    } else {
        serde_yaml::from_str(yaml).map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?
    };

    Ok((Some(frontmatter), after_open[body_start..].trim_start()))
}

const FENCE: &str = "---";

/// Text after an opening fence line, if `text` starts with one.
fn strip_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(FENCE)?;
    match rest.find('\n') {
        Some(pos) if rest[..pos].trim().is_empty() => Some(&rest[pos + 1..]),
        None if rest.trim().is_empty() => Some(""),
        _ => None,
    }
}

/// Errors that can occur when parsing frontmatter.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Unclosed frontmatter block - missing closing ---")]
    Unclosed,

    #[error("Invalid YAML in frontmatter: {0}")]
    InvalidYaml(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_valid_frontmatter() {
        let source = r#"---
title: Stream Recaps
layout: base.html
permalink: /streams/
tags: [streams, video]
---

<h1>{{ title }}</h1>
"#;

        let (fm, content) = extract_frontmatter(source).unwrap();
        let fm = fm.unwrap();

        assert_eq!(fm.title.as_deref(), Some("Stream Recaps"));
        assert_eq!(fm.layout.as_deref(), Some("base.html"));
        assert_eq!(fm.permalink_template(), Some("/streams/"));
        assert_eq!(fm.tags, vec!["streams".to_string(), "video".to_string()]);
        assert!(!fm.exclude);
        assert!(content.starts_with("<h1>{{ title }}</h1>"));
    }

    #[test]
    fn keeps_unknown_keys_as_extra() {
        let source = "---\ntitle: Home\nhero:\n  heading: Hi\nfeatured_count: 3\n---\nbody";

        let (fm, _) = extract_frontmatter(source).unwrap();
        let fm = fm.unwrap();

        assert_eq!(fm.extra["featured_count"], serde_json::json!(3));
        assert_eq!(fm.extra["hero"], serde_json::json!({ "heading": "Hi" }));
    }

    #[test]
    fn empty_block_yields_default() {
        let (fm, content) = extract_frontmatter("---\n---\nbody").unwrap();

        assert_eq!(fm, Some(Frontmatter::default()));
        assert_eq!(content, "body");
    }

    #[test]
    fn handles_no_frontmatter() {
        let source = "# Just Markdown\n\nNo frontmatter here.";

        let (fm, content) = extract_frontmatter(source).unwrap();

        assert!(fm.is_none());
        assert_eq!(content, source);
    }

    #[test]
    fn errors_on_unclosed_frontmatter() {
        let source = "---\ntitle: Test\n# No closing";

        let result = extract_frontmatter(source);

        assert!(matches!(result, Err(FrontmatterError::Unclosed)));
    }

    #[test]
    fn closes_at_first_fence_line() {
        let source = "---\ntitle: Rules\n---  \n<hr>\n---\nmore";

        let (fm, content) = extract_frontmatter(source).unwrap();

        assert_eq!(fm.unwrap().title.as_deref(), Some("Rules"));
        assert_eq!(content, "<hr>\n---\nmore");
    }

    #[test]
    fn horizontal_rule_is_not_frontmatter() {
        let source = "-----\n\ntext";

        let (fm, content) = extract_frontmatter(source).unwrap();

        assert!(fm.is_none());
        assert_eq!(content, source);
    }

    #[test]
    fn single_tag_string() {
        let (fm, _) = extract_frontmatter("---\ntags: post\n---\nbody").unwrap();

        assert_eq!(fm.unwrap().tags, vec!["post".to_string()]);
    }

    #[test]
    fn permalink_false_skips_output() {
        let (fm, _) = extract_frontmatter("---\npermalink: false\n---\nbody").unwrap();
        let fm = fm.unwrap();

        assert_eq!(fm.permalink, Some(Permalink::Disabled));
        assert_eq!(fm.permalink_template(), None);
        assert!(!fm.writes_output());
        assert_eq!(serde_json::to_value(&fm).unwrap()["permalink"], serde_json::json!(false));
    }

    #[test]
    fn permalink_true_is_rejected() {
        let result = extract_frontmatter("---\npermalink: true\n---\nbody");

        assert!(matches!(result, Err(FrontmatterError::InvalidYaml(_))));
    }

    #[test]
    fn errors_on_invalid_yaml() {
        let source = "---\ntitle: [invalid yaml\n---\n";

        let result = extract_frontmatter(source);

        assert!(matches!(result, Err(FrontmatterError::InvalidYaml(_))));
    }
}
