//! Static site generator for alcove sites.
//!
//! Renders a tree of HTML, Jinja and Markdown templates with layouts, global
//! data and CMS content into a static output directory.

pub mod assets;
pub mod builder;
pub mod config;
pub mod data;
pub mod templates;

pub use assets::Passthrough;
pub use builder::{content_resolver, BuildError, BuildResult, StaticBuilder};
pub use config::{CmsSettings, CollectionPages, ConfigError, SiteConfig, SitePaths};
pub use data::{DataError, GlobalData};
pub use templates::{Layout, TemplateEngine, TemplateError};
