//! Asset pipelines and task graph for the lacquer theme builder.
//!
//! Turns a declarative [`Config`] into named build tasks over seven asset
//! classes (templates, styles, vendor files, vector icons, images, scripts,
//! fonts), composed as `clean` followed by a concurrent build of all classes.

pub mod config;
pub mod copy;
pub mod pipeline;
pub mod sass;
pub mod svg;
pub mod tasks;
pub mod twig;

pub use config::{Config, ConfigError, ServerOptions};
pub use pipeline::{write_assets, Asset, Pipeline, PipeError};
pub use tasks::{AssetClass, BuildSummary, TaskError, TaskName, TaskSet, UnknownTask};
