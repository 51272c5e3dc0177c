//! Task graph assembly.
//!
//! Wires the pipe builders into named tasks: one per asset class, a clean
//! task, and a build task that cleans first and then runs every class
//! concurrently. Watch and serve compose on top of these in the server
//! crate.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, ConfigError};
use crate::copy::{fonts_pipe, images_pipe, js_pipe, vendor_pipe};
use crate::pipeline::{write_assets, Asset, PipeError, Pipeline};
use crate::sass::sass_pipe;
use crate::svg::svg_pipe;
use crate::twig::twig_pipe;

/// One of the seven asset classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Twig,
    Sass,
    Vendor,
    Svg,
    Images,
    Js,
    Fonts,
}

impl AssetClass {
    /// Every asset class, in build order.
    pub const ALL: [AssetClass; 7] = [
        AssetClass::Twig,
        AssetClass::Sass,
        AssetClass::Vendor,
        AssetClass::Svg,
        AssetClass::Images,
        AssetClass::Js,
        AssetClass::Fonts,
    ];

    /// The task name of this class.
    pub fn name(self) -> &'static str {
        match self {
            AssetClass::Twig => "twig",
            AssetClass::Sass => "sass",
            AssetClass::Vendor => "vendor",
            AssetClass::Svg => "svg",
            AssetClass::Images => "images",
            AssetClass::Js => "js",
            AssetClass::Fonts => "fonts",
        }
    }

    /// Build this class's pipeline from the configuration.
    pub fn pipeline(self, config: &Config) -> Pipeline {
        match self {
            AssetClass::Twig => twig_pipe(config),
            AssetClass::Sass => sass_pipe(config),
            AssetClass::Vendor => vendor_pipe(config),
            AssetClass::Svg => svg_pipe(config),
            AssetClass::Images => images_pipe(config),
            AssetClass::Js => js_pipe(config),
            AssetClass::Fonts => fonts_pipe(config),
        }
    }

    /// The watch globs bound to this class.
    pub fn watch_globs(self, config: &Config) -> &[String] {
        match self {
            AssetClass::Twig => &config.twig.watch,
            AssetClass::Sass => &config.sass.watch,
            AssetClass::Vendor => &config.vendor.watch,
            AssetClass::Svg => &config.svg.watch,
            AssetClass::Images => &config.images.watch,
            AssetClass::Js => &config.js.watch,
            AssetClass::Fonts => &config.fonts.watch,
        }
    }
}

/// A named task exposed to the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskName {
    Class(AssetClass),
    Clean,
    Build,
    Watch,
    Serve,
    Default,
}

impl TaskName {
    /// Every exposed task name.
    pub const ALL: [&'static str; 12] = [
        "twig", "sass", "vendor", "svg", "images", "js", "fonts", "clean", "build", "watch",
        "serve", "default",
    ];
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskName::Class(class) => class.name(),
            TaskName::Clean => "clean",
            TaskName::Build => "build",
            TaskName::Watch => "watch",
            TaskName::Serve => "serve",
            TaskName::Default => "default",
        };
        f.write_str(name)
    }
}

/// Error for an unrecognized task name.
#[derive(Debug, thiserror::Error)]
#[error("Unknown task '{0}'; expected one of: twig, sass, vendor, svg, images, js, fonts, clean, build, watch, serve, default")]
pub struct UnknownTask(pub String);

impl FromStr for TaskName {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let task = match s {
            "twig" => TaskName::Class(AssetClass::Twig),
            "sass" => TaskName::Class(AssetClass::Sass),
            "vendor" => TaskName::Class(AssetClass::Vendor),
            "svg" => TaskName::Class(AssetClass::Svg),
            "images" => TaskName::Class(AssetClass::Images),
            "js" => TaskName::Class(AssetClass::Js),
            "fonts" => TaskName::Class(AssetClass::Fonts),
            "clean" => TaskName::Clean,
            "build" => TaskName::Build,
            "watch" => TaskName::Watch,
            "serve" => TaskName::Serve,
            "default" => TaskName::Default,
            other => return Err(UnknownTask(other.to_string())),
        };
        Ok(task)
    }
}

/// Errors surfaced by tasks.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{class}: {source}")]
    Pipe {
        class: &'static str,
        source: PipeError,
    },

    #[error("Failed to clean {path}: {message}")]
    Clean { path: PathBuf, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Task panicked: {0}")]
    Panicked(String),
}

/// Result of a full build.
#[derive(Debug)]
pub struct BuildSummary {
    /// Files produced per asset class, in [`AssetClass::ALL`] order.
    pub files: [usize; 7],

    /// Total build time in milliseconds.
    pub duration_ms: u64,
}

impl BuildSummary {
    /// Total files produced.
    pub fn total(&self) -> usize {
        self.files.iter().sum()
    }
}

/// The assembled task set over one configuration.
#[derive(Debug, Clone)]
pub struct TaskSet {
    config: Arc<Config>,
}

impl TaskSet {
    /// Assemble the task set, validating the configuration eagerly so a bad
    /// config fails before any task starts.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// The resolved configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one asset class: load, transform, and (outside pack mode) write
    /// under the dist directory. Returns the produced assets.
    pub async fn run_class(&self, class: AssetClass) -> Result<Vec<Asset>, TaskError> {
        let config = Arc::clone(&self.config);

        let assets = tokio::task::spawn_blocking(move || -> Result<Vec<Asset>, TaskError> {
            let pipeline = class.pipeline(&config);

            if !pipeline.has_sources() {
                tracing::debug!("{}: no sources configured, skipping", class.name());
                return Ok(Vec::new());
            }

            let assets = pipeline.run().map_err(|source| TaskError::Pipe {
                class: class.name(),
                source,
            })?;

            if !config.pack {
                write_assets(&assets, &config.dist_dir).map_err(|source| TaskError::Pipe {
                    class: class.name(),
                    source,
                })?;
            }

            Ok(assets)
        })
        .await
        .map_err(|e| TaskError::Panicked(e.to_string()))??;

        tracing::debug!("{}: {} files", class.name(), assets.len());

        Ok(assets)
    }

    /// Delete the destination directory tree.
    ///
    /// An already-absent directory is a no-op; anything else is fatal since
    /// nothing may safely proceed without a known-clean destination.
    pub async fn clean(&self) -> Result<(), TaskError> {
        let dist = self.config.dist_dir.clone();

        match tokio::fs::remove_dir_all(&dist).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TaskError::Clean {
                path: dist,
                message: e.to_string(),
            }),
        }
    }

    /// Clean, then run every asset class concurrently.
    pub async fn build(&self) -> Result<BuildSummary, TaskError> {
        let start = Instant::now();

        self.clean().await?;

        let (twig, sass, vendor, svg, images, js, fonts) = tokio::try_join!(
            self.run_class(AssetClass::Twig),
            self.run_class(AssetClass::Sass),
            self.run_class(AssetClass::Vendor),
            self.run_class(AssetClass::Svg),
            self.run_class(AssetClass::Images),
            self.run_class(AssetClass::Js),
            self.run_class(AssetClass::Fonts),
        )?;

        let summary = BuildSummary {
            files: [
                twig.len(),
                sass.len(),
                vendor.len(),
                svg.len(),
                images.len(),
                js.len(),
                fonts.len(),
            ],
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Built {} files in {}ms",
            summary.total(),
            summary.duration_ms
        );

        Ok(summary)
    }
}
