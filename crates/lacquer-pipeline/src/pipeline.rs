//! Pipeline runtime.
//!
//! A [`Pipeline`] is a declarative description of one asset class: a set of
//! source globs and a list of named stages, each a transform over the whole
//! stream of in-flight [`Asset`]s. Stages are plain functions so they can be
//! exercised without touching the filesystem; loading sources and writing
//! the destination are kept at the edges.

use std::fs;
use std::path::{Path, PathBuf};

/// A file flowing through a pipeline.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Path relative to the pipeline's base; rename stages rewrite this.
    pub rel: PathBuf,

    /// Original filesystem path, empty for generated assets.
    pub source: PathBuf,

    /// File contents.
    pub contents: Vec<u8>,
}

impl Asset {
    /// An asset read from disk.
    pub fn from_source(source: PathBuf, rel: PathBuf, contents: Vec<u8>) -> Self {
        Self {
            rel,
            source,
            contents,
        }
    }

    /// An asset produced by a stage rather than read from disk.
    pub fn generated(rel: PathBuf, contents: Vec<u8>) -> Self {
        Self {
            rel,
            source: PathBuf::new(),
            contents,
        }
    }

    /// Contents as UTF-8 text.
    pub fn text(&self) -> Result<&str, PipeError> {
        std::str::from_utf8(&self.contents).map_err(|_| PipeError::NotUtf8 {
            path: self.rel.display().to_string(),
        })
    }
}

/// Errors surfaced by pipelines.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Failed to read source: {0}")]
    Read(String),

    #[error("File is not UTF-8 text: {path}")]
    NotUtf8 { path: String },

    #[error("Invalid data file: {path}: {message}")]
    Data { path: String, message: String },

    #[error("Failed to render template: {path}: {message}")]
    Template { path: String, message: String },

    #[error("Failed to compile stylesheet: {path}: {message}")]
    Sass { path: String, message: String },

    #[error("CSS processing error: {path}: {message}")]
    Css { path: String, message: String },

    #[error(transparent)]
    Sprite(#[from] lacquer_markup::SpriteError),

    #[error("Failed to write output: {0}")]
    Write(String),
}

type StageFn = Box<dyn Fn(Vec<Asset>) -> Result<Vec<Asset>, PipeError> + Send + Sync>;

struct Stage {
    label: &'static str,
    apply: StageFn,
}

/// A described sequence of stream transforms over a set of source files.
pub struct Pipeline {
    label: &'static str,
    sources: Vec<String>,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Create a pipeline reading the given source globs.
    pub fn from_globs(label: &'static str, sources: &[String]) -> Self {
        Self {
            label,
            sources: sources.to_vec(),
            stages: Vec::new(),
        }
    }

    /// Append a named transform stage.
    pub fn stage<F>(mut self, label: &'static str, f: F) -> Self
    where
        F: Fn(Vec<Asset>) -> Result<Vec<Asset>, PipeError> + Send + Sync + 'static,
    {
        self.stages.push(Stage {
            label,
            apply: Box::new(f),
        });
        self
    }

    /// Append a stage only when `condition` holds.
    pub fn stage_if<F>(self, condition: bool, label: &'static str, f: F) -> Self
    where
        F: Fn(Vec<Asset>) -> Result<Vec<Asset>, PipeError> + Send + Sync + 'static,
    {
        if condition {
            self.stage(label, f)
        } else {
            self
        }
    }

    /// The asset-class label.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Whether the pipeline has any sources configured.
    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Stage labels, in order.
    pub fn stage_labels(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.label).collect()
    }

    /// Expand the source globs and read every matching file.
    pub fn load(&self) -> Result<Vec<Asset>, PipeError> {
        let mut assets = Vec::new();

        for pattern in &self.sources {
            let base = glob_base(pattern);

            let paths = glob::glob(pattern).map_err(|e| PipeError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;

            for entry in paths {
                let path = entry.map_err(|e| PipeError::Read(e.to_string()))?;

                if !path.is_file() {
                    continue;
                }

                let rel = path.strip_prefix(&base).unwrap_or(&path).to_path_buf();

                let contents = fs::read(&path)
                    .map_err(|e| PipeError::Read(format!("{}: {}", path.display(), e)))?;

                assets.push(Asset::from_source(path, rel, contents));
            }
        }

        Ok(assets)
    }

    /// Run the stages over an already-loaded stream.
    pub fn apply(&self, mut assets: Vec<Asset>) -> Result<Vec<Asset>, PipeError> {
        for stage in &self.stages {
            tracing::debug!("{}: stage {}", self.label, stage.label);
            assets = (stage.apply)(assets)?;
        }
        Ok(assets)
    }

    /// Load sources and run every stage.
    pub fn run(&self) -> Result<Vec<Asset>, PipeError> {
        let assets = self.load()?;
        self.apply(assets)
    }
}

/// The literal directory prefix of a glob pattern.
///
/// This mirrors how stream sources resolve relative paths: everything up to
/// the first wildcard component is the base, and a fully literal pattern
/// uses its parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let mut base = if pattern.starts_with('/') {
        PathBuf::from("/")
    } else {
        PathBuf::new()
    };

    let parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();

    for (i, part) in parts.iter().enumerate() {
        let is_last = i == parts.len() - 1;
        if is_last || part.contains(['*', '?', '[', '{']) {
            break;
        }
        base.push(part);
    }

    base
}

/// Write assets under the destination directory, creating parents as needed.
///
/// Returns the number of files written.
pub fn write_assets(assets: &[Asset], dist_dir: &Path) -> Result<usize, PipeError> {
    for asset in assets {
        let target = dist_dir.join(&asset.rel);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| PipeError::Write(e.to_string()))?;
        }

        fs::write(&target, &asset.contents)
            .map_err(|e| PipeError::Write(format!("{}: {}", target.display(), e)))?;
    }

    Ok(assets.len())
}

/// A rename stage nesting every asset's directory under a fixed prefix.
pub fn nest_under(
    prefix: &'static str,
) -> impl Fn(Vec<Asset>) -> Result<Vec<Asset>, PipeError> + Send + Sync {
    move |assets| {
        Ok(assets
            .into_iter()
            .map(|mut asset| {
                asset.rel = Path::new(prefix).join(&asset.rel);
                asset
            })
            .collect())
    }
}
