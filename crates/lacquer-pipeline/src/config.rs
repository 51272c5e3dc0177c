//! Build configuration.
//!
//! The configuration is resolved once, before any task runs, from
//! `lacquer.toml` plus command-line overrides. No task mutates it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Fully resolved build configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Production build: minified styles, no source maps.
    #[serde(default)]
    pub production: bool,

    /// Theme-packaging mode: pipelines run but nothing is written to dist.
    #[serde(default)]
    pub pack: bool,

    /// Theme name; anything other than "default" imports a theme partial.
    #[serde(default = "default_theme")]
    pub theme: String,

    /// Text direction for styling ("ltr" or "rtl").
    #[serde(default)]
    pub direction: Option<String>,

    /// Destination directory.
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,

    #[serde(default)]
    pub twig: TwigConfig,

    #[serde(default)]
    pub sass: SassConfig,

    #[serde(default)]
    pub vendor: VendorConfig,

    #[serde(default)]
    pub svg: SvgConfig,

    #[serde(default)]
    pub images: ImagesConfig,

    #[serde(default)]
    pub js: JsConfig,

    #[serde(default)]
    pub fonts: FontsConfig,

    #[serde(default)]
    pub server: ServerOptions,
}

/// Template pipeline settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwigConfig {
    #[serde(default = "default_twig_src")]
    pub src: Vec<String>,

    #[serde(default = "default_twig_watch")]
    pub watch: Vec<String>,

    /// Explicit data overrides; these win over file-sourced data.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,

    /// Directory of JSON data files, merged by filename stem.
    #[serde(default = "default_twig_data_dir")]
    pub data_dir: PathBuf,

    /// Root for resolving template includes and extends.
    #[serde(default = "default_twig_base_path")]
    pub base_path: PathBuf,
}

/// Style pipeline settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SassConfig {
    #[serde(default = "default_sass_src")]
    pub src: Vec<String>,

    #[serde(default = "default_sass_watch")]
    pub watch: Vec<String>,
}

/// Vendor copy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VendorConfig {
    #[serde(default = "default_vendor_globs")]
    pub src: Vec<String>,

    #[serde(default = "default_vendor_globs")]
    pub watch: Vec<String>,
}

/// Icon sprite settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SvgConfig {
    #[serde(default = "default_svg_globs")]
    pub src: Vec<String>,

    #[serde(default = "default_svg_globs")]
    pub watch: Vec<String>,

    /// Name of the generated sprite document.
    #[serde(default = "default_svg_file_name")]
    pub file_name: String,
}

/// Image copy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImagesConfig {
    #[serde(default = "default_images_globs")]
    pub src: Vec<String>,

    #[serde(default = "default_images_globs")]
    pub watch: Vec<String>,
}

/// Script copy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsConfig {
    #[serde(default = "default_js_globs")]
    pub src: Vec<String>,

    #[serde(default = "default_js_globs")]
    pub watch: Vec<String>,
}

/// Font copy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FontsConfig {
    #[serde(default = "default_fonts_globs")]
    pub src: Vec<String>,

    #[serde(default = "default_fonts_globs")]
    pub watch: Vec<String>,
}

/// Dev server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerOptions {
    /// Document root served to browsers.
    #[serde(default = "default_server_base_dir")]
    pub base_dir: PathBuf,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Open a browser once the server is listening.
    #[serde(default = "default_true")]
    pub open: bool,
}

fn default_theme() -> String {
    "default".to_string()
}
fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}
fn default_twig_src() -> Vec<String> {
    vec!["src/twig/pages/**/*".to_string()]
}
fn default_twig_watch() -> Vec<String> {
    vec!["src/data/**/*".to_string(), "src/twig/**/*".to_string()]
}
fn default_twig_data_dir() -> PathBuf {
    PathBuf::from("src/data")
}
fn default_twig_base_path() -> PathBuf {
    PathBuf::from("src/twig/")
}
fn default_sass_src() -> Vec<String> {
    vec![
        "src/scss/style.scss".to_string(),
        "src/scss/style.ltr.scss".to_string(),
        "src/scss/style.rtl.scss".to_string(),
    ]
}
fn default_sass_watch() -> Vec<String> {
    vec!["src/scss/**/*".to_string()]
}
fn default_vendor_globs() -> Vec<String> {
    vec!["src/vendor/**/*".to_string()]
}
fn default_svg_globs() -> Vec<String> {
    vec!["src/svg/**/*.svg".to_string()]
}
fn default_svg_file_name() -> String {
    "sprite.svg".to_string()
}
fn default_images_globs() -> Vec<String> {
    vec!["src/images/**/*".to_string()]
}
fn default_js_globs() -> Vec<String> {
    vec!["src/js/**/*".to_string()]
}
fn default_fonts_globs() -> Vec<String> {
    vec!["src/fonts/**/*".to_string()]
}
fn default_server_base_dir() -> PathBuf {
    PathBuf::from("./dist")
}
fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    3000
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str("").expect("empty config is valid")
    }
}

impl Default for TwigConfig {
    fn default() -> Self {
        Self {
            src: default_twig_src(),
            watch: default_twig_watch(),
            data: serde_json::Map::new(),
            data_dir: default_twig_data_dir(),
            base_path: default_twig_base_path(),
        }
    }
}

impl Default for SassConfig {
    fn default() -> Self {
        Self {
            src: default_sass_src(),
            watch: default_sass_watch(),
        }
    }
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            src: default_vendor_globs(),
            watch: default_vendor_globs(),
        }
    }
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self {
            src: default_svg_globs(),
            watch: default_svg_globs(),
            file_name: default_svg_file_name(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            src: default_images_globs(),
            watch: default_images_globs(),
        }
    }
}

impl Default for JsConfig {
    fn default() -> Self {
        Self {
            src: default_js_globs(),
            watch: default_js_globs(),
        }
    }
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            src: default_fonts_globs(),
            watch: default_fonts_globs(),
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            base_dir: default_server_base_dir(),
            host: default_server_host(),
            port: default_server_port(),
            open: default_true(),
        }
    }
}

/// Errors in configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("dist directory must not be empty")]
    MissingDistDir,

    #[error("theme must not be empty")]
    MissingTheme,

    #[error("server document root must not be empty")]
    MissingServerRoot,

    #[error("direction must be \"ltr\" or \"rtl\", got \"{0}\"")]
    InvalidDirection(String),

    #[error("pack mode cannot be combined with watch or serve")]
    PackWithLiveTask,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the default configuration; a malformed one is
    /// an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        tracing::info!("Loaded config from {}", path.display());

        Ok(config)
    }

    /// Validate invariants that must hold before any task starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dist_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingDistDir);
        }

        if self.theme.is_empty() {
            return Err(ConfigError::MissingTheme);
        }

        if self.server.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingServerRoot);
        }

        if let Some(direction) = &self.direction {
            if direction != "ltr" && direction != "rtl" {
                return Err(ConfigError::InvalidDirection(direction.clone()));
            }
        }

        Ok(())
    }

    /// Additional validation for tasks that keep running and serving.
    ///
    /// Pack mode suppresses writes, so there would be nothing to serve or
    /// reload; the combination is rejected up front.
    pub fn validate_live(&self) -> Result<(), ConfigError> {
        if self.pack {
            return Err(ConfigError::PackWithLiveTask);
        }
        Ok(())
    }
}
