//! Style pipeline.
//!
//! Compiles SCSS entry files, vendor-prefixes for a fixed browser support
//! set, minifies in production, and emits source maps in development.
//! Packaging builds prepend a preamble selecting text direction and theme
//! before compilation.

use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use crate::config::Config;
use crate::pipeline::{nest_under, Asset, PipeError, Pipeline};

/// Build the style pipeline.
pub fn sass_pipe(config: &Config) -> Pipeline {
    let production = config.production;
    let preamble = style_preamble(config.direction.as_deref(), &config.theme);

    Pipeline::from_globs("sass", &config.sass.src)
        .stage_if(config.pack, "prepend", move |assets| {
            let preamble = preamble.clone();
            Ok(assets
                .into_iter()
                .map(move |mut asset| {
                    let mut contents = preamble.clone().into_bytes();
                    contents.extend_from_slice(&asset.contents);
                    asset.contents = contents;
                    asset
                })
                .collect())
        })
        .stage("compile", |assets| {
            assets.into_iter().map(compile_scss).collect()
        })
        .stage("postcss", move |assets| {
            assets
                .into_iter()
                .map(|asset| postprocess_css(asset, production))
                .collect()
        })
        .stage_if(!production, "sourcemap", |assets| {
            let mut out = Vec::with_capacity(assets.len() * 2);
            for asset in assets {
                let (css, map) = attach_source_map(asset)?;
                out.push(css);
                out.push(map);
            }
            Ok(out)
        })
        .stage("rename", nest_under("css"))
}

/// Build the compilation preamble.
///
/// Always starts with a comment marker line; direction declarations follow
/// when a direction is configured, and any theme other than "default" adds
/// an import of its partial.
pub fn style_preamble(direction: Option<&str>, theme: &str) -> String {
    let mut preamble = String::from("//\n");

    if let Some(direction) = direction {
        preamble.push_str(&format!("$direction: {};\n", direction));
        preamble.push_str("$both-directions: false;\n");
    }

    if theme != "default" {
        preamble.push_str(&format!("@import \"themes/{}\";\n", theme));
    }

    preamble
}

/// The supported browser set: last two versions of the major browsers, the
/// legacy IE line, and the Firefox extended-support release.
pub fn browser_targets() -> Browsers {
    Browsers {
        chrome: Some(version(119, 0)),
        edge: Some(version(119, 0)),
        firefox: Some(version(115, 0)),
        safari: Some(version(16, 6)),
        ios_saf: Some(version(16, 6)),
        opera: Some(version(104, 0)),
        ie: Some(version(11, 0)),
        ..Browsers::default()
    }
}

fn version(major: u32, minor: u32) -> u32 {
    (major << 16) | (minor << 8)
}

/// Compile one SCSS asset to expanded CSS.
fn compile_scss(asset: Asset) -> Result<Asset, PipeError> {
    let source = asset.text()?.to_string();

    let load_dir = asset
        .source
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let options = grass::Options::default()
        .style(grass::OutputStyle::Expanded)
        .load_path(load_dir);

    let css = grass::from_string(source, &options).map_err(|e| PipeError::Sass {
        path: asset.rel.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(Asset {
        rel: asset.rel.with_extension("css"),
        source: asset.source,
        contents: css.into_bytes(),
    })
}

/// Vendor-prefix the compiled CSS, minifying when `production`.
fn postprocess_css(asset: Asset, production: bool) -> Result<Asset, PipeError> {
    let css = asset.text()?.to_string();
    let path = asset.rel.display().to_string();

    let stylesheet = StyleSheet::parse(&css, ParserOptions::default()).map_err(|e| {
        PipeError::Css {
            path: path.clone(),
            message: e.to_string(),
        }
    })?;

    let output = stylesheet
        .to_css(PrinterOptions {
            minify: production,
            targets: Targets {
                browsers: Some(browser_targets()),
                ..Targets::default()
            },
            ..PrinterOptions::default()
        })
        .map_err(|e| PipeError::Css {
            path,
            message: e.to_string(),
        })?;

    Ok(Asset {
        rel: asset.rel,
        source: asset.source,
        contents: output.code.into_bytes(),
    })
}

/// Emit a source-map sibling and reference it from the stylesheet.
///
/// The compiler exposes no span table, so the map is a skeleton document:
/// correct file and source names, empty mappings.
fn attach_source_map(mut asset: Asset) -> Result<(Asset, Asset), PipeError> {
    let css_name = asset
        .rel
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let source_name = asset
        .source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| css_name.replace(".css", ".scss"));

    let map = serde_json::json!({
        "version": 3,
        "file": css_name,
        "sources": [source_name],
        "names": [],
        "mappings": "",
    });

    let map_rel = PathBuf::from(format!("{}.map", asset.rel.display()));

    asset
        .contents
        .extend_from_slice(format!("\n/*# sourceMappingURL={}.map */\n", css_name).as_bytes());

    let map_asset = Asset::generated(map_rel, map.to_string().into_bytes());

    Ok((asset, map_asset))
}
