//! Icon sprite pipeline.
//!
//! Combines every SVG source into one symbol sprite document nested under
//! `images/`.

use std::path::PathBuf;

use lacquer_markup::{build_sprite, SpriteIcon, SpriteOptions};

use crate::config::Config;
use crate::pipeline::{nest_under, Asset, PipeError, Pipeline};

/// Build the sprite pipeline.
pub fn svg_pipe(config: &Config) -> Pipeline {
    let file_name = config.svg.file_name.clone();

    Pipeline::from_globs("svg", &config.svg.src)
        .stage("sprite", move |assets| {
            if assets.is_empty() {
                return Ok(Vec::new());
            }

            let icons = assets
                .iter()
                .map(|asset| {
                    Ok(SpriteIcon {
                        name: asset
                            .rel
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        markup: asset.text()?.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, PipeError>>()?;

            let sprite = build_sprite(&icons, &SpriteOptions::default())?;

            Ok(vec![Asset::generated(
                PathBuf::from(&file_name),
                sprite.into_bytes(),
            )])
        })
        .stage("rename", nest_under("images"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn combines_icons_into_one_sprite_under_images() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("src/svg");
        fs::create_dir_all(&root).unwrap();
        fs::write(
            root.join("arrow.svg"),
            r#"<svg viewBox="0 0 24 24"><path d="M0 0"/></svg>"#,
        )
        .unwrap();
        fs::write(
            root.join("cross.svg"),
            r#"<svg viewBox="0 0 16 16"><path d="M1 1"/></svg>"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.svg.src = vec![format!("{}/**/*.svg", root.display())];

        let assets = svg_pipe(&config).run().unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].rel, PathBuf::from("images/sprite.svg"));

        let sprite = std::str::from_utf8(&assets[0].contents).unwrap();
        assert!(sprite.contains(r#"id="svg-arrow""#));
        assert!(sprite.contains(r#"id="svg-cross""#));
    }

    #[test]
    fn sprite_name_comes_from_config() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("icons");
        fs::create_dir_all(&root).unwrap();
        fs::write(
            root.join("dot.svg"),
            r#"<svg viewBox="0 0 4 4"><circle r="2"/></svg>"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.svg.src = vec![format!("{}/**/*.svg", root.display())];
        config.svg.file_name = "icons.svg".to_string();

        let assets = svg_pipe(&config).run().unwrap();

        assert_eq!(assets[0].rel, PathBuf::from("images/icons.svg"));
    }

    #[test]
    fn no_sources_produce_no_sprite() {
        let temp = tempdir().unwrap();

        let mut config = Config::default();
        config.svg.src = vec![format!("{}/**/*.svg", temp.path().display())];

        let assets = svg_pipe(&config).run().unwrap();

        assert!(assets.is_empty());
    }
}
