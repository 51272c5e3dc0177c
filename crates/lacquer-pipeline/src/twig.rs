//! Template pipeline.
//!
//! Renders template sources against a data context merged from a directory
//! of JSON files plus explicit overrides, then beautifies the output markup.

use std::fs;
use std::path::{Path, PathBuf};

use minijinja::{path_loader, Environment};
use rayon::prelude::*;

use lacquer_markup::{beautify_html, BeautifyOptions};

use crate::config::Config;
use crate::pipeline::{Asset, PipeError, Pipeline};

/// Build the template pipeline.
pub fn twig_pipe(config: &Config) -> Pipeline {
    let data_dir = config.twig.data_dir.clone();
    let overrides = config.twig.data.clone();
    let base_path = config.twig.base_path.clone();

    Pipeline::from_globs("twig", &config.twig.src)
        .stage("render", move |assets| {
            let data = load_template_data(&data_dir, &overrides)?;
            render_templates(assets, &base_path, &data)
        })
        .stage("beautify", |assets| {
            let options = BeautifyOptions::default();
            Ok(assets
                .into_iter()
                .map(|mut asset| {
                    if let Ok(text) = std::str::from_utf8(&asset.contents) {
                        asset.contents = beautify_html(text, &options).into_bytes();
                    }
                    asset
                })
                .collect())
        })
}

/// Merge the JSON files of a data directory into one mapping.
///
/// Each file contributes one top-level key, its filename stem; files are
/// merged in name order so a later file wins a stem collision, and explicit
/// overrides always win over file-sourced data.
pub fn load_template_data(
    data_dir: &Path,
    overrides: &serde_json::Map<String, serde_json::Value>,
) -> Result<serde_json::Map<String, serde_json::Value>, PipeError> {
    let mut data = serde_json::Map::new();

    if data_dir.is_dir() {
        let mut entries: Vec<PathBuf> = fs::read_dir(data_dir)
            .map_err(|e| PipeError::Read(format!("{}: {}", data_dir.display(), e)))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        entries.sort();

        for path in entries {
            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };

            let content = fs::read_to_string(&path)
                .map_err(|e| PipeError::Read(format!("{}: {}", path.display(), e)))?;

            let value: serde_json::Value =
                serde_json::from_str(&content).map_err(|e| PipeError::Data {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;

            data.insert(stem, value);
        }
    }

    for (key, value) in overrides {
        data.insert(key.clone(), value.clone());
    }

    Ok(data)
}

/// Render every template asset against the merged data context.
fn render_templates(
    assets: Vec<Asset>,
    base_path: &Path,
    data: &serde_json::Map<String, serde_json::Value>,
) -> Result<Vec<Asset>, PipeError> {
    let mut env = Environment::new();
    env.set_loader(path_loader(base_path));

    assets
        .into_par_iter()
        .map(|asset| {
            let source = asset.text()?.to_string();

            let html = env.render_str(&source, data).map_err(|e| PipeError::Template {
                path: asset.rel.display().to_string(),
                message: e.to_string(),
            })?;

            Ok(Asset {
                rel: output_name(&asset.rel),
                source: asset.source,
                contents: html.into_bytes(),
            })
        })
        .collect()
}

/// Map a template source name to its output name (`page.twig` -> `page.html`).
fn output_name(rel: &Path) -> PathBuf {
    let name = rel.to_string_lossy();

    if let Some(stripped) = name.strip_suffix(".twig") {
        let stripped = stripped.to_string();
        if Path::new(&stripped).extension().is_some() {
            PathBuf::from(stripped)
        } else {
            PathBuf::from(stripped + ".html")
        }
    } else {
        rel.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn merges_data_files_by_stem() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("site.json"), r#"{"title": "Stroyka"}"#).unwrap();
        fs::write(temp.path().join("menu.json"), r#"["home", "shop"]"#).unwrap();

        let data = load_template_data(temp.path(), &serde_json::Map::new()).unwrap();

        assert_eq!(data["site"]["title"], "Stroyka");
        assert_eq!(data["menu"][0], "home");
    }

    #[test]
    fn explicit_overrides_win_over_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("site.json"), r#"{"title": "from file"}"#).unwrap();

        let mut overrides = serde_json::Map::new();
        overrides.insert(
            "site".to_string(),
            serde_json::json!({"title": "explicit"}),
        );

        let data = load_template_data(temp.path(), &overrides).unwrap();

        assert_eq!(data["site"]["title"], "explicit");
    }

    #[test]
    fn missing_data_dir_yields_only_overrides() {
        let mut overrides = serde_json::Map::new();
        overrides.insert("k".to_string(), serde_json::json!(1));

        let data = load_template_data(Path::new("no-such-dir"), &overrides).unwrap();

        assert_eq!(data.len(), 1);
        assert_eq!(data["k"], 1);
    }

    #[test]
    fn malformed_data_file_is_an_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("bad.json"), "{ not json").unwrap();

        let err = load_template_data(temp.path(), &serde_json::Map::new()).unwrap_err();

        assert!(matches!(err, PipeError::Data { .. }));
    }

    #[test]
    fn renders_and_beautifies_pages() {
        let temp = tempdir().unwrap();
        let pages = temp.path().join("src/twig/pages");
        let data_dir = temp.path().join("src/data");
        fs::create_dir_all(&pages).unwrap();
        fs::create_dir_all(&data_dir).unwrap();

        fs::write(
            pages.join("index.twig"),
            "<div><p>{{ site.title }}</p></div>",
        )
        .unwrap();
        fs::write(data_dir.join("site.json"), r#"{"title": "Stroyka"}"#).unwrap();

        let mut config = Config::default();
        config.twig.src = vec![format!("{}/**/*", pages.display())];
        config.twig.data_dir = data_dir;
        config.twig.base_path = temp.path().join("src/twig");

        let assets = twig_pipe(&config).run().unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].rel, PathBuf::from("index.html"));

        let html = std::str::from_utf8(&assets[0].contents).unwrap();
        assert_eq!(html, "<div>\n    <p>\n        Stroyka\n    </p>\n</div>\n");
    }

    #[test]
    fn resolves_includes_from_the_base_path() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("src/twig");
        let pages = base.join("pages");
        fs::create_dir_all(base.join("partials")).unwrap();
        fs::create_dir_all(&pages).unwrap();

        fs::write(base.join("partials/header.twig"), "<header>H</header>").unwrap();
        fs::write(
            pages.join("index.twig"),
            "<div>{% include \"partials/header.twig\" %}</div>",
        )
        .unwrap();

        let mut config = Config::default();
        config.twig.src = vec![format!("{}/**/*", pages.display())];
        config.twig.data_dir = temp.path().join("src/data");
        config.twig.base_path = base;

        let assets = twig_pipe(&config).run().unwrap();

        let html = std::str::from_utf8(&assets[0].contents).unwrap();
        assert!(html.contains("<header>"));
    }

    #[test]
    fn template_errors_name_the_page() {
        let temp = tempdir().unwrap();
        let pages = temp.path().join("pages");
        fs::create_dir_all(&pages).unwrap();
        fs::write(pages.join("broken.twig"), "{% if %}").unwrap();

        let mut config = Config::default();
        config.twig.src = vec![format!("{}/**/*", pages.display())];
        config.twig.data_dir = temp.path().join("no-data");
        config.twig.base_path = temp.path().to_path_buf();

        let err = twig_pipe(&config).run().unwrap_err();

        assert!(matches!(err, PipeError::Template { .. }));
        assert!(err.to_string().contains("broken.twig"));
    }

    #[test]
    fn output_names_replace_the_twig_extension() {
        assert_eq!(output_name(Path::new("index.twig")), PathBuf::from("index.html"));
        assert_eq!(
            output_name(Path::new("shop/cart.html.twig")),
            PathBuf::from("shop/cart.html")
        );
        assert_eq!(output_name(Path::new("about.html")), PathBuf::from("about.html"));
    }
}
