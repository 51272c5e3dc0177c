//! Verbatim copy pipelines.
//!
//! Vendor files, images, scripts, and fonts are copied unchanged, with each
//! file's directory nested under the class prefix.

use crate::config::Config;
use crate::pipeline::{nest_under, Pipeline};

fn copy_pipe(label: &'static str, sources: &[String], prefix: &'static str) -> Pipeline {
    Pipeline::from_globs(label, sources).stage("rename", nest_under(prefix))
}

/// Build the vendor pipeline.
pub fn vendor_pipe(config: &Config) -> Pipeline {
    copy_pipe("vendor", &config.vendor.src, "vendor")
}

/// Build the images pipeline.
pub fn images_pipe(config: &Config) -> Pipeline {
    copy_pipe("images", &config.images.src, "images")
}

/// Build the scripts pipeline.
pub fn js_pipe(config: &Config) -> Pipeline {
    copy_pipe("js", &config.js.src, "js")
}

/// Build the fonts pipeline.
pub fn fonts_pipe(config: &Config) -> Pipeline {
    copy_pipe("fonts", &config.fonts.src, "fonts")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Asset;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn copies_preserve_bytes_and_nest_the_directory() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("src/vendor");
        fs::create_dir_all(root.join("bootstrap/css")).unwrap();
        fs::write(root.join("bootstrap/css/bootstrap.css"), "body{}").unwrap();

        let mut config = Config::default();
        config.vendor.src = vec![format!("{}/**/*", root.display())];

        let assets = vendor_pipe(&config).run().unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(
            assets[0].rel,
            PathBuf::from("vendor/bootstrap/css/bootstrap.css")
        );
        assert_eq!(assets[0].contents, b"body{}");
    }

    #[test]
    fn each_class_renames_under_its_own_prefix() {
        let asset = || vec![Asset::generated(PathBuf::from("sub/f.bin"), Vec::new())];
        let config = Config::default();

        let cases = [
            (images_pipe(&config), "images/sub/f.bin"),
            (js_pipe(&config), "js/sub/f.bin"),
            (fonts_pipe(&config), "fonts/sub/f.bin"),
            (vendor_pipe(&config), "vendor/sub/f.bin"),
        ];

        for (pipe, expected) in cases {
            let out = pipe.apply(asset()).unwrap();
            assert_eq!(out[0].rel, PathBuf::from(expected));
        }
    }

    #[test]
    fn no_segment_is_altered_besides_the_prefix() {
        let asset = Asset::generated(PathBuf::from("deep/tree/of/dirs/file.woff2"), Vec::new());
        let config = Config::default();

        let out = fonts_pipe(&config).apply(vec![asset]).unwrap();

        assert_eq!(out[0].rel, PathBuf::from("fonts/deep/tree/of/dirs/file.woff2"));
    }
}
