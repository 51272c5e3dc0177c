//! SVG symbol sprite assembly.
//!
//! Combines individual icon files into a single document of `<symbol>`
//! elements that pages reference with `<use href="sprite.svg#svg-name">`.

use regex::Regex;

/// Options controlling sprite generation.
#[derive(Debug, Clone)]
pub struct SpriteOptions {
    /// Prefix applied to every symbol id.
    pub id_prefix: String,
}

impl Default for SpriteOptions {
    fn default() -> Self {
        Self {
            id_prefix: "svg-".to_string(),
        }
    }
}

/// A source icon to include in the sprite.
#[derive(Debug, Clone)]
pub struct SpriteIcon {
    /// Symbol name, usually the source file stem.
    pub name: String,

    /// Full SVG document text.
    pub markup: String,
}

/// Errors that can occur when assembling a sprite.
#[derive(Debug, thiserror::Error)]
pub enum SpriteError {
    #[error("No <svg> root element in icon '{0}'")]
    MissingRoot(String),
}

/// Build a symbol sprite document from a set of icons.
///
/// Each icon contributes one `<symbol>` whose id is the prefixed icon name
/// and whose `viewBox` is carried over from the source root element (or
/// synthesized from `width`/`height` when absent).
pub fn build_sprite(icons: &[SpriteIcon], options: &SpriteOptions) -> Result<String, SpriteError> {
    let root_re = Regex::new(r"(?s)<svg\b([^>]*)>(.*)</svg\s*>").expect("root pattern");

    let mut symbols = Vec::with_capacity(icons.len());

    for icon in icons {
        let cleaned = strip_preamble(&icon.markup);

        let caps = root_re
            .captures(&cleaned)
            .ok_or_else(|| SpriteError::MissingRoot(icon.name.clone()))?;

        let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let inner = caps.get(2).map(|m| m.as_str()).unwrap_or("").trim();

        let id = format!("{}{}", options.id_prefix, icon.name);

        let symbol = match view_box(attrs) {
            Some(vb) => format!("<symbol id=\"{}\" viewBox=\"{}\">{}</symbol>", id, vb, inner),
            None => format!("<symbol id=\"{}\">{}</symbol>", id, inner),
        };

        symbols.push(symbol);
    }

    Ok(format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\">\n{}\n</svg>\n",
        symbols.join("\n")
    ))
}

/// Remove the XML declaration, doctype, and leading comments.
fn strip_preamble(markup: &str) -> String {
    let decl = Regex::new(r"(?s)<\?xml.*?\?>").expect("decl pattern");
    let doctype = Regex::new(r"(?s)<!DOCTYPE[^>]*>").expect("doctype pattern");
    let comment = Regex::new(r"(?s)<!--.*?-->").expect("comment pattern");

    let markup = decl.replace_all(markup, "");
    let markup = doctype.replace_all(&markup, "");
    comment.replace_all(&markup, "").into_owned()
}

/// Extract a viewBox from the root attributes, deriving one from explicit
/// width/height when the source has none.
fn view_box(attrs: &str) -> Option<String> {
    let vb_re = Regex::new(r#"viewBox\s*=\s*"([^"]*)""#).expect("viewBox pattern");
    if let Some(caps) = vb_re.captures(attrs) {
        return Some(caps[1].to_string());
    }

    let width = dimension(attrs, "width")?;
    let height = dimension(attrs, "height")?;
    Some(format!("0 0 {} {}", width, height))
}

fn dimension(attrs: &str, name: &str) -> Option<String> {
    let re = Regex::new(&format!(r#"\b{}\s*=\s*"([0-9.]+)(?:px)?""#, name)).expect("dim pattern");
    re.captures(attrs).map(|caps| caps[1].to_string())
}
