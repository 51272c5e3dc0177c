//! HTML reindentation.

/// Options controlling beautification.
#[derive(Debug, Clone)]
pub struct BeautifyOptions {
    /// Number of spaces per indentation level.
    pub indent_size: usize,

    /// Maximum number of consecutive blank lines kept between nodes.
    pub max_preserve_newlines: usize,
}

impl Default for BeautifyOptions {
    fn default() -> Self {
        Self {
            indent_size: 4,
            max_preserve_newlines: 0,
        }
    }
}

/// Elements whose content is emitted verbatim, without reindentation.
const RAW_ELEMENTS: &[&str] = &["pre", "textarea", "script", "style"];

/// Elements that never have a closing tag and do not increase depth.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug)]
enum Token {
    /// An opening tag, with its name and full source text.
    Open { name: String, text: String },
    /// A closing tag.
    Close { name: String, text: String },
    /// A self-closing tag, comment, doctype, or processing instruction.
    Standalone(String),
    /// A raw element emitted as one unit: open tag, verbatim content, close tag.
    Raw(String),
    /// A text run, with the number of newlines that preceded it.
    Text { text: String, blank_lines: usize },
}

/// Reindent an HTML document.
///
/// Every tag and text run is placed on its own line at the current nesting
/// depth. Content of `pre`, `textarea`, `script`, and `style` elements is
/// preserved byte for byte.
pub fn beautify_html(input: &str, options: &BeautifyOptions) -> String {
    let tokens = tokenize(input);
    let indent = " ".repeat(options.indent_size);

    let mut out = String::with_capacity(input.len());
    let mut depth: usize = 0;

    for token in tokens {
        match token {
            Token::Open { name, text } => {
                push_line(&mut out, &indent, depth, &text);
                if !VOID_ELEMENTS.contains(&name.as_str()) {
                    depth += 1;
                }
            }
            Token::Close { text, .. } => {
                depth = depth.saturating_sub(1);
                push_line(&mut out, &indent, depth, &text);
            }
            Token::Standalone(text) | Token::Raw(text) => {
                push_line(&mut out, &indent, depth, &text);
            }
            Token::Text { text, blank_lines } => {
                let keep = blank_lines.min(options.max_preserve_newlines);
                for _ in 0..keep {
                    out.push('\n');
                }
                push_line(&mut out, &indent, depth, &text);
            }
        }
    }

    out
}

fn push_line(out: &mut String, indent: &str, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str(indent);
    }
    out.push_str(text);
    out.push('\n');
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut pos = 0;

    while pos < input.len() {
        if bytes[pos] == b'<' {
            if input[pos..].starts_with("<!--") {
                let end = input[pos..]
                    .find("-->")
                    .map(|i| pos + i + 3)
                    .unwrap_or(input.len());
                tokens.push(Token::Standalone(input[pos..end].to_string()));
                pos = end;
                continue;
            }

            let end = match input[pos..].find('>') {
                Some(i) => pos + i + 1,
                None => {
                    // Unterminated tag, treat the remainder as text.
                    push_text(&mut tokens, &input[pos..], 0);
                    break;
                }
            };

            let tag = &input[pos..end];

            if tag.starts_with("</") {
                let name = tag_name(&tag[2..]);
                tokens.push(Token::Close {
                    name,
                    text: tag.to_string(),
                });
                pos = end;
            } else if tag.starts_with("<!") || tag.starts_with("<?") || tag.ends_with("/>") {
                tokens.push(Token::Standalone(tag.to_string()));
                pos = end;
            } else {
                let name = tag_name(&tag[1..]);

                if RAW_ELEMENTS.contains(&name.as_str()) {
                    let close = format!("</{}", name);
                    let rest = &input[end..];
                    let close_at = find_ci(rest, &close);

                    match close_at {
                        Some(at) => {
                            let close_end = rest[at..]
                                .find('>')
                                .map(|i| at + i + 1)
                                .unwrap_or(rest.len());
                            let unit = &input[pos..end + close_end];
                            tokens.push(Token::Raw(unit.to_string()));
                            pos = end + close_end;
                        }
                        None => {
                            tokens.push(Token::Raw(input[pos..].to_string()));
                            pos = input.len();
                        }
                    }
                } else {
                    tokens.push(Token::Open {
                        name,
                        text: tag.to_string(),
                    });
                    pos = end;
                }
            }
        } else {
            let end = input[pos..]
                .find('<')
                .map(|i| pos + i)
                .unwrap_or(input.len());
            let raw = &input[pos..end];
            let blank_lines = raw.matches('\n').count().saturating_sub(1);
            push_text(&mut tokens, raw, blank_lines);
            pos = end;
        }
    }

    tokens
}

fn push_text(tokens: &mut Vec<Token>, raw: &str, blank_lines: usize) {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.is_empty() {
        tokens.push(Token::Text {
            text: collapsed,
            blank_lines,
        });
    }
}

/// Extract the element name from the text following `<` or `</`.
fn tag_name(rest: &str) -> String {
    rest.chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Case-insensitive substring search.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack_lower = haystack.to_ascii_lowercase();
    let needle_lower = needle.to_ascii_lowercase();
    haystack_lower.find(&needle_lower)
}
