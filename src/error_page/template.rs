//! `$`-placeholder templates for error bodies.
//!
//! Syntax: `$name` or `${name}` is replaced by the value bound to `name`;
//! `$$` produces a literal `$`. Names are ASCII identifiers. Any other use of
//! `$` is malformed. Substituted values are inserted verbatim and never
//! rescanned.

use thiserror::Error;

/// Errors found while scanning a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("invalid placeholder at byte {offset}")]
    InvalidPlaceholder { offset: usize },

    #[error("unterminated `${{` at byte {offset}")]
    Unterminated { offset: usize },

    #[error("unknown placeholder `{name}`")]
    UnknownPlaceholder { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Placeholder(String),
}

/// A template checked against a fixed set of placeholder names.
///
/// Construction is the only fallible step; [`Template::render`] always
/// produces a string with every placeholder replaced.
///
/// # Examples
///
/// ```
/// use basehttp::error_page::template::Template;
///
/// let t = Template::compile("${method} $path costs $$5", &["method", "path"]).unwrap();
/// let out = t.render(|name| match name {
///     "method" => "GET",
///     _ => "/",
/// });
/// assert_eq!(out, "GET / costs $5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    pieces: Vec<Piece>,
}

impl Template {
    /// Parses `source`, rejecting any placeholder not listed in `allowed`.
    pub fn compile(source: &str, allowed: &[&str]) -> Result<Self, TemplateError> {
        let pieces = scan(source)?;
        for piece in &pieces {
            if let Piece::Placeholder(name) = piece {
                if !allowed.contains(&name.as_str()) {
                    return Err(TemplateError::UnknownPlaceholder { name: name.clone() });
                }
            }
        }
        Ok(Self {
            source: source.to_owned(),
            pieces,
        })
    }

    /// A template that renders `text` verbatim, `$` included.
    pub fn plain(text: &str) -> Self {
        Self {
            source: text.to_owned(),
            pieces: vec![Piece::Literal(text.to_owned())],
        }
    }

    /// Returns the template text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders the template, asking `value` for each placeholder.
    pub fn render<'a>(&self, value: impl Fn(&str) -> &'a str) -> String {
        let mut out = String::with_capacity(self.source.len());
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Placeholder(name) => out.push_str(value(name)),
            }
        }
        out
    }
}

fn is_ident_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

fn is_ident_continue(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

fn is_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty() && is_ident_start(bytes[0]) && bytes[1..].iter().all(|&b| is_ident_continue(b))
}

// `$` and identifier bytes are ASCII, so every slice boundary below is a char boundary.
fn scan(source: &str) -> Result<Vec<Piece>, TemplateError> {
    let bytes = source.as_bytes();
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        literal.push_str(&source[literal_start..i]);

        match bytes.get(i + 1) {
            Some(b'$') => {
                literal.push('$');
                i += 2;
            }
            Some(b'{') => {
                let start = i + 2;
                let end = source[start..]
                    .find('}')
                    .map(|off| start + off)
                    .ok_or(TemplateError::Unterminated { offset: i })?;
                let name = &source[start..end];
                if !is_identifier(name) {
                    return Err(TemplateError::InvalidPlaceholder { offset: i });
                }
                flush(&mut pieces, &mut literal);
                pieces.push(Piece::Placeholder(name.to_owned()));
                i = end + 1;
            }
            Some(&b) if is_ident_start(b) => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_ident_continue(bytes[end]) {
                    end += 1;
                }
                flush(&mut pieces, &mut literal);
                pieces.push(Piece::Placeholder(source[start..end].to_owned()));
                i = end;
            }
            _ => return Err(TemplateError::InvalidPlaceholder { offset: i }),
        }
        literal_start = i;
    }

    literal.push_str(&source[literal_start..]);
    flush(&mut pieces, &mut literal);
    Ok(pieces)
}

fn flush(pieces: &mut Vec<Piece>, literal: &mut String) {
    if !literal.is_empty() {
        pieces.push(Piece::Literal(std::mem::take(literal)));
    }
}
