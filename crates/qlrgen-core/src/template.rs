//! XML template parsing and rendering
//!
//! Templates are plain text with `{name}` placeholders. `{{` and `}}` stand for
//! literal braces. Placeholder names match `[A-Za-z_][A-Za-z0-9_]*`.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{QlrError, Result};
use crate::substitution::{Substitutions, METADATA_KEYS};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Token(String),
}

/// A parsed template
#[derive(Debug, Clone)]
pub struct Template {
    path: PathBuf,
    segments: Vec<Segment>,
}

impl Template {
    /// Read and parse a template file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        Self::parse(path, &source)
    }

    /// Parse template text; `path` is only used to label errors
    pub fn parse(path: impl Into<PathBuf>, source: &str) -> Result<Self> {
        let path = path.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(syntax_error(&path, offset, "unterminated placeholder"));
                    }
                    if !is_valid_token(&name) {
                        return Err(syntax_error(
                            &path,
                            offset,
                            &format!("invalid placeholder name '{}'", name),
                        ));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Token(name));
                }
                '}' => {
                    return Err(syntax_error(&path, offset, "unmatched '}' (use '}}' for a literal brace)"));
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { path, segments })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Distinct placeholder names used by the template
    pub fn tokens(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Token(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Fill every placeholder, escaping values for XML
    pub fn render(&self, substitutions: &Substitutions) -> Result<String> {
        let mut output = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Token(name) => {
                    let value =
                        substitutions.get(name).ok_or_else(|| QlrError::MissingSubstitution {
                            template: self.path.clone(),
                            token: name.clone(),
                        })?;
                    output.push_str(&escape_value(value));
                }
            }
        }

        // Templates pick from the fixed metadata keys freely; anything else
        // left over was supplied for this template and went unused.
        let tokens = self.tokens();
        let (unused_metadata, unused_other): (Vec<&str>, Vec<&str>) = substitutions
            .keys()
            .filter(|key| !tokens.contains(key))
            .partition(|key| METADATA_KEYS.contains(key));
        if !unused_other.is_empty() {
            tracing::warn!(
                template = %self.path.display(),
                unused = ?unused_other,
                "Substitutions not referenced by template"
            );
        }
        if !unused_metadata.is_empty() {
            tracing::debug!(
                template = %self.path.display(),
                unused = ?unused_metadata,
                "Metadata keys not referenced by template"
            );
        }

        Ok(output)
    }
}

/// Renders templates by path, parsing each file at most once
#[derive(Debug, Default)]
pub struct TemplateRenderer {
    templates: HashMap<PathBuf, Arc<Template>>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an already parsed template to the cache
    pub fn insert(&mut self, template: Template) -> Arc<Template> {
        let template = Arc::new(template);
        self.templates.insert(template.path().to_path_buf(), Arc::clone(&template));
        template
    }

    pub fn get(&self, template_path: &Path) -> Option<Arc<Template>> {
        self.templates.get(template_path).cloned()
    }

    /// Render the template at `template_path`, loading it from disk if it is
    /// not cached
    pub fn render(&self, template_path: &Path, substitutions: &Substitutions) -> Result<String> {
        match self.templates.get(template_path) {
            Some(template) => template.render(substitutions),
            None => {
                tracing::debug!(template = %template_path.display(), "Loading uncached template");
                Template::load(template_path)?.render(substitutions)
            }
        }
    }
}

fn is_valid_token(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn syntax_error(path: &Path, offset: usize, reason: &str) -> QlrError {
    QlrError::Template {
        template: path.to_path_buf(),
        offset,
        reason: reason.to_string(),
    }
}

/// Escape a value for use in XML text or attribute content.
///
/// Characters XML 1.0 does not allow at all are replaced with U+FFFD.
pub fn escape_value(value: &str) -> Cow<'_, str> {
    if value.chars().all(is_xml_char) {
        quick_xml::escape::escape(value)
    } else {
        let cleaned: String =
            value.chars().map(|c| if is_xml_char(c) { c } else { '\u{FFFD}' }).collect();
        Cow::Owned(quick_xml::escape::escape(cleaned.as_str()).into_owned())
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}
