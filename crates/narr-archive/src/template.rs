//! Named-placeholder format templates.
//!
//! A template is literal text with placeholders of the form `{key}` or
//! `{key:0N}`, where `N` zero-pads a number to `N` digits, e.g.
//! `NARR_3D.{variable}.{year:04}{month:02}{day:02}.{hhmm:04}.{ext}`.
//!
//! Templates are validated once against the set of keys they may use, so
//! rendering never fails afterwards. Fixed-width templates can also be
//! parsed back into their field values.

use std::collections::HashMap;

use crate::error::{ArchiveError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { key: String, width: Option<usize> },
}

/// A value substituted into a template field.
#[derive(Debug, Clone, Copy)]
pub enum Value<'a> {
    Text(&'a str),
    Number(i64),
}

/// A parsed, validated format template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`, accepting only placeholders named in `allowed`.
    pub fn parse(source: &str, allowed: &[&str]) -> Result<Self> {
        let malformed = |reason: &str| {
            ArchiveError::Config(format!("malformed template '{}': {}", source, reason))
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut field = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(malformed("nested '{'")),
                            _ => field.push(c),
                        }
                    }
                    if !closed {
                        return Err(malformed("unterminated placeholder"));
                    }

                    let (key, width) = match field.split_once(':') {
                        Some((key, spec)) => {
                            let width = spec
                                .trim_start_matches('0')
                                .parse::<usize>()
                                .map_err(|_| malformed(&format!("bad width '{}'", spec)))?;
                            (key.to_string(), Some(width))
                        }
                        None => (field, None),
                    };

                    if !allowed.contains(&key.as_str()) {
                        return Err(malformed(&format!(
                            "unknown placeholder '{}' (expected one of: {})",
                            key,
                            allowed.join(", ")
                        )));
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field { key, width });
                }
                '}' => return Err(malformed("unmatched '}'")),
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Substitute `values` into the template.
    ///
    /// Placeholders without a value are left in place verbatim.
    pub fn render(&self, values: &[(&str, Value<'_>)]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { key, width } => {
                    match values.iter().find(|(k, _)| *k == key.as_str()).map(|(_, v)| *v) {
                        Some(Value::Text(text)) => out.push_str(text),
                        Some(Value::Number(n)) => match width {
                            Some(w) => out.push_str(&format!("{:0width$}", n, width = *w)),
                            None => out.push_str(&n.to_string()),
                        },
                        None => {
                            out.push('{');
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                }
            }
        }
        out
    }

    /// Recover field values from text produced by [`Template::render`].
    ///
    /// Fixed-width fields must be all digits. A field without a width runs
    /// up to the next literal (or the end of the input); two adjacent
    /// unbounded fields cannot be separated and never match.
    pub fn extract(&self, input: &str) -> Option<HashMap<String, String>> {
        let mut values = HashMap::new();
        let mut rest = input;

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => {
                    rest = rest.strip_prefix(text.as_str())?;
                }
                Segment::Field {
                    key,
                    width: Some(w),
                } => {
                    let value = rest.get(..*w)?;
                    if !value.bytes().all(|b| b.is_ascii_digit()) {
                        return None;
                    }
                    values.insert(key.clone(), value.to_string());
                    rest = &rest[*w..];
                }
                Segment::Field { key, width: None } => {
                    let end = match self.segments.get(i + 1) {
                        None => rest.len(),
                        Some(Segment::Literal(next)) => rest.find(next.as_str())?,
                        Some(Segment::Field { .. }) => return None,
                    };
                    if end == 0 {
                        return None;
                    }
                    values.insert(key.clone(), rest[..end].to_string());
                    rest = &rest[end..];
                }
            }
        }

        rest.is_empty().then_some(values)
    }
}
