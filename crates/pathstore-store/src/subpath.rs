//! JSON-internal query expressions for `load`.
//!
//! Accepts dot and bracket addressing with an optional leading `$`:
//!
//! - `members`, `$.members`
//! - `grades.final`, `grades["final exam"]`, `grades['a.b']`
//! - `members[0].name`, `members.0.name`
//!
//! A key segment also indexes arrays when it is numeric, and an index segment
//! also looks up objects by its decimal key, so both spellings reach the same
//! value.

use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// One step of a subpath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed subpath expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subpath {
    segments: Vec<Segment>,
}

impl Subpath {
    /// Parse an expression. An empty expression (or bare `$`) addresses the
    /// whole document.
    pub fn parse(expr: &str) -> StoreResult<Self> {
        let invalid = |reason: &str| StoreError::InvalidSubpath {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let mut rest = expr.trim();
        if let Some(stripped) = rest.strip_prefix('$') {
            rest = stripped;
        }
        let mut chars = rest.chars().peekable();
        let mut segments = Vec::new();
        // A leading dot after `$` is allowed; any other dot must separate two segments.
        let mut expect_segment = false;
        if chars.peek() == Some(&'.') {
            chars.next();
            expect_segment = true;
        }

        while let Some(&ch) = chars.peek() {
            match ch {
                '.' => {
                    if expect_segment {
                        return Err(invalid("empty segment"));
                    }
                    chars.next();
                    expect_segment = true;
                }
                '[' => {
                    chars.next();
                    let segment = match chars.peek() {
                        Some(&quote) if quote == '"' || quote == '\'' => {
                            chars.next();
                            let mut key = String::new();
                            loop {
                                match chars.next() {
                                    Some(c) if c == quote => break,
                                    Some('\\') => match chars.next() {
                                        Some(c) => key.push(c),
                                        None => return Err(invalid("unterminated escape")),
                                    },
                                    Some(c) => key.push(c),
                                    None => return Err(invalid("unterminated quoted key")),
                                }
                            }
                            Segment::Key(key)
                        }
                        _ => {
                            let mut raw = String::new();
                            loop {
                                match chars.peek() {
                                    Some(']') => break,
                                    Some(&c) => {
                                        raw.push(c);
                                        chars.next();
                                    }
                                    None => return Err(invalid("missing ']'")),
                                }
                            }
                            let raw = raw.trim();
                            if raw.is_empty() {
                                return Err(invalid("empty brackets"));
                            }
                            match raw.parse::<usize>() {
                                Ok(index) => Segment::Index(index),
                                Err(_) => Segment::Key(raw.to_string()),
                            }
                        }
                    };
                    if chars.next() != Some(']') {
                        return Err(invalid("missing ']'"));
                    }
                    segments.push(segment);
                    expect_segment = false;
                }
                _ => {
                    let mut key = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == '.' || c == '[' {
                            break;
                        }
                        key.push(c);
                        chars.next();
                    }
                    segments.push(Segment::Key(key));
                    expect_segment = false;
                }
            }
        }

        if expect_segment {
            return Err(invalid("trailing '.'"));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Walk `root` along the subpath. Returns `None` as soon as a step is
    /// missing or lands on a scalar.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments.iter().try_fold(root, |node, segment| match (segment, node) {
            (Segment::Key(key), Value::Object(map)) => map.get(key),
            (Segment::Key(key), Value::Array(items)) => {
                key.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            (Segment::Index(i), Value::Array(items)) => items.get(*i),
            (Segment::Index(i), Value::Object(map)) => map.get(&i.to_string()),
            _ => None,
        })
    }
}
