//! Text to [`Document`].
//!
//! Grammar: `!` starts a comment running to end of line, `,` separates
//! fields, `;` terminates an object. The first field is the class name.

use thiserror::Error;

use crate::document::Document;
use crate::object::{IdfObject, Span};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Object at {span} is not terminated with ';'")]
    Unterminated { span: Span },

    #[error("Object at {span} has an empty class name")]
    EmptyClassName { span: Span },

    #[error("Object at {span} has an invalid class name '{class}'")]
    InvalidClassName { class: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Unterminated { span }
            | ParseError::EmptyClassName { span }
            | ParseError::InvalidClassName { span, .. } => *span,
        }
    }
}

struct Pending {
    start: usize,
    start_line: usize,
    values: Vec<String>,
}

pub fn parse(text: &str) -> Result<Document, ParseError> {
    let mut doc = Document::new();
    let mut pending: Option<Pending> = None;
    let mut field = String::new();
    let mut line = 1usize;
    let mut in_comment = false;

    for (offset, ch) in text.char_indices() {
        if ch == '\n' {
            line += 1;
            in_comment = false;
            if pending.is_some() {
                field.push(' ');
            }
            continue;
        }
        if in_comment {
            continue;
        }
        if ch == '!' {
            in_comment = true;
            continue;
        }
        if pending.is_none() {
            if ch.is_whitespace() {
                continue;
            }
            pending = Some(Pending {
                start: offset,
                start_line: line,
                values: Vec::new(),
            });
        }
        let Some(current) = pending.as_mut() else {
            continue;
        };

        match ch {
            ',' => current.values.push(std::mem::take(&mut field).trim().to_string()),
            ';' => {
                current.values.push(std::mem::take(&mut field).trim().to_string());
                let span = Span {
                    start: current.start,
                    end: offset + 1,
                    start_line: current.start_line,
                    end_line: line,
                };
                let values = std::mem::take(&mut current.values);
                pending = None;
                doc.push(build_object(values, span)?);
            }
            _ => field.push(ch),
        }
    }

    if let Some(current) = pending {
        return Err(ParseError::Unterminated {
            span: Span {
                start: current.start,
                end: text.len(),
                start_line: current.start_line,
                end_line: line,
            },
        });
    }

    tracing::debug!(objects = doc.len(), "parsed document");
    Ok(doc)
}

fn build_object(mut values: Vec<String>, span: Span) -> Result<IdfObject, ParseError> {
    let class = values.remove(0);
    if class.is_empty() {
        return Err(ParseError::EmptyClassName { span });
    }
    if !class
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-' | '.'))
    {
        return Err(ParseError::InvalidClassName { class, span });
    }
    // `Class;` and `Class,;` both mean "no fields"
    if values.len() == 1 && values[0].is_empty() {
        values.clear();
    }
    Ok(IdfObject::new(&class, values).with_span(span))
}
