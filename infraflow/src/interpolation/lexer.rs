//! Tokenizer for `{{ ... }}` templates.

use crate::errors::LexError;

const OPEN: &[u8] = b"{{";
const CLOSE: &[u8] = b"}}";

/// A piece of a tokenized template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text copied to the output unchanged.
    Text(String),
    /// Raw content between `{{` and `}}`, untrimmed.
    Variable(String),
}

impl Token {
    /// Returns true for variable tokens.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }
}

/// Splits a template into text and variable tokens.
///
/// A `}}` outside a marker is literal text. Empty text runs are not emitted.
///
/// # Errors
///
/// Returns [`LexError::Unbalanced`] when a `{{` is never closed or appears
/// inside another marker.
pub fn tokenize(template: &str) -> Result<Vec<Token>, LexError> {
    let bytes = template.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut open: Option<usize> = None;
    let mut i = 0;

    while i < bytes.len() {
        let rest = &bytes[i..];
        if rest.starts_with(OPEN) {
            if open.is_some() {
                return Err(unbalanced(i, template));
            }
            if text_start < i {
                tokens.push(Token::Text(template[text_start..i].to_string()));
            }
            open = Some(i);
            i += OPEN.len();
        } else if let (Some(start), true) = (open, rest.starts_with(CLOSE)) {
            tokens.push(Token::Variable(
                template[start + OPEN.len()..i].to_string(),
            ));
            open = None;
            i += CLOSE.len();
            text_start = i;
        } else {
            i += 1;
        }
    }

    if let Some(start) = open {
        return Err(unbalanced(start, template));
    }
    if text_start < bytes.len() {
        tokens.push(Token::Text(template[text_start..].to_string()));
    }

    Ok(tokens)
}

/// Returns true if the template contains at least one variable marker.
///
/// Malformed templates count as containing variables.
#[must_use]
pub fn has_variables(template: &str) -> bool {
    tokenize(template).map_or(true, |tokens| tokens.iter().any(Token::is_variable))
}

fn unbalanced(offset: usize, template: &str) -> LexError {
    LexError::Unbalanced {
        offset,
        template: template.to_string(),
    }
}
