//! Fully qualified name derivation.
//!
//! # Responsibility
//! - Validate human-assigned names against the catalog name grammar.
//! - Join a name with its parent namespace into a unique FQN.
//!
//! # Invariants
//! - The same name and parent always produce the same FQN.
//! - Names containing `.` are quoted so FQN segments stay splittable.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

const MAX_NAME_CHARS: usize = 256;
const FQN_SEPARATOR: char = '.';

static NAME_GRAMMAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[^\x00-\x1F\x7F"]+$"#).expect("valid name grammar regex"));

/// Why a name was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidNameError {
    #[error("entity name cannot be empty")]
    Empty,
    #[error("entity name `{0}` exceeds 256 characters")]
    TooLong(String),
    #[error("entity name `{0}` contains quotes or control characters")]
    IllegalCharacter(String),
    #[error("entity name `{0}` must not contain `::`")]
    ReservedSeparator(String),
}

/// Resolves a human name plus parent context into a fully qualified name.
pub trait NamingService {
    fn fully_qualified_name(
        &self,
        name: &str,
        parent_fqn: Option<&str>,
    ) -> Result<String, InvalidNameError>;
}

/// Dot-separated FQNs with quoted segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNamingService;

impl NamingService for DefaultNamingService {
    fn fully_qualified_name(
        &self,
        name: &str,
        parent_fqn: Option<&str>,
    ) -> Result<String, InvalidNameError> {
        validate_name(name)?;
        let segment = quote_name(name);
        Ok(match parent_fqn {
            Some(parent) => format!("{parent}{FQN_SEPARATOR}{segment}"),
            None => segment,
        })
    }
}

/// Checks `name` against the catalog name grammar.
pub fn validate_name(name: &str) -> Result<(), InvalidNameError> {
    if name.trim().is_empty() {
        return Err(InvalidNameError::Empty);
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(InvalidNameError::TooLong(name.to_string()));
    }
    if name.contains("::") {
        return Err(InvalidNameError::ReservedSeparator(name.to_string()));
    }
    if !NAME_GRAMMAR_RE.is_match(name) {
        return Err(InvalidNameError::IllegalCharacter(name.to_string()));
    }
    Ok(())
}

/// Quotes a segment when it contains the FQN separator.
pub fn quote_name(name: &str) -> String {
    if name.contains(FQN_SEPARATOR) {
        format!("\"{name}\"")
    } else {
        name.to_string()
    }
}
