//! Turning body lines into domain tokens.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

/// Outcome of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    /// A complete token to hand to subscribers.
    Token(T),
    /// Nothing to deliver (keep-alive newline, comment, ...).
    Skip,
    /// In-band end of stream: complete the connection as if the body ended.
    End,
}

/// A line that could not be parsed. Never recovered by reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not parse stream line: {message}")]
pub struct ParseError {
    message: String,
    line: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: &str) -> Self {
        Self {
            message: message.into(),
            line: line.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The offending line.
    pub fn line(&self) -> &str {
        &self.line
    }
}

/// Parses one newline-delimited chunk into a token.
pub trait TokenParser: Send + Sync + 'static {
    type Token: Clone + Send + 'static;

    fn parse(&self, line: &str) -> Result<Parsed<Self::Token>, ParseError>;
}

/// Every non-blank line is a token; blank lines are keep-alives.
#[derive(Debug, Clone, Default)]
pub struct LineParser {
    end_marker: Option<String>,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat a line equal to `marker` as end of stream.
    pub fn with_end_marker(marker: impl Into<String>) -> Self {
        Self {
            end_marker: Some(marker.into()),
        }
    }
}

impl TokenParser for LineParser {
    type Token = String;

    fn parse(&self, line: &str) -> Result<Parsed<String>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Parsed::Skip);
        }
        if self.end_marker.as_deref() == Some(line) {
            return Ok(Parsed::End);
        }
        Ok(Parsed::Token(line.to_string()))
    }
}

/// One JSON document per line, deserialized into `T`.
pub struct JsonLinesParser<T> {
    _token: PhantomData<fn() -> T>,
}

impl<T> JsonLinesParser<T> {
    pub fn new() -> Self {
        Self {
            _token: PhantomData,
        }
    }
}

impl<T> Default for JsonLinesParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonLinesParser<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesParser").finish()
    }
}

impl<T> TokenParser for JsonLinesParser<T>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    type Token = T;

    fn parse(&self, line: &str) -> Result<Parsed<T>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Parsed::Skip);
        }
        serde_json::from_str(line)
            .map(Parsed::Token)
            .map_err(|e| ParseError::new(e.to_string(), line))
    }
}
