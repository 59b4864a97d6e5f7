//! Error types for ISO 8601 parsing and arithmetic.

use std::fmt;

use thiserror::Error;

/// The ISO 8601 construct an error was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Construct {
    Date,
    Duration,
    Interval,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Construct::Date => "date",
            Construct::Duration => "duration",
            Construct::Interval => "interval",
        })
    }
}

/// Coarse error class.
///
/// `Type` is a caller contract violation (nothing to parse at all), `Range`
/// covers every grammar, semantic and arithmetic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Type,
    Range,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IsoError {
    #[error("ISO 8601 {0} source is required and must be a non-empty string")]
    MissingSource(Construct),

    #[error("Unexpected ISO 8601 {construct} character \"{parsed}[{}]\" at {column}", eol(.found))]
    UnexpectedCharacter {
        construct: Construct,
        parsed: String,
        found: Option<char>,
        column: usize,
    },

    #[error("Unexpected ISO 8601 {construct} separator \"{parsed}[{}]\" at {column}, date and time separators are unbalanced", eol(.found))]
    UnbalancedSeparators {
        construct: Construct,
        parsed: String,
        found: Option<char>,
        column: usize,
    },

    #[error("Invalid ISO 8601 {what} \"{text}\"")]
    InvalidValue { what: &'static str, text: String },

    #[error("ISO 8601 interval \"{0}\" combination is not allowed")]
    IllegalCombination(String),

    #[error("ISO 8601 interval end date occur before start date")]
    EndBeforeStart,

    #[error("ISO 8601 {construct} {what} is too long, at most {limit} characters are allowed")]
    TooLong {
        construct: Construct,
        what: &'static str,
        limit: usize,
    },

    #[error("ISO 8601 duration fractions are allowed on the smallest unit in the string, e.g. P0.5D or PT1.001S but not P0.5DT1H")]
    FractionNotLast,

    #[error("ISO 8601 {0} is out of range")]
    OutOfRange(Construct),

    #[error("Invalid ISO 8601 {0}")]
    Invalid(Construct),
}

impl IsoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IsoError::MissingSource(_) => ErrorKind::Type,
            _ => ErrorKind::Range,
        }
    }
}

fn eol(found: &Option<char>) -> String {
    found.map_or_else(|| "EOL".to_string(), String::from)
}

pub type Result<T> = std::result::Result<T, IsoError>;
