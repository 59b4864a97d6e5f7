//! One-shot parse state for the parser front ends.

use crate::error::{Construct, IsoError, Result};

/// Lifecycle of a parser object.
///
/// A parser is parsed at most once. Asking again after success returns the
/// cached value; asking again after failure yields [`IsoError::Invalid`]
/// since the specific diagnostic was already handed out.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParseState<T> {
    #[default]
    Unparsed,
    Parsed(T),
    Failed,
}

impl<T> ParseState<T> {
    pub(crate) fn resolve(
        &mut self,
        construct: Construct,
        parse: impl FnOnce() -> Result<T>,
    ) -> Result<&T> {
        if matches!(self, ParseState::Unparsed) {
            match parse() {
                Ok(value) => *self = ParseState::Parsed(value),
                Err(err) => {
                    tracing::debug!(%construct, error = %err, "ISO 8601 parse failed");
                    *self = ParseState::Failed;
                    return Err(err);
                }
            }
        }
        match &*self {
            ParseState::Parsed(value) => Ok(value),
            _ => Err(IsoError::Invalid(construct)),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            ParseState::Parsed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseState::Parsed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ParseState::Failed)
    }
}
