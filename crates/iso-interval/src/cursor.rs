//! Character cursor shared by the date, duration and interval grammars.
//!
//! A cursor is a borrowed source plus a byte position. It is `Copy`, so a
//! grammar can look ahead by cloning and commit by assignment.

use crate::error::{Construct, IsoError};

/// The Unicode minus sign, accepted wherever an ASCII `-` sign is.
pub(crate) const MINUS_SIGN: char = '\u{2212}';

#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    stop: Option<char>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            stop: None,
        }
    }

    /// Start at `pos`, clamped to a char boundary inside `src`.
    pub(crate) fn at(src: &'a str, pos: usize) -> Self {
        let mut pos = pos.min(src.len());
        while !src.is_char_boundary(pos) {
            pos -= 1;
        }
        Self {
            src,
            pos,
            stop: None,
        }
    }

    /// Treat `stop` as end of input.
    pub(crate) fn with_stop(mut self, stop: Option<char>) -> Self {
        self.stop = stop;
        self
    }

    /// Next char, or `None` at end of input or at the stop char.
    pub(crate) fn peek(&self) -> Option<char> {
        self.raw_peek().filter(|c| Some(*c) != self.stop)
    }

    /// Char `n` positions ahead, with the stop char ending the lookahead.
    pub(crate) fn peek_nth(&self, n: usize) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        for _ in 0..n {
            match chars.next() {
                Some(c) if Some(c) != self.stop => {}
                _ => return None,
            }
        }
        chars.next().filter(|c| Some(*c) != self.stop)
    }

    /// Next char ignoring the stop char.
    pub(crate) fn raw_peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.raw_peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume `c` if it is next.
    pub(crate) fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_digit(&mut self) -> Option<u32> {
        let d = self.peek()?.to_digit(10)?;
        self.pos += 1;
        Some(d)
    }

    pub(crate) fn is_done(&self) -> bool {
        self.peek().is_none()
    }

    pub(crate) fn parsed(&self) -> &'a str {
        &self.src[..self.pos]
    }

    /// Char column of the cursor.
    pub(crate) fn column(&self) -> usize {
        self.parsed().chars().count()
    }

    pub(crate) fn unexpected(&self, construct: Construct) -> IsoError {
        IsoError::UnexpectedCharacter {
            construct,
            parsed: self.parsed().to_string(),
            found: self.raw_peek(),
            column: self.column(),
        }
    }

    pub(crate) fn unbalanced(&self, construct: Construct) -> IsoError {
        IsoError::UnbalancedSeparators {
            construct,
            parsed: self.parsed().to_string(),
            found: self.raw_peek(),
            column: self.column(),
        }
    }
}
