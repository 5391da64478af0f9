//! Matching received lines to the command that is waiting for them.
//!
//! A receiver's output is a mix of answers to the current query and status
//! broadcasts for unrelated state (`Z2ON` while asking for `PW?`,
//! `MVMAX 98` after `MV455`). Each [`Command`] carries an [`Expectation`]
//! that says which lines count as its answer; [`correlate`] scans every
//! line received so far and picks them out.

use regex_lite::Regex;

use avrlib_core::error::{Error, Result};

use crate::protocol;

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// A whole-line pattern with an optional exclusion.
///
/// The accept pattern is always anchored at both ends. A line that also
/// matches the reject pattern is treated as unrelated; zone input queries
/// use this to skip the power, volume, and mute lines that share their
/// prefix.
#[derive(Debug, Clone)]
pub struct ResponsePattern {
    accept: Regex,
    reject: Option<Regex>,
}

impl ResponsePattern {
    /// Compile `accept` as a whole-line pattern.
    pub fn new(accept: &str) -> Result<Self> {
        Ok(Self {
            accept: compile(accept)?,
            reject: None,
        })
    }

    /// Also skip lines that match `reject` in full.
    pub fn with_reject(mut self, reject: &str) -> Result<Self> {
        self.reject = Some(compile(reject)?);
        Ok(self)
    }

    /// Match a single line.
    pub fn matches(&self, line: &str) -> Option<Match> {
        if self.reject.as_ref().is_some_and(|r| r.is_match(line)) {
            return None;
        }
        let caps = self.accept.captures(line)?;
        let groups = (1..caps.len())
            .map(|i| caps.get(i).map_or_else(String::new, |m| m.as_str().to_string()))
            .collect();
        Some(Match {
            line: line.to_string(),
            groups,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| Error::InvalidParameter(format!("bad response pattern {pattern:?}: {e}")))
}

// ---------------------------------------------------------------------------
// Commands and replies
// ---------------------------------------------------------------------------

/// Which received lines answer a command.
#[derive(Debug, Clone)]
pub enum Expectation {
    /// The first line matching the pattern.
    Pattern(ResponsePattern),
    /// Every line matching the pattern, collected until the stream goes quiet.
    Table(ResponsePattern),
    /// Nothing is expected; silence is success.
    FireAndForget,
}

/// One command line and how to recognise its answer.
#[derive(Debug, Clone)]
pub struct Command {
    text: String,
    expectation: Expectation,
}

impl Command {
    /// A command answered by a single line.
    pub fn query(text: impl Into<String>, pattern: ResponsePattern) -> Self {
        Self::new(text, Expectation::Pattern(pattern))
    }

    /// A command answered by a run of lines.
    pub fn table(text: impl Into<String>, pattern: ResponsePattern) -> Self {
        Self::new(text, Expectation::Table(pattern))
    }

    /// A command the receiver does not acknowledge.
    pub fn fire_and_forget(text: impl Into<String>) -> Self {
        Self::new(text, Expectation::FireAndForget)
    }

    pub fn new(text: impl Into<String>, expectation: Expectation) -> Self {
        Self {
            text: text.into(),
            expectation,
        }
    }

    /// The line to transmit, without terminator.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the command asks for state; queries get the longer timeout.
    pub fn is_query(&self) -> bool {
        protocol::is_query(&self.text)
    }

    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }
}

/// A line accepted by a [`ResponsePattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The whole trimmed line.
    pub line: String,
    /// Capture groups 1.., with unmatched optional groups as empty strings.
    pub groups: Vec<String>,
}

impl Match {
    /// Capture group 1, or the empty string for a pattern without groups.
    pub fn payload(&self) -> &str {
        self.group(1).unwrap_or("")
    }

    /// Capture group `n` (1-based).
    pub fn group(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .map(String::as_str)
    }
}

/// The resolved answer to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A fire-and-forget command completed without a matching line.
    Silent,
    /// The first line matching a [`Expectation::Pattern`].
    Line(Match),
    /// Every line matching a [`Expectation::Table`], in arrival order.
    Lines(Vec<Match>),
}

impl Reply {
    /// The single matched line, if any.
    pub fn into_line(self) -> Option<Match> {
        match self {
            Reply::Line(m) => Some(m),
            Reply::Lines(mut all) if !all.is_empty() => Some(all.remove(0)),
            _ => None,
        }
    }

    /// All matched lines; empty for [`Reply::Silent`].
    pub fn into_lines(self) -> Vec<Match> {
        match self {
            Reply::Silent => Vec::new(),
            Reply::Line(m) => vec![m],
            Reply::Lines(all) => all,
        }
    }
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// Find the answer to `expectation` among `lines`.
///
/// Pure: the dispatcher re-runs it over the whole attempt each time a chunk
/// arrives, and the same lines always give the same result. Unrelated lines
/// are skipped. Returns `None` when nothing matches yet, and always for
/// [`Expectation::FireAndForget`].
pub fn correlate(lines: &[String], expectation: &Expectation) -> Option<Reply> {
    match expectation {
        Expectation::Pattern(pattern) => lines
            .iter()
            .find_map(|line| pattern.matches(line))
            .map(Reply::Line),
        Expectation::Table(pattern) => {
            let all: Vec<Match> = lines.iter().filter_map(|l| pattern.matches(l)).collect();
            if all.is_empty() {
                None
            } else {
                Some(Reply::Lines(all))
            }
        }
        Expectation::FireAndForget => None,
    }
}
