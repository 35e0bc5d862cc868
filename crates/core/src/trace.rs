//! Trace input.
//!
//! Parses line-oriented access traces. Each non-empty, non-comment line is
//! one access:
//!
//! ```text
//! <op> <addr>[ <core_id>]     # op ∈ {r, R, w, W}; addr hex (0x…) or decimal
//! P<id> <op> <addr>           # alternative per-core syntax
//! ```
//!
//! Blank lines and lines whose first non-whitespace character is `#` are
//! ignored. Malformed lines are counted and skipped in lenient mode; in
//! strict mode the first one aborts the run.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::common::{Addr, TraceError};
use crate::stats::TraceStats;

/// One access record from a trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceAccess {
    /// Byte address accessed.
    pub address: Addr,
    /// Whether the access is a write.
    pub is_write: bool,
    /// Issuing core (0 unless the trace says otherwise).
    pub core_id: u32,
}

fn parse_addr(token: &str) -> Result<Addr, String> {
    let parsed = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| format!("bad hex address `{token}`: {e}"))
    } else {
        token
            .parse::<u64>()
            .map_err(|e| format!("bad address `{token}`: {e}"))
    }?;
    Addr::try_from(parsed).map_err(|_| format!("address `{token}` exceeds the 32-bit space"))
}

fn parse_op(token: &str) -> Result<bool, String> {
    match token {
        "r" | "R" => Ok(false),
        "w" | "W" => Ok(true),
        other => Err(format!("unknown op `{other}` (expected r or w)")),
    }
}

fn parse_core(token: &str) -> Result<u32, String> {
    token
        .parse::<u32>()
        .map_err(|e| format!("bad core id `{token}`: {e}"))
}

/// Parses one trace line.
///
/// Returns `Ok(None)` for blank and comment lines, `Ok(Some(_))` for a
/// well-formed access, and `Err(reason)` otherwise.
pub fn parse_line(line: &str) -> Result<Option<TraceAccess>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();

    // `P<id> <op> <addr>` form.
    if let Some(id_str) = tokens[0]
        .strip_prefix('P')
        .or_else(|| tokens[0].strip_prefix('p'))
    {
        if tokens.len() != 3 {
            return Err(format!(
                "expected `P<id> <op> <addr>`, got {} token(s)",
                tokens.len()
            ));
        }
        let core_id = parse_core(id_str)?;
        let is_write = parse_op(tokens[1])?;
        let address = parse_addr(tokens[2])?;
        return Ok(Some(TraceAccess {
            address,
            is_write,
            core_id,
        }));
    }

    // `<op> <addr>[ <core_id>]` form.
    if !(2..=3).contains(&tokens.len()) {
        return Err(format!(
            "expected `<op> <addr>[ <core_id>]`, got {} token(s)",
            tokens.len()
        ));
    }
    let is_write = parse_op(tokens[0])?;
    let address = parse_addr(tokens[1])?;
    let core_id = if tokens.len() == 3 {
        parse_core(tokens[2])?
    } else {
        0
    };
    Ok(Some(TraceAccess {
        address,
        is_write,
        core_id,
    }))
}

/// Streaming trace reader over any buffered source.
#[derive(Debug)]
pub struct TraceReader<R> {
    source: R,
    strict: bool,
    line_no: usize,
    stats: TraceStats,
    buf: String,
}

impl<R: BufRead> TraceReader<R> {
    /// Wraps a buffered source. In strict mode the first malformed line is
    /// surfaced as an error instead of being skipped.
    pub fn new(source: R, strict: bool) -> Self {
        Self {
            source,
            strict,
            line_no: 0,
            stats: TraceStats::default(),
            buf: String::new(),
        }
    }

    /// Line and invalid-line tallies so far.
    pub fn stats(&self) -> TraceStats {
        self.stats
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<TraceAccess, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.source.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(TraceError::Io(e))),
            }
            self.line_no += 1;
            self.stats.lines += 1;
            match parse_line(&self.buf) {
                Ok(Some(access)) => return Some(Ok(access)),
                Ok(None) => {}
                Err(reason) => {
                    if self.strict {
                        return Some(Err(TraceError::Parse {
                            line: self.line_no,
                            reason,
                        }));
                    }
                    self.stats.invalid_lines += 1;
                    warn!(line = self.line_no, %reason, "skipping malformed trace line");
                }
            }
        }
    }
}

/// Reads a whole trace file into memory.
///
/// # Errors
///
/// Returns [`TraceError::Io`] if the file cannot be opened or read, and
/// [`TraceError::Parse`] for the first malformed line when `strict` is set.
pub fn load_trace(path: &Path, strict: bool) -> Result<(Vec<TraceAccess>, TraceStats), TraceError> {
    let file = File::open(path)?;
    let mut reader = TraceReader::new(BufReader::new(file), strict);
    let mut accesses = Vec::new();
    for access in reader.by_ref() {
        accesses.push(access?);
    }
    Ok((accesses, reader.stats()))
}
