//! Trace parsing unit tests.

use std::io::{Cursor, Write as _};

use cachesim_core::common::TraceError;
use cachesim_core::trace::{TraceAccess, TraceReader, load_trace, parse_line};
use pretty_assertions::assert_eq;

fn access(address: u32, is_write: bool, core_id: u32) -> TraceAccess {
    TraceAccess {
        address,
        is_write,
        core_id,
    }
}

// ══════════════════════════════════════════════════════════
// 1. Line forms
// ══════════════════════════════════════════════════════════

/// `<op> <addr>` with hex and decimal addresses, both cases.
#[test]
fn parses_basic_forms() {
    assert_eq!(
        parse_line("r 0x1000").unwrap(),
        Some(access(0x1000, false, 0))
    );
    assert_eq!(parse_line("W 4096").unwrap(), Some(access(4096, true, 0)));
    assert_eq!(
        parse_line("R 0X20").unwrap(),
        Some(access(0x20, false, 0)),
        "uppercase hex prefix"
    );
    assert_eq!(parse_line("w 0x0").unwrap(), Some(access(0, true, 0)));
}

/// A trailing core id attaches the access to that core.
#[test]
fn parses_trailing_core_id() {
    assert_eq!(
        parse_line("r 0x1000 3").unwrap(),
        Some(access(0x1000, false, 3))
    );
}

/// The `P<id> <op> <addr>` alternative syntax.
#[test]
fn parses_per_core_prefix_form() {
    assert_eq!(
        parse_line("P2 w 0x2000").unwrap(),
        Some(access(0x2000, true, 2))
    );
    assert_eq!(
        parse_line("p0 R 128").unwrap(),
        Some(access(128, false, 0)),
        "lowercase prefix accepted"
    );
}

/// Blank lines and `#` comments produce nothing.
#[test]
fn skips_blanks_and_comments() {
    assert_eq!(parse_line("").unwrap(), None);
    assert_eq!(parse_line("   \t ").unwrap(), None);
    assert_eq!(parse_line("# a comment").unwrap(), None);
    assert_eq!(parse_line("   # indented comment").unwrap(), None);
}

/// Leading and trailing whitespace is tolerated.
#[test]
fn tolerates_surrounding_whitespace() {
    assert_eq!(
        parse_line("  r\t0x40  ").unwrap(),
        Some(access(0x40, false, 0))
    );
}

// ══════════════════════════════════════════════════════════
// 2. Malformed lines
// ══════════════════════════════════════════════════════════

/// Unknown ops, bad numbers, and wrong arity are rejected with reasons.
#[test]
fn rejects_malformed_lines() {
    assert!(parse_line("x 0x1000").is_err(), "unknown op");
    assert!(parse_line("r zzz").is_err(), "unparseable address");
    assert!(parse_line("r").is_err(), "missing address");
    assert!(parse_line("r 0x10 1 extra").is_err(), "too many tokens");
    assert!(parse_line("P w 0x10").is_err(), "missing core id after P");
    assert!(
        parse_line("r 0x100000000").is_err(),
        "address beyond 32 bits"
    );
}

// ══════════════════════════════════════════════════════════
// 3. Streaming reader
// ══════════════════════════════════════════════════════════

/// Lenient mode counts and skips bad lines, yielding the good ones.
#[test]
fn lenient_reader_skips_and_counts() {
    let text = "r 0x1000\nbogus line\n# comment\nw 0x2000\n";
    let mut reader = TraceReader::new(Cursor::new(text), false);
    let accesses: Vec<_> = reader.by_ref().map(Result::unwrap).collect();
    assert_eq!(
        accesses,
        vec![access(0x1000, false, 0), access(0x2000, true, 0)]
    );
    let stats = reader.stats();
    assert_eq!(stats.lines, 4);
    assert_eq!(stats.invalid_lines, 1);
}

/// Strict mode surfaces the first bad line with its number.
#[test]
fn strict_reader_fails_fast() {
    let text = "r 0x1000\nbogus\n";
    let mut reader = TraceReader::new(Cursor::new(text), true);
    assert!(reader.next().unwrap().is_ok());
    match reader.next().unwrap() {
        Err(TraceError::Parse { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected parse error, got {other:?}"),
    }
}

// ══════════════════════════════════════════════════════════
// 4. File loading
// ══════════════════════════════════════════════════════════

/// `load_trace` reads a whole file and reports reader tallies.
#[test]
fn load_trace_reads_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "# warmup").unwrap();
    writeln!(file, "r 0x1000").unwrap();
    writeln!(file, "P1 w 0x40").unwrap();
    let (accesses, stats) = load_trace(file.path(), false).expect("readable");
    assert_eq!(
        accesses,
        vec![access(0x1000, false, 0), access(0x40, true, 1)]
    );
    assert_eq!(stats.lines, 3);
    assert_eq!(stats.invalid_lines, 0);
}

/// A missing file is an I/O error.
#[test]
fn missing_file_is_io_error() {
    let result = load_trace(std::path::Path::new("/nonexistent/trace.txt"), false);
    assert!(matches!(result, Err(TraceError::Io(_))));
}
