use std::fs;
use std::path::Path;

use crate::error::Error;

pub const MAX_TAIL_LINES: usize = 1000;
pub const DEFAULT_TAIL_LINES: usize = 50;

/// The last `lines` lines of a log file, line endings preserved. Invalid
/// UTF-8 is replaced rather than rejected.
pub fn tail_lines(path: &Path, lines: usize) -> Result<String, Error> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);

    let all: Vec<&str> = text.split_inclusive('\n').collect();
    let start = all.len().saturating_sub(lines);
    Ok(all[start..].concat())
}
