use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Reads the last `lines` lines written after the final `separator` line.
///
/// # Arguments
/// * `path` - The log file.
/// * `separator` - Prefix of the line that opens each run's section.
/// * `lines` - The number of trailing lines to keep.
///
/// # Returns
/// * The trailing lines, oldest first. Without any separator the whole file
///   counts. A missing file yields an empty list.
pub fn tail_since(path: &Path, separator: &str, lines: usize) -> io::Result<Vec<String>> {
    if lines == 0 || !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut buffer: VecDeque<String> = VecDeque::with_capacity(lines);

    for line in reader.lines().map_while(Result::ok) {
        if line.starts_with(separator) {
            buffer.clear();
            continue;
        }
        if buffer.len() == lines {
            buffer.pop_front();
        }
        buffer.push_back(line);
    }

    Ok(buffer.into())
}

/// Whether any of `lines` reports a failed bind because the address is taken.
pub fn indicates_port_conflict(lines: &[String]) -> bool {
    lines.iter().rev().any(|line| {
        let lower = line.to_ascii_lowercase();
        lower.contains("address already in use")
            || lower.contains("os error 48")
            || lower.contains("os error 98")
            || lower.contains("eaddrinuse")
    })
}
