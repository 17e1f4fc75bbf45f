//! Cold-start backlog: the last `n` lines of a file.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
};

use encoding_rs::Encoding;

/// Size of each backwards read.
pub const CHUNK_SIZE: u64 = 8 * 1024;

/// Return the final `n` lines of the file at `path`, oldest first.
///
/// The file is read backwards in [`CHUNK_SIZE`] chunks until `n` complete
/// non-blank lines have been collected or the start of the file is reached, so
/// only the tail of a large file is touched. Lines are decoded with
/// `encoding` (undecodable bytes become U+FFFD), stripped of surrounding
/// whitespace, and blank lines are dropped.
///
/// A final line without its newline is left out; the tailer picks it up once
/// the writer finishes it.
pub fn last_lines(path: &Path, n: usize, encoding: &'static Encoding) -> io::Result<Vec<String>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut file = File::open(path)?;
    let mut pos = file.seek(SeekFrom::End(0))?;
    let mut buf: Vec<u8> = Vec::new();

    while pos > 0 && complete_lines(&buf) < n {
        let step = CHUNK_SIZE.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
    }

    let finished = buf.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    buf.truncate(finished);
    let (text, _) = encoding.decode_without_bom_handling(&buf);
    let lines: Vec<&str> = text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].iter().map(|line| (*line).to_owned()).collect())
}

/// Non-blank lines in `buf` known to be complete. The first segment may be
/// the tail end of a line that starts in an earlier chunk, and the last one
/// has no newline yet, so both are skipped.
fn complete_lines(buf: &[u8]) -> usize {
    let Some(last_break) = buf.iter().rposition(|&b| b == b'\n') else {
        return 0;
    };
    buf[..last_break]
        .split(|&b| b == b'\n')
        .skip(1)
        .filter(|segment| segment.iter().any(|b| !b.is_ascii_whitespace()))
        .count()
}

/// Offset just past the last newline before `end`, or 0 when there is none.
pub fn last_line_end(file: &mut File, end: u64) -> io::Result<u64> {
    let mut pos = end;
    while pos > 0 {
        let step = CHUNK_SIZE.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk)?;
        if let Some(i) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(pos + i as u64 + 1);
        }
    }
    Ok(0)
}
