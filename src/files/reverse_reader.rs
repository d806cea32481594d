// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Buffered reader that yields lines from the end of a seekable source
//! toward its beginning.
//!
//! The reader owns a fixed-size byte buffer refilled from `buffer_size`
//! bytes before the unread region (or from byte 0 near the start), so it
//! never depends on another reader's internal state. Lines shorter than the
//! buffer are delivered intact; longer ones may be split.

use std::io::{Read, Seek, SeekFrom};

pub struct ReverseLineReader<R: Read + Seek> {
    src: R,
    buffer: Vec<u8>,
    /// Unread bytes remaining in the buffer, scanned back to front.
    scan: usize,
    /// File bytes before the buffered region.
    remaining: u64,
    buffer_size: usize,
    exhausted: bool,
}

impl<R: Read + Seek> ReverseLineReader<R> {
    pub fn new(mut src: R, buffer_size: usize) -> std::io::Result<Self> {
        let len = src.seek(SeekFrom::End(0))?;
        Ok(Self {
            src,
            buffer: Vec::new(),
            scan: 0,
            remaining: len,
            buffer_size: buffer_size.max(1),
            exhausted: len == 0,
        })
    }

    /// The next line walking toward the start of the source, without its
    /// terminator; a `\r` preceding the `\n` is stripped. `None` once the
    /// buffer is drained and the source cursor sits at byte 0.
    pub fn read_line(&mut self) -> std::io::Result<Option<String>> {
        if self.exhausted {
            return Ok(None);
        }
        // Collected back to front; reversed on completion.
        let mut collected: Vec<u8> = Vec::new();
        loop {
            if self.scan == 0 {
                if self.remaining == 0 {
                    self.exhausted = true;
                    return Ok(Some(finish_line(collected)));
                }
                self.refill()?;
            }
            while self.scan > 0 {
                let byte = self.buffer[self.scan - 1];
                if byte == b'\n' {
                    self.scan -= 1;
                    return Ok(Some(finish_line(collected)));
                }
                if collected.len() == self.buffer_size {
                    return Ok(Some(finish_line(collected)));
                }
                self.scan -= 1;
                collected.push(byte);
            }
        }
    }

    fn refill(&mut self) -> std::io::Result<()> {
        let start = self.remaining.saturating_sub(self.buffer_size as u64);
        let count = (self.remaining - start) as usize;
        self.src.seek(SeekFrom::Start(start))?;
        self.buffer.resize(count, 0);
        self.src.read_exact(&mut self.buffer)?;
        self.scan = count;
        self.remaining = start;
        Ok(())
    }
}

fn finish_line(mut reversed: Vec<u8>) -> String {
    reversed.reverse();
    if reversed.last() == Some(&b'\r') {
        reversed.pop();
    }
    String::from_utf8_lossy(&reversed).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn read_all(data: &str, buffer_size: usize) -> Vec<String> {
        let mut reader = ReverseLineReader::new(Cursor::new(data.as_bytes()), buffer_size)
            .expect("reader setup failed");
        let mut lines = Vec::new();
        while let Some(line) = reader.read_line().expect("read failed") {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn yields_lines_last_to_first() {
        assert_eq!(read_all("L1\nL2\nL3", 16), vec!["L3", "L2", "L1"]);
    }

    #[test]
    fn strips_carriage_returns() {
        assert_eq!(read_all("a\r\nb\r\nc", 16), vec!["c", "b", "a"]);
    }

    #[test]
    fn trailing_newline_yields_a_leading_empty_line() {
        assert_eq!(read_all("a\nb\n", 16), vec!["", "b", "a"]);
    }

    #[test]
    fn empty_source_has_no_lines() {
        assert!(read_all("", 16).is_empty());
    }

    #[test]
    fn lines_crossing_a_refill_stay_intact() {
        // Buffer of 8, lines of 5+1 bytes straddle every refill boundary.
        let data = "aaaaa\nbbbbb\nccccc\nddddd";
        assert_eq!(read_all(data, 8), vec!["ddddd", "ccccc", "bbbbb", "aaaaa"]);
    }

    #[test]
    fn overlong_lines_are_split_not_lost() {
        let long = "x".repeat(20);
        let data = format!("first\n{long}");
        let pieces = read_all(&data, 8);
        let tail: String = pieces[..pieces.len() - 1].iter().rev().cloned().collect();
        assert_eq!(tail, long);
        assert_eq!(pieces.last().map(String::as_str), Some("first"));
    }

    proptest! {
        #[test]
        fn reverses_any_line_sequence(
            lines in proptest::collection::vec("[a-z0-9 ]{0,20}", 1..12),
            buffer_size in 4usize..64,
        ) {
            let data = lines.join("\n");
            let expected: Vec<String> = lines.into_iter().rev().collect();
            // Lines longer than the buffer may legitimately split.
            prop_assume!(expected.iter().all(|l| l.len() <= buffer_size));
            prop_assert_eq!(read_all(&data, buffer_size), expected);
        }
    }
}
