// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Pull-based tokenizer for RepRapFirmware-style G-code.
//!
//! One `parse` call produces one code. The caller owns the `Code` record
//! (cleared and refilled on every call) and the `enforcing_abs` carry bit,
//! so line-boundary behavior stays visible to the caller: the bit is set by
//! a bare `G53` prefix and cleared again when the physical line ends.

use crate::core::code::{Code, CodeFlags, CodeType, Keyword};
use crate::core::error::CodeError;
use crate::core::parameter::{Parameter, IMPLICIT_LETTER};

pub struct CodeTokenizer<'a> {
    text: &'a str,
    cursor: usize,
    at_line_start: bool,
    // True once a code on the current physical line has been emitted, so
    // keyword and G53-prefix detection stay confined to the line head.
    mid_line: bool,
    line_indent: usize,
    line_number: Option<i64>,
}

impl<'a> CodeTokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            cursor: 0,
            at_line_start: true,
            mid_line: false,
            line_indent: 0,
            line_number: None,
        }
    }

    /// Parses the next code into `code`. Returns `Ok(false)` at the end of
    /// the stream. Comment-only and empty lines produce codes of type
    /// `Comment` and `None` respectively.
    pub fn parse(&mut self, code: &mut Code, enforcing_abs: &mut bool) -> Result<bool, CodeError> {
        code.reset();
        if self.cursor >= self.text.len() {
            return Ok(false);
        }

        if self.at_line_start {
            self.read_line_start()?;
        }
        code.indent = self.line_indent;
        code.line_number = self.line_number;

        // Comments and line ends ahead of any command resolve first.
        loop {
            self.skip_spaces();
            match self.peek() {
                None => {
                    if code.file_position.is_none() {
                        code.file_position = Some(self.cursor as u64);
                    }
                    seal(code, *enforcing_abs);
                    return Ok(true);
                }
                Some(b'\r') | Some(b'\n') => {
                    if code.file_position.is_none() {
                        code.file_position = Some(self.cursor as u64);
                    }
                    seal(code, *enforcing_abs);
                    self.consume_line_break(enforcing_abs);
                    return Ok(true);
                }
                Some(b';') => {
                    if code.file_position.is_none() {
                        code.file_position = Some(self.cursor as u64);
                    }
                    self.read_eol_comment(code);
                }
                Some(b'(') => {
                    if code.file_position.is_none() {
                        code.file_position = Some(self.cursor as u64);
                    }
                    self.read_paren_comment(code);
                }
                Some(_) => break,
            }
        }

        loop {
            code.file_position = Some(self.cursor as u64);

            if !self.mid_line {
                let word_start = self.cursor;
                let word = self.scan_word();
                if let Some(keyword) = Keyword::parse(word) {
                    return self.parse_keyword_line(code, keyword, enforcing_abs);
                }
                self.cursor = word_start;
            }

            let letter = self.peek().unwrap_or(b'\0');
            let code_type = match letter.to_ascii_uppercase() {
                b'G' => CodeType::GCode,
                b'M' => CodeType::MCode,
                b'T' => CodeType::TCode,
                _ => {
                    return Err(CodeError::parse(
                        self.cursor as u64,
                        format!("invalid character at command position: '{}'", letter as char),
                    ));
                }
            };
            self.cursor += 1;

            if self.peek() == Some(b'-') {
                return Err(CodeError::parse(
                    self.cursor as u64,
                    "command number must not be negative",
                ));
            }
            let major = self.scan_u32("expected a command number")?;
            let minor = if self.peek() == Some(b'.') {
                self.cursor += 1;
                Some(self.scan_u32("expected digits after the decimal point")?)
            } else {
                None
            };

            // A bare G53 at the line head is a modifier for its siblings,
            // not a code of its own.
            if !self.mid_line && code_type == CodeType::GCode && major == 53 && minor.is_none() {
                self.skip_spaces();
                if let Some(next) = self.peek() {
                    if matches!(next.to_ascii_uppercase(), b'G' | b'M' | b'T') {
                        *enforcing_abs = true;
                        self.mid_line = true;
                        continue;
                    }
                }
            }

            code.code_type = code_type;
            code.major_number = Some(major);
            code.minor_number = minor;
            break;
        }

        self.parse_parameters(code, enforcing_abs)
    }

    fn parse_parameters(
        &mut self,
        code: &mut Code,
        enforcing_abs: &mut bool,
    ) -> Result<bool, CodeError> {
        let arg_start = self.cursor;
        let mut arg_end: Option<usize> = None;
        loop {
            self.skip_spaces();
            match self.peek() {
                None | Some(b'\r') | Some(b'\n') => {
                    let end = arg_end.unwrap_or(self.cursor);
                    code.raw_argument = self.text[arg_start..end].trim().to_string();
                    seal(code, *enforcing_abs);
                    self.consume_line_break(enforcing_abs);
                    return Ok(true);
                }
                Some(b';') => {
                    arg_end.get_or_insert(self.cursor);
                    self.read_eol_comment(code);
                }
                Some(b'(') => {
                    arg_end.get_or_insert(self.cursor);
                    self.read_paren_comment(code);
                }
                Some(c) if c.is_ascii_alphabetic() => {
                    if matches!(c.to_ascii_uppercase(), b'G' | b'M')
                        && self.peek_at(1).is_some_and(|b| b.is_ascii_digit())
                    {
                        // A fresh command on the same physical line.
                        let end = arg_end.unwrap_or(self.cursor);
                        code.raw_argument = self.text[arg_start..end].trim().to_string();
                        seal(code, *enforcing_abs);
                        self.mid_line = true;
                        return Ok(true);
                    }
                    self.cursor += 1;
                    let raw = self.read_value()?;
                    code.parameters.push(Parameter::new(letter_of(c), raw));
                }
                Some(_) => {
                    // A value with no letter keeps the implicit letter.
                    let raw = self.read_value()?;
                    code.parameters.push(Parameter::new(IMPLICIT_LETTER, raw));
                }
            }
        }
    }

    fn parse_keyword_line(
        &mut self,
        code: &mut Code,
        keyword: Keyword,
        enforcing_abs: &mut bool,
    ) -> Result<bool, CodeError> {
        code.code_type = CodeType::Keyword;
        code.keyword = Some(keyword);

        let arg_offset = self.cursor;
        let mut argument: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\r') | Some(b'\n') => break,
                Some(b'"') => {
                    let literal = self.read_quoted()?;
                    argument.extend_from_slice(literal.as_bytes());
                }
                Some(b';') => {
                    self.read_eol_comment(code);
                    break;
                }
                Some(b'(') => {
                    self.read_paren_comment(code);
                }
                Some(c) => {
                    argument.push(c);
                    self.cursor += 1;
                }
            }
        }

        let argument = String::from_utf8_lossy(&argument);
        let trimmed = argument.trim();
        if keyword.takes_argument() {
            code.keyword_argument = Some(trimmed.to_string());
        } else if !trimmed.is_empty() {
            return Err(CodeError::parse(
                arg_offset as u64,
                format!("unexpected argument after '{}'", keyword.as_str()),
            ));
        }

        seal(code, *enforcing_abs);
        self.consume_line_break(enforcing_abs);
        Ok(true)
    }

    /// Reads one parameter value: a quoted literal, a braced expression, or
    /// a raw run ending at whitespace, a comment, a letter, or the line end.
    fn read_value(&mut self) -> Result<&'a str, CodeError> {
        match self.peek() {
            Some(b'"') => self.read_quoted(),
            Some(b'{') => self.read_expression(),
            _ => {
                let start = self.cursor;
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphabetic()
                        || matches!(c, b' ' | b'\t' | b';' | b'(' | b'\r' | b'\n')
                    {
                        break;
                    }
                    self.cursor += 1;
                }
                Ok(&self.text[start..self.cursor])
            }
        }
    }

    /// Reads a `"…"` literal including the quotes; `""` escapes a quote.
    fn read_quoted(&mut self) -> Result<&'a str, CodeError> {
        let start = self.cursor;
        self.cursor += 1;
        loop {
            match self.peek() {
                None | Some(b'\r') | Some(b'\n') => {
                    return Err(CodeError::parse(start as u64, "unterminated string literal"));
                }
                Some(b'"') => {
                    self.cursor += 1;
                    if self.peek() == Some(b'"') {
                        self.cursor += 1;
                    } else {
                        return Ok(&self.text[start..self.cursor]);
                    }
                }
                Some(_) => self.cursor += 1,
            }
        }
    }

    /// Reads a `{…}` expression verbatim, honoring nested braces and quoted
    /// strings inside the expression.
    fn read_expression(&mut self) -> Result<&'a str, CodeError> {
        let start = self.cursor;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None | Some(b'\r') | Some(b'\n') => {
                    return Err(CodeError::parse(start as u64, "unterminated expression"));
                }
                Some(b'{') => {
                    depth += 1;
                    self.cursor += 1;
                }
                Some(b'}') => {
                    depth -= 1;
                    self.cursor += 1;
                    if depth == 0 {
                        return Ok(&self.text[start..self.cursor]);
                    }
                }
                Some(b'"') => {
                    self.read_quoted()?;
                }
                Some(_) => self.cursor += 1,
            }
        }
    }

    fn read_eol_comment(&mut self, code: &mut Code) {
        self.cursor += 1;
        let start = self.cursor;
        while !matches!(self.peek(), None | Some(b'\r') | Some(b'\n')) {
            self.cursor += 1;
        }
        append_comment(code, &self.text[start..self.cursor]);
    }

    /// Inline `(…)` comment; an unterminated one extends to the line end.
    fn read_paren_comment(&mut self, code: &mut Code) {
        self.cursor += 1;
        let start = self.cursor;
        while !matches!(self.peek(), None | Some(b')') | Some(b'\r') | Some(b'\n')) {
            self.cursor += 1;
        }
        append_comment(code, &self.text[start..self.cursor]);
        if self.peek() == Some(b')') {
            self.cursor += 1;
        }
    }

    fn read_line_start(&mut self) -> Result<(), CodeError> {
        self.at_line_start = false;
        self.mid_line = false;
        self.line_indent = 0;
        self.line_number = None;
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.line_indent += 1;
            self.cursor += 1;
        }
        if matches!(self.peek(), Some(b'N') | Some(b'n'))
            && self.peek_at(1).is_some_and(|b| b.is_ascii_digit())
        {
            self.cursor += 1;
            let digits = self.scan_digits();
            let number = digits
                .parse::<i64>()
                .map_err(|_| CodeError::parse(self.cursor as u64, "line number out of range"))?;
            self.line_number = Some(number);
        }
        Ok(())
    }

    fn consume_line_break(&mut self, enforcing_abs: &mut bool) {
        if self.peek() == Some(b'\r') {
            self.cursor += 1;
        }
        if self.peek() == Some(b'\n') {
            self.cursor += 1;
        }
        self.at_line_start = true;
        self.mid_line = false;
        self.line_indent = 0;
        self.line_number = None;
        *enforcing_abs = false;
    }

    fn scan_word(&mut self) -> &'a str {
        let start = self.cursor;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.cursor += 1;
        }
        &self.text[start..self.cursor]
    }

    fn scan_digits(&mut self) -> &'a str {
        let start = self.cursor;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.cursor += 1;
        }
        &self.text[start..self.cursor]
    }

    fn scan_u32(&mut self, expected: &str) -> Result<u32, CodeError> {
        let offset = self.cursor as u64;
        let digits = self.scan_digits();
        if digits.is_empty() {
            return Err(CodeError::parse(offset, expected));
        }
        digits
            .parse::<u32>()
            .map_err(|_| CodeError::parse(offset, "command number out of range"))
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.cursor += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.cursor).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.text.as_bytes().get(self.cursor + offset).copied()
    }
}

/// Fixes up a finished code: comment-only lines get the `Comment` type and
/// the `G53` carry marks every sibling it covers.
fn seal(code: &mut Code, enforcing_abs: bool) {
    if code.code_type == CodeType::None && code.comment.is_some() {
        code.code_type = CodeType::Comment;
    }
    if enforcing_abs {
        code.flags.insert(CodeFlags::ENFORCE_ABSOLUTE_POSITION);
    }
}

fn append_comment(code: &mut Code, text: &str) {
    match &mut code.comment {
        Some(comment) => comment.push_str(text),
        None => code.comment = Some(text.to_string()),
    }
}

fn letter_of(byte: u8) -> char {
    byte.to_ascii_uppercase() as char
}

/// Iterator over the codes of a text blob, skipping empty lines. The
/// `enforcing_abs` carry lives inside the stream and resets at every
/// physical line boundary.
pub struct CodeStream<'a> {
    tokenizer: CodeTokenizer<'a>,
    enforcing_abs: bool,
    failed: bool,
}

impl<'a> CodeStream<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            tokenizer: CodeTokenizer::new(text),
            enforcing_abs: false,
            failed: false,
        }
    }
}

impl Iterator for CodeStream<'_> {
    type Item = Result<Code, CodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut code = Code::new();
        loop {
            match self.tokenizer.parse(&mut code, &mut self.enforcing_abs) {
                Ok(true) => {
                    if code.code_type == CodeType::None {
                        continue;
                    }
                    return Some(Ok(code));
                }
                Ok(false) => return None,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Splits a whole text blob into codes, stopping at the first parse error.
pub fn split_codes(text: &str) -> Result<Vec<Code>, CodeError> {
    CodeStream::new(text).collect()
}
