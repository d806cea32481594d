// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Letter-tagged parameter values with deferred polymorphic coercion.
//!
//! A parameter stores its source text verbatim; every `as_*` accessor parses
//! on demand and fails with `TypeMismatch` when the coercion is impossible.

use std::fmt;

use crate::core::error::CodeError;

/// The letter used for values that appear without a preceding letter.
pub const IMPLICIT_LETTER: char = '@';

/// A hardware driver address, `(board << 16) | port`, serialized as `b.d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverId {
    pub board: u16,
    pub port: u16,
}

impl DriverId {
    pub fn new(board: u16, port: u16) -> Self {
        Self { board, port }
    }

    pub fn as_u32(self) -> u32 {
        (u32::from(self.board) << 16) | u32::from(self.port)
    }
}

impl From<u32> for DriverId {
    fn from(value: u32) -> Self {
        Self {
            board: (value >> 16) as u16,
            port: (value & 0xFFFF) as u16,
        }
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.board, self.port)
    }
}

/// A single code parameter: an uppercased letter and the raw source text of
/// its value, quotes and braces included.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub letter: char,
    pub raw: String,
}

impl Parameter {
    pub fn new(letter: char, raw: impl Into<String>) -> Self {
        Self {
            letter: letter.to_ascii_uppercase(),
            raw: raw.into(),
        }
    }

    /// True when the value is a `{…}` expression placeholder.
    pub fn is_expression(&self) -> bool {
        self.raw.starts_with('{')
    }

    /// True when the value is a quoted string literal.
    pub fn is_string(&self) -> bool {
        self.raw.starts_with('"')
    }

    /// The string form of the value: quoted literals are unescaped, numeric
    /// values come back as their source text, expressions verbatim.
    pub fn as_string(&self) -> String {
        if self.is_string() {
            unescape_quoted(&self.raw)
        } else {
            self.raw.clone()
        }
    }

    pub fn as_float(&self) -> Result<f64, CodeError> {
        if self.is_expression() || self.is_string() {
            return Err(self.mismatch("float"));
        }
        if self.raw.is_empty() {
            return Ok(0.0);
        }
        self.raw
            .trim()
            .parse::<f64>()
            .map_err(|_| self.mismatch("float"))
    }

    pub fn as_integer(&self) -> Result<i64, CodeError> {
        if self.is_expression() || self.is_string() {
            return Err(self.mismatch("integer"));
        }
        if self.raw.is_empty() {
            return Ok(0);
        }
        let text = self.raw.trim();
        if let Ok(value) = text.parse::<i64>() {
            return Ok(value);
        }
        // Lossy narrowing from float text, rounding half away from zero.
        let value = text.parse::<f64>().map_err(|_| self.mismatch("integer"))?;
        let rounded = value.round();
        if rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
            return Err(self.mismatch("integer"));
        }
        Ok(rounded as i64)
    }

    pub fn as_unsigned(&self) -> Result<u64, CodeError> {
        let value = self
            .as_integer()
            .map_err(|_| self.mismatch("unsigned integer"))?;
        u64::try_from(value).map_err(|_| self.mismatch("unsigned integer"))
    }

    pub fn as_bool(&self) -> Result<bool, CodeError> {
        match self.raw.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Ok(self.as_integer().map_err(|_| self.mismatch("bool"))? != 0),
        }
    }

    pub fn as_int_array(&self) -> Result<Vec<i64>, CodeError> {
        self.array_elements("integer array")?
            .iter()
            .map(|e| {
                e.parse::<i64>()
                    .or_else(|_| e.parse::<f64>().map(|f| f.round() as i64))
                    .map_err(|_| self.mismatch("integer array"))
            })
            .collect()
    }

    pub fn as_uint_array(&self) -> Result<Vec<u64>, CodeError> {
        self.as_int_array()
            .map_err(|_| self.mismatch("unsigned integer array"))?
            .into_iter()
            .map(|v| u64::try_from(v).map_err(|_| self.mismatch("unsigned integer array")))
            .collect()
    }

    pub fn as_float_array(&self) -> Result<Vec<f64>, CodeError> {
        self.array_elements("float array")?
            .iter()
            .map(|e| e.parse::<f64>().map_err(|_| self.mismatch("float array")))
            .collect()
    }

    pub fn as_driver_id(&self) -> Result<DriverId, CodeError> {
        if self.is_expression() || self.is_string() {
            return Err(self.mismatch("driver id"));
        }
        parse_driver_id(self.raw.trim()).ok_or_else(|| self.mismatch("driver id"))
    }

    pub fn as_driver_id_array(&self) -> Result<Vec<DriverId>, CodeError> {
        self.array_elements("driver id array")?
            .iter()
            .map(|e| parse_driver_id(e).ok_or_else(|| self.mismatch("driver id array")))
            .collect()
    }

    /// Splits the raw text on `:`. A scalar becomes a singleton; an empty
    /// element anywhere (including a trailing `:`) is a coercion failure.
    fn array_elements(&self, requested: &'static str) -> Result<Vec<String>, CodeError> {
        if self.is_expression() || self.is_string() {
            return Err(self.mismatch(requested));
        }
        let text = self.raw.trim();
        if text.is_empty() {
            return Ok(vec!["0".to_string()]);
        }
        let elements: Vec<String> = text.split(':').map(str::to_string).collect();
        if elements.iter().any(String::is_empty) {
            return Err(self.mismatch(requested));
        }
        Ok(elements)
    }

    fn mismatch(&self, requested: &'static str) -> CodeError {
        CodeError::type_mismatch(self.letter, requested, &self.raw)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.letter == IMPLICIT_LETTER {
            write!(f, "{}", self.raw)
        } else {
            write!(f, "{}{}", self.letter, self.raw)
        }
    }
}

/// Parses `b.d` or a plain integer into a driver id.
fn parse_driver_id(text: &str) -> Option<DriverId> {
    if let Some((board, port)) = text.split_once('.') {
        let board = board.parse::<u16>().ok()?;
        let port = port.parse::<u16>().ok()?;
        return Some(DriverId::new(board, port));
    }
    text.parse::<u32>().ok().map(DriverId::from)
}

/// Strips the outer quotes of a quoted literal and collapses doubled quotes.
pub(crate) fn unescape_quoted(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' && chars.peek() == Some(&'"') {
            chars.next();
        }
        out.push(c);
    }
    out
}
