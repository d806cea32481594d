// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types shared across the command layer.

use std::fmt;
use std::io;

/// An error raised by the tokenizer, parameter coercion, path resolution,
/// or the file-information scans.
#[derive(Debug)]
pub enum CodeError {
    /// Malformed G-code at the given byte offset of the source stream.
    Parse { offset: u64, message: String },
    /// A parameter could not be coerced to the requested type.
    TypeMismatch {
        letter: char,
        requested: &'static str,
        stored: String,
    },
    /// A virtual path named a drive that is not present or not mounted.
    InvalidDrive { drive: usize },
    /// An underlying read or seek failed.
    Io(io::Error),
    /// The operation was cancelled through its token.
    Cancelled,
}

impl CodeError {
    pub fn parse(offset: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }

    pub fn type_mismatch(letter: char, requested: &'static str, stored: &str) -> Self {
        Self::TypeMismatch {
            letter,
            requested,
            stored: stored.to_string(),
        }
    }
}

impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { offset, message } => {
                write!(f, "parse error at byte {offset}: {message}")
            }
            Self::TypeMismatch {
                letter,
                requested,
                stored,
            } => write!(
                f,
                "parameter '{letter}' cannot be read as {requested} (value \"{stored}\")"
            ),
            Self::InvalidDrive { drive } => write!(f, "invalid drive {drive}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for CodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for CodeError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
