// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Print-file metadata extraction.
//!
//! Slicers leave their metadata near the head and tail of a job file, so
//! the scans read at most `file_info_read_limit_header` bytes forward and
//! `file_info_read_limit_footer` bytes backward and never touch the middle.
//! Comment lines run through the configured filter lists; move codes feed
//! the first-layer-height and object-height heuristics.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::SystemTime;

use regex::Regex;

use crate::config::Settings;
use crate::core::code::{Code, CodeType};
use crate::core::error::CodeError;
use crate::files::paths::{DirectoryCategory, PathResolver};
use crate::files::reverse_reader::ReverseLineReader;
use crate::files::CancelToken;
use crate::tokenizer::CodeTokenizer;

/// Everything the scans can learn about a print file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFileInfo {
    /// Virtual path of the file.
    pub file_name: String,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
    pub first_layer_height: Option<f64>,
    pub layer_height: Option<f64>,
    /// Object height in mm, from the last absolute `Z` move of the file.
    pub height: Option<f64>,
    pub num_layers: Option<u32>,
    /// Filament usage per extruder, in mm.
    pub filament_used: Vec<f64>,
    pub generated_by: Option<String>,
    /// Estimated print time in seconds.
    pub print_time: Option<u64>,
    /// Simulated print time in seconds.
    pub simulated_time: Option<u64>,
}

impl ParsedFileInfo {
    /// True once every field the scans can stop on has been found.
    pub fn is_complete(&self) -> bool {
        self.height.is_some()
            && self.first_layer_height.is_some()
            && self.layer_height.is_some()
            && !self.filament_used.is_empty()
            && self.generated_by.is_some()
    }
}

/// A time filter sums its optional named groups `h`, `m`, `s` into seconds.
struct TimeFilter(Regex);

impl TimeFilter {
    fn extract(&self, line: &str) -> Option<u64> {
        let captures = self.0.captures(line)?;
        let mut seconds = 0.0;
        let mut matched = false;
        for (group, scale) in [("h", 3600.0), ("m", 60.0), ("s", 1.0)] {
            if let Some(value) = captures.name(group) {
                if let Ok(value) = value.as_str().parse::<f64>() {
                    seconds += value * scale;
                    matched = true;
                }
            }
        }
        matched.then(|| seconds.round() as u64)
    }
}

/// A filament filter gates the line; values are then harvested from the
/// match onward. The unit comes from the named group the pattern declares:
/// `mm` is taken directly, `m` scales by 1000.
struct FilamentFilter {
    gate: Regex,
    meters: bool,
}

struct Filters {
    layer_height: Vec<Regex>,
    filament: Vec<FilamentFilter>,
    generated_by: Vec<Regex>,
    print_time: Vec<TimeFilter>,
    simulated_time: Vec<TimeFilter>,
    number: Regex,
}

impl Filters {
    fn compile(settings: &Settings) -> Result<Self, CodeError> {
        Ok(Self {
            layer_height: compile_list(&settings.layer_height_filters)?,
            filament: compile_list(&settings.filament_filters)?
                .into_iter()
                .map(|gate| {
                    let names: Vec<&str> = gate.capture_names().flatten().collect();
                    let meters = names.contains(&"m") && !names.contains(&"mm");
                    FilamentFilter { gate, meters }
                })
                .collect(),
            generated_by: compile_list(&settings.generated_by_filters)?,
            print_time: compile_list(&settings.print_time_filters)?
                .into_iter()
                .map(TimeFilter)
                .collect(),
            simulated_time: compile_list(&settings.simulated_time_filters)?
                .into_iter()
                .map(TimeFilter)
                .collect(),
            number: Regex::new(r"\d+\.?\d*").map_err(|e| bad_pattern(&e))?,
        })
    }
}

fn compile_list(patterns: &[String]) -> Result<Vec<Regex>, CodeError> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).map_err(|e| bad_pattern(&e)))
        .collect()
}

fn bad_pattern(err: &regex::Error) -> CodeError {
    CodeError::parse(0, format!("invalid filter pattern: {err}"))
}

pub struct FileInfoParser {
    settings: Settings,
    filters: Filters,
    resolver: PathResolver,
}

impl FileInfoParser {
    /// Compiles the configured filters once. A malformed pattern fails here
    /// rather than on the first scan.
    pub fn new(settings: Settings, resolver: PathResolver) -> Result<Self, CodeError> {
        let filters = Filters::compile(&settings)?;
        Ok(Self {
            settings,
            filters,
            resolver,
        })
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Scans the head and tail of the file behind `virtual_path`. Whatever
    /// was collected when the scans end is returned; only I/O failures and
    /// cancellation abort.
    pub fn parse(
        &self,
        virtual_path: &str,
        cancel: &CancelToken,
    ) -> Result<ParsedFileInfo, CodeError> {
        // The model read scope inside the resolver is released before the
        // file opens.
        let physical = self
            .resolver
            .to_physical(virtual_path, DirectoryCategory::GCodes)?;
        let file = File::open(&physical)?;
        let metadata = file.metadata()?;

        let mut info = ParsedFileInfo {
            file_name: virtual_path.to_string(),
            size: metadata.len(),
            last_modified: metadata.modified().ok(),
            ..Default::default()
        };

        self.scan_header(&file, &mut info, cancel)?;
        if !info.is_complete() {
            self.scan_footer(&file, &mut info, cancel)?;
        }

        if let (Some(height), Some(first), Some(layer)) =
            (info.height, info.first_layer_height, info.layer_height)
        {
            if height > 0.0 && first > 0.0 && layer > 0.0 {
                let layers = ((height - first) / layer).round() as i64 + 1;
                if layers > 0 {
                    info.num_layers = Some(layers as u32);
                }
            }
        }

        Ok(info)
    }

    fn scan_header(
        &self,
        file: &File,
        info: &mut ParsedFileInfo,
        cancel: &CancelToken,
    ) -> Result<(), CodeError> {
        let limit = self.settings.file_info_read_limit_header
            + self.settings.file_info_read_buffer_size as u64;
        let mut reader = BufReader::with_capacity(self.settings.file_info_read_buffer_size, file);
        let mut code = Code::new();
        let mut line = String::new();
        let mut read_bytes = 0u64;
        let mut in_relative_mode = false;
        let mut last_line_had_info = false;

        loop {
            if cancel.is_cancelled() {
                return Err(CodeError::Cancelled);
            }
            line.clear();
            let consumed = reader.read_line(&mut line)?;
            if consumed == 0 {
                break;
            }
            read_bytes += consumed as u64;

            let got_info = self.process_line(
                line.trim_end_matches(['\r', '\n']),
                &mut code,
                info,
                &mut in_relative_mode,
                false,
            );
            // Two consecutive quiet lines are required: slicer headers may
            // leave a gap between metadata blocks.
            if !got_info && !last_line_had_info && info.is_complete() {
                break;
            }
            last_line_had_info = got_info;

            if read_bytes > limit {
                break;
            }
        }
        Ok(())
    }

    fn scan_footer(
        &self,
        file: &File,
        info: &mut ParsedFileInfo,
        cancel: &CancelToken,
    ) -> Result<(), CodeError> {
        let limit = self.settings.file_info_read_limit_footer
            + self.settings.file_info_read_buffer_size as u64;
        let mut reader =
            ReverseLineReader::new(file, self.settings.file_info_read_buffer_size)?;
        let mut code = Code::new();
        let mut read_bytes = 0u64;
        let mut in_relative_mode = false;
        let mut last_line_had_info = false;

        while let Some(line) = reader.read_line()? {
            if cancel.is_cancelled() {
                return Err(CodeError::Cancelled);
            }
            read_bytes += line.len() as u64 + 1;

            let got_info = self.process_line(&line, &mut code, info, &mut in_relative_mode, true);
            if !got_info && !last_line_had_info && info.is_complete() {
                break;
            }
            last_line_had_info = got_info;

            if read_bytes > limit {
                break;
            }
        }
        Ok(())
    }

    /// Tokenizes one line and applies the move heuristics and comment
    /// extractors. A parse error skips the line: job files may carry
    /// non-code noise. Returns whether anything new was learned.
    fn process_line(
        &self,
        line: &str,
        code: &mut Code,
        info: &mut ParsedFileInfo,
        in_relative_mode: &mut bool,
        backward: bool,
    ) -> bool {
        let mut got_info = false;
        let mut had_comment = false;
        let mut tokenizer = CodeTokenizer::new(line);
        // The G53 carry is inhibited: lines are tokenized independently.
        let mut enforcing = false;

        loop {
            match tokenizer.parse(code, &mut enforcing) {
                Ok(true) => {
                    if code.comment.is_some() {
                        had_comment = true;
                    }
                    if code.code_type != CodeType::GCode {
                        continue;
                    }
                    match code.major_number {
                        Some(0) | Some(1) => {
                            if *in_relative_mode {
                                continue;
                            }
                            if backward {
                                // The last absolute move wins, unless its
                                // comment marks an extrusion value.
                                if info.height.is_none() && !comment_is_extrusion(code) {
                                    if let Some(z) = float_parameter(code, 'Z') {
                                        info.height = Some(z);
                                        got_info = true;
                                    }
                                }
                            } else if info.first_layer_height.is_none() {
                                if let Some(z) = float_parameter(code, 'Z') {
                                    if z > 0.0 && z <= self.settings.max_layer_height {
                                        info.first_layer_height = Some(z);
                                        got_info = true;
                                    }
                                }
                            }
                        }
                        // Scanning backward, a G90 means everything before
                        // it ran in the preceding (assumed relative) mode.
                        Some(90) => *in_relative_mode = backward,
                        Some(91) => *in_relative_mode = !backward,
                        _ => {}
                    }
                }
                Ok(false) => break,
                Err(_) => break,
            }
        }

        if had_comment {
            got_info |= self.extract_from_comment(line, info);
        }
        got_info
    }

    /// Applies the filter lists, in order, to a comment-carrying line. Only
    /// fields still unset are considered; the first matching pattern wins.
    fn extract_from_comment(&self, line: &str, info: &mut ParsedFileInfo) -> bool {
        let mut got_info = false;

        if info.layer_height.is_none() {
            for filter in &self.filters.layer_height {
                if let Some(mm) = filter
                    .captures(line)
                    .and_then(|c| c.name("mm"))
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                {
                    info.layer_height = Some(mm);
                    got_info = true;
                    break;
                }
            }
        }

        if info.filament_used.is_empty() {
            for filter in &self.filters.filament {
                if let Some(found) = filter.gate.find(line) {
                    let scale = if filter.meters { 1000.0 } else { 1.0 };
                    let values: Vec<f64> = self
                        .filters
                        .number
                        .find_iter(&line[found.start()..])
                        .filter_map(|m| m.as_str().parse::<f64>().ok())
                        .map(|v| v * scale)
                        .collect();
                    if !values.is_empty() {
                        info.filament_used = values;
                        got_info = true;
                        break;
                    }
                }
            }
        }

        if info.generated_by.is_none() {
            for filter in &self.filters.generated_by {
                if let Some(name) = filter.captures(line).and_then(|c| c.get(1)) {
                    info.generated_by = Some(name.as_str().trim().to_string());
                    got_info = true;
                    break;
                }
            }
        }

        if info.print_time.is_none() {
            for filter in &self.filters.print_time {
                if let Some(seconds) = filter.extract(line) {
                    info.print_time = Some(seconds);
                    got_info = true;
                    break;
                }
            }
        }

        if info.simulated_time.is_none() {
            for filter in &self.filters.simulated_time {
                if let Some(seconds) = filter.extract(line) {
                    info.simulated_time = Some(seconds);
                    got_info = true;
                    break;
                }
            }
        }

        got_info
    }
}

fn float_parameter(code: &Code, letter: char) -> Option<f64> {
    code.parameter(letter).and_then(|p| p.as_float().ok())
}

/// Slicer convention: a trailing comment starting with `E` refers to the
/// extrusion value, not a true move.
fn comment_is_extrusion(code: &Code) -> bool {
    code.comment
        .as_deref()
        .is_some_and(|comment| comment.trim_start().starts_with('E'))
}
