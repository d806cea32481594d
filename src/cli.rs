// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface: dump parsed codes or extract print-file
//! metadata, as text or JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use clap::{ArgAction, Parser, ValueEnum};
use serde_json::{json, Value};

use crate::config::Settings;
use crate::core::code::{Code, CodeFlags, CodeType};
use crate::core::error::CodeError;
use crate::files::info::{FileInfoParser, ParsedFileInfo};
use crate::files::paths::PathResolver;
use crate::files::CancelToken;
use crate::model::ModelStore;
use crate::tokenizer::CodeStream;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "G-code command layer for a printer control server.

Without --info, every input file is split into typed codes and printed one
per line. With --info, only the head and tail of each file are scanned and
the collected slicer metadata is reported.
Use --base-dir to anchor drive 0 somewhere other than the filesystem root.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "gforge",
    version = VERSION,
    about = "G-code splitter and print-file metadata scanner",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Select the output format. text is default; json enables machine-readable output."
    )]
    pub format: OutputFormat,
    #[arg(
        short = 'i',
        long = "info",
        action = ArgAction::SetTrue,
        long_help = "Scan the file head and tail for slicer metadata instead of dumping parsed codes."
    )]
    pub info: bool,
    #[arg(
        long = "base-dir",
        value_name = "DIR",
        long_help = "Physical root for drive 0. Defaults to the filesystem root so plain paths resolve as themselves."
    )]
    pub base_dir: Option<PathBuf>,
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

pub fn run(cli: &Cli) -> Result<(), CodeError> {
    if cli.info {
        let mut settings = Settings::default();
        settings.base_directory = cli.base_dir.clone().unwrap_or_else(|| PathBuf::from("/"));

        let store = Arc::new(ModelStore::default());
        let resolver = PathResolver::new(settings.base_directory.clone(), store);
        let parser = FileInfoParser::new(settings, resolver)?;
        for file in &cli.files {
            let physical = fs::canonicalize(file)?;
            let virtual_path = parser.resolver().to_virtual(&physical);
            let info = parser.parse(&virtual_path, &CancelToken::new())?;
            match cli.format {
                OutputFormat::Text => print_info_text(file, &info),
                OutputFormat::Json => println!("{}", info_payload(&info)),
            }
        }
        return Ok(());
    }

    for file in &cli.files {
        let text = fs::read_to_string(file)?;
        match cli.format {
            OutputFormat::Text => {
                for code in CodeStream::new(&text) {
                    println!("{}", code?);
                }
            }
            OutputFormat::Json => {
                let codes: Result<Vec<Code>, CodeError> = CodeStream::new(&text).collect();
                let payloads: Vec<Value> = codes?.iter().map(code_payload).collect();
                println!("{}", Value::Array(payloads));
            }
        }
    }
    Ok(())
}

fn print_info_text(file: &Path, info: &ParsedFileInfo) {
    println!("{}:", file.display());
    println!("  size: {} bytes", info.size);
    if let Some(height) = info.height {
        println!("  height: {height} mm");
    }
    if let Some(first) = info.first_layer_height {
        println!("  first layer height: {first} mm");
    }
    if let Some(layer) = info.layer_height {
        println!("  layer height: {layer} mm");
    }
    if let Some(layers) = info.num_layers {
        println!("  layers: {layers}");
    }
    if !info.filament_used.is_empty() {
        let list: Vec<String> = info.filament_used.iter().map(|f| format!("{f}")).collect();
        println!("  filament used: {} mm", list.join(", "));
    }
    if let Some(generated_by) = &info.generated_by {
        println!("  generated by: {generated_by}");
    }
    if let Some(seconds) = info.print_time {
        println!("  print time: {}", format_duration(seconds));
    }
    if let Some(seconds) = info.simulated_time {
        println!("  simulated time: {}", format_duration(seconds));
    }
}

fn format_duration(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn info_payload(info: &ParsedFileInfo) -> Value {
    let last_modified = info
        .last_modified
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());
    json!({
        "fileName": info.file_name,
        "size": info.size,
        "lastModified": last_modified,
        "firstLayerHeight": info.first_layer_height,
        "layerHeight": info.layer_height,
        "height": info.height,
        "numLayers": info.num_layers,
        "filament": info.filament_used,
        "generatedBy": info.generated_by,
        "printTime": info.print_time,
        "simulatedTime": info.simulated_time,
    })
}

fn code_payload(code: &Code) -> Value {
    let code_type = match code.code_type {
        CodeType::None => "none",
        CodeType::Comment => "comment",
        CodeType::GCode => "G",
        CodeType::MCode => "M",
        CodeType::TCode => "T",
        CodeType::Keyword => "keyword",
    };
    let parameters: Vec<Value> = code
        .parameters
        .iter()
        .map(|p| json!({ "letter": p.letter.to_string(), "value": p.raw }))
        .collect();
    json!({
        "type": code_type,
        "lineNumber": code.line_number,
        "indent": code.indent,
        "keyword": code.keyword.map(|k| k.as_str()),
        "keywordArgument": code.keyword_argument,
        "majorNumber": code.major_number,
        "minorNumber": code.minor_number,
        "parameters": parameters,
        "comment": code.comment,
        "enforceAbsolutePosition": code
            .flags
            .contains(CodeFlags::ENFORCE_ABSOLUTE_POSITION),
        "filePosition": code.file_position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(95), "1m 35s");
        assert_eq!(format_duration(8010), "2h 13m 30s");
    }

    #[test]
    fn code_payload_carries_the_salient_fields() {
        let codes = crate::tokenizer::split_codes("G53 G1 X100").unwrap();
        let payload = code_payload(&codes[0]);
        assert_eq!(payload["type"], "G");
        assert_eq!(payload["majorNumber"], 1);
        assert_eq!(payload["enforceAbsolutePosition"], true);
        assert_eq!(payload["parameters"][0]["letter"], "X");
        assert_eq!(payload["parameters"][0]["value"], "100");
    }

    #[test]
    fn cli_arguments_parse() {
        let cli = Cli::try_parse_from(["gforge", "--info", "--format", "json", "a.g"]).unwrap();
        assert!(cli.info);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.files, vec![PathBuf::from("a.g")]);

        assert!(Cli::try_parse_from(["gforge"]).is_err());
    }
}
