// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! End-to-end checks over the public surface: splitting realistic G-code,
//! path resolution against a live model store, and file-info scans on real
//! temp files.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use gforge::config::Settings;
use gforge::core::code::{CodeFlags, CodeType, Keyword};
use gforge::files::info::FileInfoParser;
use gforge::files::paths::{DirectoryCategory, PathResolver};
use gforge::files::CancelToken;
use gforge::model::{ModelStore, Storage};
use gforge::tokenizer::split_codes;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_base() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    let base = std::env::temp_dir().join(format!("gforge-it-{pid}-{nanos}-{counter}"));
    fs::create_dir_all(base.join("gcodes")).expect("create temp dirs");
    base
}

#[test]
fn splits_a_realistic_macro() {
    let macro_text = "\
; homeall.g: home all axes
G91               ; relative positioning
G1 H1 X-240 Y-240 F3600 ; coarse home
G1 X5 Y5 F6000    ; back off
G90               ; absolute positioning
if move.axes[2].homed
  G1 Z5 F600
else
  M291 P\"Z not homed\" S1
M400
";
    let codes = split_codes(macro_text).expect("macro parses");
    assert_eq!(codes.len(), 10);
    assert_eq!(codes[9].major_number, Some(400));

    assert_eq!(codes[0].code_type, CodeType::Comment);
    assert_eq!(codes[1].major_number, Some(91));
    assert_eq!(
        codes[1].comment.as_deref(),
        Some(" relative positioning")
    );

    let coarse = &codes[2];
    assert_eq!(coarse.parameter('H').unwrap().as_integer().unwrap(), 1);
    assert_eq!(coarse.parameter('X').unwrap().as_integer().unwrap(), -240);
    assert_eq!(coarse.parameter('F').unwrap().as_integer().unwrap(), 3600);

    let condition = &codes[5];
    assert_eq!(condition.code_type, CodeType::Keyword);
    assert_eq!(condition.keyword, Some(Keyword::If));
    assert_eq!(
        condition.keyword_argument.as_deref(),
        Some("move.axes[2].homed")
    );
    assert_eq!(condition.indent, 0);

    let branch_move = &codes[6];
    assert_eq!(branch_move.indent, 2);
    assert_eq!(branch_move.major_number, Some(1));

    let else_code = &codes[7];
    assert_eq!(else_code.keyword, Some(Keyword::Else));
    assert_eq!(else_code.keyword_argument, None);

    let message = &codes[8];
    assert_eq!(message.indent, 2);
    assert_eq!(message.major_number, Some(291));
    assert_eq!(message.parameter('P').unwrap().as_string(), "Z not homed");
}

#[test]
fn g53_prefix_survives_the_public_surface() {
    let codes = split_codes("G53 G1 X10 G0 Y20\nT0\n").expect("parses");
    assert_eq!(codes.len(), 3);
    assert!(codes[0]
        .flags
        .contains(CodeFlags::ENFORCE_ABSOLUTE_POSITION));
    assert!(codes[1]
        .flags
        .contains(CodeFlags::ENFORCE_ABSOLUTE_POSITION));
    assert_eq!(codes[2].code_type, CodeType::TCode);
    assert!(!codes[2]
        .flags
        .contains(CodeFlags::ENFORCE_ABSOLUTE_POSITION));
}

#[test]
fn resolver_round_trip_with_reconfigured_storage() {
    let store = Arc::new(ModelStore::default());
    store.write_scope(|model| {
        model.storages.push(Storage {
            mounted: true,
            path: Some("/media/usb0".to_string()),
        });
    });
    let resolver = PathResolver::new("/srv/printer", store);

    let physical = resolver
        .to_physical("1:/prints/benchy.g", DirectoryCategory::GCodes)
        .expect("drive resolves");
    assert_eq!(physical, PathBuf::from("/media/usb0/prints/benchy.g"));
    assert_eq!(resolver.to_virtual(&physical), "1:/prints/benchy.g");

    let physical = resolver
        .to_physical("benchy.g", DirectoryCategory::GCodes)
        .expect("category resolves");
    assert_eq!(physical, PathBuf::from("/srv/printer/gcodes/benchy.g"));
    assert_eq!(resolver.to_virtual(&physical), "0:/gcodes/benchy.g");
}

#[test]
fn file_info_end_to_end() {
    let base = temp_base();
    let job = "\
;Layer height: 0.3
;Generated with Cura_SteamEngine 5.2.1
;Filament used: 1.2m
;TIME:600
G90
G28
G1 Z0.3 F3000
G1 X100 Y100 E5.0
G1 Z12.3
M84
";
    fs::write(base.join("gcodes/benchy.g"), job).expect("write job");

    let mut settings = Settings::default();
    settings.base_directory = base.clone();
    let resolver = PathResolver::new(base, Arc::new(ModelStore::default()));
    let parser = FileInfoParser::new(settings, resolver).expect("filters compile");

    let info = parser
        .parse("0:/gcodes/benchy.g", &CancelToken::new())
        .expect("scan succeeds");

    assert_eq!(info.file_name, "0:/gcodes/benchy.g");
    assert_eq!(info.size, job.len() as u64);
    assert_eq!(info.layer_height, Some(0.3));
    assert_eq!(info.first_layer_height, Some(0.3));
    assert_eq!(info.height, Some(12.3));
    assert_eq!(info.filament_used, vec![1200.0]);
    assert_eq!(info.generated_by.as_deref(), Some("Cura_SteamEngine 5.2.1"));
    assert_eq!(info.print_time, Some(600));
    // round((12.3 - 0.3) / 0.3) + 1
    assert_eq!(info.num_layers, Some(41));
    assert!(info.is_complete());
}

#[test]
fn unprecedented_strings_match_both_spellings() {
    let codes = split_codes("M32 \"sub dir/job file.g\"").expect("parses");
    assert_eq!(
        codes[0].unprecedented_string().as_deref(),
        Some("sub dir/job file.g")
    );

    let codes = split_codes("M32 sub dir/job file.g").expect("parses");
    assert_eq!(
        codes[0].unprecedented_string().as_deref(),
        Some("sub dir/job file.g")
    );
}

#[test]
fn parse_errors_report_stream_offsets() {
    let err = split_codes("G90\nG1 X{unclosed\n").expect_err("must fail");
    match err {
        gforge::core::error::CodeError::Parse { offset, .. } => {
            // The brace sits at byte 8 of the stream.
            assert_eq!(offset, 8);
        }
        other => panic!("unexpected error {other:?}"),
    }
}
