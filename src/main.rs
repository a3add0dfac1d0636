//! DCC Verification Tool - CLI Interface
//! Author: kartik4091
//! Created: 2025-06-06
//!
//! Loads a Digital Calibration Certificate, verifies its signature against
//! the given trust material and prints a status summary.

use std::fs;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, Command};
use dcc_verify::utils::{init_logging, LogLevel};
use dcc_verify::verification::StructuralValidator;
use dcc_verify::{
    Dcc, ReportFormat, ReportFormatter, SchemaSource, TrustStore, VerificationConfig, VerificationContext,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let log_level = matches
        .get_one::<String>("verbose")
        .and_then(|level| level.parse::<LogLevel>().ok())
        .unwrap_or_default();
    if let Err(e) = init_logging(log_level) {
        eprintln!("{}", e);
    }

    let config = match matches.get_one::<String>("config") {
        Some(path) => match VerificationConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config file: {}", e);
                process::exit(2);
            }
        },
        None => VerificationConfig::default(),
    };

    let store = match load_trust_store(&matches) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to load trust material: {}", e);
            process::exit(2);
        }
    };

    // Input is required by clap
    let Some(input) = matches.get_one::<String>("input") else {
        process::exit(2);
    };
    let mut dcc = if matches.get_flag("compressed") {
        match fs::read(input) {
            Ok(bytes) => Dcc::from_compressed_with_limit(&bytes, config.max_decompressed_size),
            Err(e) => {
                error!("Failed to read {}: {}", input, e);
                process::exit(1);
            }
        }
    } else {
        Dcc::from_file(input)
    };

    let mut failed = !dcc.is_loaded();

    if store.is_empty() {
        if dcc.is_signed() {
            warn!("No trust material given, signature not verified");
        }
    } else {
        let context = VerificationContext::with_config(Arc::new(store), config.clone());
        match dcc.verify_signature(&context) {
            Ok(outcome) => info!("Signature outcome: {:?}", outcome),
            Err(e) => {
                error!("Signature verification failed: {}", e);
                failed = true;
            }
        }
    }

    if matches.get_flag("schema") {
        let timeout = Duration::from_millis(config.schema_timeout_ms);
        if dcc.verify_schema(&StructuralValidator, SchemaSource::Offline, timeout).await != Some(true) {
            failed = true;
        }
    }

    let format = match matches.get_one::<String>("format").map(String::as_str) {
        Some("json") => ReportFormat::Json,
        _ => ReportFormat::PlainText,
    };
    match ReportFormatter::format(dcc.status_report(), dcc.document(), format) {
        Ok(report) => println!("{}", report),
        Err(e) => {
            error!("Failed to format report: {}", e);
            failed = true;
        }
    }

    if failed {
        process::exit(1);
    }
}

fn build_cli() -> Command {
    Command::new("dcc-verify")
        .version(env!("CARGO_PKG_VERSION"))
        .author("kartik4091")
        .about("Digital Calibration Certificate loader and XAdES signature verifier")
        .arg(Arg::new("input")
            .short('i')
            .long("input")
            .value_name("FILE")
            .help("DCC XML file, or a compressed container with --compressed")
            .required(true))
        .arg(Arg::new("compressed")
            .long("compressed")
            .action(ArgAction::SetTrue)
            .help("Input is a compressed DCC container"))
        .arg(Arg::new("root")
            .short('r')
            .long("root")
            .value_name("CERT")
            .action(ArgAction::Append)
            .help("Trusted root certificate (PEM or DER), repeatable"))
        .arg(Arg::new("intermediate")
            .long("intermediate")
            .value_name("CERT")
            .action(ArgAction::Append)
            .help("Intermediate certificate (PEM or DER), repeatable"))
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .help("Configuration file (JSON/YAML)"))
        .arg(Arg::new("schema")
            .long("schema")
            .action(ArgAction::SetTrue)
            .help("Run the offline structural schema check"))
        .arg(Arg::new("format")
            .short('f')
            .long("format")
            .value_parser(["text", "json"])
            .default_value("text")
            .help("Report format"))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .value_parser(["error", "warn", "info", "debug", "trace"])
            .default_value("warn")
            .help("Set logging verbosity"))
}

fn load_trust_store(matches: &ArgMatches) -> Result<TrustStore, dcc_verify::TrustStoreError> {
    let mut store = TrustStore::new();
    for path in matches.get_many::<String>("root").into_iter().flatten() {
        store.load_root(path)?;
        info!("Loaded root certificate {}", path);
    }
    for path in matches.get_many::<String>("intermediate").into_iter().flatten() {
        store.load_intermediate(path)?;
        info!("Loaded intermediate certificate {}", path);
    }
    Ok(store)
}
