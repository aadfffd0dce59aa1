//! Coverage gate for CI: checks that every user-reference field in the
//! schema has a deletion strategy, a lookup index and, for blob references,
//! a storage cleanup registration.
//!
//! Exit codes: 0 coverage complete, 1 violations found, 2 inputs unreadable.

use std::path::PathBuf;
use std::process;

use erasure::{CoverageVerifier, DeletionManifest, ErasureConfig, SchemaDescription};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "Usage: erasure-verify [--manifest <path>] [--schema <path>]

Options:
  --manifest <path>   Deletion manifest (JSON), default from ERASURE_MANIFEST_PATH
  --schema <path>     Schema description (JSON), default from ERASURE_SCHEMA_PATH
  -h, --help          Print this help";

struct Args {
    manifest: PathBuf,
    schema: PathBuf,
}

fn parse_args(config: &ErasureConfig) -> Result<Option<Args>, String> {
    let mut args = Args {
        manifest: config.manifest_path.clone(),
        schema: config.schema_path.clone(),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--manifest" => {
                args.manifest = iter
                    .next()
                    .map(PathBuf::from)
                    .ok_or("--manifest requires a path")?;
            }
            "--schema" => {
                args.schema = iter
                    .next()
                    .map(PathBuf::from)
                    .ok_or("--schema requires a path")?;
            }
            "-h" | "--help" => return Ok(None),
            other => return Err(format!("unknown argument: {}", other)),
        }
    }

    Ok(Some(args))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("erasure=warn".parse()?))
        .init();

    let config = ErasureConfig::from_env();
    let args = match parse_args(&config) {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Err(message) => {
            eprintln!("{}\n\n{}", message, USAGE);
            process::exit(2);
        }
    };

    let manifest = match DeletionManifest::from_path(&args.manifest) {
        Ok(manifest) => manifest,
        Err(e) => {
            error!("Cannot load manifest {}: {}", args.manifest.display(), e);
            eprintln!("error: {}", e);
            process::exit(2);
        }
    };
    let schema = match SchemaDescription::from_path(&args.schema) {
        Ok(schema) => schema,
        Err(e) => {
            error!("Cannot load schema {}: {}", args.schema.display(), e);
            eprintln!("error: {}", e);
            process::exit(2);
        }
    };

    info!(
        "Verifying {} against {}",
        args.manifest.display(),
        args.schema.display()
    );
    let report = CoverageVerifier::new(&manifest).verify(&schema);
    print!("{}", report.render());

    process::exit(report.exit_code());
}
