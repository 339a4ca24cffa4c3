//! CLI entrypoint for the tagshim harness.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tagshim_core::config::{parse_tag, parse_threshold};
use tagshim_core::{ReallocPolicy, TagConfig};
use tagshim_harness::report::classify_all;
use tagshim_harness::{ConfigReport, HarnessError, PreloadLaunch};

/// Inspection and launch tooling for tagshim.
#[derive(Debug, Parser)]
#[command(name = "tagshim-harness")]
#[command(about = "Inspect and run programs under the tagshim preload library")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the configuration the shim would resolve from this environment.
    Config,
    /// Apply both tag predicates to raw addresses.
    Classify {
        /// Addresses, 0x-prefixed hex or decimal.
        #[arg(required = true)]
        addresses: Vec<String>,
        /// Tag to test against (defaults to the environment's configuration).
        #[arg(long)]
        tag: Option<String>,
    },
    /// Run a program with the shim preloaded.
    Run {
        /// Path to libtagshim_abi.so.
        #[arg(long)]
        preload: PathBuf,
        /// Emit a per-call trace on stderr.
        #[arg(long)]
        trace: bool,
        /// Small-object threshold in bytes.
        #[arg(long)]
        threshold: Option<String>,
        /// 16-bit tag (0x-prefixed hex or decimal).
        #[arg(long)]
        tag: Option<String>,
        /// `inherit` or `size`.
        #[arg(long)]
        realloc_policy: Option<String>,
        /// Program and arguments.
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, HarnessError> {
    match cli.command {
        Command::Config => {
            let report = ConfigReport::from_env();
            for warning in &report.warnings {
                eprintln!("warning: {warning}");
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Classify { addresses, tag } => {
            let mask = match tag {
                Some(raw) => parse_tag(raw.as_bytes())?,
                None => {
                    use std::os::unix::ffi::OsStringExt;
                    TagConfig::resolve(
                        |name| std::env::var_os(name).map(OsStringExt::into_vec),
                        |err| eprintln!("warning: {err}"),
                    )
                    .mask
                }
            };
            let reports = classify_all(&addresses, mask)?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Command::Run {
            preload,
            trace,
            threshold,
            tag,
            realloc_policy,
            command,
        } => {
            let mut launch = PreloadLaunch::new(preload, command)?.trace(trace);
            if let Some(raw) = tag {
                launch = launch.tag(parse_tag(raw.as_bytes())?);
            }
            if let Some(raw) = threshold {
                launch = launch.small_object_threshold(parse_threshold(raw.as_bytes())?);
            }
            if let Some(raw) = realloc_policy {
                launch = launch.realloc_policy(ReallocPolicy::parse(raw.as_bytes())?);
            }
            launch.check_library()?;

            let inherited = std::env::var_os("LD_PRELOAD");
            eprintln!(
                "Running with LD_PRELOAD={}",
                launch.preload_value(inherited.as_deref()).to_string_lossy()
            );
            let status = launch.command(inherited.as_deref()).status()?;
            if !status.success() {
                let code = status.code().unwrap_or(1);
                return Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
