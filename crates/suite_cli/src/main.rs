//! suiteweld: generate native bridges and TypeScript clients for plugin suites
//!
//! ```text
//! suiteweld [options] <inputs...>
//!
//!   --types <file>        type map (.json or .toml)
//!   --native-out <dir>    directory for native wrappers (default generated/native)
//!   --client-out <dir>    directory for client modules (default generated/client)
//!   --suite <name>        only generate this suite; repeatable
//!   --exclude <name>      skip this suite; repeatable
//!   --all-versions        keep every version of a suite, not just the newest
//!   --dry-run             generate in memory and report without writing
//! ```
//!
//! Log level is read from `SUITE_WELD_LOG` (default `info`).

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use suite_weld::{BindingBuilder, BuildReport, TypeMapConfig};
use tracing::info;

/// Parsed command line
#[derive(Debug, PartialEq)]
struct WeldCommand {
    inputs: Vec<PathBuf>,
    types: Option<PathBuf>,
    native_out: PathBuf,
    client_out: PathBuf,
    only: Vec<String>,
    exclude: Vec<String>,
    all_versions: bool,
    dry_run: bool,
}

impl WeldCommand {
    fn parse(args: &[String]) -> Result<Self> {
        let mut cmd = WeldCommand {
            inputs: Vec::new(),
            types: None,
            native_out: PathBuf::from("generated/native"),
            client_out: PathBuf::from("generated/client"),
            only: Vec::new(),
            exclude: Vec::new(),
            all_versions: false,
            dry_run: false,
        };

        let mut i = 0;
        while i < args.len() {
            let value = |flag: &str| -> Result<String> {
                match args.get(i + 1) {
                    Some(v) => Ok(v.clone()),
                    None => bail!("{} requires a value", flag),
                }
            };

            match args[i].as_str() {
                "--types" | "-t" => {
                    cmd.types = Some(PathBuf::from(value("--types")?));
                    i += 2;
                }
                "--native-out" => {
                    cmd.native_out = PathBuf::from(value("--native-out")?);
                    i += 2;
                }
                "--client-out" => {
                    cmd.client_out = PathBuf::from(value("--client-out")?);
                    i += 2;
                }
                "--suite" | "-s" => {
                    cmd.only.push(value("--suite")?);
                    i += 2;
                }
                "--exclude" | "-x" => {
                    cmd.exclude.push(value("--exclude")?);
                    i += 2;
                }
                "--all-versions" => {
                    cmd.all_versions = true;
                    i += 1;
                }
                "--dry-run" | "-n" => {
                    cmd.dry_run = true;
                    i += 1;
                }
                arg if !arg.starts_with('-') => {
                    cmd.inputs.push(PathBuf::from(arg));
                    i += 1;
                }
                _ => {
                    bail!("Unknown flag: {}", args[i]);
                }
            }
        }

        if cmd.inputs.is_empty() {
            bail!("no declaration files or directories given");
        }
        Ok(cmd)
    }

    fn builder(&self) -> Result<BindingBuilder> {
        let config = match &self.types {
            Some(path) => TypeMapConfig::load(path)
                .with_context(|| format!("loading type map {}", path.display()))?,
            None => TypeMapConfig::default(),
        };

        let mut builder = BindingBuilder::new(config)
            .native_out(&self.native_out)
            .client_out(&self.client_out)
            .latest_versions_only(!self.all_versions);
        for input in &self.inputs {
            builder = builder.input(input);
        }
        for suite in &self.only {
            builder = builder.only(suite.as_str());
        }
        for suite in &self.exclude {
            builder = builder.exclude(suite.as_str());
        }
        Ok(builder)
    }
}

fn print_summary(report: &BuildReport) {
    for suite in &report.suites {
        println!(
            "{} ({}): {} generated, {} skipped",
            suite.name,
            suite.origin,
            suite.generated.len(),
            suite.skipped.len()
        );
        for skipped in &suite.skipped {
            println!("    skipped {}: {}", skipped.name, skipped.reason);
        }
    }
    for name in &report.superseded {
        println!("{}: superseded by a newer version", name);
    }
    for failed in &report.failed_sources {
        println!("{}: not processed: {}", failed.origin, failed.reason);
    }
    println!(
        "{} suites, {} functions generated, {} skipped",
        report.suites.len(),
        report.generated_count(),
        report.skipped_count()
    );
}

fn main() -> Result<()> {
    use tracing_subscriber::EnvFilter;
    let filter =
        EnvFilter::try_from_env("SUITE_WELD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let cmd = WeldCommand::parse(&args)?;
    let builder = cmd.builder()?;

    let output = if cmd.dry_run {
        let output = builder.generate().context("generation failed")?;
        for file in &output.files {
            info!(path = %builder.output_path(file).display(), "would write");
        }
        output
    } else {
        builder.build().context("generation failed")?
    };

    print_summary(&output.report);
    Ok(())
}
