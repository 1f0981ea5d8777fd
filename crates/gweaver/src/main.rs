//! gweaver: weave annotated Go files into a Go package.
//!
//! # Usage
//!
//! ```bash
//! # Weave into a plain output directory
//! gweaver --package ./server --weave weaves/server.go --out ./out
//!
//! # Redirect the target module; the package comes from packageFQN
//! gweaver --weave-dir ./weaves --tag patched --write-root /tmp/woven
//!
//! # Layered configuration
//! WEAVER_FORMAT=1 gweaver --config weaver.toml --json
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use weaver::orchestrator::UnitReport;
use weaver::{
    resolve_package, GoPackageLoader, PackageOrchestrator, PackageWeave, UnitOutcome, WeaveError,
    WeaverConfig,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file (overridden by WEAVER_* variables and flags)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target package: directory or import path (default: the weave files' packageFQN)
    #[arg(long, short)]
    package: Option<String>,

    /// Weave file; repeat for several
    #[arg(long = "weave", short = 'w')]
    weaves: Vec<PathBuf>,

    /// Use every non-test .go file in this directory as a weave file
    #[arg(long)]
    weave_dir: Option<PathBuf>,

    /// Write woven files into this directory instead of redirecting the module
    #[arg(long)]
    out: Option<PathBuf>,

    /// Suffix for the redirected module copy (overrides WEAVER_TAG)
    #[arg(long)]
    tag: Option<String>,

    /// Parent directory for redirected module copies (overrides WEAVER_WRITE_ROOT)
    #[arg(long)]
    write_root: Option<PathBuf>,

    /// go.mod that receives the replace directive (overrides WEAVER_GO_MOD)
    #[arg(long)]
    go_mod: Option<PathBuf>,

    /// Run woven files through gofmt
    #[arg(long, default_value_t = false)]
    format: bool,

    /// Print the run report as JSON on stdout
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl Args {
    /// Layer flags over file and environment configuration.
    fn into_config(self) -> Result<WeaverConfig> {
        let mut config = match &self.config {
            Some(path) => WeaverConfig::from_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => WeaverConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());

        if self.package.is_some() {
            config.package = self.package;
        }
        if !self.weaves.is_empty() {
            config.weave_files = self.weaves;
        }
        if self.weave_dir.is_some() {
            config.weave_dir = self.weave_dir;
        }
        if self.out.is_some() {
            config.output_dir = self.out;
        }
        if let Some(tag) = self.tag {
            config.tag = tag;
        }
        if self.write_root.is_some() {
            config.write_root = self.write_root;
        }
        if let Some(go_mod) = self.go_mod {
            config.go_mod = go_mod;
        }
        if self.format {
            config.format = true;
        }
        config.resolve_paths();
        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gweaver=info,weaver=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let json = args.json;

    match run(args, json) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{:#}", e);
            if let Some(hint) = e.downcast_ref::<WeaveError>().and_then(WeaveError::hint) {
                eprintln!("hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every unit was woven or written back cleanly.
fn run(args: Args, json: bool) -> Result<bool> {
    let config = args.into_config()?;

    let mut weave_files = config.weave_files.clone();
    if let Some(dir) = &config.weave_dir {
        weave_files.extend(PackageWeave::discover(dir)?);
    }
    if weave_files.is_empty() {
        bail!("no weave files given (use --weave or --weave-dir)");
    }

    let weave = PackageWeave::load(&weave_files)?;
    let package = resolve_package(config.package.as_deref(), &weave)?;
    info!("Target package: {}", package);

    let loader = GoPackageLoader::new(&config.go_command).with_working_dir(&config.working_dir);
    let mut orchestrator = PackageOrchestrator::new(&weave, loader, config.persistence());
    let report = orchestrator.run(&package)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for unit in &report.units {
            println!("{}", unit_line(unit));
        }
        println!("{}", report.summary());
    }
    Ok(report.is_clean())
}

fn unit_line(unit: &UnitReport) -> String {
    let status = match &unit.outcome {
        UnitOutcome::Unchanged => "unchanged".to_string(),
        UnitOutcome::Woven => "woven".to_string(),
        UnitOutcome::Skipped { reason } => format!("skipped ({})", reason),
        UnitOutcome::Failed { reason } => format!("failed ({})", reason),
    };
    match &unit.written_to {
        Some(path) => format!("{:<10} {} -> {}", status, unit.file, path.display()),
        None => format!("{:<10} {}", status, unit.file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "gweaver",
            "--package",
            "./server",
            "-w",
            "a.go",
            "-w",
            "b.go",
            "--tag",
            "patched",
            "--format",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.package.as_deref(), Some("./server"));
        assert_eq!(config.weave_files.len(), 2);
        assert!(config.weave_files[0].ends_with("a.go"));
        assert_eq!(config.tag, "patched");
        assert!(config.format);
    }

    #[test]
    fn test_unit_line() {
        let unit = UnitReport {
            file: "server.go".into(),
            weave: Some("server.go".into()),
            outcome: UnitOutcome::Skipped {
                reason: "syntax".into(),
            },
            written_to: None,
        };
        assert_eq!(unit_line(&unit), "skipped (syntax) server.go");

        let unit = UnitReport {
            outcome: UnitOutcome::Woven,
            written_to: Some(PathBuf::from("/out/server.go")),
            ..unit
        };
        assert_eq!(unit_line(&unit), "woven      server.go -> /out/server.go");
    }

    #[test]
    fn test_config_file_is_layered_under_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("weaver.toml");
        std::fs::write(&path, "tag = \"from-file\"\nformat_command = \"gofmt -s\"\n").unwrap();

        let args = Args::parse_from(["gweaver", "--config", path.to_str().unwrap()]);
        let config = args.into_config().unwrap();
        assert_eq!(config.format_command, "gofmt -s");

        let args = Args::parse_from([
            "gweaver",
            "--config",
            path.to_str().unwrap(),
            "--tag",
            "from-flag",
        ]);
        assert_eq!(args.into_config().unwrap().tag, "from-flag");
    }
}
