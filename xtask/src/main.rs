//! Build automation tasks for the sqlpool workspace.
//!
//! Run with `cargo xtask <command>`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

/// Feature sets the pool crate is tested with.
const FEATURE_MATRIX: &[&str] = &["", "sqlpool/serde"];

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for sqlpool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all checks (format, lint, feature-matrix tests, docs)
    Ci,
    /// Run cargo fmt --check
    Fmt,
    /// Run clippy on every target and feature
    Clippy,
    /// Run tests for each feature set
    Test {
        /// Only run tests whose name contains this filter
        filter: Option<String>,
    },
    /// Generate documentation
    Doc,
    /// Run the pool benchmarks
    Bench,
    /// Run the basic usage example with debug logging
    Example,
    /// Clean build artifacts
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    let workspace_root = workspace_root()?;
    sh.change_dir(&workspace_root);

    match cli.command {
        Command::Ci => {
            println!("Running CI checks...");
            fmt(&sh)?;
            clippy(&sh)?;
            test(&sh, None)?;
            doc(&sh)?;
            println!("All CI checks passed!");
        }
        Command::Fmt => fmt(&sh)?,
        Command::Clippy => clippy(&sh)?,
        Command::Test { filter } => test(&sh, filter.as_deref())?,
        Command::Doc => doc(&sh)?,
        Command::Bench => bench(&sh)?,
        Command::Example => example(&sh)?,
        Command::Clean => clean(&sh)?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let path = String::from_utf8(output.stdout)
        .context("invalid UTF-8 in cargo output")?
        .trim()
        .to_string();

    Ok(PathBuf::from(path)
        .parent()
        .context("failed to get workspace root")?
        .to_path_buf())
}

fn fmt(sh: &Shell) -> Result<()> {
    println!("Checking formatting...");
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    println!("Formatting check passed.");
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    println!("Running clippy...");
    cmd!(
        sh,
        "cargo clippy --workspace --all-features --all-targets -- -D warnings"
    )
    .run()?;
    println!("Clippy check passed.");
    Ok(())
}

fn test(sh: &Shell, filter: Option<&str>) -> Result<()> {
    let filter: Vec<&str> = filter.into_iter().collect();
    for features in FEATURE_MATRIX {
        let (label, feature_args) = if features.is_empty() {
            ("default", Vec::new())
        } else {
            (*features, vec!["--features", *features])
        };
        println!("Running tests (features: {label})...");
        let filter = &filter;
        cmd!(
            sh,
            "cargo test -p sqlpool -p sqlpool-testing {feature_args...} -- {filter...}"
        )
        .run()
        .with_context(|| format!("tests failed with features: {label}"))?;
    }
    println!("All tests passed.");
    Ok(())
}

fn doc(sh: &Shell) -> Result<()> {
    println!("Generating documentation...");
    cmd!(sh, "cargo doc --workspace --all-features --no-deps").run()?;
    println!("Documentation generated.");
    Ok(())
}

fn bench(sh: &Shell) -> Result<()> {
    println!("Running benchmarks...");
    cmd!(sh, "cargo bench -p sqlpool --bench pool").run()?;
    Ok(())
}

fn example(sh: &Shell) -> Result<()> {
    let _env = sh.push_env("RUST_LOG", "sqlpool=debug");
    cmd!(sh, "cargo run -p sqlpool --example basic").run()?;
    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("Cleaning build artifacts...");
    cmd!(sh, "cargo clean").run()?;
    println!("Clean complete.");
    Ok(())
}
