#!/usr/bin/env cargo
//! Chat Summary CI Tool
//!
//! Checks, tests and format-checks the workspace for continuous integration

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::Command;

#[derive(Parser)]
#[command(
    name = "ci",
    about = "Chat Summary CI tool for checking and testing the workspace",
    long_about = r#"
Chat Summary CI tool for checking and testing the workspace

Examples:
  cargo ci                             # Check compilation (default)
  cargo ci check                       # Check that all crates compile
  cargo ci test                        # Run all tests
  cargo ci fmt                         # Check formatting

Crates:
  - resource-cache (shared reference-counted documents)
  - chat-summary-mcp (MCP server)
"#
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Parser)]
enum Commands {
    /// Check that all crates compile
    Check,
    /// Run all tests
    Test,
    /// Check formatting without modifying files
    Fmt,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Commands::Check) => run_check(),
        Some(Commands::Test) => run_test(),
        Some(Commands::Fmt) => run_fmt(),
        None => run_check(), // Default to check
    }
}

/// Check that all crates compile
fn run_check() -> Result<()> {
    println!("🤖 Chat Summary CI Check");
    println!("{}", "=".repeat(26));

    check_rust()?;
    run_cargo(&["check", "--workspace", "--all-targets"], "check")?;

    println!("\n✅ Workspace check passed!");
    Ok(())
}

/// Run all tests
fn run_test() -> Result<()> {
    println!("🤖 Chat Summary CI Test");
    println!("{}", "=".repeat(25));

    check_rust()?;
    run_cargo(&["test", "--workspace"], "test")?;

    println!("\n✅ All tests completed!");
    Ok(())
}

/// Check formatting
fn run_fmt() -> Result<()> {
    println!("🤖 Chat Summary CI Format");
    println!("{}", "=".repeat(27));

    check_rust()?;
    run_cargo(&["fmt", "--all", "--", "--check"], "fmt")?;

    println!("\n✅ Formatting is clean!");
    Ok(())
}

fn check_rust() -> Result<()> {
    if which::which("cargo").is_err() {
        return Err(anyhow!(
            "❌ Error: Cargo not found. Please install Rust first.\n   Visit: https://rustup.rs/"
        ));
    }
    Ok(())
}

fn get_repo_root() -> Result<PathBuf> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").context(
        "❌ CI tool must be run via cargo. CARGO_MANIFEST_DIR not found.",
    )?;

    let manifest_path = PathBuf::from(manifest_dir);
    // If we're in the ci/ directory, go up to workspace root
    if manifest_path.file_name() == Some(std::ffi::OsStr::new("ci")) {
        if let Some(parent) = manifest_path.parent() {
            return Ok(parent.to_path_buf());
        }
    }
    Ok(manifest_path)
}

/// Run one cargo subcommand at the workspace root, streaming its output
fn run_cargo(args: &[&str], step: &str) -> Result<()> {
    let repo_root = get_repo_root()?;

    println!("🦀 Running cargo {step}...");
    println!("   Workspace: {}", repo_root.display());

    let status = Command::new("cargo")
        .args(args)
        .env("RUST_BACKTRACE", "1")
        .current_dir(&repo_root)
        .status()
        .with_context(|| format!("Failed to execute cargo {step}"))?;

    if !status.success() {
        return Err(anyhow!("❌ cargo {step} failed"));
    }

    println!("✅ cargo {step} passed!");
    Ok(())
}
