use anyhow::Result;
use clap::{Parser, Subcommand};
use scheme_env::cache::SchemeCache;
use scheme_env::checker::{CheckOptions, DerivationChecker, FileReport};
use scheme_env::diagnostics;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// scheme-env - check derivation scripts against the environment engine
#[derive(Parser)]
#[command(name = "scheme-env")]
#[command(about = "Run and check quantifier derivation scripts", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a derivation file, or every *.deriv file under a directory
    Check {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Run every derivation even if the cache has its schemes
        #[arg(long)]
        no_cache: bool,
    },

    /// Watch a derivation file and re-check on changes
    Watch {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show version information
    Version,

    /// Clear the scheme cache
    ClearCache,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Check { path, no_cache } => {
            let success = check(&path, !no_cache, cli.verbose > 0)?;
            if !success {
                std::process::exit(1);
            }
        }
        Commands::Watch { file } => {
            watch_file(&file)?;
        }
        Commands::Version => {
            println!("scheme-env {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::ClearCache => {
            clear_cache()?;
        }
    }

    Ok(())
}

/// Returns true when no error diagnostic was produced
fn check(path: &Path, use_cache: bool, verbose: bool) -> Result<bool> {
    let mut checker = DerivationChecker::new(CheckOptions { use_cache });
    let reports = checker.check_paths(path)?;

    for report in &reports {
        print_report(report, verbose);
    }

    if let Err(e) = checker.save_cache() {
        tracing::warn!("Failed to save cache: {}", e);
    }

    Ok(!reports.iter().any(FileReport::has_errors))
}

fn print_report(report: &FileReport, verbose: bool) {
    if !report.diagnostics.is_empty() {
        let output = diagnostics::format_diagnostics_with_file(&report.diagnostics, &report.path);
        println!("{}", output);
    } else if verbose {
        let origin = if report.cached { " (cached)" } else { "" };
        println!("{}: No errors found{}", report.path.display(), origin);
    }

    if verbose {
        for scheme in &report.schemes {
            println!("  {}", scheme);
        }
    }
}

fn watch_file(file_path: &Path) -> Result<()> {
    use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
    use std::sync::mpsc::channel;
    use std::time::Duration;

    if !file_path.exists() {
        anyhow::bail!("File not found: {}", file_path.display());
    }

    println!("Watching {} for changes (Press Ctrl+C to stop)", file_path.display());
    println!();

    println!("Initial check:");
    let mut had_errors = match check(file_path, false, true) {
        Ok(success) => !success,
        Err(e) => {
            eprintln!("Error during initial check: {}", e);
            true
        }
    };
    println!();

    let (tx, rx) = channel();

    let mut watcher = RecommendedWatcher::new(
        move |res| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        Config::default().with_poll_interval(Duration::from_millis(500)),
    )?;

    watcher.watch(file_path, RecursiveMode::NonRecursive)?;

    loop {
        match rx.recv() {
            Ok(event) => {
                // Only re-check on modify events
                if let notify::EventKind::Modify(_) = event.kind {
                    println!("\n--- File changed, re-checking... ---\n");

                    // Small delay to ensure file is fully written
                    std::thread::sleep(Duration::from_millis(100));

                    match check(file_path, false, true) {
                        Ok(success) => {
                            if success && had_errors {
                                println!("All errors fixed!");
                            }
                            had_errors = !success;
                        }
                        Err(e) => {
                            eprintln!("Error during check: {}", e);
                            had_errors = true;
                        }
                    }
                    println!();
                }
            }
            Err(e) => {
                eprintln!("Watch error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

fn clear_cache() -> Result<()> {
    match SchemeCache::cache_path() {
        Ok(path) => {
            if path.exists() {
                std::fs::remove_file(&path)?;
                println!("Cache cleared: {}", path.display());
            } else {
                println!("No cache file found");
            }
        }
        Err(e) => {
            eprintln!("Failed to get cache path: {}", e);
        }
    }

    Ok(())
}
