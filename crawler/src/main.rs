//! Codebase health crawler CLI.
//!
//! Runs every script under a path in its own interpreter process, reports
//! the ones that crash, and with `--force` installs the packages they were
//! missing before checking again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crawler::exit_codes;
use crawler::io::config::{CONFIG_FILE_NAME, ConfigOverrides, RunConfiguration, load_config};
use crawler::io::package_manager::{CommandPackageManager, ManagerKind};
use crawler::io::registry::NpmRegistry;
use crawler::io::supervisor::InterpreterSupervisor;
use crawler::logging;
use crawler::orchestrator::{CrawlEvent, Orchestrator};
use crawler::report;

#[derive(Parser, Debug)]
#[command(
    name = "crawler",
    version,
    about = "Run every script in a project and report the ones that crash"
)]
struct Cli {
    /// File or directory to crawl.
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Echo script output, log progress and check installed packages for upgrades.
    #[arg(short, long)]
    verbose: bool,

    /// Install missing modules (and apply upgrades with --verbose).
    #[arg(short, long)]
    force: bool,

    /// Config file; defaults to `crawler.toml` in the project directory.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seconds each script may run before it is killed.
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Install attempts allowed before giving up on missing modules.
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Scripts checked at once.
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            child_timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            concurrency: self.jobs,
        }
    }

    fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.config {
            return path.clone();
        }
        let project_dir = if self.path.is_file() {
            self.path.parent().unwrap_or(Path::new("."))
        } else {
            self.path.as_path()
        };
        project_dir.join(CONFIG_FILE_NAME)
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let settings = load_config(&cli.config_path())?.with_overrides(&cli.overrides())?;
    let config = RunConfiguration::new(&cli.path, cli.verbose, cli.force, settings)?;
    let project_dir = config.project_dir();

    let supervisor = InterpreterSupervisor {
        interpreter: config.settings.interpreter.clone(),
        workdir: project_dir.clone(),
        output_limit_bytes: config.settings.output_limit_bytes,
    };
    let package_manager = CommandPackageManager {
        kind: ManagerKind::detect(&project_dir),
        project_dir,
        dependency_dir: config.dependency_dir(),
        timeout: config.install_timeout(),
        output_limit_bytes: config.settings.output_limit_bytes,
    };
    let registry = NpmRegistry::new(
        &config.settings.registry_url,
        Duration::from_secs(config.settings.registry_timeout_secs),
    )?;

    let verbose = cli.verbose;
    let run_report = Orchestrator::new(&config, &supervisor, &package_manager, &registry)
        .run(|event| print_event(&event, verbose))?;
    print!("{}", report::render(&run_report));
    Ok(run_report.stop.exit_code())
}

/// Progress goes to stderr so stdout carries only the final report.
fn print_event(event: &CrawlEvent<'_>, verbose: bool) {
    match event {
        CrawlEvent::Installing => eprintln!("installing dependencies..."),
        CrawlEvent::Adding(names) => eprintln!("adding {}...", names.join(" ")),
        CrawlEvent::Upgrading(count) => eprintln!("upgrading {count} package(s)..."),
        CrawlEvent::PassStarted { pass, files } if verbose => {
            eprintln!("pass {pass}: checking {files} file(s)");
        }
        CrawlEvent::FileChecked(outcome) if verbose => {
            eprintln!("  {:<18} {}", outcome.status.label(), outcome.path.display());
        }
        CrawlEvent::CheckingFreshness { packages } if verbose => {
            eprintln!("checking {packages} declared package(s) for upgrades");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn parse_defaults() {
        let cli = Cli::parse_from(["crawler"]);
        assert_eq!(cli.path, PathBuf::from("."));
        assert!(!cli.verbose);
        assert!(!cli.force);
        assert_eq!(cli.overrides(), ConfigOverrides::default());
    }

    #[test]
    fn parse_flags_and_overrides() {
        let cli = Cli::parse_from([
            "crawler",
            "src",
            "-v",
            "--force",
            "--timeout-secs",
            "3",
            "--max-retries",
            "5",
            "-j",
            "8",
        ]);
        assert_eq!(cli.path, PathBuf::from("src"));
        assert!(cli.verbose);
        assert!(cli.force);
        assert_eq!(
            cli.overrides(),
            ConfigOverrides {
                child_timeout_secs: Some(3),
                max_retries: Some(5),
                concurrency: Some(8),
            }
        );
    }

    #[test]
    fn config_defaults_to_project_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("index.js");
        std::fs::write(&file, "").expect("write");

        let cli = Cli::parse_from([OsStr::new("crawler"), file.as_os_str()]);
        assert_eq!(cli.config_path(), temp.path().join(CONFIG_FILE_NAME));

        let cli = Cli::parse_from([OsStr::new("crawler"), temp.path().as_os_str()]);
        assert_eq!(cli.config_path(), temp.path().join(CONFIG_FILE_NAME));

        let cli = Cli::parse_from(["crawler", "--config", "/etc/crawler.toml"]);
        assert_eq!(cli.config_path(), PathBuf::from("/etc/crawler.toml"));
    }
}
