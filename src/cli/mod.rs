use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;

use crate::collector::{CollectorOptions, MySqlSource, make_collector};
use crate::config::EffectiveConfig;
use crate::core::{Provider, Report};
use crate::engine::{EngineOptions, ResourceChecker};
use crate::jobs::JobDefinition;
use crate::loader::ChecksLoader;
use crate::registry::{Filters, Registry};
use crate::ui::{SortBy, UiConfig};

#[derive(Debug, Parser)]
#[command(
    name = "unctl",
    version,
    about = "Audit a Kubernetes cluster or a MySQL server against a library of checks"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run Kubernetes checks against the current kubeconfig context.
    K8s(ScanArgs),
    /// Run MySQL checks.
    Mysql(ScanArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Show failing findings only.
    #[arg(short = 'f', long)]
    pub failing_only: bool,
    /// Run only these check ids.
    #[arg(short = 'c', long, value_delimiter = ',', num_args = 1..)]
    pub checks: Vec<String>,
    #[arg(long)]
    pub sort_by: Option<SortBy>,
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub categories: Vec<String>,
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub services: Vec<String>,
    #[arg(short = 'l', long)]
    pub list_checks: bool,
    #[arg(long)]
    pub list_categories: bool,
    #[arg(long)]
    pub list_services: bool,
    /// Read descriptors from `{dir}/{provider}/{id}/{id}.json`.
    #[arg(long)]
    pub checks_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    crate::logs::init(cli.verbose, stderr_is_tty && !cli.no_color);

    let home_dir = crate::config::home_dir().map_err(crate::exit::invalid_args_err)?;
    let cfg = crate::config::load(cli.config.as_deref(), &home_dir)
        .map_err(crate::exit::invalid_args_err)?;

    let ui_cfg = UiConfig {
        color: stdout_is_tty && cfg.ui.color && !cli.no_color,
        stdout_is_tty,
        stderr_is_tty,
        quiet: cli.quiet || cli.json,
        verbose: cli.verbose,
    };

    match &cli.command {
        Commands::K8s(args) => scan(Provider::K8s, args, &cli, &cfg, &ui_cfg),
        Commands::Mysql(args) => scan(Provider::MySql, args, &cli, &cfg, &ui_cfg),
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "unctl", &mut out);
            Ok(())
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !cli.quiet {
                eprintln!("config: use `unctl config --show`");
            }
            Ok(())
        }
    }
}

fn scan(
    provider: Provider,
    args: &ScanArgs,
    cli: &Cli,
    cfg: &EffectiveConfig,
    ui_cfg: &UiConfig,
) -> Result<()> {
    let registry = registry_for(args, cfg)?;

    if args.list_checks {
        let checks = crate::ui::sorted_checks(registry.discover(&Filters::for_provider(provider)));
        return if cli.json {
            write_json(&checks)
        } else {
            crate::ui::print_check_list(&checks, ui_cfg);
            Ok(())
        };
    }
    if args.list_categories || args.list_services {
        let (name, counts) = if args.list_categories {
            ("CATEGORY", registry.categories(Some(provider)))
        } else {
            ("SERVICE", registry.services(Some(provider)))
        };
        return if cli.json {
            write_json(&counts)
        } else {
            crate::ui::print_counts(name, &counts);
            Ok(())
        };
    }

    let filters = Filters {
        provider: Some(provider),
        categories: args.categories.clone(),
        services: args.services.clone(),
        ids: args.checks.clone(),
    };
    let loader = ChecksLoader::new(registry);
    let units = loader.load(&filters);
    crate::ui::status_line(ui_cfg, format!("Loaded {} check(s)", units.len()));

    let jobs = JobDefinition::generate_jobs(units);
    crate::ui::status_line(ui_cfg, format!("Created {} job(s)", jobs.len()));

    let collector = make_collector(
        provider,
        &CollectorOptions {
            request_timeout: cfg.request_timeout(),
            mysql: MySqlSource {
                defaults_file: cfg.mysql.defaults_file.clone(),
                url: cfg.mysql.url.clone(),
            },
        },
    );
    let mut checker = ResourceChecker::new(
        collector,
        jobs,
        EngineOptions {
            check_timeout: cfg.check_timeout(),
            show_progress: ui_cfg.stderr_is_tty && !ui_cfg.quiet,
        },
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(async {
        let snapshot = checker.collect().await?;
        crate::ui::status_line(ui_cfg, format!("Collected {} data", provider.display_name()));
        checker.run(&snapshot).await?;
        anyhow::Ok(())
    })?;

    let failing_only = args.failing_only || cfg.ui.failing_only;
    let results = checker.reports();
    if cli.json {
        let filtered;
        let mut report = checker.report();
        if failing_only {
            filtered = results.failing_only();
            report = Report {
                results: &filtered,
                ..report
            };
        }
        write_json(&report)
    } else {
        let sort_by = args.sort_by.unwrap_or(cfg.ui.sort_by);
        crate::ui::print_results(results, provider, ui_cfg, sort_by, failing_only);
        Ok(())
    }
}

fn registry_for(args: &ScanArgs, cfg: &EffectiveConfig) -> Result<Registry> {
    let dir = args.checks_dir.clone().or_else(|| cfg.checks.dir.clone());
    let Some(dir) = dir else {
        return Ok(Registry::builtin());
    };
    if !dir.is_dir() {
        return Err(crate::exit::invalid_args(format!(
            "checks directory not found: {}",
            dir.display()
        )));
    }
    Ok(Registry::from_dir(dir))
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
