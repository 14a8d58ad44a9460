use anyhow::Result;
use clap::{Parser, Subcommand};
use govuln::{
    cache::Store,
    check::{Check, CheckMode},
    config::{Config, Settings},
    crawler::{crawl_owner, AggregateReport, CrawlOptions, Crawler},
    logging::{init_tracing, verbosity_level},
    modcache::ModuleCache,
    model::Sbom,
    output::{print_run, print_store, OutputFormat},
    scanner::Govulncheck,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const PATH_NOT_FOUND: u8 = 2;
    pub const VULNERABLE: u8 = 3;
}

#[derive(Parser)]
#[command(name = "govuln")]
#[command(
    author,
    version,
    about = "Resolve govulncheck findings for a Go project and its internal modules"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a Go project and its internal submodules
    Run {
        /// Project folder (must contain go.mod)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Report vulnerabilities without failing the exit status
        #[arg(long)]
        just_warn: bool,

        /// Skip the internal submodule crawl
        #[arg(long)]
        no_submodules: bool,

        /// Git owner whose modules are internal
        #[arg(long)]
        internal_owner: Option<String>,

        /// Output format (table, markdown, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Submodules checked at the same time
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Inspect or clear stored results
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// List stored results
    Info {
        /// Output format (table, markdown, json)
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Remove every stored result
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: ignoring config file: {}", e);
        Config::default()
    });
    init_tracing(&verbosity_level(&config.log_level, cli.verbose))?;

    match cli.command {
        Commands::Run {
            path,
            just_warn,
            no_submodules,
            internal_owner,
            format,
            concurrency,
        } => {
            if !path.exists() {
                eprintln!("Error: path not found: {}", path.display());
                return Ok(exit_codes::PATH_NOT_FOUND);
            }

            let format = parse_format(format, &config)?;
            let mut settings = config.resolve();
            if let Some(owner) = internal_owner.filter(|o| !o.is_empty()) {
                settings.internal_owner = Some(owner);
            }
            if let Some(concurrency) = concurrency {
                settings.concurrency = concurrency.max(1);
            }

            run_check(&path, &settings, format, just_warn, !no_submodules).await
        }
        Commands::Store { action } => {
            let settings = config.resolve();
            let store = Store::open(&settings.store_path, settings.cache_ttl_hours)?;
            match action {
                StoreAction::Info { format } => {
                    let format = parse_format(format, &config)?;
                    print_store(store.root(), &store.entries(), format)?;
                }
                StoreAction::Clear => {
                    let removed = store.clear()?;
                    println!("Removed {} stored entries.", removed);
                }
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn parse_format(flag: Option<String>, config: &Config) -> Result<OutputFormat> {
    let format = flag.unwrap_or_else(|| config.default_format.clone());
    OutputFormat::from_str(&format).map_err(|e| anyhow::anyhow!(e))
}

async fn run_check(
    path: &Path,
    settings: &Settings,
    format: OutputFormat,
    just_warn: bool,
    crawl: bool,
) -> Result<u8> {
    let store = Store::open(&settings.store_path, settings.cache_ttl_hours)?;
    let mut scanner = Govulncheck::new(&settings.scanner_binary, settings.scan_timeout);
    if settings.tidy_before_scan {
        scanner = scanner.with_tidy(settings.go_binary.clone());
    }

    let progress = spinner(format.is_interactive(), "Scanning project...");
    let mut check = Check::new(path, &store, &scanner)?;
    let result = check.run(CheckMode::Project).await;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }
    let report = result?;

    let submodules = if crawl {
        crawl_submodules(check.folder(), &report.sbom, settings, &store, &scanner, format).await
    } else {
        None
    };

    print_run(&report, submodules.as_ref(), format)?;

    if report.has_vulnerabilities() && !just_warn {
        Ok(exit_codes::VULNERABLE)
    } else {
        Ok(exit_codes::SUCCESS)
    }
}

async fn crawl_submodules(
    project: &Path,
    sbom: &Sbom,
    settings: &Settings,
    store: &Store,
    scanner: &Govulncheck,
    format: OutputFormat,
) -> Option<AggregateReport> {
    let Some(owner) = crawl_owner(settings.internal_owner.as_deref(), project) else {
        info!("no internal owner configured or detected; skipping submodules");
        return None;
    };

    let module_cache = ModuleCache::new(&settings.module_cache);
    let options = CrawlOptions {
        owner,
        concurrency: settings.concurrency,
        timeout: settings.crawl_timeout,
    };
    let crawler = Crawler::new(store, scanner, &module_cache, options);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping crawl");
            on_signal.cancel();
        }
    });

    let progress = spinner(format.is_interactive(), "Checking internal modules...");
    let aggregate = crawler.crawl(sbom, &cancel).await;
    signal.abort();

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Checked {} internal modules", aggregate.len()));
    }

    Some(aggregate)
}

fn spinner(interactive: bool, message: &'static str) -> Option<ProgressBar> {
    if !interactive {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Some(pb)
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'govuln config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
