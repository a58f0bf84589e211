mod output;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use console::{style, Term};
use libcloud_storm::{
    format_elapsed, names, read_nameservers, regions, run_checks, DedupSink, DnsError,
    NameserverSelection, Provider, RateLimit, ScanConfig, ScanError, Scanner,
};
use output::{ConsoleSink, FindingLog, LogFormat};
use serde::{Deserialize, Serialize};
use std::{num::NonZeroU32, path::PathBuf, time::Duration, time::Instant};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const FUZZ: &str = include_str!("fuzz.txt");

const BANNER: &str = r#"
##########################
        cloudstorm
##########################
"#;

#[derive(Debug, Default, Deserialize, Serialize)]
struct Config {
    #[serde(default)]
    scan: ScanSection,
    #[serde(default)]
    rate_limit: RateLimitSection,
    #[serde(default)]
    dns: DnsSection,
    #[serde(default)]
    regions: RegionSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ScanSection {
    threads: Option<usize>,
    quick_scan: Option<bool>,
    firebase_apps: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RateLimitSection {
    requests: Option<u64>,
    pause_secs: Option<u64>,
    requests_per_second: Option<NonZeroU32>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct DnsSection {
    #[serde(default)]
    nameservers: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RegionSection {
    #[serde(default)]
    azure: Vec<String>,
    #[serde(default)]
    gcp: Vec<String>,
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("cloudstorm").join("config.toml"))
}

fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    toml::from_str(&content).unwrap_or_else(|e| {
        warn!("Ignoring malformed config {}: {}", path.display(), e);
        Config::default()
    })
}

fn get_default_config_toml() -> String {
    r#"# cloudstorm configuration
# Command-line flags override everything set here.

[scan]
# Concurrent HTTP workers; DNS uses ten times as many, capped at 500
# threads = 25
# Skip mutations and second-level brute-forcing
# quick_scan = false
# Also probe <name>.firebaseapp.com
# firebase_apps = false

[rate_limit]
# Pause after this many HTTP requests (0 disables the pause)
# requests = 8000
# pause_secs = 240
# Hard cap on HTTP requests per second
# requests_per_second = 50

[dns]
# Empty means the system resolver configuration
# nameservers = ["1.1.1.1", "8.8.8.8"]
nameservers = []

[regions]
# Empty means the defaults (eastus / us-central1)
# azure = ["eastus", "westeurope"]
azure = []
gcp = []
"#
    .to_string()
}

#[derive(Parser, Debug)]
#[command(name = "cloudstorm")]
#[command(about = "Multi-cloud enumeration of public buckets, accounts and apps", long_about = None)]
struct Args {
    /// Keyword. Can be given multiple times
    #[arg(short = 'k', long = "keyword")]
    keywords: Vec<String>,

    /// Input file with a single keyword per line
    #[arg(long = "kf", value_name = "FILE")]
    keyfile: Option<PathBuf>,

    /// Mutations file (default: built-in list)
    #[arg(short = 'm', long = "mutations", value_name = "FILE")]
    mutations: Option<PathBuf>,

    /// Brute-force list for containers and functions (default: built-in list)
    #[arg(short = 'b', long = "brute", value_name = "FILE")]
    brute: Option<PathBuf>,

    /// Concurrent HTTP workers [default: 25]
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Comma-separated nameserver IPs (default: system resolver)
    #[arg(long = "ns", value_delimiter = ',')]
    nameservers: Vec<String>,

    /// File with one nameserver IP per line
    #[arg(long = "nsf", value_name = "FILE")]
    nameserver_file: Option<PathBuf>,

    /// Append findings to this file
    #[arg(short = 'l', long = "logfile", value_name = "FILE")]
    logfile: Option<PathBuf>,

    /// Format for the log file
    #[arg(short = 'f', long = "format", value_enum, default_value_t = LogFormat::Text)]
    format: LogFormat,

    /// Disable Amazon checks
    #[arg(long)]
    disable_aws: bool,

    /// Disable Azure checks
    #[arg(long)]
    disable_azure: bool,

    /// Disable Google checks
    #[arg(long)]
    disable_gcp: bool,

    /// Disable all mutations and second-level scans
    #[arg(long = "qs")]
    quick_scan: bool,

    /// Pause after this many HTTP requests, 0 disables [default: 8000]
    #[arg(long = "rl")]
    rate_limit: Option<u64>,

    /// Seconds to pause when the rate limit is hit [default: 240]
    #[arg(long = "rls")]
    rate_limit_pause: Option<u64>,

    /// Cap on HTTP requests per second
    #[arg(long = "rps")]
    requests_per_second: Option<NonZeroU32>,

    /// Scan every known Azure and GCP region instead of the defaults
    #[arg(long)]
    all_regions: bool,

    /// Also check Firebase apps
    #[arg(long)]
    firebase_apps: bool,

    /// Hide the progress line
    #[arg(long)]
    no_progress: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Print the default config to stdout and exit
    #[arg(long)]
    print_default_config: bool,

    /// Write the default config to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        1 => "debug".into(),
        _ => "trace".into(),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn read_keywords(args: &Args) -> Result<Vec<String>> {
    match (&args.keyfile, args.keywords.is_empty()) {
        (Some(_), false) => bail!("Use either -k or --kf, not both"),
        (None, true) => bail!("You must provide keywords via -k or a keyword file via --kf"),
        (None, false) => Ok(args.keywords.clone()),
        (Some(path), true) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot access keyword file {}", path.display()))?;
            let keywords = names::read_lines(&content);
            if keywords.is_empty() {
                bail!("Keyword file {} is empty", path.display());
            }
            Ok(keywords)
        }
    }
}

/// A user-supplied list, or the built-in one.
fn read_list(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Cannot access {}", path.display())),
        None => Ok(FUZZ.to_string()),
    }
}

fn nameserver_selection(args: &Args, config: &Config) -> Result<NameserverSelection> {
    if let Some(path) = &args.nameserver_file {
        return Ok(NameserverSelection::Custom(read_nameservers(path)?));
    }
    if !args.nameservers.is_empty() {
        return Ok(NameserverSelection::custom(&args.nameservers)?);
    }
    Ok(NameserverSelection::custom(&config.dns.nameservers)?)
}

fn region_list(configured: &[String], all: &[&str], defaults: &[&str], all_regions: bool) -> Vec<String> {
    if all_regions {
        all.iter().map(|r| r.to_string()).collect()
    } else if !configured.is_empty() {
        configured.to_vec()
    } else {
        defaults.iter().map(|r| r.to_string()).collect()
    }
}

fn build_scan_config(args: &Args, config: &Config, brute_list: String) -> Result<ScanConfig> {
    let defaults = ScanConfig::default();

    let threads = args
        .threads
        .or(config.scan.threads)
        .unwrap_or(defaults.threads);
    if threads == 0 {
        bail!("Thread count must be at least 1");
    }

    let default_limit = defaults.rate_limit.unwrap_or(RateLimit {
        requests: 8000,
        pause: Duration::from_secs(240),
    });
    let requests = args
        .rate_limit
        .or(config.rate_limit.requests)
        .unwrap_or(default_limit.requests);
    let pause = args
        .rate_limit_pause
        .or(config.rate_limit.pause_secs)
        .map(Duration::from_secs)
        .unwrap_or(default_limit.pause);
    let rate_limit = (requests > 0).then_some(RateLimit { requests, pause });

    Ok(ScanConfig {
        threads,
        nameservers: nameserver_selection(args, config)?,
        rate_limit,
        requests_per_second: args
            .requests_per_second
            .or(config.rate_limit.requests_per_second),
        quick_scan: args.quick_scan || config.scan.quick_scan.unwrap_or(false),
        brute_list,
        azure_regions: region_list(
            &config.regions.azure,
            regions::AZURE_REGIONS,
            regions::DEFAULT_AZURE_REGIONS,
            args.all_regions,
        ),
        gcp_regions: region_list(
            &config.regions.gcp,
            regions::GCP_REGIONS,
            regions::DEFAULT_GCP_REGIONS,
            args.all_regions,
        ),
        firebase_apps: args.firebase_apps || config.scan.firebase_apps.unwrap_or(false),
        show_progress: !args.no_progress && Term::stderr().is_term(),
    })
}

fn enabled_providers(args: &Args) -> Vec<Provider> {
    let mut enabled = Vec::new();
    if !args.disable_aws {
        enabled.push(Provider::Aws);
    }
    if !args.disable_azure {
        enabled.push(Provider::Azure);
    }
    if !args.disable_gcp {
        enabled.push(Provider::Gcp);
    }
    enabled
}

fn print_status(args: &Args, keywords: &[String], scan: &ScanConfig) {
    print!("{}", BANNER);
    println!("Keywords:    {}", keywords.join(", "));
    if scan.quick_scan {
        println!("Mutations:   NONE! (Using quickscan)");
    } else {
        match &args.mutations {
            Some(path) => println!("Mutations:   {}", path.display()),
            None => println!("Mutations:   (built-in list)"),
        }
    }
    match &args.brute {
        Some(path) => println!("Brute-list:  {}", path.display()),
        None => println!("Brute-list:  (built-in list)"),
    }
    match &scan.nameservers {
        NameserverSelection::System => println!("Nameservers: (system)"),
        NameserverSelection::Custom(servers) => println!(
            "Nameservers: {}",
            servers
                .iter()
                .map(|ip| ip.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
    if let Some(limit) = scan.rate_limit {
        println!(
            "Rate-limit:  sleep {}s every {} HTTP requests",
            limit.pause.as_secs(),
            limit.requests
        );
    }
    println!();
}

async fn run(args: Args, keywords: Vec<String>, scan: ScanConfig) -> Result<()> {
    let log = args
        .logfile
        .as_deref()
        .map(|path| FindingLog::open(path, args.format))
        .transpose()?;

    let mutations = if scan.quick_scan {
        Vec::new()
    } else {
        let list = names::read_lines(&read_list(args.mutations.as_ref())?);
        println!("[+] Mutations list imported: {} items", list.len());
        list
    };
    let candidates = names::build_names(&keywords, &mutations);

    let enabled = enabled_providers(&args);
    let scanner = Scanner::new(scan)?;
    let sink = DedupSink::new(ConsoleSink::new(log));
    let started = Instant::now();

    match run_checks(&scanner, &candidates, &enabled, &sink).await {
        Ok(()) => {}
        Err(ScanError::Dns(e @ DnsError::NameserverFailure { .. })) => {
            eprintln!("{} {}", style("[!]").red().bold(), e);
            eprintln!("    The nameserver is failing; pick another with --ns or --nsf and try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    println!(
        "\n[+] All done, happy hacking! {} distinct findings in {}",
        sink.distinct(),
        format_elapsed(started.elapsed())
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_default_config {
        println!("{}", get_default_config_toml());
        return Ok(());
    }

    if args.write_default_config {
        if let Some(path) = config_path() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, get_default_config_toml())?;
            println!("Default config written to: {}", path.display());
        } else {
            eprintln!("Error: Could not determine config path");
            std::process::exit(1);
        }
        return Ok(());
    }

    init_logging(args.verbose);
    let config = load_config();

    let keywords = read_keywords(&args).unwrap_or_else(|e| fail(e));
    if let Some(path) = &args.logfile {
        if path.is_dir() {
            fail(anyhow::anyhow!("Can't specify a directory as the logfile, exiting."));
        }
    }
    let brute_list = read_list(args.brute.as_ref()).unwrap_or_else(|e| fail(e));
    let scan = build_scan_config(&args, &config, brute_list).unwrap_or_else(|e| fail(e));

    print_status(&args, &keywords, &scan);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args, keywords, scan))
}

fn fail(e: anyhow::Error) -> ! {
    eprintln!("{} {:#}", style("[!]").red().bold(), e);
    std::process::exit(1);
}
