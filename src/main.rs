use anyhow::Result;
use clap::Parser;
use tmcapture::{TmCaptureConfig, TmCaptureOrchestrator};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "tmcapture")]
#[command(about = "Time-lapse capture from a networked camera board")]
#[command(version)]
#[command(long_about = "Polls a camera board over HTTP for live preview, records 96x96 \
grayscale stills at a fixed interval while recording is active, and saves each recording \
as a ZIP archive of sequentially numbered JPEG files.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "tmcapture.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Override the camera base URL
    #[arg(long, value_name = "URL", help = "Camera base URL, e.g. http://192.168.4.1")]
    base_url: Option<String>,

    /// Initial value of the interval control
    #[arg(long, value_name = "MS", help = "Initial recording interval in milliseconds")]
    interval: Option<u64>,

    /// Run without terminal controls
    #[arg(long, help = "Run headless: preview only, until Ctrl+C")]
    no_keyboard: bool,

    /// Serve frames from the built-in device simulator
    #[arg(long, help = "Start a local device simulator and capture from it")]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting tmcapture v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match TmCaptureConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(base_url) = &args.base_url {
        config.source.base_url = base_url.clone();
    }
    if let Some(interval) = args.interval {
        if interval < config.acquisition.min_interval_ms {
            warn!(
                "Interval {} ms is below the {} ms floor; recording will use the floor",
                interval, config.acquisition.min_interval_ms
            );
        }
        config.acquisition.default_interval_ms = interval;
    }

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut orchestrator = TmCaptureOrchestrator::new(config).map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;
    orchestrator.set_keyboard_enabled(!args.no_keyboard);
    orchestrator.set_simulate(args.simulate);

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize: {}", e);
        e
    })?;

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("Error during execution: {}", e);
        e
    })?;

    info!("tmcapture exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tmcapture={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .with_writer(std::io::stderr)
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    // stdout carries the status line and headless event log
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# tmcapture configuration file");
    println!("# Every key is optional; the values below are the built-in defaults.");
    println!("# Environment overrides use TMCAPTURE_<SECTION>__<KEY>, e.g. TMCAPTURE_SOURCE__BASE_URL");
    println!();
    println!("{}", toml::to_string_pretty(&TmCaptureConfig::default())?);
    Ok(())
}
