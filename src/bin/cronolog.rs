use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::TimeZone;
use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cronolog::{copy_stream, DateOrder, LinkKind, PeriodSpec, RotationConfig, RotationDelay, Rotator};

#[derive(Parser)]
#[command(
    name = "cronolog",
    version,
    about = "Write standard input to log files named from a strftime template",
    long_about = None
)]
struct Cli {
    /// Filename template, e.g. /var/log/www/%Y/%m/%d/access.log
    template: Option<String>,

    /// Maintain a hard link to the current log file
    #[arg(short = 'H', long, value_name = "NAME", conflicts_with_all = ["symlink", "link"])]
    hardlink: Option<PathBuf>,

    /// Maintain a symbolic link to the current log file
    #[arg(short = 'S', long, value_name = "NAME", conflicts_with = "link")]
    symlink: Option<PathBuf>,

    /// Same as --symlink
    #[arg(short = 'l', long, value_name = "NAME")]
    link: Option<PathBuf>,

    /// Maintain a symbolic link to the previous log file
    #[arg(short = 'P', long = "prev-symlink", value_name = "NAME")]
    prev_symlink: Option<PathBuf>,

    /// Rotation period, e.g. "15 minutes" or "day"
    #[arg(short = 'p', long, value_name = "PERIOD")]
    period: Option<String>,

    /// Shift rotation boundaries, e.g. "5 minutes" or "-30 seconds"
    #[arg(long, value_name = "DELAY", allow_hyphen_values = true)]
    delay: Option<String>,

    /// Write to a single file and never rotate
    #[arg(short = 'o', long)]
    once_only: bool,

    /// Pretend the program started at TIME
    #[arg(short = 's', long, value_name = "TIME")]
    start_time: Option<String>,

    /// Parse --start-time as month before day
    #[arg(short = 'a', long, conflicts_with = "european")]
    american: bool,

    /// Parse --start-time as day before month (default)
    #[arg(short = 'e', long)]
    european: bool,

    /// IANA time zone for period boundaries, instead of the system zone
    #[arg(short = 'z', long = "time-zone", value_name = "TZ")]
    time_zone: Option<String>,

    /// Write debug messages to FILE, or to stderr if FILE is "-"
    #[arg(short = 'x', long, value_name = "FILE")]
    debug: Option<PathBuf>,

    /// Log format (text, json)
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Load settings from a TOML file; command line options take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the next N period starts and file names, then exit
    #[arg(long, value_name = "N")]
    preview: Option<usize>,

    /// Print the effective configuration, then exit
    #[arg(long)]
    show_config: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_format, cli.debug.as_deref()) {
        eprintln!("cronolog: {:#}", e);
        return ExitCode::from(1);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let cause = e.downcast_ref::<cronolog::Error>();
            if cause.is_some_and(|err| err.is_resource_error()) {
                error!(error = %e, "log output unavailable, remaining input is discarded");
            } else {
                error!(error = %e, "exiting");
            }
            eprintln!("cronolog: {:#}", e);

            if let Some(hint) = cause.and_then(|err| err.suggestion()) {
                eprintln!("hint: {}", hint);
            }
            let code = cause.map_or(1, |err| err.exit_code());
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn setup_tracing(format: &str, debug: Option<&Path>) -> Result<()> {
    let env_filter = if debug.is_some() {
        tracing_subscriber::EnvFilter::new("cronolog=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cronolog=warn,warn"))
    };

    let writer = match debug {
        Some(path) if path != Path::new("-") => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open debug file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        _ => BoxMakeWriter::new(io::stderr),
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
        }
    }

    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = build_config(cli)?;

    if cli.show_config {
        print!("{}", config.to_string_pretty());
        return Ok(());
    }

    match &cli.time_zone {
        Some(name) => {
            let tz: chrono_tz::Tz = name
                .parse()
                .map_err(|e| cronolog::Error::config(format!("unknown time zone {:?}: {}", name, e)))?;
            run_with(&config, tz, cli.preview)
        }
        None => run_with(&config, chrono::Local, cli.preview),
    }
}

/// Merge the optional config file with command line options
fn build_config(cli: &Cli) -> Result<RotationConfig> {
    let mut config = match &cli.config {
        Some(path) => RotationConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RotationConfig::default(),
    };

    if let Some(template) = &cli.template {
        config = config.with_template(template.as_str());
    }
    if let Some(period) = &cli.period {
        config = config.with_period(PeriodSpec::parse(period).map_err(cronolog::Error::from)?);
    }
    if let Some(delay) = &cli.delay {
        config = config.with_delay(RotationDelay::parse(delay).map_err(cronolog::Error::from)?);
    }
    if cli.once_only {
        config = config.with_once_only(true);
    }
    if let Some(start) = &cli.start_time {
        config = config.with_start_time(start.as_str());
    }
    if cli.american {
        config = config.with_date_order(DateOrder::American);
    } else if cli.european {
        config = config.with_date_order(DateOrder::European);
    }

    if let Some(path) = &cli.hardlink {
        config = config.with_link(path, LinkKind::Hard);
    } else if let Some(path) = cli.symlink.as_ref().or(cli.link.as_ref()) {
        config = config.with_link(path, LinkKind::Symbolic);
    }
    if let Some(path) = &cli.prev_symlink {
        config = config.with_prev_link(path);
    }

    config.validate()?;
    debug!("effective configuration:\n{}", config.to_string_pretty());
    Ok(config)
}

fn run_with<Tz>(config: &RotationConfig, tz: Tz, preview: Option<usize>) -> Result<()>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut rotator = Rotator::from_config(config, tz)?;

    if let Some(count) = preview {
        println!("Rotation period: {}", rotator.clock().spec());
        for (i, (start, path)) in rotator.preview(rotator.now(), count)?.into_iter().enumerate() {
            println!(
                "{:>4}  {}  {}",
                i + 1,
                start.format("%Y-%m-%d %H:%M:%S %Z"),
                path.display()
            );
        }
        return Ok(());
    }

    let copied = copy_stream(&mut io::stdin().lock(), &mut rotator, config.buffer_size)?;
    debug!(bytes = copied, "{}", rotator.metrics().get_report());
    Ok(())
}
