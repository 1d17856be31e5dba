use std::path::PathBuf;

use clap::Parser;
use cphd_extract::{run, ExtractConfig, ExtractResult};
use log::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "cphd-extract",
    version = env!("CARGO_PKG_VERSION"),
    about = "Pull the metadata, PVP and wideband data from a CPHD file",
    long_about = None,
)]
struct Cli {
    /// Входной .cphd файл
    cphd: PathBuf,
    /// XML-схема CPHD (можно указать несколько раз)
    #[arg(short, long)]
    schema: Vec<PathBuf>,
    /// Потоков на чтение канала. По умолчанию: по числу ядер
    #[arg(short, long)]
    workers: Option<usize>,
    /// Читать только указанный канал
    #[arg(short, long)]
    channel: Option<usize>,
    /// Вывести отчёт в JSON
    #[arg(long)]
    json: bool,
    /// Тихий режим (только ошибки)
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Info
    };

    let mut logger = env_logger::Builder::new();
    logger.filter_level(level);

    // RUST_LOG может поднять уровень (например, debug для cphd_core)
    if !cli.quiet {
        logger.parse_default_env();
    }

    logger.format_target(false).format_timestamp_secs().init();

    let config = ExtractConfig {
        input: cli.cphd.clone(),
        schemas: cli.schema.clone(),
        workers: cli.workers,
        channel: cli.channel,
    };

    if let Err(e) = extract(&config, cli.json) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn extract(
    config: &ExtractConfig,
    json: bool,
) -> ExtractResult<()> {
    info!("Reading {:?}", config.input);

    let report = run(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.xml.trim_end());
        println!("{report}");
    }

    info!(
        "✓ {} channel(s), {} B read in {} positioned read(s)",
        report.channels.len(),
        report.bytes_read,
        report.positioned_reads
    );

    Ok(())
}
