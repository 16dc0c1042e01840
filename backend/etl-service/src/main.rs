use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use db_pool::{create_pool, DbConfig};
use etl_service::config::{ExportOptions, FetchOptions, KafkaConfig};
use etl_service::db::{read_sql_script, PgRowSource};
use etl_service::kafka::{KafkaBatchProducer, KafkaTransport};
use etl_service::metrics::{write_textfile, PipelineMetrics};
use etl_service::services::{BatchPipeline, RowExporter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "etl-service";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,etl_service=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries consumed records, logs go to stderr
    if env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  etl-service export <sql_file> <topic>");
    eprintln!("  etl-service consume <topic> <consumer_group> [--cdc] [--no-commit]");
    eprintln!("  etl-service topics");
    std::process::exit(1);
}

async fn run_export(sql_file: &str, topic: &str, metrics: PipelineMetrics) -> Result<()> {
    let sql = read_sql_script(sql_file)
        .await
        .with_context(|| format!("Failed to read SQL script {}", sql_file))?;

    let db_config = DbConfig::from_env(SERVICE_NAME).map_err(anyhow::Error::msg)?;
    db_config.log_config();
    let pool = create_pool(db_config)
        .await
        .context("Failed to create database pool")?;

    let producer = KafkaBatchProducer::new(&KafkaConfig::from_env())
        .context("Failed to create Kafka producer")?;
    let exporter = RowExporter::with_metrics(PgRowSource::new(pool), producer, metrics);

    let report = exporter
        .export(&sql, &ExportOptions::from_env(topic))
        .await
        .context("Export failed")?;

    tracing::info!(
        rows = report.rows_sent,
        batch_id = ?report.batch_id,
        "Exported rows to {}",
        topic
    );
    Ok(())
}

async fn run_consume(
    topic: &str,
    group: &str,
    flags: &[String],
    metrics: PipelineMetrics,
) -> Result<()> {
    let mut options = FetchOptions::from_env(topic, group)?;
    for flag in flags {
        match flag.as_str() {
            "--cdc" => options = options.with_cdc_extraction(true),
            "--no-commit" => options = options.with_commit(false),
            other => anyhow::bail!("Unknown flag: {}", other),
        }
    }

    let pipeline =
        BatchPipeline::with_metrics(KafkaTransport::new(KafkaConfig::from_env()), metrics);
    let result = pipeline
        .fetch_batch(&options)
        .await
        .context("Failed to fetch batch")?;

    for record in &result.records {
        println!("{}", serde_json::to_string(record)?);
    }
    match result.offset {
        Some(offset) => eprintln!("offset: {}", offset),
        None => eprintln!("offset: none"),
    }
    Ok(())
}

fn run_topics() -> Result<()> {
    let transport = KafkaTransport::new(KafkaConfig::from_env());
    for topic in transport.list_topics().context("Failed to list topics")? {
        println!("{}", topic);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let metrics = PipelineMetrics::new();
    let outcome = match args[1].as_str() {
        "export" if args.len() == 4 => run_export(&args[2], &args[3], metrics).await,
        "consume" if args.len() >= 4 => run_consume(&args[2], &args[3], &args[4..], metrics).await,
        "topics" if args.len() == 2 => run_topics(),
        _ => usage(),
    };

    if let Ok(path) = env::var("METRICS_TEXTFILE") {
        if let Err(e) = write_textfile(&PathBuf::from(&path)) {
            tracing::warn!("Failed to write metrics to {}: {}", path, e);
        }
    }

    outcome
}
