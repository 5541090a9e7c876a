//! Chunk inspection utility
//!
//! Parses external keys, decodes encoded chunk files against their key,
//! writes synthetic chunks for testing caches and stores, and evaluates
//! union/intersection over files of sorted keys.

use chunkstore::chunk::{
    decode_bytes, n_way_intersect, n_way_union, parse_external_key, sort_by_key, Chunk, Descriptor,
};
use chunkstore::encoding::Encoding;
use chunkstore::model::{Metric, SamplePair, Time, METRIC_NAME_LABEL};
use chunkstore::telemetry::Telemetry;
use chunkstore::Config;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "chunk-tool", about = "Inspect and produce encoded chunks")]
struct Args {
    /// Tenant the keys belong to
    #[arg(long, env = "CHUNKSTORE_TENANT_ID", default_value = "default", global = true)]
    tenant: String,

    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the descriptor named by an external key
    ParseKey {
        #[arg(long)]
        key: String,
    },
    /// Decode an encoded chunk file and print its samples
    Decode {
        #[arg(long)]
        key: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Write a synthetic chunk and print its external key
    EncodeDemo {
        #[arg(long, default_value = "demo_metric")]
        metric: String,
        #[arg(long, default_value_t = 120)]
        samples: usize,
        /// Milliseconds between samples
        #[arg(long, default_value_t = 15_000)]
        step_ms: i64,
        #[arg(long)]
        encoding: Option<Encoding>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Combine files of external keys, one key per line
    SetOp {
        #[arg(long, value_enum)]
        op: SetOp,
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SetOp {
    Union,
    Intersect,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _telemetry = Telemetry::init_for_component("chunkstore-chunk-tool", &args.log_level)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let config = Config::from_env()?;

    match args.command {
        Command::ParseKey { key } => {
            let desc = parse_external_key(&args.tenant, &key)?;
            println!("{}", serde_json::to_string_pretty(&desc)?);
        }
        Command::Decode { key, file } => {
            let desc = parse_external_key(&args.tenant, &key)?;
            let buf = tokio::fs::read(&file).await?;
            let chunk = decode_bytes(&desc, &buf)?;
            info!(
                key = %key,
                encoding = %chunk.descriptor().encoding,
                bytes = buf.len(),
                "Decoded chunk"
            );
            let samples = chunk.samples()?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "metric": chunk.descriptor().metric,
                    "samples": samples,
                }))?
            );
        }
        Command::EncodeDemo {
            metric,
            samples,
            step_ms,
            encoding,
            output,
        } => {
            anyhow::ensure!(samples > 0, "--samples must be greater than 0");
            anyhow::ensure!(step_ms > 0, "--step-ms must be greater than 0");

            let from = Time::now();
            let points: Vec<SamplePair> = (0..samples as i64)
                .map(|i| SamplePair::new(Time(from.0 + i * step_ms), (i as f64).sin()))
                .collect();
            let through = points.last().map(|p| p.timestamp).unwrap_or(from);
            let metric = Metric::new()
                .with_label(METRIC_NAME_LABEL, metric)
                .with_label("source", "chunk-tool");
            let encoding = encoding.unwrap_or(config.default_encoding);

            let mut chunk = Chunk::from_samples(
                Descriptor::new(&args.tenant, metric, from, through, encoding),
                &points,
            )?;
            let buf = chunk.encode()?;
            tokio::fs::write(&output, &buf).await?;
            info!(path = %output.display(), bytes = buf.len(), "Wrote chunk");
            println!("{}", chunk.descriptor().external_key());
        }
        Command::SetOp { op, files } => {
            let mut sets = Vec::with_capacity(files.len());
            for file in &files {
                let contents = tokio::fs::read_to_string(file).await?;
                let mut descs = Vec::new();
                for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    descs.push(parse_external_key(&args.tenant, line)?);
                }
                sets.push(sort_by_key(descs));
            }
            let result = match op {
                SetOp::Union => n_way_union(&sets),
                SetOp::Intersect => n_way_intersect(&sets),
            };
            for desc in result {
                println!("{}", desc.external_key());
            }
        }
    }

    Ok(())
}
