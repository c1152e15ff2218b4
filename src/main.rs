use anyhow::Result;
use clap::Parser;
use kdll::{KernelCacheConfig, fold_hash, simple_hash};
use kdll_cli::cli::{CliConfig, Command, OutputFormat, parse_hex};
use kdll_cli::replay;
use kdll_instrumentation::{AppConfig, subscriber::init_subscriber};

fn main() -> Result<()> {
    let cli = CliConfig::parse();
    cli.validate()?;

    let app_config = AppConfig::initialise(AppConfig::from_env()?.with_verbosity(cli.verbose))?;
    init_subscriber(app_config)?;

    match &cli.command {
        Command::Replay(args) => {
            let cache_config = KernelCacheConfig::from_env()?;
            tracing::debug!(?cache_config, "kernel cache configuration");
            let report = replay::run(&args.workload(), cache_config)?;
            match cli.output_format {
                OutputFormat::Text => println!("{report}"),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Command::Hash { bytes } => {
            let bytes = parse_hex(bytes)?;
            let hash = simple_hash(&bytes);
            let bucket = fold_hash(hash);
            match cli.output_format {
                OutputFormat::Text => println!("hash {hash:#010x} bucket {bucket}"),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({ "bytes": bytes.len(), "hash": hash, "bucket": bucket })
                ),
            }
        }
    }
    Ok(())
}
