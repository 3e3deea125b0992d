use std::fs::File;
use std::io::{self, BufRead, BufReader};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pricetime_clob::config::{LogFormat, Settings};
use pricetime_clob::engine::{BookService, Engine};
use pricetime_clob::metrics::install_recorder;
use pricetime_clob::output::JsonLines;

#[derive(Parser, Debug)]
#[command(name = "engine", about = "Apply ADD/CANCEL commands to a limit order book")]
struct Args {
    #[arg(long)]
    config: Option<String>,
    /// Command file; overrides the configured input. Reads stdin when absent.
    #[arg(long)]
    input: Option<String>,
    #[arg(long)]
    depth: Option<usize>,
    /// Route commands through the single-writer book service.
    #[arg(long)]
    service: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match settings.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
    }
    let prom = if settings.emit_metrics {
        Some(install_recorder()?)
    } else {
        None
    };

    let depth = args.depth.unwrap_or(settings.depth);
    let reader: Box<dyn BufRead> = match args.input.or(settings.input_path) {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };
    let mut out = JsonLines::new(io::stdout().lock());

    let (summary, snapshot, resting) = if args.service {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(async {
            let (handle, task) = BookService::spawn(settings.channel_capacity);
            let summary = handle.replay(reader, |envelope| out.emit(envelope)).await?;
            let snapshot = handle.snapshot(depth).await?;
            drop(handle);
            let engine = task.await?;
            anyhow::Ok((summary, snapshot, engine.book().len()))
        })?
    } else {
        let mut engine = Engine::new();
        let summary = engine.replay(reader, |envelope| out.emit(envelope))?;
        (summary, engine.snapshot(depth), engine.book().len())
    };
    out.emit(&snapshot);
    out.finish()?;

    info!(
        commands = summary.commands,
        rejected = summary.rejected,
        unparsable = summary.unparsable,
        resting,
        service = args.service,
        "replay complete"
    );
    if let Some(prom) = prom {
        eprintln!("{}", prom.render());
    }
    Ok(())
}
