use std::fs::File;
use std::io::BufReader;

use clap::Parser;

use pricetime_clob::engine::Engine;

#[derive(Parser, Debug)]
#[command(name = "replay")]
struct Args {
    #[arg(long)]
    input: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let file = File::open(&args.input)?;

    let mut engine = Engine::new();
    let summary = engine.replay(BufReader::new(file), |_| {})?;

    println!("commands={}", summary.commands);
    println!("rejected={}", summary.rejected);
    println!("resting_orders={}", engine.book().len());
    println!("state_hash={}", engine.state_hash()?.to_hex());
    Ok(())
}
