//! Copies stdin to stdout unchanged, counting bytes or lines on stderr.
//!
//! `cat big.iso | cargo run --example pipe -- -o unit_scale=true > copy.iso`
//! `find / | cargo run --example pipe -- --lines | wc -l`

use std::io::{self, BufRead, BufReader, Write};
use std::process;

use clap::Parser;

use progmeter::{BarConfig, ProgressBar};

#[derive(Debug, Parser)]
#[command(about = "Copy stdin to stdout with a progress meter")]
struct Cli {
    /// Expected size of the input, in bytes or lines
    #[arg(long)]
    total: Option<f64>,
    /// Count lines instead of bytes
    #[arg(long)]
    lines: bool,
    /// Bar options as `name=value`, applied after the environment
    #[arg(short = 'o', long = "option")]
    options: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("pipe: {}", err);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let unit = if cli.lines { "it" } else { "B" };
    let mut config = BarConfig::from_env()?.unit(unit).total(cli.total);
    for option in &cli.options {
        let (name, value) = option.split_once('=').unwrap_or((option.as_str(), "true"));
        config.set(name, value)?;
    }

    let pb = ProgressBar::with_config(config)?;
    let mut stdout = io::stdout().lock();
    if cli.lines {
        let mut input = BufReader::new(io::stdin().lock());
        let mut line = Vec::new();
        while input.read_until(b'\n', &mut line)? > 0 {
            stdout.write_all(&line)?;
            line.clear();
            pb.inc(1);
        }
    } else {
        let mut input = pb.wrap_read(BufReader::new(io::stdin().lock()));
        io::copy(&mut input, &mut stdout)?;
    }
    stdout.flush()?;
    pb.close();
    Ok(())
}
