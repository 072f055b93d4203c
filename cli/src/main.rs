use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use input_knob::config::{KnobConfig, validate_scale};
use input_knob::consts::DEFAULT_SCALE;
use input_knob::geometry::ElementGeometry;
use tracing_subscriber::EnvFilter;

mod replay;


use replay::Replayer;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {source}")]
    Parse { line: usize, source: serde_json::Error },
    #[error("cannot encode output: {0}")]
    Encode(serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "knob-cli", about = "Rotary knob trace replay CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON-lines trace and print the emitted events.
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct ReplayArgs {
    #[arg(help = "Trace file; stdin when absent")]
    file: Option<PathBuf>,

    #[arg(long, env = "KNOB_SCALE", default_value_t = DEFAULT_SCALE, value_parser = parse_scale, help = "Units per full turn (> 0)")]
    scale: f64,

    #[arg(long, env = "KNOB_MIN", default_value = "0", value_parser = parse_bound, help = "Lower bound, or `none`")]
    min: Bound,

    #[arg(long, env = "KNOB_MAX", default_value = "100", value_parser = parse_bound, help = "Upper bound, or `none`")]
    max: Bound,

    #[arg(long, env = "KNOB_VALUE", default_value_t = input_knob::consts::DEFAULT_VALUE)]
    value: f64,

    #[arg(long, default_value_t = 100.0, help = "Knob width in pixels")]
    width: f64,

    #[arg(long, default_value_t = 100.0, help = "Knob height in pixels")]
    height: f64,

    #[arg(long, default_value_t = false, help = "Print value/angle/rotations after each line")]
    state: bool,
}

/// A bound flag value; `none` means unbounded.
#[derive(Debug, Clone, Copy)]
struct Bound(Option<f64>);

fn parse_bound(raw: &str) -> Result<Bound, String> {
    if raw.eq_ignore_ascii_case("none") {
        return Ok(Bound(None));
    }
    raw.parse::<f64>().map(|v| Bound(Some(v))).map_err(|e| format!("expected a number or `none`: {e}"))
}

fn parse_scale(raw: &str) -> Result<f64, String> {
    let scale = raw.parse::<f64>().map_err(|e| format!("expected a number: {e}"))?;
    validate_scale(scale).map_err(|e| e.to_string())
}

fn main() -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Replay(args) => run_replay(args),
    }
}

fn run_replay(args: ReplayArgs) -> Result<(), CliError> {
    let config = KnobConfig { value: args.value, scale: args.scale, min: args.min.0, max: args.max.0 };
    let geometry = ElementGeometry::sized(0.0, 0.0, args.width, args.height);
    let mut replayer = Replayer::new(config, geometry);

    let reader: Box<dyn BufRead> = match &args.file {
        Some(path) => {
            let file = File::open(path).map_err(|source| CliError::Open { path: path.clone(), source })?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let lines = replay::run(reader, &mut stdout.lock(), &mut replayer, args.state)?;
    tracing::debug!(lines, value = replayer.core().value(), "replay finished");
    Ok(())
}
