//! acid9: headless runner for the interference sequencer

use std::path::PathBuf;

use acid9_core::{Acid9Sequencer, SequencerConfig, StepOutput};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

#[derive(Debug, Parser)]
#[command(name = "acid9", about = "Step the ACID-9 interference sequencer and print its decisions")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of clock steps to run
    #[arg(short = 'n', long, default_value_t = 32)]
    steps: u64,

    /// Seed override for probability draws and mutation
    #[arg(long)]
    seed: Option<u64>,

    /// Randomize gear A before running
    #[arg(long)]
    mutate_a: bool,

    /// Randomize gear B before running
    #[arg(long)]
    mutate_b: bool,

    /// Hold gear B while gear A turns
    #[arg(long)]
    freeze: bool,

    /// JSON state to restore before running
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Write the JSON state here after running
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Write the effective configuration here and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Print one JSON object per step instead of a table
    #[arg(long)]
    json: bool,
}

fn note_name(pitch: i32) -> String {
    // Pitch 12 is C4
    let class = NOTE_NAMES[pitch.rem_euclid(12) as usize];
    format!("{}{}", class, pitch.div_euclid(12) + 3)
}

fn print_row(out: &StepOutput) {
    let flag = |on: bool, c: char| if on { c } else { '.' };
    println!(
        "{:>5}  {:>3}  {:<4} {} {} {}",
        out.step,
        out.pitch,
        note_name(out.pitch),
        flag(out.gate, 'G'),
        flag(out.slide, 'S'),
        flag(out.accent, 'A'),
    );
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("acid9=info,acid9_core=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SequencerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SequencerConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    if let Some(path) = &args.write_config {
        config
            .save(path)
            .with_context(|| format!("writing config {}", path.display()))?;
        tracing::info!("Wrote config to {}", path.display());
        return Ok(());
    }

    let mut sequencer = Acid9Sequencer::new(config);

    if let Some(path) = &args.load_state {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading state {}", path.display()))?;
        sequencer
            .load_state(&json)
            .with_context(|| format!("parsing state {}", path.display()))?;
        tracing::info!("Restored state from {}", path.display());
    }

    if args.mutate_a {
        sequencer.mutate_a();
    }
    if args.mutate_b {
        sequencer.mutate_b();
    }
    sequencer.set_frozen(args.freeze);

    tracing::info!(
        "Running {} steps, gear B length {}",
        args.steps,
        sequencer.engine().gear_b_length()
    );

    if !args.json {
        println!(" step  pch  note G S A");
    }
    for _ in 0..args.steps {
        let out = sequencer.step();
        if args.json {
            println!("{}", serde_json::to_string(&out)?);
        } else {
            print_row(&out);
        }
    }

    if let Some(path) = &args.save_state {
        std::fs::write(path, sequencer.save_state()?)
            .with_context(|| format!("writing state {}", path.display()))?;
        tracing::info!("Saved state to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(12), "C4");
        assert_eq!(note_name(0), "C3");
        assert_eq!(note_name(21), "A4");
        assert_eq!(note_name(36), "C6");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["acid9", "-n", "8", "--seed", "5", "--json"]);
        assert_eq!(args.steps, 8);
        assert_eq!(args.seed, Some(5));
        assert!(args.json);
        assert!(args.config.is_none());
    }
}
