use anyhow::{Context, Result};
use engine::config::NBackConfig;
use engine::tasks::nback::sequence::{generate, match_indices};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::args::SequenceArgs;

#[derive(Debug, Serialize)]
struct SequenceReport {
    n_back: usize,
    repeat_probability: f64,
    seed: u64,
    sequence: Vec<u8>,
    matches: Vec<usize>,
    match_rate: f64,
}

pub fn execute(args: &SequenceArgs, config: &NBackConfig) -> Result<()> {
    let report = build(args, config)?;
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize sequence")?;
    println!("{json}");
    Ok(())
}

fn build(args: &SequenceArgs, config: &NBackConfig) -> Result<SequenceReport> {
    let probability = args.probability.unwrap_or(config.repeat_probability);
    if !(0.0..=1.0).contains(&probability) {
        anyhow::bail!("Invalid probability: {probability}. Must be within [0, 1]");
    }
    if args.n_back == 0 {
        anyhow::bail!("Invalid n_back: 0. Must be at least 1");
    }

    let sequence = generate(
        &mut StdRng::seed_from_u64(args.seed),
        args.length,
        args.n_back,
        probability,
    );
    let matches = match_indices(&sequence, args.n_back);
    let eligible = args.length.saturating_sub(args.n_back);
    let match_rate = if eligible > 0 {
        matches.len() as f64 / eligible as f64
    } else {
        0.0
    };

    Ok(SequenceReport {
        n_back: args.n_back,
        repeat_probability: probability,
        seed: args.seed,
        sequence,
        matches,
        match_rate,
    })
}
