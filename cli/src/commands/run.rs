//! `cogscreen run`: one assessment against a simulated participant.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use engine::config::NBackConfig;
use engine::core::format::{format_level, format_ms, format_percent};
use engine::core::timing::{self, InstantStamp};
use engine::tasks::nback::export::{summary_record, TestItemPayload};
use engine::tasks::nback::{
    channel, run, Advance, EngineEvent, NBackEngine, Phase, SessionOutcome,
};
use tracing::{debug, info, warn};

use crate::args::{OutputFormat, RunArgs};
use crate::participant::SimulatedParticipant;

pub async fn execute(args: RunArgs, config: NBackConfig) -> Result<()> {
    if args.realtime && args.rt_max_ms >= config.inter_stimulus_interval_ms {
        // On live timers a tap past the window lands in the next trial.
        anyhow::bail!(
            "Invalid rt_max_ms: {}. Must be below the {} ms response window with --realtime",
            args.rt_max_ms,
            config.inter_stimulus_interval_ms
        );
    }
    if args.rt_max_ms >= config.inter_stimulus_interval_ms {
        warn!(
            rt_max_ms = args.rt_max_ms,
            window_ms = config.inter_stimulus_interval_ms,
            "simulated reaction times can outlast the response window"
        );
    }

    let participant = SimulatedParticipant::new(
        args.seed.wrapping_add(1),
        args.accuracy,
        args.rt_min_ms,
        args.rt_max_ms,
    )?;
    let engine = NBackEngine::seeded(config, args.seed).context("Failed to create engine")?;

    let outcome = if args.realtime {
        drive_realtime(engine, participant, args.abort_after).await?
    } else {
        drive_synthetic(engine, participant, args.abort_after)?
    };

    let output = render(&outcome, args.format)?;
    println!("{output}");
    Ok(())
}

/// Step the engine directly on synthetic stamps; finishes instantly.
fn drive_synthetic(
    mut engine: NBackEngine,
    mut participant: SimulatedParticipant,
    abort_after: Option<usize>,
) -> Result<SessionOutcome> {
    let window_ms = engine.config.inter_stimulus_interval_ms as f64;
    let stimulus_ms = engine.config.stimulus_duration_ms as f64;
    let mut schedule = engine.start(InstantStamp::zero())?;
    let mut resolved = 0usize;

    loop {
        let mut delay = None;
        for event in engine.drain_events() {
            log_event(&event);
            if let EngineEvent::StimulusShown { cue, .. } = &event {
                delay = participant.react(cue);
            }
        }

        if abort_after.is_some_and(|limit| resolved >= limit) {
            let outcome = engine.abort()?;
            engine.drain_events().iter().for_each(log_event);
            return Ok(outcome);
        }

        let elapsed = delay.map_or(window_ms, |rt| rt as f64);
        if elapsed >= stimulus_ms {
            engine.hide_stimulus(schedule.run_id, schedule.key);
        }
        let closed_at = schedule.onset.offset_ms(elapsed);
        match delay {
            // Taps past the deadline close the trial unresponded.
            Some(_) => engine.register_response(closed_at)?,
            None => engine.register_timeout(schedule.run_id, schedule.key)?,
        };
        resolved += 1;

        match engine.advance(closed_at)? {
            Advance::Present(next) => schedule = next,
            Advance::Finished(outcome) => {
                engine.drain_events().iter().for_each(log_event);
                return Ok(outcome);
            }
        }
    }
}

/// Drive the engine through the async runner on real timers.
async fn drive_realtime(
    engine: NBackEngine,
    mut participant: SimulatedParticipant,
    abort_after: Option<usize>,
) -> Result<SessionOutcome> {
    let (handle, queue) = channel();
    handle.start();
    if abort_after == Some(0) {
        handle.abort();
    }

    let tap = handle.clone();
    let mut resolved = 0usize;
    let outcome = run(engine, queue, move |event| {
        log_event(event);
        match event {
            EngineEvent::StimulusShown { cue, .. } => {
                if let Some(delay) = participant.react(cue) {
                    let tap = tap.clone();
                    tokio::spawn(async move {
                        timing::sleep_ms(delay).await;
                        tap.respond();
                    });
                }
            }
            EngineEvent::TrialResolved { .. } => {
                resolved += 1;
                if abort_after.is_some_and(|limit| resolved >= limit) {
                    tap.abort();
                }
            }
            _ => {}
        }
    })
    .await?;

    Ok(outcome)
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::PhaseChanged { from, to } => info!(?from, ?to, "phase changed"),
        EngineEvent::BlockStarted {
            block_index,
            n_level,
            trials,
        } => info!(block = block_index, n_level, trials, "block started"),
        EngineEvent::BlockCompleted(summary) => info!(
            block = summary.block_index,
            accuracy = %format_percent(summary.accuracy),
            change = ?summary.change,
            next_level = summary.n_level,
            "block summary"
        ),
        EngineEvent::TrialResolved {
            record,
            classification,
            ..
        } => debug!(
            block = record.block_index,
            trial = record.trial_index_in_block,
            outcome = classification.label(),
            "trial"
        ),
        EngineEvent::StimulusShown { .. } | EngineEvent::StimulusHidden { .. } => {}
    }
}

fn render(outcome: &SessionOutcome, format: OutputFormat) -> Result<String> {
    let report = outcome.report();
    match format {
        OutputFormat::Json => {
            let mut record = summary_record(report).context("Failed to build summary record")?;
            if let SessionOutcome::Aborted { phase, .. } = outcome {
                record = record.with_notes(format!("aborted during {}", phase_label(*phase)));
            }
            serde_json::to_string_pretty(&record).context("Failed to serialize summary record")
        }
        OutputFormat::Item => serde_json::to_string_pretty(&TestItemPayload::from_report(report))
            .context("Failed to serialize test item"),
        OutputFormat::Summary => Ok(render_summary(outcome)),
    }
}

fn render_summary(outcome: &SessionOutcome) -> String {
    let report = outcome.report();
    let result = &report.result;
    let qc = &report.qc;

    let mut out = String::new();
    let status = match outcome {
        SessionOutcome::Completed(_) => "completed".to_string(),
        SessionOutcome::Aborted { phase, .. } => format!("aborted during {}", phase_label(*phase)),
    };
    let _ = writeln!(out, "N-back {status}");
    let _ = writeln!(out, "  highest level   {}", format_level(result.max_n_reached));
    let _ = writeln!(out, "  test trials     {}", result.total_trials);
    let _ = writeln!(out, "  accuracy        {}", format_percent(result.accuracy));
    let _ = writeln!(
        out,
        "  hits/misses     {}/{}",
        result.hits, result.misses
    );
    let _ = writeln!(
        out,
        "  false alarms    {} (correct rejections {})",
        result.false_alarms, result.correct_rejections
    );
    let _ = writeln!(
        out,
        "  reaction time   mean {}, median {}",
        format_ms(result.avg_reaction_time_ms),
        format_ms(result.median_reaction_time_ms)
    );
    let _ = writeln!(
        out,
        "  d'              {:.2} (c {:.2})",
        result.d_prime, result.criterion
    );
    let _ = write!(
        out,
        "  qc              late {}, duplicate {}, stray {}, min trials {}",
        qc.late_responses,
        qc.duplicate_responses,
        qc.stray_responses,
        if qc.min_trials_met { "met" } else { "not met" }
    );
    out
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Instructions => "instructions",
        Phase::Practice => "practice",
        Phase::Test => "test",
        Phase::Completed => "completed",
        Phase::Aborted => "aborted",
    }
}
