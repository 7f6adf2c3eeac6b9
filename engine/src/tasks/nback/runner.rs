//! Cooperative event loop that drives an [`NBackEngine`] in real time.
//!
//! Host input (start, responses, abort) and the two per-trial timers all
//! arrive as messages on one unbounded queue and are handled strictly in
//! arrival order. When a trial resolves, its remaining timers are aborted;
//! any message that slipped through anyway carries a stale `(run_id, key)`
//! and is dropped by the engine.

use futures::future::{abortable, AbortHandle};
use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use tracing::warn;

use crate::core::platform;
use crate::core::timing::{self, InstantStamp};
use crate::error::EngineResult;

use super::clock::{TrialKey, TrialSchedule};
use super::engine::{Advance, EngineEvent, NBackEngine, ResponseOutcome, SessionOutcome};
use super::sequence::StimulusSource;

#[derive(Debug, Clone, PartialEq)]
pub enum NBackMessage {
    Start,
    Respond { timestamp: InstantStamp },
    StimulusHidden { run_id: u64, key: TrialKey },
    WindowClosed { run_id: u64, key: TrialKey },
    Abort,
}

/// Host-side sender. Cheap to clone; every method is fire-and-forget and
/// returns false once the run has ended.
#[derive(Debug, Clone)]
pub struct NBackHandle {
    tx: UnboundedSender<NBackMessage>,
}

impl NBackHandle {
    pub fn start(&self) -> bool {
        self.send(NBackMessage::Start)
    }

    /// Respond now, stamped on the engine clock.
    pub fn respond(&self) -> bool {
        self.respond_at(timing::now())
    }

    pub fn respond_at(&self, timestamp: InstantStamp) -> bool {
        self.send(NBackMessage::Respond { timestamp })
    }

    pub fn abort(&self) -> bool {
        self.send(NBackMessage::Abort)
    }

    fn send(&self, message: NBackMessage) -> bool {
        self.tx.unbounded_send(message).is_ok()
    }
}

/// Receiving end consumed by [`run`].
#[derive(Debug)]
pub struct NBackQueue {
    tx: UnboundedSender<NBackMessage>,
    rx: UnboundedReceiver<NBackMessage>,
}

pub fn channel() -> (NBackHandle, NBackQueue) {
    let (tx, rx) = mpsc::unbounded();
    (NBackHandle { tx: tx.clone() }, NBackQueue { tx, rx })
}

/// Abort handles for the timers of the trial in flight.
#[derive(Debug, Default)]
struct TimerTable {
    handles: Vec<AbortHandle>,
}

impl TimerTable {
    fn arm_trial(&mut self, tx: &UnboundedSender<NBackMessage>, schedule: TrialSchedule) {
        let TrialSchedule {
            run_id,
            key,
            stimulus_ms,
            window_ms,
            ..
        } = schedule;
        self.arm(tx, stimulus_ms, NBackMessage::StimulusHidden { run_id, key });
        self.arm(tx, window_ms, NBackMessage::WindowClosed { run_id, key });
    }

    fn arm(&mut self, tx: &UnboundedSender<NBackMessage>, delay_ms: u64, message: NBackMessage) {
        let tx = tx.clone();
        let (timer, handle) = abortable(async move {
            timing::sleep_ms(delay_ms).await;
            let _ = tx.unbounded_send(message);
        });
        platform::spawn_future(async move {
            let _ = timer.await;
        });
        self.handles.push(handle);
    }

    fn cancel_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for TimerTable {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Run one assessment to its end, forwarding every [`EngineEvent`] to
/// `observer` as it happens.
///
/// Returns on completion or abort. Dropping every [`NBackHandle`] does not
/// end the run; send [`NBackHandle::abort`] instead.
pub async fn run<S, F>(
    mut engine: NBackEngine<S>,
    queue: NBackQueue,
    mut observer: F,
) -> EngineResult<SessionOutcome>
where
    S: StimulusSource,
    F: FnMut(&EngineEvent),
{
    let NBackQueue { tx, mut rx } = queue;
    let mut timers = TimerTable::default();

    while let Some(message) = rx.next().await {
        let resolved = match message {
            NBackMessage::Start => {
                match engine.start(timing::now()) {
                    Ok(schedule) => timers.arm_trial(&tx, schedule),
                    Err(err) => warn!(%err, "start ignored"),
                }
                false
            }
            NBackMessage::StimulusHidden { run_id, key } => {
                engine.hide_stimulus(run_id, key);
                false
            }
            NBackMessage::WindowClosed { run_id, key } => {
                outcome_resolved(engine.register_timeout(run_id, key))
            }
            NBackMessage::Respond { timestamp } => {
                outcome_resolved(engine.register_response(timestamp))
            }
            NBackMessage::Abort => {
                timers.cancel_all();
                match engine.abort() {
                    Ok(outcome) => {
                        flush(&mut engine, &mut observer);
                        return Ok(outcome);
                    }
                    Err(err) => {
                        warn!(%err, "abort ignored");
                        false
                    }
                }
            }
        };

        if resolved {
            timers.cancel_all();
            match engine.advance(timing::now()) {
                Ok(Advance::Present(schedule)) => timers.arm_trial(&tx, schedule),
                Ok(Advance::Finished(outcome)) => {
                    flush(&mut engine, &mut observer);
                    return Ok(outcome);
                }
                Err(err) => warn!(%err, "could not advance"),
            }
        }

        flush(&mut engine, &mut observer);
    }

    engine.abort()
}

fn outcome_resolved(outcome: EngineResult<ResponseOutcome>) -> bool {
    match outcome {
        Ok(ResponseOutcome::Resolved) => true,
        Ok(ResponseOutcome::Ignored) => false,
        Err(err) => {
            warn!(%err, "trial resolution failed");
            false
        }
    }
}

fn flush<S, F>(engine: &mut NBackEngine<S>, observer: &mut F)
where
    S: StimulusSource,
    F: FnMut(&EngineEvent),
{
    for event in engine.drain_events() {
        observer(&event);
    }
}
