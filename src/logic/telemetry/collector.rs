//! Telemetry Collector - one bounded scoring session
//!
//! `start()` subscribes to the input source and resets the snapshot,
//! `peek()` scores mid-session (pre-submit gating), `stop()` finalizes the
//! duration, releases the subscription and scores.
//!
//! A second `start()` while a session is running is ignored and returns
//! `false`; the running session keeps its data.

use std::sync::Arc;

use parking_lot::Mutex;

use super::event::{EventHandler, InputEvent, InputEventSource, Subscription};
use super::snapshot::{SignalAccumulator, SignalSnapshot};
use crate::logic::clock::Clock;
use crate::logic::scoring::{self, ScoringOutcome};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug)]
struct ActiveSession {
    started_ms: u64,
    signals: SignalAccumulator,
}

// ============================================================================
// COLLECTOR
// ============================================================================

pub struct TelemetryCollector {
    source: Arc<dyn InputEventSource>,
    clock: Arc<dyn Clock>,
    session: Arc<Mutex<Option<ActiveSession>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl TelemetryCollector {
    pub fn new(source: Arc<dyn InputEventSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            session: Arc::new(Mutex::new(None)),
            subscription: Mutex::new(None),
        }
    }

    /// Begin a session. Returns `false` if one is already running.
    pub fn start(&self) -> bool {
        {
            let mut session = self.session.lock();
            if session.is_some() {
                log::debug!("Telemetry session already active, start ignored");
                return false;
            }
            *session = Some(ActiveSession {
                started_ms: self.clock.now_ms(),
                signals: SignalAccumulator::new(),
            });
        }

        let sink = Arc::clone(&self.session);
        let handler: EventHandler = Arc::new(move |event: &InputEvent| {
            if let Some(active) = sink.lock().as_mut() {
                active.signals.observe(event);
            }
        });

        *self.subscription.lock() = Some(Subscription::new(Arc::clone(&self.source), handler));
        log::info!("Telemetry session started");
        true
    }

    /// Finish the session and score it. `None` if no session is running.
    pub fn stop(&self) -> Option<ScoringOutcome> {
        // Release listeners before reading the final snapshot
        self.subscription.lock().take();

        let active = self.session.lock().take()?;
        let mut snapshot = active.signals.snapshot;
        snapshot.elapsed_ms = self.clock.now_ms().saturating_sub(active.started_ms);

        let outcome = scoring::calculate(&snapshot);
        log::info!(
            "Telemetry session stopped after {}ms: score={} confidence={} -> {}",
            snapshot.elapsed_ms,
            outcome.score,
            outcome.confidence,
            outcome.recommendation
        );
        Some(outcome)
    }

    /// Score the running session without ending it
    pub fn peek(&self) -> Option<ScoringOutcome> {
        let snapshot = self.snapshot()?;
        Some(scoring::calculate(&snapshot))
    }

    /// Copy of the current snapshot with elapsed time filled in
    pub fn snapshot(&self) -> Option<SignalSnapshot> {
        let session = self.session.lock();
        let active = session.as_ref()?;

        let mut snapshot = active.signals.snapshot.clone();
        snapshot.elapsed_ms = self.clock.now_ms().saturating_sub(active.started_ms);
        Some(snapshot)
    }

    pub fn is_active(&self) -> bool {
        self.session.lock().is_some()
    }
}

impl std::fmt::Debug for TelemetryCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryCollector")
            .field("active", &self.is_active())
            .finish()
    }
}
