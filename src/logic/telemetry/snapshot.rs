//! Signal Snapshot - accumulated interaction telemetry for one session

use serde::{Deserialize, Deserializer, Serialize};

use super::buffer::{self, RingBuffer};
use super::event::InputEvent;

// ============================================================================
// CONSTANTS
// ============================================================================

pub const VELOCITY_WINDOW: usize = 50;
pub const TYPING_INTERVAL_WINDOW: usize = 30;
pub const INTERACTION_GAP_WINDOW: usize = 20;

// ============================================================================
// SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSnapshot {
    pub movement_count: u32,
    /// Pointer speed samples (px/s)
    #[serde(deserialize_with = "velocity_window")]
    pub velocities: RingBuffer,
    pub keystroke_count: u32,
    /// Milliseconds between consecutive key-downs
    #[serde(deserialize_with = "typing_window")]
    pub typing_intervals: RingBuffer,
    pub paste_count: u32,
    pub click_count: u32,
    /// Milliseconds between consecutive discrete interactions
    #[serde(deserialize_with = "gap_window")]
    pub interaction_gaps: RingBuffer,
    pub elapsed_ms: u64,
}

impl Default for SignalSnapshot {
    fn default() -> Self {
        Self {
            movement_count: 0,
            velocities: RingBuffer::new(VELOCITY_WINDOW),
            keystroke_count: 0,
            typing_intervals: RingBuffer::new(TYPING_INTERVAL_WINDOW),
            paste_count: 0,
            click_count: 0,
            interaction_gaps: RingBuffer::new(INTERACTION_GAP_WINDOW),
            elapsed_ms: 0,
        }
    }
}

impl SignalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// No pointer, key, paste or click activity observed
    pub fn has_no_activity(&self) -> bool {
        self.movement_count == 0
            && self.keystroke_count == 0
            && self.paste_count == 0
            && self.click_count == 0
    }
}

// Supplied snapshots get the fixed windows whatever capacity they carry

fn velocity_window<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RingBuffer, D::Error> {
    buffer::deserialize_with_window(deserializer, VELOCITY_WINDOW)
}

fn typing_window<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RingBuffer, D::Error> {
    buffer::deserialize_with_window(deserializer, TYPING_INTERVAL_WINDOW)
}

fn gap_window<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RingBuffer, D::Error> {
    buffer::deserialize_with_window(deserializer, INTERACTION_GAP_WINDOW)
}

// ============================================================================
// ACCUMULATOR
// ============================================================================

/// Snapshot plus the "last seen" markers needed to derive samples
#[derive(Debug, Clone, Default)]
pub(crate) struct SignalAccumulator {
    pub snapshot: SignalSnapshot,
    last_pointer: Option<(f64, f64, u64)>,
    last_keydown_ms: Option<u64>,
    last_interaction_ms: Option<u64>,
}

impl SignalAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::PointerMove { x, y, at_ms } => {
                self.snapshot.movement_count += 1;

                if let Some((px, py, pt)) = self.last_pointer {
                    if at_ms > pt {
                        let distance = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
                        let velocity = distance / (at_ms - pt) as f64 * 1000.0;
                        self.snapshot.velocities.push(velocity);
                    }
                }
                self.last_pointer = Some((x, y, at_ms));
            }
            InputEvent::KeyDown { at_ms } => {
                self.snapshot.keystroke_count += 1;

                if let Some(prev) = self.last_keydown_ms {
                    self.snapshot.typing_intervals.push(at_ms.saturating_sub(prev) as f64);
                }
                self.last_keydown_ms = Some(at_ms);
                self.mark_interaction(at_ms);
            }
            InputEvent::Paste { at_ms } => {
                self.snapshot.paste_count += 1;
                self.mark_interaction(at_ms);
            }
            InputEvent::Click { at_ms } => {
                self.snapshot.click_count += 1;
                self.mark_interaction(at_ms);
            }
        }
    }

    fn mark_interaction(&mut self, at_ms: u64) {
        if let Some(prev) = self.last_interaction_ms {
            self.snapshot.interaction_gaps.push(at_ms.saturating_sub(prev) as f64);
        }
        self.last_interaction_ms = Some(at_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_velocity_px_per_second() {
        let mut acc = SignalAccumulator::new();
        acc.observe(&InputEvent::PointerMove { x: 0.0, y: 0.0, at_ms: 0 });
        acc.observe(&InputEvent::PointerMove { x: 30.0, y: 40.0, at_ms: 100 });

        assert_eq!(acc.snapshot.movement_count, 2);
        let v: Vec<f64> = acc.snapshot.velocities.iter().copied().collect();
        assert_eq!(v, vec![500.0]);
    }

    #[test]
    fn test_zero_dt_pointer_sample_skipped() {
        let mut acc = SignalAccumulator::new();
        acc.observe(&InputEvent::PointerMove { x: 0.0, y: 0.0, at_ms: 10 });
        acc.observe(&InputEvent::PointerMove { x: 5.0, y: 5.0, at_ms: 10 });

        assert_eq!(acc.snapshot.movement_count, 2);
        assert!(acc.snapshot.velocities.is_empty());
    }

    #[test]
    fn test_typing_and_gap_samples() {
        let mut acc = SignalAccumulator::new();
        acc.observe(&InputEvent::KeyDown { at_ms: 100 });
        acc.observe(&InputEvent::KeyDown { at_ms: 250 });
        acc.observe(&InputEvent::Click { at_ms: 900 });
        acc.observe(&InputEvent::Paste { at_ms: 1000 });

        let intervals: Vec<f64> = acc.snapshot.typing_intervals.iter().copied().collect();
        assert_eq!(intervals, vec![150.0]);

        let gaps: Vec<f64> = acc.snapshot.interaction_gaps.iter().copied().collect();
        assert_eq!(gaps, vec![150.0, 650.0, 100.0]);

        assert_eq!(acc.snapshot.paste_count, 1);
        assert_eq!(acc.snapshot.click_count, 1);
    }

    #[test]
    fn test_windows_are_bounded() {
        let mut acc = SignalAccumulator::new();
        for i in 0..100u64 {
            acc.observe(&InputEvent::KeyDown { at_ms: i * 100 });
            acc.observe(&InputEvent::PointerMove { x: i as f64, y: 0.0, at_ms: i * 100 + 50 });
        }

        assert_eq!(acc.snapshot.keystroke_count, 100);
        assert_eq!(acc.snapshot.typing_intervals.len(), TYPING_INTERVAL_WINDOW);
        assert_eq!(acc.snapshot.velocities.len(), VELOCITY_WINDOW);
        assert_eq!(acc.snapshot.interaction_gaps.len(), INTERACTION_GAP_WINDOW);
    }

    #[test]
    fn test_empty_snapshot_has_no_activity() {
        assert!(SignalSnapshot::new().has_no_activity());
    }

    #[test]
    fn test_supplied_snapshot_gets_fixed_windows() {
        let samples: Vec<f64> = (0..80).map(f64::from).collect();
        let json = serde_json::json!({
            "movementCount": 80,
            "velocities": {"capacity": 0, "samples": samples},
            "keystrokeCount": 0,
            "typingIntervals": {"capacity": 1000, "samples": samples},
            "pasteCount": 0,
            "clickCount": 1,
            "interactionGaps": {"capacity": 5, "samples": []},
            "elapsedMs": 5000
        });

        let snapshot: SignalSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snapshot.velocities.capacity(), VELOCITY_WINDOW);
        assert_eq!(snapshot.velocities.len(), VELOCITY_WINDOW);
        assert_eq!(snapshot.velocities.iter().next(), Some(&30.0));
        assert_eq!(snapshot.typing_intervals.len(), TYPING_INTERVAL_WINDOW);
        assert_eq!(snapshot.interaction_gaps.capacity(), INTERACTION_GAP_WINDOW);
    }
}
