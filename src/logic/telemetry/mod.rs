//! Telemetry Module - interaction signals for bot scoring
//!
//! ## Structure
//! - `event.rs` - `InputEvent`, `InputEventSource`, scoped `Subscription`, `EventBus`
//! - `buffer.rs` - fixed-window sample buffer
//! - `snapshot.rs` - `SignalSnapshot` and the accumulator that derives samples
//! - `collector.rs` - session lifecycle (start / peek / stop)

pub mod event;
pub mod buffer;
pub mod snapshot;
pub mod collector;

pub use event::{EventBus, EventHandler, InputEvent, InputEventSource, Subscription, SubscriptionId};
pub use buffer::RingBuffer;
pub use snapshot::{SignalSnapshot, INTERACTION_GAP_WINDOW, TYPING_INTERVAL_WINDOW, VELOCITY_WINDOW};
pub use collector::TelemetryCollector;
