//! Events passed from timer interrupts to the consumer task

use crate::config::{TimerIdentity, TimerMode};

/// Classification of a serviced interrupt
#[derive(Debug, Clone, Copy, Eq, PartialEq, defmt::Format)]
pub enum EventKind {
    /// The alarm of a timer running in the given mode fired
    Alarm(TimerMode),
    /// The interrupt status did not match the handler's own timer
    Unknown,
}

impl EventKind {
    /// Human readable label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Alarm(TimerMode::OneShotManualRearm) => "Example timer without reload",
            EventKind::Alarm(TimerMode::AutoReload) => "Example timer with auto reload",
            EventKind::Unknown => "UNKNOWN EVENT TYPE",
        }
    }
}

/// State captured by an interrupt handler
///
/// `counter` is read from the latched hardware counter at interrupt entry, before the handler
/// writes any re-arm registers.
#[derive(Debug, Clone, Copy, Eq, PartialEq, defmt::Format)]
pub struct TimerEvent {
    /// Classification of the interrupt
    pub kind: EventKind,
    /// Timer whose handler produced the event
    pub identity: TimerIdentity,
    /// Counter value at interrupt entry
    pub counter: u64,
    /// Position of this event among all events offered to the channel
    ///
    /// Assigned by [`EventChannel`](crate::channel::EventChannel) on each send attempt, so
    /// events dropped on overflow leave a gap.
    pub sequence: u32,
}

impl TimerEvent {
    /// Create an event not yet numbered by a channel
    pub const fn new(kind: EventKind, identity: TimerIdentity, counter: u64) -> Self {
        Self {
            kind,
            identity,
            counter,
            sequence: 0,
        }
    }
}

/// Counter value with helpers to present it as two 32-bit words and seconds
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CounterValue {
    ticks: u64,
    tick_rate_hz: u32,
}

impl CounterValue {
    /// Wrap `ticks` of a counter running at `tick_rate_hz`
    pub fn new(ticks: u64, tick_rate_hz: u32) -> Self {
        Self {
            ticks,
            tick_rate_hz,
        }
    }

    /// Raw counter value
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Upper 32 bits
    pub fn high(&self) -> u32 {
        (self.ticks >> 32) as u32
    }

    /// Lower 32 bits
    pub fn low(&self) -> u32 {
        self.ticks as u32
    }

    /// Time elapsed since the counter was zero
    pub fn seconds(&self) -> f64 {
        self.ticks as f64 / self.tick_rate_hz as f64
    }
}

impl defmt::Format for CounterValue {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Counter: 0x{=u32:08x}{=u32:08x}, Time: {=f64} s",
            self.high(),
            self.low(),
            self.seconds()
        );
    }
}
