//! Task consuming timer events
//!
//! The consumer waits for events from the [`EventChannel`], reads the live counter of the timer
//! which produced the event and reports both values. The difference between the counter captured
//! in the ISR (event time) and the counter read by the task (task time) shows interrupt and
//! scheduling latency.

use crate::channel::EventChannel;
use crate::config::{TimerConfig, TimerIdentity};
use crate::error::Error;
use crate::event::{CounterValue, EventKind, TimerEvent};
use crate::hw::traits::TimerDriver;

/// Diagnostic record of a single consumed event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    /// Classification of the interrupt
    pub kind: EventKind,
    /// Timer which produced the event
    pub identity: TimerIdentity,
    /// Counter captured by the ISR
    pub event_time: CounterValue,
    /// Counter read by the consumer task
    pub task_time: CounterValue,
}

impl Report {
    /// Write this report to the diagnostic stream
    pub fn emit(&self) {
        defmt::println!("    {=str}", self.kind.label());
        defmt::println!(
            "Group[{=u8}], timer[{=u8}] alarm event",
            self.identity.group,
            self.identity.index
        );
        defmt::println!("------- EVENT TIME --------");
        defmt::println!("{}", self.event_time);
        defmt::println!("-------- TASK TIME --------");
        defmt::println!("{}", self.task_time);
    }
}

/// Consumer of events published by timer ISRs
pub struct EventConsumer<'a, D: TimerDriver, const N: usize> {
    driver: &'a D,
    channel: &'a EventChannel<N>,
    configs: &'a [TimerConfig],
    expected_sequence: u32,
}

impl<'a, D: TimerDriver, const N: usize> EventConsumer<'a, D, N> {
    /// Create a consumer of `channel` reading counters through `driver`
    ///
    /// `configs` are the configurations the timers were started with. The tick rate of each
    /// timer converts its counter values to seconds.
    pub fn new(driver: &'a D, channel: &'a EventChannel<N>, configs: &'a [TimerConfig]) -> Self {
        Self {
            driver,
            channel,
            configs,
            expected_sequence: 0,
        }
    }

    /// Consume events forever
    ///
    /// Blocks waiting for each event. A failed counter read is logged and the event skipped.
    pub fn run(&mut self) -> ! {
        loop {
            let event = self.channel.receive();
            if let Err(e) = self.process(event) {
                defmt::error!("cannot report event of timer {}: {}", event.identity, e);
            }
        }
    }

    /// Report a single event
    ///
    /// Reads the current counter of the timer which produced `event`.
    pub fn process(&mut self, event: TimerEvent) -> Result<Report, Error> {
        let missed = event.sequence.wrapping_sub(self.expected_sequence);
        if missed != 0 {
            defmt::warn!("{=u32} timer events dropped", missed);
        }
        self.expected_sequence = event.sequence.wrapping_add(1);

        let tick_rate_hz = self.tick_rate_hz(event.identity)?;
        let task_counter = self.driver.read_counter(event.identity)?;

        let report = Report {
            kind: event.kind,
            identity: event.identity,
            event_time: CounterValue::new(event.counter, tick_rate_hz),
            task_time: CounterValue::new(task_counter, tick_rate_hz),
        };
        report.emit();

        Ok(report)
    }

    /// Tick rate of timer `identity`
    ///
    /// Returns [`Err(Error::InvalidTimer)`](Error::InvalidTimer) for a timer without configuration.
    pub fn tick_rate_hz(&self, identity: TimerIdentity) -> Result<u32, Error> {
        self.configs
            .iter()
            .find(|config| config.identity() == identity)
            .map(TimerConfig::tick_rate_hz)
            .ok_or(Error::InvalidTimer)
    }

    /// Number of events known to be lost so far
    pub fn dropped(&self) -> u32 {
        self.channel.dropped()
    }
}
