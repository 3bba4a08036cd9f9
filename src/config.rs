//! Startup configuration of supervised timers
//!
//! The set of timers and their firing policies is fixed when the application starts. A
//! [`TimerConfig`] is validated once, consumed by the
//! [`TimerSupervisor`](crate::supervisor::TimerSupervisor) to program the hardware, and not kept
//! as mutable state afterwards.

use crate::error::Error;

/// Frequency of the clock feeding timer group prescalers (APB clock)
pub const TIMER_BASE_CLK_HZ: u32 = 80_000_000;
/// Clock divider used by the reference timers
pub const TIMER_DIVIDER: u32 = 16;
/// Counter ticks per second of the reference timers
pub const TIMER_SCALE: u32 = TIMER_BASE_CLK_HZ / TIMER_DIVIDER;
/// Alarm interval of the reference timer without auto reload
pub const TIMER_INTERVAL0_SEC: f64 = 3.4179;
/// Alarm interval of the reference timer with auto reload
pub const TIMER_INTERVAL1_SEC: f64 = 5.78;
/// Number of events the interrupt-to-task channel holds
pub const EVENT_QUEUE_LEN: usize = 10;
/// Number of timers in a single timer group peripheral
pub const TIMERS_PER_GROUP: usize = 2;
/// Number of timer group peripherals
pub const NUM_GROUPS: usize = 2;

/// Smallest divider accepted by the prescaler
pub const MIN_DIVIDER: u32 = 2;
/// Largest divider accepted by the prescaler
pub const MAX_DIVIDER: u32 = 65536;

/// Identifies one physical timer instance
#[derive(Debug, Clone, Copy, Eq, PartialEq, defmt::Format)]
pub struct TimerIdentity {
    /// Timer group peripheral the timer belongs to
    pub group: u8,
    /// Index of the timer inside its group
    pub index: u8,
}

impl TimerIdentity {
    /// Create an identity of timer `index` in timer group `group`
    pub const fn new(group: u8, index: u8) -> Self {
        Self { group, index }
    }

    /// Bit of this timer in the group's interrupt registers
    pub const fn interrupt_bit(&self) -> u32 {
        1u32 << self.index
    }

    /// Check if the identity addresses an existing timer
    pub fn validate(&self) -> Result<(), Error> {
        if (self.group as usize) < NUM_GROUPS && (self.index as usize) < TIMERS_PER_GROUP {
            Ok(())
        } else {
            Err(Error::InvalidTimer)
        }
    }
}

/// Firing policy of a timer
#[derive(Debug, Clone, Copy, Eq, PartialEq, defmt::Format)]
pub enum TimerMode {
    /// The counter keeps running after an alarm; software writes the next threshold
    OneShotManualRearm,
    /// The hardware resets the counter on alarm match
    AutoReload,
}

/// Base of the next threshold computed by the interrupt handler of a
/// [`OneShotManualRearm`](TimerMode::OneShotManualRearm) timer
///
/// Both policies add the configured interval to the base.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, defmt::Format)]
pub enum RearmPolicy {
    /// Next alarm is scheduled from the counter captured at interrupt entry
    ///
    /// Interrupt latency accumulates into the schedule, so task time visibly drifts from the
    /// nominal period run over run.
    #[default]
    FromSnapshot,
    /// Next alarm is scheduled from the previous alarm threshold, keeping a drift free period
    ///
    /// Alarms stay on the `start + k * interval` grid. When latency exceeds an interval, the
    /// periods already passed are skipped and the next alarm is the first grid point ahead of the
    /// captured counter. Consecutive captures can then be less than one interval apart; the
    /// minimal gap of one interval holds only for [`FromSnapshot`](RearmPolicy::FromSnapshot).
    FromPreviousAlarm,
}

/// Startup configuration of a single timer
#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub struct TimerConfig {
    identity: TimerIdentity,
    mode: TimerMode,
    interval_s: f64,
    divider: u32,
    rearm_policy: RearmPolicy,
}

impl TimerConfig {
    /// Create a validated timer configuration
    ///
    /// Returns:
    /// * [`Err(Error::InvalidTimer)`](Error::InvalidTimer) if `identity` does not exist
    /// * [`Err(Error::InvalidDivider)`](Error::InvalidDivider) if `divider` is out of the
    ///   prescaler range
    /// * [`Err(Error::InvalidInterval)`](Error::InvalidInterval) if `interval_s` is not a
    ///   positive number resulting in at least one tick
    ///
    /// # Examples
    ///
    /// ```
    /// use timg_events::config::{TimerConfig, TimerIdentity, TimerMode};
    ///
    /// let config = TimerConfig::new(TimerIdentity::new(0, 1), TimerMode::AutoReload, 5.78, 16);
    /// assert_eq!(config.unwrap().interval_ticks(), 28_900_000);
    /// ```
    pub fn new(
        identity: TimerIdentity,
        mode: TimerMode,
        interval_s: f64,
        divider: u32,
    ) -> Result<Self, Error> {
        identity.validate()?;

        if !(MIN_DIVIDER..=MAX_DIVIDER).contains(&divider) {
            return Err(Error::InvalidDivider);
        }

        if !interval_s.is_finite() || interval_s <= 0.0 {
            return Err(Error::InvalidInterval);
        }

        let config = Self {
            identity,
            mode,
            interval_s,
            divider,
            rearm_policy: RearmPolicy::default(),
        };

        if config.interval_ticks() == 0 {
            return Err(Error::InvalidInterval);
        }

        Ok(config)
    }

    /// Select how a manually re-armed timer computes its next threshold
    pub fn with_rearm_policy(mut self, rearm_policy: RearmPolicy) -> Self {
        self.rearm_policy = rearm_policy;
        self
    }

    /// Configured timer
    pub fn identity(&self) -> TimerIdentity {
        self.identity
    }

    /// Firing policy
    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    /// Alarm period in seconds
    pub fn interval_s(&self) -> f64 {
        self.interval_s
    }

    /// Prescaler of the base clock
    pub fn divider(&self) -> u32 {
        self.divider
    }

    /// Base of the next threshold of a manually re-armed timer
    pub fn rearm_policy(&self) -> RearmPolicy {
        self.rearm_policy
    }

    /// Counter ticks per second
    pub fn tick_rate_hz(&self) -> u32 {
        TIMER_BASE_CLK_HZ / self.divider
    }

    /// Configured interval expressed in counter ticks, truncated to a whole tick
    pub fn interval_ticks(&self) -> u64 {
        (self.interval_s * self.tick_rate_hz() as f64) as u64
    }
}

/// Configuration of the two reference timers of group 0
///
/// Timer 0 runs without auto reload and is re-armed by its interrupt handler every
/// [`TIMER_INTERVAL0_SEC`]. Timer 1 reloads automatically every [`TIMER_INTERVAL1_SEC`].
pub fn reference_configs() -> Result<[TimerConfig; TIMERS_PER_GROUP], Error> {
    Ok([
        TimerConfig::new(
            TimerIdentity::new(0, 0),
            TimerMode::OneShotManualRearm,
            TIMER_INTERVAL0_SEC,
            TIMER_DIVIDER,
        )?,
        TimerConfig::new(
            TimerIdentity::new(0, 1),
            TimerMode::AutoReload,
            TIMER_INTERVAL1_SEC,
            TIMER_DIVIDER,
        )?,
    ])
}
