//! Traits used for timer driver portability
//!
//! The supervisor and the consumer task program timers through [`TimerDriver`]. Interrupt
//! handlers touch the peripheral only through [`AlarmRegisters`], whose methods are bounded-time
//! register accesses safe to call from an ISR.

use crate::config::TimerIdentity;
use crate::error::Error;
use core::any::Any;

#[cfg(test)]
use mockall::*;

/// Reference to any data selected when registering an interrupt callback
///
/// The same reference is passed to the callback each time the interrupt fires.
pub type Context = &'static (dyn Any + Send + Sync);

/// Type of the function called from the timer interrupt
pub type IsrHandler = fn(Context);

/// Direction of counting
#[derive(Debug, Clone, Copy, Eq, PartialEq, defmt::Format)]
pub enum CountDirection {
    /// Counter increments on each tick
    Up,
    /// Counter decrements on each tick
    Down,
}

/// Interrupt signalling on alarm
#[derive(Debug, Clone, Copy, Eq, PartialEq, defmt::Format)]
pub enum InterruptTrigger {
    /// Interrupt line stays active until the status bit is cleared
    Level,
    /// Single pulse on alarm
    Edge,
}

bitflags::bitflags! {
    /// Requirements of the context in which an interrupt callback executes
    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    pub struct IsrFlags: u32 {
        /// Lowest priority interrupt
        const LEVEL1 = 1 << 1;
        /// Medium priority interrupt
        const LEVEL2 = 1 << 2;
        /// High priority interrupt
        const LEVEL3 = 1 << 3;
        /// Callback is placed in RAM and may run while flash cache is disabled
        const IRAM = 1 << 10;
    }
}

impl IsrFlags {
    const LEVELS: IsrFlags = IsrFlags::LEVEL1
        .union(IsrFlags::LEVEL2)
        .union(IsrFlags::LEVEL3);

    /// Check that at most one priority level is requested
    pub fn is_valid(&self) -> bool {
        self.intersection(Self::LEVELS).bits().count_ones() <= 1
    }
}

/// Hardware configuration applied by [`TimerDriver::init`]
#[derive(Debug, Clone, Copy, Eq, PartialEq, defmt::Format)]
pub struct HwTimerConfig {
    /// Prescaler of the base clock
    pub divider: u32,
    /// Counting direction
    pub direction: CountDirection,
    /// Counter runs immediately after init
    pub counter_enabled: bool,
    /// Alarm armed after init
    pub alarm_enabled: bool,
    /// Interrupt signalling on alarm
    pub interrupt_trigger: InterruptTrigger,
    /// Counter reloads on alarm
    pub auto_reload: bool,
}

/// Capabilities of a timer driver used from a thread context
#[cfg_attr(test, automock)]
pub trait TimerDriver {
    /// Initialize timer `identity` with passed configuration
    ///
    /// The counter value and alarm threshold are undefined until set.
    fn init(&self, identity: TimerIdentity, config: &HwTimerConfig) -> Result<(), Error>;

    /// Load `value` to the counter
    fn set_counter(&self, identity: TimerIdentity, value: u64) -> Result<(), Error>;

    /// Set counter value at which the alarm fires
    fn set_alarm(&self, identity: TimerIdentity, value: u64) -> Result<(), Error>;

    /// Let alarms of the timer raise the interrupt line
    fn enable_interrupt(&self, identity: TimerIdentity) -> Result<(), Error>;

    /// Stop alarms of the timer from raising the interrupt line
    fn disable_interrupt(&self, identity: TimerIdentity) -> Result<(), Error>;

    /// Register function called from the timer's interrupt
    ///
    /// `handler` is called with `context` each time the interrupt of `identity` fires. Only one
    /// callback can be registered per timer.
    fn register_callback(
        &self,
        identity: TimerIdentity,
        handler: IsrHandler,
        context: Context,
        flags: IsrFlags,
    ) -> Result<(), Error>;

    /// Start counting
    fn start(&self, identity: TimerIdentity) -> Result<(), Error>;

    /// Pause counting, keeping the counter value
    fn pause(&self, identity: TimerIdentity) -> Result<(), Error>;

    /// Get current counter value
    fn read_counter(&self, identity: TimerIdentity) -> Result<u64, Error>;
}

/// Register accesses performed by an alarm interrupt handler
///
/// Timers are addressed by their index within the group owning the interrupt.
#[cfg_attr(test, automock)]
pub trait AlarmRegisters {
    /// Raw interrupt status of all timers of the group, one bit per timer index
    fn interrupt_status(&self) -> u32;

    /// Latch the counter and read both halves of it
    fn latch_counter(&self, index: u8) -> u64;

    /// Clear the interrupt status bit of the timer
    fn clear_interrupt(&self, index: u8);

    /// Current alarm threshold
    fn read_alarm(&self, index: u8) -> u64;

    /// Set alarm threshold, upper half first
    fn write_alarm(&self, index: u8, value: u64);

    /// Arm the alarm, which hardware disarms when it fires
    fn enable_alarm(&self, index: u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isr_flags_validity() {
        assert!(IsrFlags::empty().is_valid());
        assert!(IsrFlags::IRAM.is_valid());
        assert!((IsrFlags::IRAM | IsrFlags::LEVEL2).is_valid());
        assert!(!(IsrFlags::LEVEL1 | IsrFlags::LEVEL3).is_valid());
    }
}
