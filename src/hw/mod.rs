//! Portable timer hardware abstraction
//!
//! The timer software needs two surfaces of a timer peripheral:
//!
//! * [`TimerDriver`](traits::TimerDriver) to configure timers and read counters from a thread
//! * [`AlarmRegisters`](traits::AlarmRegisters) to service alarms from an ISR
//!
//! [`TimerGroup`](timer_group::TimerGroup) implements both for the dual-timer group peripheral.

pub mod traits;

pub mod timer_group;

#[cfg(any(test, feature = "mocked_platform"))]
pub mod mock;
