#![cfg_attr(not(any(test, doctest)), no_std)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

//! Hardware timer supervision with interrupt to task event delivery.
//!
//! Two timers of a timer group peripheral fire periodically with different policies: one is
//! re-armed manually by its interrupt handler, the other reloads automatically. Each alarm
//! interrupt captures the 64-bit counter and passes it to a consumer task through a bounded,
//! interrupt safe channel. The task reads the counter again, so the reports show how far task
//! time lags behind interrupt time.
//!
//! Typical wiring:
//!
//! * allocate a [`TimerGroup`](hw::timer_group::TimerGroup), an
//!   [`EventChannel`](channel::EventChannel) and an [`IsrTable`](isr::IsrTable) statically
//! * configure timers with a [`TimerSupervisor`](supervisor::TimerSupervisor)
//! * call [`TimerGroup::on_interrupt`](hw::timer_group::TimerGroup::on_interrupt) from the timer
//!   interrupt vectors
//! * run an [`EventConsumer`](consumer::EventConsumer) in the application task

pub mod crit_sect; // pub, to let applications share state with timer ISRs
pub mod mutex;
pub mod utils;

/// Defines errors reported by this crate
pub mod error;

pub mod config;

pub mod channel;
pub mod consumer;
pub mod event;
pub mod hw;
pub mod isr;
pub mod supervisor;
