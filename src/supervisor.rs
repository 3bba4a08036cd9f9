//! One-time configuration of supervised timers
//!
//! The supervisor programs each timer to count up from zero with its alarm set one interval
//! ahead, binds the timer's slot in the [`IsrTable`] and registers [`on_alarm`] as the timer's
//! interrupt callback. Configuration happens once per timer at startup. A failure leaves the
//! demonstration without a valid degraded mode, so callers are expected to abort on any error.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() {
//! use timg_events::channel::EventChannel;
//! use timg_events::config::reference_configs;
//! use timg_events::hw::timer_group::{TimerGroup, TIMG0_BASE};
//! use timg_events::isr::IsrTable;
//! use timg_events::supervisor::TimerSupervisor;
//!
//! static TIMG0: TimerGroup = unsafe { TimerGroup::from_address(0, TIMG0_BASE) };
//! static CHANNEL: EventChannel = EventChannel::new();
//! static ISR_TABLE: IsrTable<TimerGroup> = IsrTable::new();
//!
//! let supervisor = TimerSupervisor::new(&TIMG0, &CHANNEL, &ISR_TABLE);
//! supervisor
//!     .configure_all(&reference_configs().unwrap())
//!     .unwrap();
//! # }
//! ```

use crate::channel::EventChannel;
use crate::config::{TimerConfig, TimerMode};
use crate::error::Error;
use crate::hw::traits::{
    AlarmRegisters, CountDirection, HwTimerConfig, InterruptTrigger, IsrFlags, TimerDriver,
};
use crate::isr::{on_alarm, IsrBinding, IsrTable};

/// Configures timers and wires their interrupts to an [`EventChannel`]
pub struct TimerSupervisor<H: 'static> {
    hw: &'static H,
    channel: &'static EventChannel,
    isr_table: &'static IsrTable<H>,
}

impl<H> TimerSupervisor<H>
where
    H: TimerDriver + AlarmRegisters + Sync + 'static,
{
    /// Create a supervisor programming `hw` and publishing events to `channel`
    pub fn new(
        hw: &'static H,
        channel: &'static EventChannel,
        isr_table: &'static IsrTable<H>,
    ) -> Self {
        Self {
            hw,
            channel,
            isr_table,
        }
    }

    /// Configure and start a single timer
    ///
    /// Must be called once per timer before its first alarm.
    pub fn configure(&self, config: &TimerConfig) -> Result<(), Error> {
        let result = self.try_configure(config);

        match result {
            Ok(()) => defmt::info!(
                "timer {} configured: {}, alarm every {=u64} ticks",
                config.identity(),
                config.mode(),
                config.interval_ticks()
            ),
            Err(e) => defmt::error!("timer {} configuration failed: {}", config.identity(), e),
        }

        result
    }

    /// Configure timers one by one, stopping at the first failure
    pub fn configure_all(&self, configs: &[TimerConfig]) -> Result<(), Error> {
        configs.iter().try_for_each(|config| self.configure(config))
    }

    fn try_configure(&self, config: &TimerConfig) -> Result<(), Error> {
        let identity = config.identity();
        let interval_ticks = config.interval_ticks();
        let slot = self.isr_table.slot(identity)?;
        // A running timer must not be reprogrammed
        if slot.binding().is_some() {
            return Err(Error::AlreadyConfigured);
        }

        self.hw.init(
            identity,
            &HwTimerConfig {
                divider: config.divider(),
                direction: CountDirection::Up,
                counter_enabled: false,
                alarm_enabled: true,
                interrupt_trigger: InterruptTrigger::Level,
                auto_reload: config.mode() == TimerMode::AutoReload,
            },
        )?;
        self.hw.set_counter(identity, 0)?;
        self.hw.set_alarm(identity, interval_ticks)?;
        self.hw.enable_interrupt(identity)?;

        slot.bind(IsrBinding {
            identity,
            mode: config.mode(),
            interval_ticks,
            rearm_policy: config.rearm_policy(),
            hw: self.hw,
            channel: self.channel,
        })?;
        self.hw
            .register_callback(identity, on_alarm::<H>, slot, IsrFlags::IRAM)?;

        self.hw.start(identity)
    }
}
