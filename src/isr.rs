//! Alarm interrupt handling
//!
//! Each configured timer has a slot in an [`IsrTable`], a fixed arena indexed by
//! [`TimerIdentity`]. The [`TimerSupervisor`](crate::supervisor::TimerSupervisor) binds the slot
//! once, then registers [`on_alarm`] with the slot as the callback context. From then on the slot
//! is only read, by the timer's own interrupt handler.
//!
//! The handler runs with a hard latency budget: it does not allocate, block, or log. It services
//! only the status bit of its own timer; other bits are left for their own handlers.

use crate::channel::EventChannel;
use crate::config::{RearmPolicy, TimerIdentity, TimerMode, NUM_GROUPS, TIMERS_PER_GROUP};
use crate::crit_sect;
use crate::error::Error;
use crate::event::{EventKind, TimerEvent};
use crate::hw::traits::{AlarmRegisters, Context};
use crate::mutex::Mutex;

/// State an interrupt handler needs to service its timer
pub struct IsrBinding<H: 'static> {
    /// Serviced timer
    pub identity: TimerIdentity,
    /// Arming policy of the timer
    pub mode: TimerMode,
    /// Alarm period in timer ticks
    pub interval_ticks: u64,
    /// Base of the next alarm of a manually re-armed timer
    pub rearm_policy: RearmPolicy,
    /// Registers of the timer group
    pub hw: &'static H,
    /// Channel receiving captured events
    pub channel: &'static EventChannel,
}

// Manual impls: derive would require `H: Clone`
impl<H: 'static> Clone for IsrBinding<H> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<H: 'static> Copy for IsrBinding<H> {}

/// Interrupt-bound state of a single timer
pub struct TimerIsr<H: 'static> {
    binding: Mutex<Option<IsrBinding<H>>>,
}

impl<H: 'static> TimerIsr<H> {
    /// Create an unbound slot
    pub const fn new() -> Self {
        Self {
            binding: Mutex::new(None),
        }
    }

    /// Populate this slot
    ///
    /// Returns [`Err(Error::AlreadyConfigured)`](Error::AlreadyConfigured) if the slot is already
    /// bound.
    pub fn bind(&self, binding: IsrBinding<H>) -> Result<(), Error> {
        crit_sect::locked(|cs| {
            let mut slot = self.binding.borrow_mut(cs);
            if slot.is_some() {
                return Err(Error::AlreadyConfigured);
            }
            *slot = Some(binding);
            Ok(())
        })
    }

    /// Copy of the current binding, `None` if unbound
    pub fn binding(&self) -> Option<IsrBinding<H>> {
        crit_sect::locked(|cs| *self.binding.borrow(cs))
    }

    fn reset(&self) {
        crit_sect::locked(|cs| {
            self.binding.borrow_mut(cs).take();
        });
    }
}

/// Arena of interrupt-bound state for all timers of all groups
///
/// Intended to be allocated statically, because slots are passed to the driver as `'static`
/// callback contexts.
///
/// # Examples
///
/// ```
/// use timg_events::hw::timer_group::TimerGroup;
/// use timg_events::isr::IsrTable;
///
/// static ISR_TABLE: IsrTable<TimerGroup> = IsrTable::new();
/// ```
pub struct IsrTable<H: 'static> {
    slots: [[TimerIsr<H>; TIMERS_PER_GROUP]; NUM_GROUPS],
}

impl<H: 'static> IsrTable<H> {
    /// Create a table of unbound slots
    pub const fn new() -> Self {
        // using literals because arr_macro requires them
        Self {
            slots: [
                arr_macro::arr![TimerIsr::new(); 2],
                arr_macro::arr![TimerIsr::new(); 2],
            ],
        }
    }

    /// Reset module
    ///
    /// This function is intended to be used between unit tests
    #[doc(hidden)]
    pub fn reset(&self) {
        for slot in self.slots.iter().flatten() {
            slot.reset();
        }
    }

    /// Slot of timer `identity`
    pub fn slot(&self, identity: TimerIdentity) -> Result<&TimerIsr<H>, Error> {
        self.slots
            .get(identity.group as usize)
            .and_then(|group| group.get(identity.index as usize))
            .ok_or(Error::InvalidTimer)
    }
}

/// Alarm interrupt callback
///
/// Registered by the supervisor with the timer's [`TimerIsr`] slot as context. A foreign context
/// or an unbound slot leaves the interrupt pending for the dispatcher to clear
/// ([`TimerGroup::on_interrupt`](crate::hw::timer_group::TimerGroup::on_interrupt)).
pub fn on_alarm<H>(context: Context)
where
    H: AlarmRegisters + Sync + 'static,
{
    let binding = match context.downcast_ref::<TimerIsr<H>>() {
        Some(isr) => isr.binding(),
        None => None,
    };

    if let Some(binding) = binding {
        service_alarm(&binding);
    }
}

/// Service one interrupt of the timer described by `binding`
///
/// Returns `false` if the event could not be queued and was dropped.
pub fn service_alarm<H>(binding: &IsrBinding<H>) -> bool
where
    H: AlarmRegisters + 'static,
{
    let hw = binding.hw;
    let index = binding.identity.index;

    let status = hw.interrupt_status();
    let counter = hw.latch_counter(index);

    let kind = if status & binding.identity.interrupt_bit() != 0 {
        hw.clear_interrupt(index);
        if binding.mode == TimerMode::OneShotManualRearm {
            let alarm = match binding.rearm_policy {
                RearmPolicy::FromSnapshot => counter.wrapping_add(binding.interval_ticks),
                RearmPolicy::FromPreviousAlarm => {
                    next_alarm_after(hw.read_alarm(index), binding.interval_ticks, counter)
                }
            };
            hw.write_alarm(index, alarm);
        }
        EventKind::Alarm(binding.mode)
    } else {
        EventKind::Unknown
    };

    // Firing disarms the alarm
    hw.enable_alarm(index);

    // On overflow the event is dropped; the ISR must not wait for the consumer
    binding
        .channel
        .send_nonblocking(TimerEvent::new(kind, binding.identity, counter))
}

/// First alarm of the `previous + k * interval` series which is still ahead of `counter`
///
/// An up-counter already past its threshold would not fire again until it wraps, so periods
/// missed because of latency are skipped.
fn next_alarm_after(previous: u64, interval: u64, counter: u64) -> u64 {
    let next = previous.wrapping_add(interval);
    if next > counter {
        return next;
    }
    let missed = (counter - next).checked_div(interval).map_or(1, |n| n + 1);
    next.wrapping_add(missed.wrapping_mul(interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::mock::MockRegisters;
    use crate::hw::timer_group::TimerGroup;
    use crate::hw::traits::{IsrFlags, MockAlarmRegisters, TimerDriver};
    use mockall::predicate::eq;
    use mockall::Sequence;

    const INTERVAL: u64 = 17_089_500;

    struct Fixture {
        regs: &'static MockRegisters,
        channel: &'static EventChannel,
        binding: IsrBinding<TimerGroup>,
    }

    fn fixture(index: u8, mode: TimerMode, rearm_policy: RearmPolicy) -> Fixture {
        let regs: &'static MockRegisters = Box::leak(Box::new(MockRegisters::new()));
        let timg: &'static TimerGroup = Box::leak(Box::new(TimerGroup::new(0, regs)));
        let channel: &'static EventChannel = Box::leak(Box::new(EventChannel::new()));

        Fixture {
            regs,
            channel,
            binding: IsrBinding {
                identity: TimerIdentity::new(0, index),
                mode,
                interval_ticks: INTERVAL,
                rearm_policy,
                hw: timg,
                channel,
            },
        }
    }

    fn mock_binding(
        hw: &'static MockAlarmRegisters,
        mode: TimerMode,
    ) -> IsrBinding<MockAlarmRegisters> {
        IsrBinding {
            identity: TimerIdentity::new(0, 0),
            mode,
            interval_ticks: INTERVAL,
            rearm_policy: RearmPolicy::FromSnapshot,
            hw,
            channel: Box::leak(Box::new(EventChannel::new())),
        }
    }

    #[test]
    fn test_snapshot_taken_before_rearm() {
        let mut hw = MockAlarmRegisters::new();
        let mut seq = Sequence::new();

        hw.expect_interrupt_status()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(0b01u32);
        hw.expect_latch_counter()
            .with(eq(0))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(1000u64);
        hw.expect_clear_interrupt()
            .with(eq(0))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        hw.expect_write_alarm()
            .with(eq(0), eq(1000 + INTERVAL))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        hw.expect_enable_alarm()
            .with(eq(0))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let hw: &'static MockAlarmRegisters = Box::leak(Box::new(hw));
        let binding = mock_binding(hw, TimerMode::OneShotManualRearm);

        assert!(service_alarm(&binding));

        let event = binding.channel.try_receive().unwrap();
        assert_eq!(event.counter, 1000);
        assert_eq!(event.kind, EventKind::Alarm(TimerMode::OneShotManualRearm));
    }

    #[test]
    fn test_auto_reload_does_not_write_alarm() {
        let mut hw = MockAlarmRegisters::new();
        hw.expect_interrupt_status().return_const(0b01u32);
        hw.expect_latch_counter().return_const(5u64);
        hw.expect_clear_interrupt().times(1).return_const(());
        hw.expect_read_alarm().never();
        hw.expect_write_alarm().never();
        hw.expect_enable_alarm().times(1).return_const(());

        let hw: &'static MockAlarmRegisters = Box::leak(Box::new(hw));
        let binding = mock_binding(hw, TimerMode::AutoReload);

        assert!(service_alarm(&binding));
        assert_eq!(
            binding.channel.try_receive().unwrap().kind,
            EventKind::Alarm(TimerMode::AutoReload)
        );
    }

    #[test]
    fn test_manual_rearm_from_snapshot() {
        let f = fixture(0, TimerMode::OneShotManualRearm, RearmPolicy::FromSnapshot);
        f.regs.fire(0, INTERVAL + 40);

        assert!(service_alarm(&f.binding));

        assert_eq!(f.regs.int_clr.get(), 0b01);
        assert_eq!(f.regs.alarm(0), 2 * INTERVAL + 40);
        assert_eq!(f.regs.hw_timer[0].update.get(), 1);
        assert_ne!(f.regs.hw_timer[0].config.get() & (1 << 10), 0);

        let event = f.channel.try_receive().unwrap();
        assert_eq!(event.kind, EventKind::Alarm(TimerMode::OneShotManualRearm));
        assert_eq!(event.identity, TimerIdentity::new(0, 0));
        assert_eq!(event.counter, INTERVAL + 40);
    }

    #[test]
    fn test_manual_rearm_from_previous_alarm() {
        let f = fixture(0, TimerMode::OneShotManualRearm, RearmPolicy::FromPreviousAlarm);
        f.regs.hw_timer[0].alarm_lo.set(INTERVAL as u32);
        f.regs.fire(0, INTERVAL + 40);

        assert!(service_alarm(&f.binding));

        assert_eq!(f.regs.alarm(0), 2 * INTERVAL);
        assert_eq!(f.channel.try_receive().unwrap().counter, INTERVAL + 40);
    }

    #[test]
    fn test_previous_alarm_rearm_skips_missed_periods() {
        let f = fixture(0, TimerMode::OneShotManualRearm, RearmPolicy::FromPreviousAlarm);
        f.regs.hw_timer[0].alarm_lo.set(INTERVAL as u32);
        f.regs.fire(0, 3 * INTERVAL + 40);

        assert!(service_alarm(&f.binding));

        assert_eq!(f.regs.alarm(0), 4 * INTERVAL);
        assert!(f.regs.alarm(0) > 3 * INTERVAL + 40);
    }

    #[test]
    fn test_next_alarm_after() {
        assert_eq!(next_alarm_after(100, 10, 105), 110);
        assert_eq!(next_alarm_after(100, 10, 110), 120);
        assert_eq!(next_alarm_after(100, 10, 135), 140);
        assert_eq!(next_alarm_after(100, 0, 135), 100);
    }

    #[test]
    fn test_auto_reload_clears_own_bit_only() {
        let f = fixture(1, TimerMode::AutoReload, RearmPolicy::FromSnapshot);
        f.regs.fire(1, 28_900_003);

        assert!(service_alarm(&f.binding));

        assert_eq!(f.regs.int_clr.get(), 0b10);
        assert_eq!(f.regs.alarm(1), 0);
        let event = f.channel.try_receive().unwrap();
        assert_eq!(event.kind, EventKind::Alarm(TimerMode::AutoReload));
        assert_eq!(event.identity, TimerIdentity::new(0, 1));
    }

    #[test]
    fn test_both_status_bits_set_services_own_timer_only() {
        let f = fixture(0, TimerMode::OneShotManualRearm, RearmPolicy::FromSnapshot);
        f.regs.fire(0, 100);
        f.regs.int_st.set(0b11);

        assert!(service_alarm(&f.binding));

        assert_eq!(f.regs.int_clr.get(), 0b01);
        assert_eq!(
            f.channel.try_receive().unwrap().kind,
            EventKind::Alarm(TimerMode::OneShotManualRearm)
        );
    }

    #[test]
    fn test_unexpected_status_produces_unknown_event() {
        let f = fixture(0, TimerMode::OneShotManualRearm, RearmPolicy::FromSnapshot);
        f.regs.fire(1, 0);
        f.regs.set_latched_counter(0, 777);

        assert!(service_alarm(&f.binding));

        assert_eq!(f.regs.int_clr.get(), 0);
        assert_eq!(f.regs.alarm(0), 0);
        assert_ne!(f.regs.hw_timer[0].config.get() & (1 << 10), 0);

        let event = f.channel.try_receive().unwrap();
        assert_eq!(event.kind, EventKind::Unknown);
        assert_eq!(event.counter, 777);
    }

    #[test]
    fn test_full_channel_drops_event_without_blocking() {
        let f = fixture(1, TimerMode::AutoReload, RearmPolicy::FromSnapshot);

        for i in 0..f.channel.capacity() as u64 + 5 {
            f.regs.fire(1, i);
            service_alarm(&f.binding);
            // Hardware still gets serviced when the event is lost
            assert_eq!(f.regs.int_clr.get(), 0b10);
        }

        assert_eq!(f.channel.len(), f.channel.capacity());
        assert_eq!(f.channel.dropped(), 5);
        for i in 0..f.channel.capacity() as u64 {
            assert_eq!(f.channel.try_receive().unwrap().counter, i);
        }
    }

    #[test]
    fn test_on_alarm_dispatches_through_table_slot() {
        let f = fixture(1, TimerMode::AutoReload, RearmPolicy::FromSnapshot);
        let table: &'static IsrTable<TimerGroup> = Box::leak(Box::new(IsrTable::new()));
        let slot = table.slot(f.binding.identity).unwrap();
        assert!(slot.bind(f.binding).is_ok());

        f.regs.fire(1, 42);
        on_alarm::<TimerGroup>(slot);

        assert_eq!(f.channel.try_receive().unwrap().counter, 42);
    }

    #[test]
    fn test_on_alarm_with_unbound_slot_does_nothing() {
        let table: &'static IsrTable<TimerGroup> = Box::leak(Box::new(IsrTable::new()));

        on_alarm::<TimerGroup>(table.slot(TimerIdentity::new(0, 0)).unwrap());
    }

    #[test]
    fn test_on_alarm_with_foreign_context_does_nothing() {
        on_alarm::<TimerGroup>(&5u32);
    }

    #[test]
    fn test_interrupt_of_unbound_slot_cleared_by_dispatcher() {
        let regs: &'static MockRegisters = Box::leak(Box::new(MockRegisters::new()));
        let timg: &'static TimerGroup = Box::leak(Box::new(TimerGroup::new(0, regs)));
        let table: &'static IsrTable<TimerGroup> = Box::leak(Box::new(IsrTable::new()));
        let id = TimerIdentity::new(0, 0);
        let slot = table.slot(id).unwrap();
        assert!(timg
            .register_callback(id, on_alarm::<TimerGroup>, slot, IsrFlags::IRAM)
            .is_ok());

        regs.fire(0, 10);
        timg.on_interrupt(0);

        assert_eq!(regs.int_clr.get(), 0b01);
        assert_eq!(regs.alarm(0), 0);
    }

    #[test]
    fn test_interrupt_with_foreign_context_cleared_by_dispatcher() {
        static FOREIGN: u32 = 5;

        let regs: &'static MockRegisters = Box::leak(Box::new(MockRegisters::new()));
        let timg: &'static TimerGroup = Box::leak(Box::new(TimerGroup::new(0, regs)));
        let id = TimerIdentity::new(0, 1);
        assert!(timg
            .register_callback(id, on_alarm::<TimerGroup>, &FOREIGN, IsrFlags::IRAM)
            .is_ok());

        regs.fire(1, 10);
        timg.on_interrupt(1);

        assert_eq!(regs.int_clr.get(), 0b10);
    }

    #[test]
    fn test_slot_bound_once() {
        let f = fixture(0, TimerMode::OneShotManualRearm, RearmPolicy::FromSnapshot);
        let table: IsrTable<TimerGroup> = IsrTable::new();
        let slot = table.slot(TimerIdentity::new(0, 0)).unwrap();

        assert!(slot.bind(f.binding).is_ok());
        assert_eq!(slot.bind(f.binding), Err(Error::AlreadyConfigured));

        table.reset();
        assert!(slot.binding().is_none());
        assert!(slot.bind(f.binding).is_ok());
    }

    #[test]
    fn test_slot_of_invalid_identity() {
        let table: IsrTable<TimerGroup> = IsrTable::new();

        assert!(table.slot(TimerIdentity::new(0, 2)).is_err());
        assert!(table.slot(TimerIdentity::new(2, 0)).is_err());
        assert!(table.slot(TimerIdentity::new(1, 1)).is_ok());
    }
}
