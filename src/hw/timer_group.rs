//! Driver of the timer group peripheral
//!
//! A timer group contains two 64-bit general purpose timers sharing one set of interrupt
//! registers. Each timer counts ticks of the APB clock divided by a 16-bit prescaler and raises an
//! alarm when its counter matches the alarm threshold. Reading a counter requires latching it
//! first: a write to `update` freezes both 32-bit halves so that `lo` and `hi` are consistent.

use super::traits::{
    AlarmRegisters, Context, CountDirection, HwTimerConfig, InterruptTrigger, IsrFlags, IsrHandler,
    TimerDriver,
};
use crate::config::{TimerIdentity, MAX_DIVIDER, MIN_DIVIDER, TIMERS_PER_GROUP};
use crate::crit_sect;
use crate::error::Error;
use crate::mutex::Mutex;
use core::ops::Deref;
use vcell::VolatileCell;

/// Base address of timer group 0
pub const TIMG0_BASE: usize = 0x3FF5_F000;
/// Base address of timer group 1
pub const TIMG1_BASE: usize = 0x3FF6_0000;

const CONFIG_EN: u32 = 1 << 31;
const CONFIG_INCREASE: u32 = 1 << 30;
const CONFIG_AUTORELOAD: u32 = 1 << 29;
const CONFIG_DIVIDER_SHIFT: u32 = 13;
const CONFIG_DIVIDER_MASK: u32 = 0xffff << CONFIG_DIVIDER_SHIFT;
const CONFIG_EDGE_INT_EN: u32 = 1 << 12;
const CONFIG_LEVEL_INT_EN: u32 = 1 << 11;
const CONFIG_ALARM_EN: u32 = 1 << 10;

/// Registers of a single timer
#[repr(C)]
pub struct HwTimerRegisters {
    /// Enable, direction, auto reload, divider, interrupt type and alarm enable bits
    pub config: VolatileCell<u32>,
    /// Lower half of the latched counter
    pub lo: VolatileCell<u32>,
    /// Upper half of the latched counter
    pub hi: VolatileCell<u32>,
    /// Any write latches the counter to `lo` and `hi`
    pub update: VolatileCell<u32>,
    /// Lower half of the alarm threshold
    pub alarm_lo: VolatileCell<u32>,
    /// Upper half of the alarm threshold
    pub alarm_hi: VolatileCell<u32>,
    /// Lower half of the value loaded to the counter
    pub load_lo: VolatileCell<u32>,
    /// Upper half of the value loaded to the counter
    pub load_hi: VolatileCell<u32>,
    /// Any write loads `load_lo` and `load_hi` to the counter
    pub load: VolatileCell<u32>,
}

/// Register block of a timer group
#[repr(C)]
pub struct RegisterBlock {
    /// Registers of each timer
    pub hw_timer: [HwTimerRegisters; TIMERS_PER_GROUP],
    // Watchdog and calibration registers, not used by this driver
    _reserved: [u32; 20],
    /// Interrupt enable, one bit per timer
    pub int_ena: VolatileCell<u32>,
    /// Raw interrupt status
    pub int_raw: VolatileCell<u32>,
    /// Masked interrupt status
    pub int_st: VolatileCell<u32>,
    /// Write one to clear the status bit
    pub int_clr: VolatileCell<u32>,
}

struct TimerGroupPeriphWrapper {
    ptr: *const RegisterBlock,
}
impl TimerGroupPeriphWrapper {
    const fn new(ptr: *const RegisterBlock) -> Self {
        TimerGroupPeriphWrapper { ptr }
    }
}
impl Deref for TimerGroupPeriphWrapper {
    type Target = RegisterBlock;
    fn deref(&self) -> &Self::Target {
        unsafe { &*self.ptr }
    }
}
// Safety: registers are shared with the hardware anyway. Read-modify-write sequences on registers
// shared by both timers are done in critical sections; per timer registers are accessed only by
// the timer's owner (setup code, then the timer's ISR).
unsafe impl Sync for TimerGroupPeriphWrapper {}
unsafe impl Send for TimerGroupPeriphWrapper {}

#[derive(Clone, Copy)]
struct Callback {
    handler: IsrHandler,
    context: Context,
    flags: IsrFlags,
}

/// Driver of one timer group peripheral
pub struct TimerGroup {
    group: u8,
    regs: TimerGroupPeriphWrapper,
    callbacks: Mutex<[Option<Callback>; TIMERS_PER_GROUP]>,
}

impl TimerGroup {
    /// Create a driver of timer group `group` using the passed register block
    ///
    /// The driver keeps accessing `regs` for its whole life, so the block must be `'static`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() {
    /// use timg_events::hw::timer_group::{RegisterBlock, TimerGroup, TIMG0_BASE};
    ///
    /// let regs: &'static RegisterBlock = unsafe { &*(TIMG0_BASE as *const RegisterBlock) };
    /// let timg0 = TimerGroup::new(0, regs);
    /// # }
    /// ```
    ///
    /// A driver cannot outlive a borrowed register block:
    ///
    /// ```compile_fail
    /// use timg_events::hw::timer_group::{RegisterBlock, TimerGroup};
    ///
    /// fn driver_of(regs: &RegisterBlock) -> TimerGroup {
    ///     TimerGroup::new(0, regs)
    /// }
    /// ```
    pub fn new(group: u8, regs: &'static RegisterBlock) -> Self {
        Self {
            group,
            regs: TimerGroupPeriphWrapper::new(regs),
            callbacks: Mutex::new([None; TIMERS_PER_GROUP]),
        }
    }

    /// Create a driver of the timer group mapped at `base_address`
    ///
    /// Usable to initialize a `static` driver instance.
    ///
    /// # Safety
    ///
    /// `base_address` must point to a timer group register block which is not driven by any other
    /// driver instance.
    pub const unsafe fn from_address(group: u8, base_address: usize) -> Self {
        Self {
            group,
            regs: TimerGroupPeriphWrapper::new(base_address as *const RegisterBlock),
            callbacks: Mutex::new([None; TIMERS_PER_GROUP]),
        }
    }

    /// Number of this timer group
    pub fn group(&self) -> u8 {
        self.group
    }

    /// Entry point of the timer group interrupt vector
    ///
    /// The platform's interrupt handler for timer `index` of this group must call this function.
    /// It calls the callback registered with
    /// [`register_callback`](TimerDriver::register_callback), if any. An interrupt still pending
    /// after the callback, or without any callback, is cleared so that a level triggered
    /// interrupt does not fire again immediately.
    pub fn on_interrupt(&self, index: u8) {
        if index as usize >= TIMERS_PER_GROUP {
            return;
        }

        let callback = crit_sect::locked(|cs| {
            self.callbacks
                .borrow(cs)
                .get(index as usize)
                .copied()
                .flatten()
        });

        if let Some(callback) = callback {
            (callback.handler)(callback.context);
        }

        if self.regs.int_st.get() & (1u32 << index) != 0 {
            self.clear_interrupt(index);
        }
    }

    /// Flags passed when the callback of timer `identity` was registered
    pub fn callback_flags(&self, identity: TimerIdentity) -> Option<IsrFlags> {
        let index = self.index_of(identity).ok()?;
        crit_sect::locked(|cs| self.callbacks.borrow(cs)[index].map(|c| c.flags))
    }

    fn index_of(&self, identity: TimerIdentity) -> Result<usize, Error> {
        if identity.group == self.group && (identity.index as usize) < TIMERS_PER_GROUP {
            Ok(identity.index as usize)
        } else {
            Err(Error::InvalidTimer)
        }
    }

    fn timer(&self, identity: TimerIdentity) -> Result<&HwTimerRegisters, Error> {
        Ok(&self.regs.hw_timer[self.index_of(identity)?])
    }

    fn modify_config<F>(timer: &HwTimerRegisters, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        timer.config.set(f(timer.config.get()));
    }

    fn latch_and_read(timer: &HwTimerRegisters) -> u64 {
        timer.update.set(1);
        (timer.hi.get() as u64) << 32 | timer.lo.get() as u64
    }
}

impl TimerDriver for TimerGroup {
    fn init(&self, identity: TimerIdentity, config: &HwTimerConfig) -> Result<(), Error> {
        let timer = self.timer(identity)?;

        if !(MIN_DIVIDER..=MAX_DIVIDER).contains(&config.divider) {
            return Err(Error::InvalidDivider);
        }
        // Divider of 65536 is encoded as 0
        let divider_field = (config.divider << CONFIG_DIVIDER_SHIFT) & CONFIG_DIVIDER_MASK;

        let mut value = divider_field;
        if config.counter_enabled {
            value |= CONFIG_EN;
        }
        if config.direction == CountDirection::Up {
            value |= CONFIG_INCREASE;
        }
        if config.auto_reload {
            value |= CONFIG_AUTORELOAD;
        }
        if config.alarm_enabled {
            value |= CONFIG_ALARM_EN;
        }
        value |= match config.interrupt_trigger {
            InterruptTrigger::Level => CONFIG_LEVEL_INT_EN,
            InterruptTrigger::Edge => CONFIG_EDGE_INT_EN,
        };

        timer.config.set(value);
        Ok(())
    }

    fn set_counter(&self, identity: TimerIdentity, value: u64) -> Result<(), Error> {
        let timer = self.timer(identity)?;
        timer.load_lo.set(value as u32);
        timer.load_hi.set((value >> 32) as u32);
        timer.load.set(1);
        Ok(())
    }

    fn set_alarm(&self, identity: TimerIdentity, value: u64) -> Result<(), Error> {
        let index = self.index_of(identity)?;
        self.write_alarm(index as u8, value);
        Ok(())
    }

    fn enable_interrupt(&self, identity: TimerIdentity) -> Result<(), Error> {
        let bit = 1u32 << self.index_of(identity)?;
        crit_sect::locked(|_| self.regs.int_ena.set(self.regs.int_ena.get() | bit));
        Ok(())
    }

    fn disable_interrupt(&self, identity: TimerIdentity) -> Result<(), Error> {
        let bit = 1u32 << self.index_of(identity)?;
        crit_sect::locked(|_| self.regs.int_ena.set(self.regs.int_ena.get() & !bit));
        Ok(())
    }

    fn register_callback(
        &self,
        identity: TimerIdentity,
        handler: IsrHandler,
        context: Context,
        flags: IsrFlags,
    ) -> Result<(), Error> {
        let index = self.index_of(identity)?;
        if !flags.is_valid() {
            return Err(Error::InvalidInterruptFlags);
        }

        crit_sect::locked(|cs| {
            let mut callbacks = self.callbacks.borrow_mut(cs);
            let slot = &mut callbacks[index];
            if slot.is_some() {
                return Err(Error::CallbackAlreadyRegistered);
            }
            *slot = Some(Callback {
                handler,
                context,
                flags,
            });
            Ok(())
        })
    }

    fn start(&self, identity: TimerIdentity) -> Result<(), Error> {
        Self::modify_config(self.timer(identity)?, |c| c | CONFIG_EN);
        Ok(())
    }

    fn pause(&self, identity: TimerIdentity) -> Result<(), Error> {
        Self::modify_config(self.timer(identity)?, |c| c & !CONFIG_EN);
        Ok(())
    }

    fn read_counter(&self, identity: TimerIdentity) -> Result<u64, Error> {
        Ok(Self::latch_and_read(self.timer(identity)?))
    }
}

impl AlarmRegisters for TimerGroup {
    fn interrupt_status(&self) -> u32 {
        self.regs.int_st.get()
    }

    fn latch_counter(&self, index: u8) -> u64 {
        Self::latch_and_read(&self.regs.hw_timer[index as usize])
    }

    fn clear_interrupt(&self, index: u8) {
        // Write one to clear; zero bits leave other timers' status untouched
        self.regs.int_clr.set(1u32 << index);
    }

    fn read_alarm(&self, index: u8) -> u64 {
        let timer = &self.regs.hw_timer[index as usize];
        (timer.alarm_hi.get() as u64) << 32 | timer.alarm_lo.get() as u64
    }

    fn write_alarm(&self, index: u8, value: u64) {
        let timer = &self.regs.hw_timer[index as usize];
        timer.alarm_hi.set((value >> 32) as u32);
        timer.alarm_lo.set(value as u32);
    }

    fn enable_alarm(&self, index: u8) {
        Self::modify_config(&self.regs.hw_timer[index as usize], |c| c | CONFIG_ALARM_EN);
    }
}
