//! Memory backed timer group registers intended to be used in unit tests
//!
//! The mock does not count. Tests play the role of the hardware: they place the value the counter
//! would have at the next latch with [`set_latched_counter`](MockRegisters::set_latched_counter)
//! and raise interrupt status bits with [`fire`](MockRegisters::fire).

#[cfg(not(any(test, feature = "mocked_platform")))]
compile_error!("MockRegisters cannot be used on real hardware");

use super::timer_group::RegisterBlock;
use core::ops::Deref;
use vcell::VolatileCell;

const NUM_WORDS: usize = 64;

/// Timer group peripheral mock
#[repr(C, align(4))]
pub struct MockRegisters {
    memory: [VolatileCell<u32>; NUM_WORDS],
}

impl MockRegisters {
    /// Create registers with all bits cleared
    pub fn new() -> Self {
        Self {
            memory: core::array::from_fn(|_| VolatileCell::new(0)),
        }
    }

    /// Set the value read from timer `index` after the counter is latched
    pub fn set_latched_counter(&self, index: usize, value: u64) {
        self.hw_timer[index].lo.set(value as u32);
        self.hw_timer[index].hi.set((value >> 32) as u32);
    }

    /// Simulate an alarm of timer `index` matching at counter value `counter`
    ///
    /// Only the status bit of the firing timer is left set.
    pub fn fire(&self, index: usize, counter: u64) {
        self.set_latched_counter(index, counter);
        self.int_raw.set(1 << index);
        self.int_st.set(1 << index);
        self.int_clr.set(0);
    }

    /// Alarm threshold of timer `index` as written by software
    pub fn alarm(&self, index: usize) -> u64 {
        (self.hw_timer[index].alarm_hi.get() as u64) << 32
            | self.hw_timer[index].alarm_lo.get() as u64
    }
}

impl Default for MockRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for MockRegisters {
    type Target = RegisterBlock;
    fn deref(&self) -> &Self::Target {
        let ptr: *const RegisterBlock = self.memory.as_ptr() as *const _;
        // Safety: memory is larger than the register block, aligned, zero initialized, and made of
        // interior mutable 32-bit words like the register block itself
        unsafe { &*ptr }
    }
}
