/// Errors reported by timer software
#[derive(Debug, Clone, Copy, Eq, PartialEq, defmt::Format)]
pub enum Error {
    /// The timer identity does not exist in the peripheral
    InvalidTimer,
    /// The clock divider is out of range supported by the peripheral
    InvalidDivider,
    /// The alarm interval is not a positive number of ticks
    InvalidInterval,
    /// The timer was already configured
    AlreadyConfigured,
    /// An interrupt callback is already registered for the timer
    CallbackAlreadyRegistered,
    /// Requested interrupt flags cannot be satisfied
    InvalidInterruptFlags,
}
