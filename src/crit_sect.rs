//! Critical sections guarding state shared with timer ISRs
//!
//! Built on the `critical-section` crate. The final binary selects the implementation: a
//! single-core interrupt mask on the target chip, the `std` implementation in host tests.

// TODO: Implement own mutex abstraction instead of relying on blocking all IRQs
//       It should block only the timer group IRQs which can enter this function

/// Proof that the current context runs inside a critical section
pub struct CriticalSection<'a> {
    _internal_cs: critical_section::CriticalSection<'a>,
}

impl<'a> CriticalSection<'a> {
    fn new(internal_cs: critical_section::CriticalSection<'a>) -> Self {
        Self {
            _internal_cs: internal_cs,
        }
    }
}

/// Runs `f` with IRQs blocked
pub fn locked<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    critical_section::with(|cs| f(&CriticalSection::new(cs)))
}

/// Puts the core to sleep until an interrupt is pending, unless `ready` already holds
///
/// `ready` is evaluated with interrupts masked. On Cortex-M a pending interrupt wakes the core
/// from WFI even while masked, so an event produced between the check and the sleep is not
/// missed: the ISR runs as soon as the critical section ends. Other platforms only hint a spin
/// and let the caller check again.
pub fn wait_for_interrupt_unless<F>(ready: F)
where
    F: FnOnce(&CriticalSection) -> bool,
{
    locked(|cs| {
        if !ready(cs) {
            wait_for_interrupt();
        }
    });
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
fn wait_for_interrupt() {
    cortex_m::asm::wfi();
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
fn wait_for_interrupt() {
    core::hint::spin_loop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_returns_closure_result() {
        assert_eq!(locked(|_| 42), 42);
    }

    #[test]
    fn test_locked_nests() {
        let inner = locked(|_| locked(|_| 7));
        assert_eq!(inner, 7);
    }

    #[test]
    fn test_wait_returns_when_ready() {
        let mut checked = false;
        wait_for_interrupt_unless(|_| {
            checked = true;
            true
        });
        assert!(checked);
    }

    #[test]
    fn test_wait_returns_when_not_ready() {
        let mut checks = 0;
        for _ in 0..3 {
            wait_for_interrupt_unless(|_| {
                checks += 1;
                false
            });
        }
        assert_eq!(checks, 3);
    }
}
