//! Mutex ensuring that access to variables accessible from timer IRQs is mutually exclusive.
//!
//! This mutex requires proof of disabled IRQs provided by the `CriticalSection`'s lock

use crate::crit_sect::CriticalSection;
use core::cell::{Ref, RefCell, RefMut};

/// Wraps variable which is accessible from an IRQ
pub struct Mutex<T>(RefCell<T>);

impl<T> Mutex<T> {
    /// Creates new wrapper for a variable accessible from an IRQ
    ///
    /// # Example
    ///
    /// ```
    /// use timg_events::mutex::Mutex;
    ///
    /// static ALARMS_SEEN: Mutex<u32> = Mutex::new(0);
    /// ```
    pub const fn new(value: T) -> Mutex<T> {
        Self(RefCell::new(value))
    }

    /// Borrows Mutex's internal variable with mutually exclusive access
    pub fn borrow<'cs>(&'cs self, _cs: &'cs CriticalSection) -> Ref<'cs, T> {
        self.0.borrow()
    }

    /// Mutably borrows Mutex's internal variable with mutually exclusive access
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() {
    /// use timg_events::crit_sect;
    /// use timg_events::mutex::Mutex;
    ///
    /// static ALARMS_SEEN: Mutex<u32> = Mutex::new(0);
    ///
    /// crit_sect::locked(|cs_token| {
    ///   *ALARMS_SEEN.borrow_mut(cs_token) += 1;
    /// });
    /// # }
    /// ```
    pub fn borrow_mut<'cs>(&'cs self, _cs: &'cs CriticalSection) -> RefMut<'cs, T> {
        self.0.borrow_mut()
    }
}

// Safety: Mutex is Sync assumming contained type is Send and the CriticalSection module prevents
// concurrent access to Mutex from multiple contexts. This assumption is verified run-time by
// RefCell used inside the mutex
unsafe impl<T> Sync for Mutex<T> where T: Send {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crit_sect;

    #[test]
    fn test_borrow_mut_then_borrow() {
        let mutex = Mutex::new(5u32);

        crit_sect::locked(|cs| {
            *mutex.borrow_mut(cs) += 1;
        });

        crit_sect::locked(|cs| {
            assert_eq!(*mutex.borrow(cs), 6);
        });
    }

    #[test]
    #[should_panic]
    fn test_nested_mutable_borrow_is_detected() {
        let mutex = Mutex::new(0u32);

        crit_sect::locked(|cs| {
            let _first = mutex.borrow_mut(cs);
            let _second = mutex.borrow_mut(cs);
        });
    }
}
