//! Bounded channel delivering [`TimerEvent`]s from interrupt handlers to a task
//!
//! Producers are interrupt handlers of any number of timers. They push events with
//! [`send_nonblocking`](EventChannel::send_nonblocking), which never waits and never allocates.
//! The single consumer task pulls events with [`receive`](EventChannel::receive) which sleeps until
//! an event is available.
//!
//! The queue is guarded by a short critical section. Events keep the order in which their
//! producers completed the enqueue, across all timers.
//!
//! When the queue is full the new event is dropped. Sustained overflow loses events instead of
//! stalling interrupt handlers; the loss is visible to the consumer as a gap in
//! [`TimerEvent::sequence`] and through [`dropped`](EventChannel::dropped).

use crate::config::EVENT_QUEUE_LEN;
use crate::crit_sect;
use crate::event::TimerEvent;
use crate::mutex::Mutex;
use crate::utils::ring_buffer::RingBuffer;

struct ChannelData<const N: usize> {
    queue: RingBuffer<TimerEvent, N>,
    next_sequence: u32,
    dropped: u32,
}

/// Interrupt safe bounded queue of timer events
///
/// # Examples
///
/// ```no_run
/// # fn main() {
/// use timg_events::channel::EventChannel;
///
/// static CHANNEL: EventChannel = EventChannel::new();
///
/// let event = CHANNEL.receive();
/// # }
/// ```
pub struct EventChannel<const N: usize = EVENT_QUEUE_LEN> {
    data: Mutex<ChannelData<N>>,
}

impl<const N: usize> EventChannel<N> {
    /// Create an empty channel
    pub const fn new() -> Self {
        Self {
            data: Mutex::new(ChannelData {
                queue: RingBuffer::new(),
                next_sequence: 0,
                dropped: 0,
            }),
        }
    }

    /// Reset channel
    ///
    /// This function is intended to be used between unit tests
    #[doc(hidden)]
    pub fn reset(&self) {
        crit_sect::locked(|cs| {
            let mut data = self.data.borrow_mut(cs);
            data.queue.clear();
            data.next_sequence = 0;
            data.dropped = 0;
        });
    }

    /// Enqueue `event` without blocking
    ///
    /// Safe to call from an ISR. The channel overwrites [`TimerEvent::sequence`] with the next
    /// sequence number, whether or not the event fits in the queue.
    ///
    /// Returns `false` if the queue is full and the event was dropped.
    pub fn send_nonblocking(&self, mut event: TimerEvent) -> bool {
        crit_sect::locked(|cs| {
            let mut data = self.data.borrow_mut(cs);
            event.sequence = data.next_sequence;
            data.next_sequence = data.next_sequence.wrapping_add(1);

            let queued = data.queue.push(event);
            if !queued {
                data.dropped = data.dropped.wrapping_add(1);
            }
            queued
        })
    }

    /// Dequeue the oldest event, if any
    pub fn try_receive(&self) -> Option<TimerEvent> {
        crit_sect::locked(|cs| self.data.borrow_mut(cs).queue.pop())
    }

    /// Dequeue the oldest event, sleeping until one is available
    ///
    /// Must be called from thread mode only: the caller sleeps waiting for a producer's
    /// interrupt, which never happens if the caller blocks that interrupt.
    pub fn receive(&self) -> TimerEvent {
        loop {
            if let Some(event) = self.try_receive() {
                return event;
            }
            crit_sect::wait_for_interrupt_unless(|cs| !self.data.borrow(cs).queue.is_empty());
        }
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        crit_sect::locked(|cs| self.data.borrow(cs).queue.len())
    }

    /// Checks if no event is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximal number of queued events
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of events dropped because the queue was full
    pub fn dropped(&self) -> u32 {
        crit_sect::locked(|cs| self.data.borrow(cs).dropped)
    }
}

impl<const N: usize> Default for EventChannel<N> {
    fn default() -> Self {
        Self::new()
    }
}
