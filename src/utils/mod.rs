//! Heapless data structures used by timer software

pub mod ring_buffer;
