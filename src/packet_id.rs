//! Packet identifier allocation.
//!
//! Identifiers are leased for the lifetime of one request/response exchange
//! and must be released when the exchange completes or times out. The
//! allocator is a per-session monotonic counter modulo 65536 that skips
//! zero and any identifier still in flight.

use crate::error::{MqttError, Result};
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Debug)]
struct IdState {
    next: u16,
    in_flight: HashSet<u16>,
}

#[derive(Debug)]
pub struct PacketIdGenerator {
    state: Mutex<IdState>,
}

impl PacketIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IdState {
                next: 1,
                in_flight: HashSet::new(),
            }),
        }
    }

    /// Leases the next free identifier.
    ///
    /// # Errors
    ///
    /// Returns `PacketIdExhausted` when all 65535 identifiers are in
    /// flight.
    pub fn next(&self) -> Result<u16> {
        let mut state = self.state.lock();
        if state.in_flight.len() == usize::from(u16::MAX) {
            return Err(MqttError::PacketIdExhausted);
        }
        loop {
            let candidate = state.next;
            state.next = state.next.checked_add(1).unwrap_or(1);
            if candidate != 0 && !state.in_flight.contains(&candidate) {
                state.in_flight.insert(candidate);
                return Ok(candidate);
            }
        }
    }

    /// Returns an identifier to the pool. Idempotent.
    pub fn release(&self, id: u16) {
        self.state.lock().in_flight.remove(&id);
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }
}

impl Default for PacketIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
