//! Redundancy (LBRR) recovery for a lost head packet.
//!
//! Later packets may embed a low-bitrate copy of an earlier one. When the
//! head of the jitter window was lost, the lookahead slots are searched in
//! order of increasing delay, closest first. The first slot that yields a
//! non-empty payload wins, even if a later slot also carries one.

use crate::codec::CodecEngine;
use crate::jitter::JitterWindow;

/// A payload recovered from redundancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    /// Decodable payload standing in for the lost packet
    pub payload: Vec<u8>,

    /// How many positions behind the head it was found
    pub delay: usize,
}

/// Search the window's lookahead slots for redundancy describing its head.
///
/// Empty (lost) and not-yet-filled slots are skipped. Returns `None` if no
/// slot carries usable redundancy; the caller then conceals the packet.
pub fn recover<E: CodecEngine>(engine: &E, window: &JitterWindow) -> Option<Recovered> {
    for delay in 1..=window.depth() {
        let Some(slot) = window.lookahead(delay) else {
            break;
        };
        if slot.is_empty() {
            continue;
        }

        if let Some(payload) = engine.search_for_lbrr(slot, delay) {
            if !payload.is_empty() {
                tracing::trace!(
                    delay,
                    bytes = payload.len(),
                    "recovered lost packet from redundancy"
                );
                return Some(Recovered { payload, delay });
            }
        }
    }

    None
}
