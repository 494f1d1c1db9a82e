//! Suppression of payloads that match the retained message.

use crate::content::RawMessageBuffer;

/// Compares an inbound payload with the retained message.
///
/// The payload is truncated and terminated exactly as it would be stored.
/// Returns the buffer to store when it differs, `None` when it is identical.
pub fn detect_change(current: &RawMessageBuffer, payload: &[u8]) -> Option<RawMessageBuffer> {
    let incoming = RawMessageBuffer::from_payload(payload);
    if incoming.as_terminated() == current.as_terminated() {
        None
    } else {
        Some(incoming)
    }
}
