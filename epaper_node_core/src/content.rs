//! Bounded content types kept in retained memory.
//!
//! Everything here has a fixed size so that it can live in the RTC region
//! without an allocator. Oversized input is truncated, never rejected.

use core::fmt;
use heapless::Vec;

/// Capacity of the raw message buffer, terminator included.
pub const MESSAGE_CAPACITY: usize = 256;
/// Maximum number of display items kept from one payload.
pub const ITEM_CAPACITY: usize = 4;
/// Byte capacity of a display item key.
pub const KEY_CAPACITY: usize = 16;
/// Byte capacity of a display item value.
pub const VALUE_CAPACITY: usize = 24;

/// The most recently accepted payload, stored verbatim and NUL-terminated.
#[repr(C)]
#[derive(Clone)]
pub struct RawMessageBuffer {
    bytes: [u8; MESSAGE_CAPACITY],
    len: u16,
}

impl RawMessageBuffer {
    /// An empty buffer (a lone terminator).
    pub const fn empty() -> Self {
        Self {
            bytes: [0; MESSAGE_CAPACITY],
            len: 0,
        }
    }

    /// Copies an inbound payload into a fresh buffer.
    ///
    /// The payload ends at its first NUL byte and is cut to
    /// `MESSAGE_CAPACITY - 1` bytes so the terminator always fits.
    pub fn from_payload(payload: &[u8]) -> Self {
        let end = payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(payload.len());
        let len = end.min(MESSAGE_CAPACITY - 1);

        let mut buffer = Self::empty();
        buffer.bytes[..len].copy_from_slice(&payload[..len]);
        buffer.len = len as u16;
        buffer
    }

    /// Payload bytes without the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Payload bytes including the trailing NUL.
    pub fn as_terminated(&self) -> &[u8] {
        &self.bytes[..=self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for RawMessageBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for RawMessageBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_terminated() == other.as_terminated()
    }
}

impl Eq for RawMessageBuffer {}

impl fmt::Debug for RawMessageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMessageBuffer")
            .field("len", &self.len)
            .field("text", &String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

/// One `key=value` pair shown on the panel.
#[repr(C)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayItem {
    key: heapless::String<KEY_CAPACITY>,
    value: heapless::String<VALUE_CAPACITY>,
}

impl DisplayItem {
    /// Builds an item, keeping the longest prefix of each field that fits.
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: truncated(key),
            value: truncated(value),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Copies whole characters of `text` until the next one would not fit.
fn truncated<const N: usize>(text: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Ordered display items. Item 0 is the headline, the rest are body rows.
#[repr(C)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayItemSet {
    items: Vec<DisplayItem, ITEM_CAPACITY>,
}

impl DisplayItemSet {
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Appends an item. Returns `false` and drops the item once the set is full.
    pub fn push(&mut self, item: DisplayItem) -> bool {
        self.items.push(item).is_ok()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, DisplayItem> {
        self.items.iter()
    }

    /// The emphasized first item, if any.
    pub fn headline(&self) -> Option<&DisplayItem> {
        self.items.first()
    }

    /// Items after the headline, in order.
    pub fn rows(&self) -> &[DisplayItem] {
        self.items.get(1..).unwrap_or(&[])
    }
}

impl<'a> IntoIterator for &'a DisplayItemSet {
    type Item = &'a DisplayItem;
    type IntoIter = core::slice::Iter<'a, DisplayItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
