use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicBool, Ordering};

use epaper_node_core::RetainedRegion;

/// Lives in RTC slow memory, which keeps its contents through deep sleep.
/// Loaded from the image (both slots invalid) on power-on.
#[link_section = ".rtc.data"]
static mut RETAINED: RetainedRegion = RetainedRegion::new();

static TAKEN: AtomicBool = AtomicBool::new(false);

/// Hands out the retained region. Only the first call per boot gets it.
pub fn take() -> Option<&'static mut RetainedRegion> {
    if TAKEN.swap(true, Ordering::AcqRel) {
        return None;
    }
    // SAFETY: the flag above makes this the only reference for the whole boot.
    Some(unsafe { &mut *addr_of_mut!(RETAINED) })
}
