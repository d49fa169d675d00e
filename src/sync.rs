//! Scoped masking of the periodic tick.
//!
//! Reads and writes of a single shadow value are atomic on the target, a read-modify-write or a
//! group of related values is not. `AtomicAccess` keeps the loop interrupt from observing such
//! an update half done. Every service waits while the guard is alive, so keep the scope short
//! and never hold it across an operation of unbounded duration.

use crate::platform::TickMask;

/// Masks the tick on creation and restores the previous mask state when dropped, so guards may
/// be nested.
#[must_use = "the tick is unmasked again as soon as the guard is dropped"]
pub struct AtomicAccess<'a, M: TickMask + ?Sized> {
    mask: &'a M,
    was_masked: bool,
}

impl<'a, M: TickMask + ?Sized> AtomicAccess<'a, M> {
    pub fn acquire(mask: &'a M) -> Self {
        let was_masked = mask.is_tick_masked();
        mask.mask_tick();
        Self { mask, was_masked }
    }
}

impl<M: TickMask + ?Sized> Drop for AtomicAccess<'_, M> {
    fn drop(&mut self) {
        if !self.was_masked {
            self.mask.unmask_tick();
        }
    }
}

/// Runs `f` with the tick masked.
pub fn atomic<M: TickMask + ?Sized, R>(mask: &M, f: impl FnOnce() -> R) -> R {
    let _guard = AtomicAccess::acquire(mask);
    f()
}
