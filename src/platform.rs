use crate::record::PhysicalRecord;
use embedded_storage::{ReadStorage, Storage};

/// Wear-levelled key/value primitive the store persists its records through. Virtual addresses
/// are stable slot numbers, the implementation decides where a slot lives physically.
pub trait RecordStorage {
    type Error;

    fn write_record(&mut self, address: u16, value: u16) -> Result<(), Self::Error>;

    /// Returns the stored value or `0xFFFF` if the slot was never written or cannot be read.
    fn read_record(&mut self, address: u16) -> u16;
}

impl<T: RecordStorage> RecordStorage for &mut T {
    type Error = T::Error;

    fn write_record(&mut self, address: u16, value: u16) -> Result<(), Self::Error> {
        (**self).write_record(address, value)
    }

    fn read_record(&mut self, address: u16) -> u16 {
        (**self).read_record(address)
    }
}

/// Gate on the periodic scheduling interrupt. Implementations toggle the update interrupt
/// enable of the loop timer and leave every other interrupt alone.
pub trait TickMask {
    fn mask_tick(&self);
    fn unmask_tick(&self);
    fn is_tick_masked(&self) -> bool;
}

impl<T: TickMask> TickMask for &T {
    fn mask_tick(&self) {
        (**self).mask_tick()
    }

    fn unmask_tick(&self) {
        (**self).unmask_tick()
    }

    fn is_tick_masked(&self) -> bool {
        (**self).is_tick_masked()
    }
}

/// The hardware timer driving the service loop.
pub trait OsTimer: TickMask {
    /// Milliseconds since boot, handed to every service call.
    fn system_time_ms(&self) -> u32;

    /// Free running count of the loop timer, used to measure how long one loop takes.
    ///
    /// Must wrap at `u32::MAX` only. A counter reloaded every period cannot measure an overrun,
    /// feed it from a separate free running timer in that case.
    fn counter(&self) -> u32;

    /// Enables the counter. The update interrupt is unmasked separately.
    fn start(&mut self);

    /// Acknowledges the update event at the end of the interrupt handler.
    fn clear_update_flag(&mut self);
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EepromError<E> {
    /// The record slot lies beyond the capacity of the device.
    OutOfRange,
    Storage(E),
}

/// Maps record slots onto a byte addressable `embedded_storage::Storage`, two little endian
/// bytes per virtual address starting at `base`.
///
/// Meant for real EEPROMs or storage drivers that already level wear. Raw NOR flash needs an
/// emulation layer in between.
pub struct EepromRecords<S> {
    storage: S,
    base: u32,
}

impl<S: Storage> EepromRecords<S> {
    pub fn new(storage: S, base: u32) -> Self {
        Self { storage, base }
    }

    pub fn release(self) -> S {
        self.storage
    }

    fn offset(&self, address: u16) -> Option<u32> {
        let offset = self.base.checked_add(address as u32 * 2)?;
        let end = (offset as usize).checked_add(2)?;
        if end > self.storage.capacity() {
            return None;
        }
        Some(offset)
    }
}

impl<S: Storage> RecordStorage for EepromRecords<S> {
    type Error = EepromError<S::Error>;

    fn write_record(&mut self, address: u16, value: u16) -> Result<(), Self::Error> {
        let offset = self.offset(address).ok_or(EepromError::OutOfRange)?;
        self.storage
            .write(offset, &value.to_le_bytes())
            .map_err(EepromError::Storage)
    }

    fn read_record(&mut self, address: u16) -> u16 {
        let Some(offset) = self.offset(address) else {
            return PhysicalRecord::ERASED.raw();
        };

        let mut buf = [0xFF; 2];
        match ReadStorage::read(&mut self.storage, offset, &mut buf) {
            Ok(()) => u16::from_le_bytes(buf),
            Err(_) => PhysicalRecord::ERASED.raw(),
        }
    }
}
