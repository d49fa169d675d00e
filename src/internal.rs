use crate::catalogue::{INIT_MARKER, INIT_MARKER_ADDRESS, VariableId};
use crate::error::Error;
use crate::platform::RecordStorage;
use crate::record::PhysicalRecord;
use crate::NvStore;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// What a pending queue entry writes once it is committed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Commit {
    Value(u8),
    /// Forces the record back to the erased pattern.
    Wipe,
}

impl Commit {
    pub const fn record(self) -> PhysicalRecord {
        match self {
            Commit::Value(payload) => PhysicalRecord::encode(payload),
            Commit::Wipe => PhysicalRecord::ERASED,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingWrite {
    pub id: VariableId,
    pub commit: Commit,
    /// Failed commit attempts so far.
    pub attempts: u8,
}

/// Bounded FIFO of writes waiting for the drain task, holding at most one entry per variable.
pub(crate) struct PendingQueue<const Q: usize> {
    entries: heapless::Vec<PendingWrite, Q>,
}

impl<const Q: usize> PendingQueue<Q> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Replaces the entry of `id` in place if there is one, otherwise appends.
    pub(crate) fn enqueue(&mut self, id: VariableId, commit: Commit) -> Result<(), Error> {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) {
            entry.commit = commit;
            entry.attempts = 0;
            return Ok(());
        }

        self.entries
            .push(PendingWrite {
                id,
                commit,
                attempts: 0,
            })
            .map_err(|_| Error::QueueFull)
    }

    /// Puts a failed entry back at the end. A newer entry for the same variable wins.
    pub(crate) fn requeue(&mut self, entry: PendingWrite) -> Result<(), PendingWrite> {
        if self.entries.iter().any(|queued| queued.id == entry.id) {
            return Ok(());
        }
        self.entries.push(entry)
    }

    pub(crate) fn pop_front(&mut self) -> Option<PendingWrite> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub(crate) fn remove(&mut self, id: VariableId) -> Option<PendingWrite> {
        let position = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(position))
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&PendingWrite) -> bool) {
        self.entries.retain(keep)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &PendingWrite> {
        self.entries.iter()
    }
}

impl<S: RecordStorage, const Q: usize> NvStore<S, Q> {
    /// Writes one record. A slot already holding the record is left alone to save a write cycle.
    pub(crate) fn write_record(
        &mut self,
        address: u16,
        record: PhysicalRecord,
    ) -> Result<(), Error> {
        if self.storage.read_record(address) == record.raw() {
            #[cfg(feature = "defmt")]
            trace!("write_record: @{:#x} unchanged", address);

            #[cfg(feature = "debug-logs")]
            println!("  internal: write_record @{address:#06x} unchanged {record:?}");

            return Ok(());
        }

        #[cfg(feature = "defmt")]
        trace!("write_record: @{:#x} {:#x}", address, record.raw());

        #[cfg(feature = "debug-logs")]
        println!("  internal: write_record @{address:#06x} {record:?}");

        self.storage
            .write_record(address, record.raw())
            .map_err(|_| Error::PhysicalIoFailure)
    }

    /// Writes a record immediately, retrying up to the retry budget.
    pub(crate) fn write_record_blocking(
        &mut self,
        address: u16,
        record: PhysicalRecord,
    ) -> Result<(), Error> {
        let budget = self.config.retry_budget.max(1);
        let mut attempts = 0;
        loop {
            match self.write_record(address, record) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempts += 1;
                    self.diagnostics.failed_commits =
                        self.diagnostics.failed_commits.saturating_add(1);
                    self.diagnostics.last_error = Some(e);
                    if attempts >= budget {
                        self.abandon(address);
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Commits up to `budget` queued entries, oldest first. Returns the number of attempts made.
    pub(crate) fn drain(&mut self, budget: usize) -> usize {
        let retry_budget = self.config.retry_budget.max(1);
        let mut attempted = 0;

        while attempted < budget {
            let Some(mut entry) = self.queue.pop_front() else {
                break;
            };
            attempted += 1;

            let Err(e) = self.write_record(entry.id.address(), entry.commit.record()) else {
                continue;
            };

            entry.attempts = entry.attempts.saturating_add(1);
            self.diagnostics.failed_commits = self.diagnostics.failed_commits.saturating_add(1);
            self.diagnostics.last_error = Some(e);

            if entry.attempts >= retry_budget {
                self.abandon(entry.id.address());
            } else if self.queue.requeue(entry).is_err() {
                self.abandon(entry.id.address());
            }
        }

        attempted
    }

    fn abandon(&mut self, _address: u16) {
        #[cfg(feature = "defmt")]
        warn!("giving up on record @{:#x}, value stays volatile", _address);

        #[cfg(feature = "debug-logs")]
        println!("  internal: abandon @{_address:#06x}");

        self.diagnostics.abandoned_commits = self.diagnostics.abandoned_commits.saturating_add(1);
    }

    /// Queues a write without checking the store state.
    pub(crate) fn enqueue(&mut self, id: VariableId, commit: Commit) -> Result<(), Error> {
        self.queue.enqueue(id, commit).inspect_err(|&e| {
            #[cfg(feature = "defmt")]
            warn!("dropped write of {}: {}", id, e);

            #[cfg(feature = "debug-logs")]
            println!("  internal: enqueue {id:?} dropped: {e}");

            self.diagnostics.dropped_requests = self.diagnostics.dropped_requests.saturating_add(1);
            self.diagnostics.last_error = Some(e);
        })
    }

    /// Decodes every record into the shadow. Invalid records get their default and a corrective
    /// write.
    pub(crate) fn load_shadow(&mut self) {
        for id in VariableId::all() {
            let record = PhysicalRecord::from_raw(self.storage.read_record(id.address()));
            match record.decode() {
                Ok(value) => self.shadow[id.index()] = value,
                Err(e) => {
                    #[cfg(feature = "defmt")]
                    warn!("{} invalid ({}), restoring default", id, record);

                    #[cfg(feature = "debug-logs")]
                    println!("  internal: load_shadow {id:?} invalid {record:?}");

                    self.diagnostics.invalid_records =
                        self.diagnostics.invalid_records.saturating_add(1);
                    self.diagnostics.last_error = Some(e);

                    let default = id.default_value();
                    self.shadow[id.index()] = default;
                    let _ = self.enqueue(id, Commit::Value(default));
                }
            }
        }
    }

    pub(crate) fn read_marker(&mut self) -> bool {
        let record = PhysicalRecord::from_raw(self.storage.read_record(INIT_MARKER_ADDRESS));
        self.initialized = record.decode() == Ok(INIT_MARKER);
        self.initialized
    }

    pub(crate) fn write_marker(&mut self) -> Result<(), Error> {
        self.write_record_blocking(INIT_MARKER_ADDRESS, PhysicalRecord::encode(INIT_MARKER))?;
        self.initialized = true;
        Ok(())
    }
}
