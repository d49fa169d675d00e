#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod catalogue;
pub mod error;
mod get;
mod internal;
pub mod platform;
pub mod record;
pub mod scheduler;
mod set;
pub mod sync;

pub use catalogue::{Region, VariableId};
pub use get::Get;
pub use internal::{Commit, PendingWrite};
pub use set::Set;

use crate::error::Error;
use crate::internal::PendingQueue;
use crate::platform::RecordStorage;
use crate::record::PhysicalRecord;
use crate::scheduler::Service;
#[cfg(feature = "defmt")]
use defmt::{info, warn};
use strum::EnumCount;

/// Capacity of the pending write queue of `NvStore::new`.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreState {
    /// `init` has not run yet. Reads return catalogue defaults, writes are refused.
    Uninitialized,
    /// Factory defaults are being written.
    Initializing,
    Ready,
    /// Writes are refused, reads are served from the shadow.
    Shutdown,
}

/// What happens to queued writes on `shutdown`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ShutdownPolicy {
    /// Commit everything still queued, one attempt per entry.
    #[default]
    Flush,
    /// Drop the queue. Values revert to their stored state on `restart`.
    Abandon,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Commits attempted per `drain_task` call. Bounds the time spent in one loop period.
    pub drain_batch: usize,
    /// Failed attempts after which a commit is given up.
    pub retry_budget: u8,
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            drain_batch: 2,
            retry_budget: 3,
            shutdown_policy: ShutdownPolicy::Flush,
        }
    }
}

/// Counters of faults absorbed by the store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Diagnostics {
    /// Records found invalid while loading the shadow.
    pub invalid_records: u32,
    /// Write requests refused or dropped because the queue was full.
    pub dropped_requests: u32,
    /// Failed physical write attempts, retried or not.
    pub failed_commits: u32,
    /// Commits given up after exhausting the retry budget.
    pub abandoned_commits: u32,
    pub last_error: Option<Error>,
}

/// The configuration store keeps a shadow copy of every catalogue variable in RAM. Reads are
/// served from the shadow only; writes update the shadow and queue the record for the periodic
/// drain task which commits a few entries per loop period.
pub struct NvStore<S: RecordStorage, const Q: usize = DEFAULT_QUEUE_CAPACITY> {
    pub(crate) storage: S,
    pub(crate) config: Config,
    pub(crate) state: StoreState,
    pub(crate) initialized: bool,
    pub(crate) shadow: [u8; VariableId::COUNT],
    pub(crate) queue: PendingQueue<Q>,
    pub(crate) diagnostics: Diagnostics,
}

impl<S: RecordStorage> NvStore<S> {
    /// Creates a store with the default configuration. Nothing is read before `init`.
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, Config::default())
    }
}

impl<S: RecordStorage, const Q: usize> NvStore<S, Q> {
    pub fn with_config(storage: S, config: Config) -> Self {
        let mut shadow = [0u8; VariableId::COUNT];
        for id in VariableId::all() {
            shadow[id.index()] = id.default_value();
        }

        Self {
            storage,
            config,
            state: StoreState::Uninitialized,
            initialized: false,
            shadow,
            queue: PendingQueue::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Loads the shadow from the record storage.
    ///
    /// A storage without a valid init marker gets a factory reset first. Every record that fails
    /// its validity check is replaced by its default in the shadow and a corrective write is
    /// queued. Never fails; a broken storage leaves the device running on defaults.
    ///
    /// Only the first call loads anything. Later calls are ignored, use `restart` after
    /// `shutdown` to re-read the storage.
    pub fn init(&mut self) {
        if self.state != StoreState::Uninitialized {
            #[cfg(feature = "defmt")]
            warn!("nv init ignored in state {}", self.state);

            #[cfg(feature = "debug-logs")]
            println!("NvStore: init ignored in state {:?}", self.state);

            return;
        }

        #[cfg(feature = "defmt")]
        info!("nv init");

        #[cfg(feature = "debug-logs")]
        println!("NvStore: init");

        self.revalidate();
    }

    fn revalidate(&mut self) {
        self.state = StoreState::Initializing;
        if !self.read_marker() {
            self.factory_reset();
        }
        self.load_shadow();
        self.state = StoreState::Ready;
    }

    /// Get a value from the shadow. Never touches the storage, safe from interrupt context.
    ///
    /// Supported types are u8, i8 and bool.
    pub fn read<R>(&self, id: VariableId) -> R
    where
        NvStore<S, Q>: Get<R>,
    {
        Get::get(self, id)
    }

    pub fn read_u8(&self, id: VariableId) -> u8 {
        self.read(id)
    }

    pub fn read_i8(&self, id: VariableId) -> i8 {
        self.read(id)
    }

    /// Updates the shadow and queues the value for persistence. Never blocks.
    ///
    /// A refused or dropped request is logged and counted in `Diagnostics`; use
    /// `try_request_write` to observe it.
    pub fn request_write<R>(&mut self, id: VariableId, value: R)
    where
        NvStore<S, Q>: Set<R>,
    {
        let _ = Set::set(self, id, value);
    }

    /// Same as `request_write`, but reports why a request did not make it into the queue.
    ///
    /// With `Error::QueueFull` the shadow already holds the new value; with `Error::NotReady`
    /// and `Error::ShutDown` it is left unchanged.
    pub fn try_request_write<R>(&mut self, id: VariableId, value: R) -> Result<(), Error>
    where
        NvStore<S, Q>: Set<R>,
    {
        Set::set(self, id, value)
    }

    pub fn write_u8(&mut self, id: VariableId, value: u8) {
        self.request_write(id, value)
    }

    pub fn write_i8(&mut self, id: VariableId, value: i8) {
        self.request_write(id, value)
    }

    /// Queues the current shadow value of `id` for persistence.
    pub fn request_save(&mut self, id: VariableId) {
        let _ = self.write_payload(id, self.shadow[id.index()]);
    }

    pub(crate) fn write_payload(&mut self, id: VariableId, payload: u8) -> Result<(), Error> {
        self.accepts_writes(id)?;
        self.shadow[id.index()] = payload;
        self.enqueue(id, Commit::Value(payload))
    }

    fn accepts_writes(&mut self, _id: VariableId) -> Result<(), Error> {
        let refusal = match self.state {
            StoreState::Ready => return Ok(()),
            StoreState::Shutdown => Error::ShutDown,
            StoreState::Uninitialized | StoreState::Initializing => Error::NotReady,
        };

        #[cfg(feature = "defmt")]
        warn!("write of {} refused: {}", _id, refusal);

        #[cfg(feature = "debug-logs")]
        println!("NvStore: write of {_id:?} refused: {refusal}");

        self.diagnostics.dropped_requests = self.diagnostics.dropped_requests.saturating_add(1);
        self.diagnostics.last_error = Some(refusal);
        Err(refusal)
    }

    /// Commits at most `Config::drain_batch` queued writes, at least one. Called once per loop
    /// period.
    ///
    /// A failed commit is moved to the back of the queue and retried on a later call until the
    /// retry budget is used up.
    pub fn drain_task(&mut self) {
        if self.state != StoreState::Ready {
            return;
        }
        self.drain(self.config.drain_batch.max(1));
    }

    /// Restores every regular variable to its catalogue default and marks the storage as
    /// initialized. Static variables are left untouched.
    ///
    /// The records are written immediately, one after another, so this takes far longer than a
    /// loop period. Refused before `init` and while shut down.
    pub fn factory_reset(&mut self) {
        if matches!(self.state, StoreState::Uninitialized | StoreState::Shutdown) {
            #[cfg(feature = "defmt")]
            warn!("factory reset refused in state {}", self.state);

            #[cfg(feature = "debug-logs")]
            println!("NvStore: factory reset refused in state {:?}", self.state);

            return;
        }

        #[cfg(feature = "defmt")]
        info!("factory reset");

        #[cfg(feature = "debug-logs")]
        println!("NvStore: factory_reset");

        let resume = self.state;
        self.state = StoreState::Initializing;

        // queued values of regular variables are superseded by the defaults
        self.queue.retain(|entry| entry.id.is_static());

        for id in VariableId::regular() {
            let default = id.default_value();
            self.shadow[id.index()] = default;
            let _ = self.write_record_blocking(id.address(), PhysicalRecord::encode(default));
        }

        let _ = self.write_marker();
        self.state = resume;
    }

    /// Retires the stored value of `id`: any queued write is dropped, the shadow returns to the
    /// catalogue default and the record is overwritten with the erased pattern by the drain task.
    ///
    /// With the queue full and nothing queued for `id` the wipe is dropped and the shadow keeps
    /// the stored value.
    pub fn wipe_variable(&mut self, id: VariableId) {
        if self.accepts_writes(id).is_err() {
            return;
        }

        self.queue.remove(id);
        if self.enqueue(id, Commit::Wipe).is_ok() {
            self.shadow[id.index()] = id.default_value();
        }
    }

    /// Writes the init marker, so the next `init` does not start with a factory reset.
    pub fn set_data_initialized(&mut self) {
        let _ = self.write_marker();
    }

    /// Whether the storage carried a valid init marker at the last `init` or `restart`, or
    /// one has been written since.
    pub fn is_data_initialized(&self) -> bool {
        self.initialized
    }

    /// Stops accepting writes ahead of a low power period. Queued writes are flushed or
    /// dropped according to `Config::shutdown_policy`.
    pub fn shutdown(&mut self) {
        if self.state == StoreState::Ready {
            match self.config.shutdown_policy {
                ShutdownPolicy::Flush => {
                    let pending = self.queue.len();
                    let retry_budget = self.config.retry_budget;
                    // a single attempt each, failing entries are abandoned right away
                    self.config.retry_budget = 1;
                    self.drain(pending);
                    self.config.retry_budget = retry_budget;
                }
                ShutdownPolicy::Abandon => {
                    let dropped = self.queue.len() as u32;
                    self.diagnostics.abandoned_commits =
                        self.diagnostics.abandoned_commits.saturating_add(dropped);
                    self.queue.clear();
                }
            }
        }

        #[cfg(feature = "defmt")]
        info!("nv shutdown");

        #[cfg(feature = "debug-logs")]
        println!("NvStore: shutdown");

        self.state = StoreState::Shutdown;
    }

    /// Leaves `Shutdown`, re-reading the shadow from the record storage. Ignored in any other
    /// state.
    pub fn restart(&mut self) {
        if self.state != StoreState::Shutdown {
            return;
        }

        #[cfg(feature = "defmt")]
        info!("nv restart");

        #[cfg(feature = "debug-logs")]
        println!("NvStore: restart");

        self.revalidate();
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Number of writes waiting for the drain task.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queued writes, oldest first.
    pub fn pending_writes(&self) -> impl Iterator<Item = &PendingWrite> {
        self.queue.iter()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Gives back the record storage. Queued writes are lost.
    pub fn release(self) -> S {
        self.storage
    }
}

impl<S: RecordStorage, const Q: usize> Service for NvStore<S, Q> {
    fn init(&mut self, _now_ms: u32) {
        NvStore::init(self)
    }

    fn service(&mut self, _now_ms: u32) {
        self.drain_task()
    }

    fn shutdown(&mut self) {
        NvStore::shutdown(self)
    }

    fn restart(&mut self, _now_ms: u32) {
        NvStore::restart(self)
    }
}
