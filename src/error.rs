use thiserror::Error;

/// Errors of the configuration store. Callers of the variable API never receive these from
/// reads or writes; they are surfaced through `try_request_write`, `VariableId::try_from`,
/// `PhysicalRecord::decode` and `Diagnostics::last_error` only.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The checksum byte of a record is not the complement of its payload. Either the record was
    /// never written (erased flash) or a write was interrupted.
    #[error("invalid record")]
    InvalidRecord,

    /// The pending write queue is full. The shadow holds the new value but it is not durable.
    #[error("write queue full")]
    QueueFull,

    /// The record storage rejected a write.
    #[error("physical write failed")]
    PhysicalIoFailure,

    /// Writes are refused while the store is shut down.
    #[error("store is shut down")]
    ShutDown,

    /// Writes are refused before `init` completed.
    #[error("store not ready")]
    NotReady,

    /// A raw virtual address does not name a catalogue entry.
    #[error("unknown variable")]
    UnknownVariable,
}
