#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::{ReadStorage, Storage};
use nv_store::platform::{OsTimer, RecordStorage, TickMask};
use nv_store::record::PhysicalRecord;
use nv_store::scheduler::Service;
use nv_store::{NvStore, VariableId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub const RECORD_SLOTS: usize = 256;

/// In-memory record storage. Every slot starts erased.
pub struct Records {
    pub slots: Vec<u16>,
    pub operations: Vec<Operation>,
    /// Writes fail once this many writes have been attempted.
    pub fail_after_writes: usize,
    /// Writes to these addresses always fail.
    pub failing_addresses: Vec<u16>,
    /// The next write only programs the payload byte, as if power was lost halfway.
    pub tear_next_write: bool,
    write_attempts: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { address: u16 },
    Write { address: u16, value: u16 },
}

#[derive(Debug, PartialEq)]
pub struct WriteError;

impl Records {
    pub fn new() -> Self {
        Self {
            slots: vec![0xFFFF; RECORD_SLOTS],
            operations: Vec::new(),
            fail_after_writes: usize::MAX,
            failing_addresses: Vec::new(),
            tear_next_write: false,
            write_attempts: 0,
        }
    }

    /// A storage that went through a cold boot and had every queued write committed.
    pub fn formatted() -> Self {
        let mut store = NvStore::new(Records::new());
        store.init();
        drain_all(&mut store);
        let mut records = store.release();
        records.operations.clear();
        records
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_writes = usize::MAX;
        self.failing_addresses.clear();
    }

    pub fn record(&self, id: VariableId) -> PhysicalRecord {
        PhysicalRecord::from_raw(self.slots[id.address() as usize])
    }

    pub fn set_record(&mut self, id: VariableId, record: PhysicalRecord) {
        self.slots[id.address() as usize] = record.raw();
    }

    pub fn writes(&self) -> Vec<(u16, u16)> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                Operation::Write { address, value } => Some((*address, *value)),
                _ => None,
            })
            .collect()
    }

    pub fn writes_to(&self, id: VariableId) -> Vec<PhysicalRecord> {
        self.writes()
            .into_iter()
            .filter(|(address, _)| *address == id.address())
            .map(|(_, value)| PhysicalRecord::from_raw(value))
            .collect()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }
}

impl RecordStorage for Records {
    type Error = WriteError;

    fn write_record(&mut self, address: u16, value: u16) -> Result<(), Self::Error> {
        println!("    records: write: 0x{address:04X} = 0x{value:04X}");

        self.write_attempts += 1;
        if self.write_attempts > self.fail_after_writes || self.failing_addresses.contains(&address)
        {
            println!("    records: FAULT");
            return Err(WriteError);
        }

        self.operations.push(Operation::Write { address, value });

        let value = if self.tear_next_write {
            self.tear_next_write = false;
            0xFF00 | (value & 0x00FF)
        } else {
            value
        };
        self.slots[address as usize] = value;
        Ok(())
    }

    fn read_record(&mut self, address: u16) -> u16 {
        self.operations.push(Operation::Read { address });
        self.slots[address as usize]
    }
}

pub fn drain_all<S: RecordStorage, const Q: usize>(store: &mut NvStore<S, Q>) {
    while store.pending() > 0 {
        store.drain_task();
    }
}

/// Byte addressable RAM device for `EepromRecords`.
pub struct RamEeprom {
    pub buf: Vec<u8>,
}

impl RamEeprom {
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0xFF; size],
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct EepromFault;

impl ReadStorage for RamEeprom {
    type Error = EepromFault;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;
        let src = self.buf.get(offset..offset + bytes.len()).ok_or(EepromFault)?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl Storage for RamEeprom {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;
        let dst = self
            .buf
            .get_mut(offset..offset + bytes.len())
            .ok_or(EepromFault)?;
        dst.copy_from_slice(bytes);
        Ok(())
    }
}

/// Loop timer double. `counter` advances by `counter_step` on every read, so a loop appears to
/// take `counter_step` counts.
#[derive(Default)]
pub struct Timer {
    pub now_ms: Cell<u32>,
    pub counter: Cell<u32>,
    pub counter_step: Cell<u32>,
    pub masked: Cell<bool>,
    pub started: Cell<bool>,
    pub flags_cleared: Cell<u32>,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            masked: Cell::new(true),
            ..Default::default()
        }
    }
}

impl TickMask for Timer {
    fn mask_tick(&self) {
        self.masked.set(true);
    }

    fn unmask_tick(&self) {
        self.masked.set(false);
    }

    fn is_tick_masked(&self) -> bool {
        self.masked.get()
    }
}

impl OsTimer for Timer {
    fn system_time_ms(&self) -> u32 {
        self.now_ms.get()
    }

    fn counter(&self) -> u32 {
        let count = self.counter.get();
        self.counter.set(count.wrapping_add(self.counter_step.get()));
        count
    }

    fn start(&mut self) {
        self.started.set(true);
    }

    fn clear_update_flag(&mut self) {
        self.flags_cleared.set(self.flags_cleared.get() + 1);
    }
}

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Service that records every lifecycle call.
pub struct Recorder {
    pub name: &'static str,
    pub log: Log,
}

impl Recorder {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: log.clone(),
        }
    }

    fn push(&self, event: String) {
        self.log.borrow_mut().push(event);
    }
}

impl Service for Recorder {
    fn init(&mut self, now_ms: u32) {
        self.push(format!("{}:init@{now_ms}", self.name));
    }

    fn service(&mut self, now_ms: u32) {
        self.push(format!("{}:service@{now_ms}", self.name));
    }

    fn shutdown(&mut self) {
        self.push(format!("{}:shutdown", self.name));
    }

    fn restart(&mut self, now_ms: u32) {
        self.push(format!("{}:restart@{now_ms}", self.name));
    }
}

/// Service relying on the default `shutdown` and `restart`.
pub struct Minimal {
    pub log: Log,
}

impl Service for Minimal {
    fn init(&mut self, now_ms: u32) {
        self.log.borrow_mut().push(format!("minimal:init@{now_ms}"));
    }

    fn service(&mut self, now_ms: u32) {
        self.log.borrow_mut().push(format!("minimal:service@{now_ms}"));
    }
}
