use crate::catalogue::VariableId;
use crate::error::Error;
use crate::platform::RecordStorage;
use crate::NvStore;

pub trait Set<T> {
    fn set(&mut self, id: VariableId, value: T) -> Result<(), Error>;
}

impl<T, S: Set<T>> Set<T> for &mut S {
    fn set(&mut self, id: VariableId, value: T) -> Result<(), Error> {
        (*self).set(id, value)
    }
}

impl<S: RecordStorage, const Q: usize> Set<u8> for NvStore<S, Q> {
    fn set(&mut self, id: VariableId, value: u8) -> Result<(), Error> {
        self.write_payload(id, value)
    }
}

impl<S: RecordStorage, const Q: usize> Set<i8> for NvStore<S, Q> {
    fn set(&mut self, id: VariableId, value: i8) -> Result<(), Error> {
        self.write_payload(id, value.cast_unsigned())
    }
}

impl<S: RecordStorage, const Q: usize> Set<bool> for NvStore<S, Q> {
    fn set(&mut self, id: VariableId, value: bool) -> Result<(), Error> {
        self.write_payload(id, value as u8)
    }
}
