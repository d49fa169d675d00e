//! The `Get<T>` trait and its implementations allow a single generic `read<T>()` for every
//! supported representation of an 8-bit variable.

use crate::catalogue::VariableId;
use crate::platform::RecordStorage;
use crate::NvStore;

pub trait Get<T> {
    fn get(&self, id: VariableId) -> T;
}

impl<T, G: Get<T>> Get<T> for &G {
    fn get(&self, id: VariableId) -> T {
        (**self).get(id)
    }
}

impl<T, G: Get<T>> Get<T> for &mut G {
    fn get(&self, id: VariableId) -> T {
        (**self).get(id)
    }
}

impl<S: RecordStorage, const Q: usize> Get<u8> for NvStore<S, Q> {
    fn get(&self, id: VariableId) -> u8 {
        self.shadow[id.index()]
    }
}

impl<S: RecordStorage, const Q: usize> Get<i8> for NvStore<S, Q> {
    fn get(&self, id: VariableId) -> i8 {
        self.shadow[id.index()].cast_signed()
    }
}

impl<S: RecordStorage, const Q: usize> Get<bool> for NvStore<S, Q> {
    fn get(&self, id: VariableId) -> bool {
        self.shadow[id.index()] != 0
    }
}
