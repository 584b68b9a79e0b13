//! Runtime heap record layouts.
//!
//! Scope record: `[parent, slot_0 .. slot_n]`
//! Closure:      `[code address, captured scope]`
//! Tuple:        `[length, elem_0 .. elem_n]`

use num_bigint::BigInt;

use crate::vm::{Memory, VmResult};

/// Words before the first slot of a scope record.
pub const RECORD_HEADER: i64 = 1;
pub const RECORD_PARENT: i64 = 0;

pub const CLOSURE_CODE: i64 = 0;
pub const CLOSURE_SCOPE: i64 = 1;

pub const TUPLE_LENGTH: i64 = 0;
/// Words before the first tuple element.
pub const TUPLE_HEADER: i64 = 1;

/// Read-only view of a scope record in machine memory.
#[derive(Debug, Clone, Copy)]
pub struct ScopeRecord<'m> {
    memory: &'m Memory,
    address: u64,
}

impl<'m> ScopeRecord<'m> {
    pub fn at(memory: &'m Memory, address: u64) -> Self {
        ScopeRecord { memory, address }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    /// The enclosing record, or `None` for the outermost one (parent word 0).
    pub fn parent(&self) -> VmResult<Option<ScopeRecord<'m>>> {
        let word = self.memory.get(self.address + RECORD_PARENT as u64);
        if word == BigInt::from(0) {
            return Ok(None);
        }
        Ok(Some(ScopeRecord::at(self.memory, Memory::address(&word)?)))
    }

    pub fn slot(&self, index: u64) -> BigInt {
        self.memory.get(self.address + RECORD_HEADER as u64 + index)
    }
}

/// Elements of the tuple stored at `address`.
pub fn tuple_elements(memory: &Memory, address: u64) -> VmResult<Vec<BigInt>> {
    let length = Memory::address(&memory.get(address + TUPLE_LENGTH as u64))?;
    Ok((0..length).map(|i| memory.get(address + TUPLE_HEADER as u64 + i)).collect())
}
