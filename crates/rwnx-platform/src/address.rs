//! Address translation for the embedded subsystem.
//!
//! Upper layers never dereference device memory directly. They translate a
//! logical `(AddressSpace, offset)` pair into an [`Address`] here and then
//! hand that address to the bus transport for the actual access.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical memory region exposed by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressSpace {
    /// Memory of the embedded CPU.
    Cpu,
    /// Memory/registers of one subsystem of the embedded system.
    System,
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpace::Cpu => write!(f, "CPU"),
            AddressSpace::System => write!(f, "SYSTEM"),
        }
    }
}

/// Concrete bus address of a device location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u64);

impl Address {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// A contiguous window of device memory as seen from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub base: u64,
    pub size: u64,
}

impl Region {
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }
}

/// Bus-reported layout of both address spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMap {
    pub cpu: Region,
    pub system: Region,
}

impl AddressMap {
    pub fn region(&self, space: AddressSpace) -> Region {
        match space {
            AddressSpace::Cpu => self.cpu,
            AddressSpace::System => self.system,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Offset 0x{offset:X} out of range for {space} space (size 0x{size:X})")]
    OutOfRange {
        space: AddressSpace,
        offset: u64,
        size: u64,
    },
}

/// Translate `offset` inside `space` into a bus address.
///
/// Offsets at or beyond the region size are rejected, never clamped.
pub fn translate(
    map: &AddressMap,
    space: AddressSpace,
    offset: u64,
) -> Result<Address, TranslateError> {
    let region = map.region(space);
    if offset >= region.size {
        return Err(TranslateError::OutOfRange {
            space,
            offset,
            size: region.size,
        });
    }
    region
        .base
        .checked_add(offset)
        .map(Address)
        .ok_or(TranslateError::OutOfRange {
            space,
            offset,
            size: region.size,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> AddressMap {
        AddressMap {
            cpu: Region::new(0x0010_0000, 0x4_0000),
            system: Region::new(0x4000_0000, 0x10_0000),
        }
    }

    #[test]
    fn test_translate_within_range() {
        let m = map();
        assert_eq!(
            translate(&m, AddressSpace::Cpu, 0).unwrap(),
            Address(0x0010_0000)
        );
        assert_eq!(
            translate(&m, AddressSpace::System, 0xB000).unwrap(),
            Address(0x4000_B000)
        );
        assert_eq!(
            translate(&m, AddressSpace::System, 0x0F_FFFC).unwrap(),
            Address(0x400F_FFFC)
        );
    }

    #[test]
    fn test_translate_is_deterministic() {
        let m = map();
        for offset in (0..0x4_0000u64).step_by(0x1000) {
            let a = translate(&m, AddressSpace::Cpu, offset).unwrap();
            let b = translate(&m, AddressSpace::Cpu, offset).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.value(), 0x0010_0000 + offset);
        }
    }

    #[test]
    fn test_translate_out_of_range() {
        let m = map();
        let err = translate(&m, AddressSpace::Cpu, 0x4_0000).unwrap_err();
        assert_eq!(
            err,
            TranslateError::OutOfRange {
                space: AddressSpace::Cpu,
                offset: 0x4_0000,
                size: 0x4_0000,
            }
        );
        assert!(translate(&m, AddressSpace::System, u64::MAX).is_err());
    }

    #[test]
    fn test_empty_region_rejects_everything() {
        let m = AddressMap {
            cpu: Region::new(0x1000, 0),
            system: Region::new(0x2000, 0x10),
        };
        assert!(translate(&m, AddressSpace::Cpu, 0).is_err());
    }
}
