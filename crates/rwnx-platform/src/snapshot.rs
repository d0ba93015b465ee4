//! Config register snapshot across a disable/enable cycle.
//!
//! The bus reports which SYSTEM-space registers hold configuration that must
//! survive a reset. They are read back right before the platform goes down
//! and replayed, in the same order, once it is back up.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use tracing::debug;

use crate::address::{self, AddressMap, AddressSpace};
use crate::transport::{BusTransport, TransportError};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot does not match config register list (snapshot: {snapshot:?}, current: {current:?})")]
    SnapshotMismatch { snapshot: Vec<u32>, current: Vec<u32> },
    #[error("Snapshot blob truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("Address error: {0}")]
    Address(#[from] address::TranslateError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Ordered list of SYSTEM-space register offsets to preserve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRegisterList {
    offsets: Vec<u32>,
}

impl ConfigRegisterList {
    pub fn new(offsets: Vec<u32>) -> Self {
        Self { offsets }
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Captured `(offset, value)` pairs, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    entries: Vec<(u32, u32)>,
}

impl ConfigSnapshot {
    pub fn entries(&self) -> &[(u32, u32)] {
        &self.entries
    }

    pub fn offsets(&self) -> Vec<u32> {
        self.entries.iter().map(|(offset, _)| *offset).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as `count` followed by `(offset, value)` pairs, all u32 LE.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.entries.len() * 8);
        buf.write_u32::<LittleEndian>(self.entries.len() as u32).unwrap();
        for &(offset, value) in &self.entries {
            buf.write_u32::<LittleEndian>(offset).unwrap();
            buf.write_u32::<LittleEndian>(value).unwrap();
        }
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        if data.len() < 4 {
            return Err(SnapshotError::Truncated {
                expected: 4,
                actual: data.len(),
            });
        }
        let mut cursor = Cursor::new(data);
        let count = cursor.read_u32::<LittleEndian>().map_err(|_| SnapshotError::Truncated {
            expected: 4,
            actual: data.len(),
        })? as usize;
        let expected = count
            .checked_mul(8)
            .and_then(|n| n.checked_add(4))
            .unwrap_or(usize::MAX);
        if data.len() < expected {
            return Err(SnapshotError::Truncated {
                expected,
                actual: data.len(),
            });
        }
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let offset = cursor.read_u32::<LittleEndian>().map_err(|_| SnapshotError::Truncated {
                expected,
                actual: data.len(),
            })?;
            let value = cursor.read_u32::<LittleEndian>().map_err(|_| SnapshotError::Truncated {
                expected,
                actual: data.len(),
            })?;
            entries.push((offset, value));
        }
        Ok(Self { entries })
    }
}

/// Read every register of `list`, in list order, in one pass.
pub fn capture<T: BusTransport + ?Sized>(
    list: &ConfigRegisterList,
    bus: &T,
    map: &AddressMap,
) -> Result<ConfigSnapshot, SnapshotError> {
    let mut entries = Vec::with_capacity(list.len());
    for &offset in list.offsets() {
        let addr = address::translate(map, AddressSpace::System, offset as u64)?;
        let value = bus.read_register(addr)?;
        debug!(
            offset = %format!("0x{:08X}", offset),
            value = %format!("0x{:08X}", value),
            "Captured config register"
        );
        entries.push((offset, value));
    }
    Ok(ConfigSnapshot { entries })
}

/// Write `snapshot` back in capture order.
///
/// The snapshot must cover exactly `list`; nothing is written otherwise.
pub fn restore<T: BusTransport + ?Sized>(
    snapshot: &ConfigSnapshot,
    list: &ConfigRegisterList,
    bus: &T,
    map: &AddressMap,
) -> Result<(), SnapshotError> {
    let snapshot_offsets = snapshot.offsets();
    if snapshot_offsets.as_slice() != list.offsets() {
        return Err(SnapshotError::SnapshotMismatch {
            snapshot: snapshot_offsets,
            current: list.offsets().to_vec(),
        });
    }

    // Translate everything up front so a bad offset aborts before any write.
    let mut writes = Vec::with_capacity(snapshot.entries.len());
    for &(offset, value) in &snapshot.entries {
        writes.push((address::translate(map, AddressSpace::System, offset as u64)?, value));
    }
    for (addr, value) in writes {
        bus.write_register(addr, value)?;
    }
    debug!(count = snapshot.entries.len(), "Restored config registers");
    Ok(())
}
