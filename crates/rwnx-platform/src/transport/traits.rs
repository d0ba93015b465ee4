//! Bus transport abstraction.
//!
//! Defines the `BusTransport` trait implemented by each bus adapter
//! (PCI, USB, SDIO), allowing the platform controller to stay bus-agnostic.

use std::fmt;

use crate::address::{self, Address, AddressMap, AddressSpace};
use crate::snapshot::ConfigRegisterList;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Failed to enable transport: {0}")]
    EnableFailed(String),

    #[error("Failed to disable transport: {0}")]
    DisableFailed(String),

    #[error("Firmware download of {name} failed: {message}")]
    DownloadFailed { name: String, message: String },

    #[error("Device disconnected")]
    Disconnected,

    #[error("Address error: {0}")]
    Address(#[from] address::TranslateError),
}

/// Kind of bus the adapter drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    Pci,
    Usb,
    Sdio,
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusKind::Pci => write!(f, "PCI"),
            BusKind::Usb => write!(f, "USB"),
            BusKind::Sdio => write!(f, "SDIO"),
        }
    }
}

/// Capability set reported by the bus adapter at probe time.
#[derive(Debug, Clone)]
pub struct BusCapabilities {
    pub kind: BusKind,
    pub address_map: AddressMap,
    /// Interrupt line used by the device.
    pub irq: u32,
    /// Registers to preserve across a disable/enable cycle.
    pub config_registers: ConfigRegisterList,
}

/// Abstract bus transport interface.
///
/// Implementations own the electrical and DMA details; the platform layer
/// only sequences these calls.
pub trait BusTransport: Send + Sync {
    /// Associate the transport with a platform handle and report what it can do.
    fn probe(&mut self) -> Result<BusCapabilities, TransportError>;

    /// Push one firmware artifact to the device.
    fn load_firmware(&mut self, name: &str, data: &[u8]) -> Result<(), TransportError>;

    /// Configure transfer queues and interrupt acknowledgement.
    fn enable_transport(&mut self) -> Result<(), TransportError>;

    /// Stop transfers and interrupts.
    fn disable_transport(&mut self) -> Result<(), TransportError>;

    /// Free every bus resource held for the device.
    fn teardown(&mut self);

    /// Acknowledge the device interrupt at link level.
    fn ack_irq_at_link_level(&self);

    fn read_register(&self, addr: Address) -> Result<u32, TransportError>;

    fn write_register(&self, addr: Address, value: u32) -> Result<(), TransportError>;

    /// Address map this transport exposes.
    fn address_map(&self) -> AddressMap;

    fn raw_address_for(&self, space: AddressSpace, offset: u64) -> Result<Address, TransportError> {
        Ok(address::translate(&self.address_map(), space, offset)?)
    }
}
