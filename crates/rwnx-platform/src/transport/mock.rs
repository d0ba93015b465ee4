//! Mock bus transport for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::traits::{BusCapabilities, BusKind, BusTransport, TransportError};
use crate::address::{Address, AddressMap, Region};
use crate::snapshot::ConfigRegisterList;

/// Operations recorded by [`MockBus`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Probe,
    LoadFirmware { name: String, len: usize },
    EnableTransport,
    DisableTransport,
    Teardown,
    AckIrq,
    Read(Address),
    Write(Address, u32),
}

#[derive(Debug, Default)]
struct MockState {
    registers: HashMap<Address, u32>,
    ops: Vec<BusOp>,
    fail_probe: bool,
    fail_enable: bool,
    fail_disable: bool,
    fail_load: Option<String>,
    connected: bool,
}

/// Mock transport backed by an in-memory register file.
///
/// Clones share state, so a test can keep one handle while the platform
/// controller owns another.
#[derive(Debug, Clone)]
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
    map: AddressMap,
    irq: u32,
    config_registers: ConfigRegisterList,
}

impl MockBus {
    pub const DEFAULT_MAP: AddressMap = AddressMap {
        cpu: Region::new(0x0000_0000, 0x0006_0000),
        system: Region::new(0x4000_0000, 0x0010_0000),
    };

    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                connected: true,
                ..Default::default()
            })),
            map: Self::DEFAULT_MAP,
            irq: 42,
            config_registers: ConfigRegisterList::default(),
        }
    }

    /// Set the registers reported as config registers at probe time.
    pub fn with_config_registers(mut self, offsets: &[u32]) -> Self {
        self.config_registers = ConfigRegisterList::new(offsets.to_vec());
        self
    }

    pub fn with_address_map(mut self, map: AddressMap) -> Self {
        self.map = map;
        self
    }

    /// Preload a register value.
    pub fn set_register(&self, addr: Address, value: u32) {
        self.state.lock().unwrap().registers.insert(addr, value);
    }

    /// Current register value (0 if never written).
    pub fn register(&self, addr: Address) -> u32 {
        self.state
            .lock()
            .unwrap()
            .registers
            .get(&addr)
            .copied()
            .unwrap_or(0)
    }

    /// Get all recorded operations.
    pub fn ops(&self) -> Vec<BusOp> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.lock().unwrap().ops.clear();
    }

    /// Names of firmware artifacts pushed so far, in order.
    pub fn loaded_firmware(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::LoadFirmware { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Register writes recorded so far, in order.
    pub fn writes(&self) -> Vec<(Address, u32)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::Write(addr, value) => Some((addr, value)),
                _ => None,
            })
            .collect()
    }

    pub fn fail_probe(&self, fail: bool) {
        self.state.lock().unwrap().fail_probe = fail;
    }

    pub fn fail_enable(&self, fail: bool) {
        self.state.lock().unwrap().fail_enable = fail;
    }

    pub fn fail_disable(&self, fail: bool) {
        self.state.lock().unwrap().fail_disable = fail;
    }

    /// Make the download of `name` fail.
    pub fn fail_load(&self, name: Option<&str>) {
        self.state.lock().unwrap().fail_load = name.map(str::to_string);
    }

    /// Simulate surprise removal.
    pub fn disconnect(&self) {
        self.state.lock().unwrap().connected = false;
    }

    fn record(&self, op: BusOp) {
        self.state.lock().unwrap().ops.push(op);
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.state.lock().unwrap().connected {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusTransport for MockBus {
    fn probe(&mut self) -> Result<BusCapabilities, TransportError> {
        self.record(BusOp::Probe);
        if self.state.lock().unwrap().fail_probe {
            return Err(TransportError::ProbeFailed("mock probe failure".into()));
        }
        Ok(BusCapabilities {
            kind: BusKind::Sdio,
            address_map: self.map,
            irq: self.irq,
            config_registers: self.config_registers.clone(),
        })
    }

    fn load_firmware(&mut self, name: &str, data: &[u8]) -> Result<(), TransportError> {
        self.ensure_connected()?;
        let fail = self.state.lock().unwrap().fail_load.as_deref() == Some(name);
        if fail {
            return Err(TransportError::DownloadFailed {
                name: name.to_string(),
                message: "mock download failure".into(),
            });
        }
        self.record(BusOp::LoadFirmware {
            name: name.to_string(),
            len: data.len(),
        });
        Ok(())
    }

    fn enable_transport(&mut self) -> Result<(), TransportError> {
        self.ensure_connected()?;
        if self.state.lock().unwrap().fail_enable {
            return Err(TransportError::EnableFailed("mock enable failure".into()));
        }
        self.record(BusOp::EnableTransport);
        Ok(())
    }

    fn disable_transport(&mut self) -> Result<(), TransportError> {
        self.record(BusOp::DisableTransport);
        let state = self.state.lock().unwrap();
        if !state.connected {
            return Err(TransportError::DisableFailed("device gone".into()));
        }
        if state.fail_disable {
            return Err(TransportError::DisableFailed("mock disable failure".into()));
        }
        Ok(())
    }

    fn teardown(&mut self) {
        self.record(BusOp::Teardown);
    }

    fn ack_irq_at_link_level(&self) {
        self.record(BusOp::AckIrq);
    }

    fn read_register(&self, addr: Address) -> Result<u32, TransportError> {
        self.ensure_connected()?;
        self.record(BusOp::Read(addr));
        Ok(self.register(addr))
    }

    fn write_register(&self, addr: Address, value: u32) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.record(BusOp::Write(addr, value));
        self.state.lock().unwrap().registers.insert(addr, value);
        Ok(())
    }

    fn address_map(&self) -> AddressMap {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressSpace;

    #[test]
    fn test_mock_register_file() {
        let bus = MockBus::new();
        let addr = bus.raw_address_for(AddressSpace::System, 0x10).unwrap();
        assert_eq!(addr, Address(0x4000_0010));

        bus.write_register(addr, 0xCAFE).unwrap();
        assert_eq!(bus.read_register(addr).unwrap(), 0xCAFE);
        assert_eq!(bus.writes(), vec![(addr, 0xCAFE)]);
    }

    #[test]
    fn test_mock_shared_between_clones() {
        let bus = MockBus::new();
        let mut owned = bus.clone();
        owned.load_firmware("fmacfw.bin", &[0u8; 16]).unwrap();
        assert_eq!(bus.loaded_firmware(), vec!["fmacfw.bin".to_string()]);
    }

    #[test]
    fn test_mock_disconnect() {
        let bus = MockBus::new();
        bus.disconnect();
        assert!(matches!(
            bus.read_register(Address(0x4000_0000)),
            Err(TransportError::Disconnected)
        ));
    }
}
