//! Platform controller: bring-up, shutdown and register access.
//!
//! One controller exists per attached device. It owns the bus transport and
//! sequences firmware download, transport enable and the config register
//! snapshot around a disable/enable cycle.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::address::{self, Address, AddressSpace, TranslateError};
use crate::config::PlatformConfig;
use crate::events::{Operation, PlatformEvent, PlatformObserver, TracingObserver};
use crate::firmware::{
    self, BuildVariant, FirmwareError, FirmwareMode, FirmwareStore, StoreError,
};
use crate::snapshot::{self, ConfigRegisterList, ConfigSnapshot, SnapshotError};
use crate::state::{LifecycleContext, PlatformState, TransitionRejected};
use crate::transport::{BusCapabilities, BusKind, BusTransport, TransportError};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Platform init failed: {0}")]
    Init(#[source] TransportError),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: PlatformState,
        to: PlatformState,
    },

    #[error("Platform already enabled")]
    AlreadyEnabled,

    #[error("Platform not enabled")]
    NotEnabled,

    #[error("Firmware not found: {0}")]
    FirmwareNotFound(String),

    #[error("Failed to load firmware: {0}")]
    FirmwareLoad(#[from] StoreError),

    #[error("Address out of range: {0}")]
    OutOfRange(#[from] TranslateError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<TransitionRejected> for PlatformError {
    fn from(e: TransitionRejected) -> Self {
        PlatformError::InvalidStateTransition {
            from: e.from,
            to: e.to,
        }
    }
}

impl From<FirmwareError> for PlatformError {
    fn from(e: FirmwareError) -> Self {
        match e {
            FirmwareError::MissingArtifact(name) => PlatformError::FirmwareNotFound(name),
            FirmwareError::Store(e) => PlatformError::FirmwareLoad(e),
        }
    }
}

/// Firmware selection for a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareSelection {
    pub mode: FirmwareMode,
    pub variant: BuildVariant,
}

impl From<&PlatformConfig> for FirmwareSelection {
    fn from(config: &PlatformConfig) -> Self {
        Self {
            mode: config.mode,
            variant: config.variant,
        }
    }
}

type BoxedStore = Box<dyn FirmwareStore + Send + Sync>;

/// Handle for one attached device.
pub struct PlatformController<T: BusTransport, O: PlatformObserver = TracingObserver> {
    bus: T,
    caps: BusCapabilities,
    store: BoxedStore,
    selection: FirmwareSelection,
    lifecycle: LifecycleContext,
    /// Captured at the last disable, replayed at the next enable.
    pending_snapshot: Option<ConfigSnapshot>,
    observer: Arc<O>,
}

impl<T: BusTransport> PlatformController<T, TracingObserver> {
    /// Probe `bus` and create a handle with the default tracing observer.
    pub fn init<S>(bus: T, store: S, selection: FirmwareSelection) -> Result<Self, PlatformError>
    where
        S: FirmwareStore + Send + Sync + 'static,
    {
        Self::init_with_observer(bus, store, selection, Arc::new(TracingObserver))
    }
}

impl<T: BusTransport, O: PlatformObserver> PlatformController<T, O> {
    /// Probe `bus` and create a handle. Nothing is enabled.
    #[instrument(skip_all, fields(mode = %selection.mode))]
    pub fn init_with_observer<S>(
        mut bus: T,
        store: S,
        selection: FirmwareSelection,
        observer: Arc<O>,
    ) -> Result<Self, PlatformError>
    where
        S: FirmwareStore + Send + Sync + 'static,
    {
        let caps = match bus.probe() {
            Ok(caps) => caps,
            Err(e) => {
                observer.on_event(&PlatformEvent::Error {
                    operation: Operation::Init,
                    message: e.to_string(),
                });
                return Err(PlatformError::Init(e));
            }
        };
        info!(
            bus = %caps.kind,
            irq = caps.irq,
            config_registers = caps.config_registers.len(),
            "Bus probed"
        );

        let mut controller = Self {
            bus,
            caps,
            store: Box::new(store),
            selection,
            lifecycle: LifecycleContext::new(),
            pending_snapshot: None,
            observer,
        };
        controller.transition(PlatformState::Initialized)?;
        Ok(controller)
    }

    pub fn state(&self) -> PlatformState {
        self.lifecycle.state()
    }

    pub fn is_enabled(&self) -> bool {
        self.lifecycle.is_enabled()
    }

    pub fn bus_kind(&self) -> BusKind {
        self.caps.kind
    }

    /// Interrupt number reported by the bus.
    pub fn irq(&self) -> u32 {
        self.caps.irq
    }

    pub fn get_config_registers(&self) -> &ConfigRegisterList {
        &self.caps.config_registers
    }

    /// Snapshot waiting to be replayed by the next enable.
    pub fn pending_snapshot(&self) -> Option<&ConfigSnapshot> {
        self.pending_snapshot.as_ref()
    }

    pub fn selection(&self) -> FirmwareSelection {
        self.selection
    }

    /// Mark the device as surprise-removed so deinit skips teardown.
    pub fn set_wait_disconnect(&mut self, wait: bool) {
        self.lifecycle.wait_disconnect = wait;
    }

    pub fn transport(&self) -> &T {
        &self.bus
    }

    /// Load firmware and start the device.
    #[instrument(skip(self), fields(state = %self.state()))]
    pub fn enable(&mut self) -> Result<(), PlatformError> {
        let from = self.state();
        if from == PlatformState::Enabled {
            return Err(PlatformError::AlreadyEnabled);
        }
        self.lifecycle.check(PlatformState::Enabled)?;

        let mut transport_up = false;
        if let Err(e) = self.bring_up(&mut transport_up) {
            self.roll_back(transport_up, &e);
            self.report(Operation::Enable, &e);
            return Err(e);
        }

        self.pending_snapshot = None;
        self.transition(PlatformState::Enabled)?;
        info!(mode = %self.selection.mode, "Platform enabled");
        Ok(())
    }

    fn bring_up(&mut self, transport_up: &mut bool) -> Result<(), PlatformError> {
        let artifacts = firmware::resolve(self.selection.mode, &self.selection.variant);
        let resolved = firmware::validate_presence(&artifacts, &*self.store)?;

        let skipped = artifacts
            .iter()
            .filter(|a| !resolved.iter().any(|r| r.kind == a.kind));
        for artifact in skipped {
            self.observer.on_event(&PlatformEvent::FirmwareSkipped {
                kind: artifact.kind,
                name: artifact.primary_name().to_string(),
            });
        }

        for artifact in &resolved {
            let data = self.store.load(&artifact.name)?;
            self.bus.load_firmware(&artifact.name, &data)?;
            self.observer.on_event(&PlatformEvent::FirmwareLoaded {
                kind: artifact.kind,
                name: artifact.name.clone(),
                size: data.len(),
            });
        }

        self.bus.enable_transport()?;
        *transport_up = true;

        if let Some(pending) = &self.pending_snapshot {
            snapshot::restore(
                pending,
                &self.caps.config_registers,
                &self.bus,
                &self.caps.address_map,
            )?;
            self.observer.on_event(&PlatformEvent::SnapshotRestored {
                registers: pending.entries().len(),
            });
        }
        Ok(())
    }

    fn roll_back(&mut self, transport_up: bool, cause: &PlatformError) {
        if transport_up && let Err(e) = self.bus.disable_transport() {
            warn!("Rollback could not disable transport: {}", e);
        }
        self.observer.on_event(&PlatformEvent::RolledBack {
            message: cause.to_string(),
        });
    }

    /// Stop the device, keeping its config registers for the next enable.
    ///
    /// A no-op unless enabled. A device that is already gone is taken down
    /// without a snapshot.
    #[instrument(skip(self), fields(state = %self.state()))]
    pub fn disable(&mut self) -> Result<(), PlatformError> {
        match self.state() {
            PlatformState::Enabled => {}
            from if from.is_resting() => return Ok(()),
            from => {
                return Err(PlatformError::InvalidStateTransition {
                    from,
                    to: PlatformState::Disabled,
                });
            }
        }

        let mut device_gone = self.lifecycle.wait_disconnect;
        let captured = if device_gone {
            None
        } else {
            match snapshot::capture(
                &self.caps.config_registers,
                &self.bus,
                &self.caps.address_map,
            ) {
                Ok(captured) => Some(captured),
                Err(SnapshotError::Transport(TransportError::Disconnected)) => {
                    warn!("Device disconnected during snapshot capture");
                    device_gone = true;
                    None
                }
                Err(e) => {
                    let e = PlatformError::from(e);
                    self.report(Operation::Disable, &e);
                    return Err(e);
                }
            }
        };
        match captured {
            Some(captured) => {
                self.observer.on_event(&PlatformEvent::SnapshotCaptured {
                    registers: captured.entries().len(),
                });
                self.pending_snapshot = Some(captured);
            }
            None => self.pending_snapshot = None,
        }

        // The platform is down whether or not the bus complains.
        let result = self.bus.disable_transport();
        self.transition(PlatformState::Disabled)?;
        match result {
            Err(e) if device_gone => warn!("Ignoring transport disable on a gone device: {}", e),
            Err(e) => {
                let e = PlatformError::from(e);
                self.report(Operation::Disable, &e);
                return Err(e);
            }
            Ok(()) => {}
        }
        info!("Platform disabled");
        Ok(())
    }

    /// Encode the pending snapshot so it can outlive this handle.
    pub fn export_snapshot(&self) -> Option<Vec<u8>> {
        self.pending_snapshot.as_ref().map(ConfigSnapshot::to_bytes)
    }

    /// Adopt a snapshot encoded by [`export_snapshot`](Self::export_snapshot).
    ///
    /// It is replayed by the next enable. The register list must match the
    /// one this bus reported at probe time.
    pub fn import_snapshot(&mut self, blob: &[u8]) -> Result<(), PlatformError> {
        self.ensure_live()?;
        if self.is_enabled() {
            return Err(PlatformError::AlreadyEnabled);
        }
        let imported = ConfigSnapshot::from_bytes(blob)?;
        if imported.offsets().as_slice() != self.caps.config_registers.offsets() {
            return Err(SnapshotError::SnapshotMismatch {
                snapshot: imported.offsets(),
                current: self.caps.config_registers.offsets().to_vec(),
            }
            .into());
        }
        self.pending_snapshot = Some(imported);
        Ok(())
    }

    /// Release the device. Must not be enabled.
    #[instrument(skip(self), fields(state = %self.state()))]
    pub fn deinit(&mut self) -> Result<(), PlatformError> {
        if let Err(rejected) = self.lifecycle.check(PlatformState::Deinitialized) {
            let e = PlatformError::from(rejected);
            if rejected.from == PlatformState::Enabled {
                error!("deinit called while platform is enabled; nothing released");
            }
            self.report(Operation::Deinit, &e);
            return Err(e);
        }

        if self.lifecycle.wait_disconnect {
            self.observer.on_event(&PlatformEvent::TeardownSkipped);
        } else {
            self.bus.teardown();
        }
        self.pending_snapshot = None;
        self.transition(PlatformState::Deinitialized)?;
        Ok(())
    }

    /// Bus address of `offset` in `space`.
    pub fn get_address(&self, space: AddressSpace, offset: u64) -> Result<Address, PlatformError> {
        Ok(address::translate(&self.caps.address_map, space, offset)?)
    }

    pub fn read_register(&self, space: AddressSpace, offset: u64) -> Result<u32, PlatformError> {
        self.ensure_live()?;
        let addr = self.get_address(space, offset)?;
        Ok(self.bus.read_register(addr)?)
    }

    pub fn write_register(
        &self,
        space: AddressSpace,
        offset: u64,
        value: u32,
    ) -> Result<(), PlatformError> {
        self.ensure_live()?;
        let addr = self.get_address(space, offset)?;
        Ok(self.bus.write_register(addr, value)?)
    }

    /// Acknowledge one device interrupt at link level.
    pub fn ack_irq(&self) -> Result<(), PlatformError> {
        if !self.is_enabled() {
            return Err(PlatformError::NotEnabled);
        }
        self.bus.ack_irq_at_link_level();
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), PlatformError> {
        if self.state().is_terminal() {
            return Err(PlatformError::InvalidStateTransition {
                from: PlatformState::Deinitialized,
                to: PlatformState::Deinitialized,
            });
        }
        Ok(())
    }

    fn transition(&mut self, to: PlatformState) -> Result<(), PlatformError> {
        let from = self.state();
        self.lifecycle.goto_state(to)?;
        self.observer
            .on_event(&PlatformEvent::StateChanged { from, to });
        Ok(())
    }

    fn report(&self, operation: Operation, e: &PlatformError) {
        self.observer.on_event(&PlatformEvent::Error {
            operation,
            message: e.to_string(),
        });
    }
}
