//! Firmware image resolution.
//!
//! Maps a firmware mode and build variant to the ordered list of artifacts
//! the device needs, then checks the firmware store before anything is
//! pushed over the bus.

pub mod names;
pub mod store;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use store::{DirectoryStore, FirmwareStore, MemoryStore, StoreError};

use names::*;

#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error("Missing firmware artifact: {0}")]
    MissingArtifact(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Operating mode selected for one bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FirmwareMode {
    #[default]
    Normal = 0,
    RfTest = 1,
    BleScanWakeup = 2,
    M2dOta = 3,
    DpdCalib = 4,
    BleScanAdFilter = 5,
}

impl FirmwareMode {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Normal),
            1 => Some(Self::RfTest),
            2 => Some(Self::BleScanWakeup),
            3 => Some(Self::M2dOta),
            4 => Some(Self::DpdCalib),
            5 => Some(Self::BleScanAdFilter),
            _ => None,
        }
    }
}

impl fmt::Display for FirmwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirmwareMode::Normal => write!(f, "NORMAL"),
            FirmwareMode::RfTest => write!(f, "RF_TEST"),
            FirmwareMode::BleScanWakeup => write!(f, "BLE_SCAN_WAKEUP"),
            FirmwareMode::M2dOta => write!(f, "M2D_OTA"),
            FirmwareMode::DpdCalib => write!(f, "DPD_CALIB"),
            FirmwareMode::BleScanAdFilter => write!(f, "BLE_SCAN_AD_FILTER"),
        }
    }
}

/// Which MAC firmware flavour the driver was built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacFlavor {
    #[default]
    #[serde(rename = "fullmac")]
    FullMac,
    #[serde(rename = "fhost")]
    FHost,
}

impl MacFlavor {
    pub fn base_name(&self) -> &'static str {
        match self {
            MacFlavor::FullMac => RWNX_MAC_FW_BASE_NAME_FULLMAC,
            MacFlavor::FHost => RWNX_MAC_FW_BASE_NAME_FHOST,
        }
    }
}

/// RF front-end PHY profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhyProfile {
    #[default]
    Trident,
    Karst,
}

/// Build-time switches that change the artifact naming contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildVariant {
    pub mac: MacFlavor,
    pub phy: PhyProfile,
    /// TL4 builds ship a single `.hex` MAC image.
    pub tl4: bool,
    /// Digital pre-distortion support.
    pub dpd: bool,
    /// Always recalibrate DPD instead of reusing a stored result.
    pub force_dpd_calib: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Settings,
    PhyConfig,
    Agc,
    Ldpc,
    MacFirmware,
    FcuRamcode,
    DpdResult,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Settings => write!(f, "settings"),
            ArtifactKind::PhyConfig => write!(f, "phy config"),
            ArtifactKind::Agc => write!(f, "AGC"),
            ArtifactKind::Ldpc => write!(f, "LDPC"),
            ArtifactKind::MacFirmware => write!(f, "MAC firmware"),
            ArtifactKind::FcuRamcode => write!(f, "FCU ramcode"),
            ArtifactKind::DpdResult => write!(f, "DPD result"),
        }
    }
}

/// One artifact the device needs, with its candidate file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareArtifact {
    pub kind: ArtifactKind,
    /// Primary name first, then fallbacks.
    pub candidates: Vec<String>,
    pub mandatory: bool,
}

impl FirmwareArtifact {
    fn mandatory(kind: ArtifactKind, name: &str) -> Self {
        Self {
            kind,
            candidates: vec![name.to_string()],
            mandatory: true,
        }
    }

    pub fn primary_name(&self) -> &str {
        self.candidates.first().map(String::as_str).unwrap_or("")
    }
}

/// Artifact whose file was found in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub kind: ArtifactKind,
    pub name: String,
}

fn phy_config_name(phy: PhyProfile) -> &'static str {
    match phy {
        PhyProfile::Trident => RWNX_PHY_CONFIG_TRD_NAME,
        PhyProfile::Karst => RWNX_PHY_CONFIG_KARST_NAME,
    }
}

fn mac_firmware(variant: &BuildVariant) -> FirmwareArtifact {
    let base = variant.mac.base_name();
    let candidates = if variant.tl4 {
        vec![format!("{}{}", base, RWNX_MAC_FW_TL4_EXT)]
    } else {
        vec![
            format!("{}{}", base, RWNX_MAC_FW_EXT),
            format!("{}{}", base, RWNX_MAC_FW_EXT2),
        ]
    };
    FirmwareArtifact {
        kind: ArtifactKind::MacFirmware,
        candidates,
        mandatory: true,
    }
}

/// Ordered artifact list for `mode` under `variant`.
pub fn resolve(mode: FirmwareMode, variant: &BuildVariant) -> Vec<FirmwareArtifact> {
    let settings = FirmwareArtifact::mandatory(ArtifactKind::Settings, RWNX_CONFIG_FW_NAME);
    let phy = FirmwareArtifact::mandatory(ArtifactKind::PhyConfig, phy_config_name(variant.phy));
    let agc = FirmwareArtifact::mandatory(ArtifactKind::Agc, RWNX_AGC_FW_NAME);
    let ldpc = FirmwareArtifact::mandatory(ArtifactKind::Ldpc, RWNX_LDPC_RAM_NAME);
    let fcu = FirmwareArtifact::mandatory(ArtifactKind::FcuRamcode, RWNX_FCU_FW_NAME);

    let artifacts = match mode {
        FirmwareMode::Normal => {
            let mut list = vec![settings, phy, agc, ldpc, mac_firmware(variant), fcu];
            if variant.dpd && !variant.force_dpd_calib {
                list.push(FirmwareArtifact {
                    kind: ArtifactKind::DpdResult,
                    candidates: vec![FW_DPDRESULT_NAME_8800DC.to_string()],
                    mandatory: false,
                });
            }
            list
        }
        FirmwareMode::RfTest => vec![settings, phy, agc, ldpc, mac_firmware(variant), fcu],
        // The DPD result is what this mode produces.
        FirmwareMode::DpdCalib => vec![settings, phy, agc, mac_firmware(variant)],
        FirmwareMode::BleScanWakeup | FirmwareMode::BleScanAdFilter | FirmwareMode::M2dOta => {
            vec![settings, mac_firmware(variant)]
        }
    };

    debug!(mode = %mode, count = artifacts.len(), "Resolved firmware artifacts");
    artifacts
}

/// Check each artifact against `store`, picking the first present candidate.
///
/// A mandatory artifact with no present candidate fails with its primary
/// name. Missing optional artifacts are dropped.
pub fn validate_presence<S: FirmwareStore + ?Sized>(
    artifacts: &[FirmwareArtifact],
    store: &S,
) -> Result<Vec<ResolvedArtifact>, FirmwareError> {
    let mut resolved = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        match artifact.candidates.iter().find(|name| store.contains(name)) {
            Some(name) => {
                if name != artifact.primary_name() {
                    info!(
                        kind = %artifact.kind,
                        primary = artifact.primary_name(),
                        fallback = %name,
                        "Using fallback firmware name"
                    );
                }
                resolved.push(ResolvedArtifact {
                    kind: artifact.kind,
                    name: name.clone(),
                });
            }
            None if artifact.mandatory => {
                return Err(FirmwareError::MissingArtifact(
                    artifact.primary_name().to_string(),
                ));
            }
            None => {
                debug!(
                    kind = %artifact.kind,
                    name = artifact.primary_name(),
                    "Optional artifact absent, skipping"
                );
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(artifacts: &[FirmwareArtifact]) -> Vec<Vec<&str>> {
        artifacts
            .iter()
            .map(|a| a.candidates.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_normal_mode_fullmac() {
        let list = resolve(FirmwareMode::Normal, &BuildVariant::default());
        assert_eq!(
            names(&list),
            vec![
                vec!["rwnx_settings.ini"],
                vec!["rwnx_trident.ini"],
                vec!["agcram.bin"],
                vec!["ldpcram.bin"],
                vec!["fmacfw.ihex", "fmacfw.bin"],
                vec!["fcuram.bin"],
            ]
        );
        assert!(list.iter().all(|a| a.mandatory));
    }

    #[test]
    fn test_tl4_fhost_karst_naming() {
        let variant = BuildVariant {
            mac: MacFlavor::FHost,
            phy: PhyProfile::Karst,
            tl4: true,
            ..Default::default()
        };
        let list = resolve(FirmwareMode::RfTest, &variant);
        let mac = list
            .iter()
            .find(|a| a.kind == ArtifactKind::MacFirmware)
            .unwrap();
        assert_eq!(mac.candidates, vec!["fhostfw.hex".to_string()]);
        assert_eq!(list[1].candidates, vec!["rwnx_karst.ini".to_string()]);
    }

    #[test]
    fn test_dpd_result_gating() {
        let dpd = BuildVariant {
            dpd: true,
            ..Default::default()
        };
        let list = resolve(FirmwareMode::Normal, &dpd);
        let last = list.last().unwrap();
        assert_eq!(last.kind, ArtifactKind::DpdResult);
        assert_eq!(last.primary_name(), "aic_dpdresult_lite_8800dc.bin");
        assert!(!last.mandatory);

        let forced = BuildVariant {
            dpd: true,
            force_dpd_calib: true,
            ..Default::default()
        };
        let list = resolve(FirmwareMode::Normal, &forced);
        assert!(list.iter().all(|a| a.kind != ArtifactKind::DpdResult));

        let list = resolve(FirmwareMode::DpdCalib, &dpd);
        assert!(list.iter().all(|a| a.kind != ArtifactKind::DpdResult));
    }

    #[test]
    fn test_low_power_modes_are_minimal() {
        for mode in [
            FirmwareMode::BleScanWakeup,
            FirmwareMode::BleScanAdFilter,
            FirmwareMode::M2dOta,
        ] {
            let list = resolve(mode, &BuildVariant::default());
            let kinds: Vec<_> = list.iter().map(|a| a.kind).collect();
            assert_eq!(kinds, vec![ArtifactKind::Settings, ArtifactKind::MacFirmware]);
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let variant = BuildVariant::default();
        assert_eq!(
            resolve(FirmwareMode::Normal, &variant),
            resolve(FirmwareMode::Normal, &variant)
        );
    }

    #[test]
    fn test_validate_uses_fallback_name() {
        let store = MemoryStore::new()
            .with("rwnx_settings.ini", b"")
            .with("fmacfw.bin", &[0u8; 4]);
        let list = resolve(FirmwareMode::M2dOta, &BuildVariant::default());
        let resolved = validate_presence(&list, &store).unwrap();
        assert_eq!(resolved[1].name, "fmacfw.bin");
    }

    #[test]
    fn test_validate_prefers_primary_name() {
        let store = MemoryStore::new()
            .with("rwnx_settings.ini", b"")
            .with("fmacfw.ihex", &[0u8; 4])
            .with("fmacfw.bin", &[0u8; 4]);
        let list = resolve(FirmwareMode::M2dOta, &BuildVariant::default());
        let resolved = validate_presence(&list, &store).unwrap();
        assert_eq!(resolved[1].name, "fmacfw.ihex");
    }

    #[test]
    fn test_validate_missing_mandatory() {
        let store = MemoryStore::new().with("rwnx_settings.ini", b"");
        let list = resolve(FirmwareMode::M2dOta, &BuildVariant::default());
        let err = validate_presence(&list, &store).unwrap_err();
        assert!(matches!(err, FirmwareError::MissingArtifact(name) if name == "fmacfw.ihex"));
    }

    #[test]
    fn test_validate_skips_missing_optional() {
        let mut store = MemoryStore::new();
        for name in [
            "rwnx_settings.ini",
            "rwnx_trident.ini",
            "agcram.bin",
            "ldpcram.bin",
            "fmacfw.ihex",
            "fcuram.bin",
        ] {
            store.insert(name, vec![0u8; 8]);
        }
        let variant = BuildVariant {
            dpd: true,
            ..Default::default()
        };
        let list = resolve(FirmwareMode::Normal, &variant);
        assert_eq!(list.len(), 7);
        let resolved = validate_presence(&list, &store).unwrap();
        assert_eq!(resolved.len(), 6);
    }

    #[test]
    fn test_mode_from_u8() {
        assert_eq!(FirmwareMode::from_u8(4), Some(FirmwareMode::DpdCalib));
        assert_eq!(FirmwareMode::from_u8(6), None);
        assert_eq!(FirmwareMode::BleScanAdFilter as u8, 5);
    }
}
