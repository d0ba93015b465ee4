//! Platform configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::firmware::{BuildVariant, FirmwareMode};
use crate::regulatory::{self, PowerLimitTable, RegionCode};
use crate::userconfig::{ParseReport, UserConfig};

/// Settings for one device bring-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Directory holding the firmware files.
    pub firmware_dir: PathBuf,
    pub mode: FirmwareMode,
    pub variant: BuildVariant,
    /// ISO country code; unknown codes fall back to the DEFAULT region.
    pub country_code: String,
    /// User configuration text file.
    pub userconfig_path: Option<PathBuf>,
    /// Power-limit table file.
    pub powerlimit_path: Option<PathBuf>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            firmware_dir: PathBuf::from("/lib/firmware/aic8800"),
            mode: FirmwareMode::Normal,
            variant: BuildVariant::default(),
            country_code: "00".to_string(),
            userconfig_path: None,
            powerlimit_path: None,
        }
    }
}

impl PlatformConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: PlatformConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn region(&self) -> RegionCode {
        regulatory::region_for(&self.country_code)
    }

    /// Parse the user configuration file, if one is configured.
    pub fn load_user_config(&self) -> Result<Option<(UserConfig, ParseReport)>> {
        let Some(path) = &self.userconfig_path else {
            return Ok(None);
        };
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let parsed = UserConfig::parse(&data, data.len())
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(parsed))
    }

    /// Parse the power-limit file, if one is configured.
    pub fn load_power_limits(&self) -> Result<Option<(PowerLimitTable, ParseReport)>> {
        let Some(path) = &self.powerlimit_path else {
            return Ok(None);
        };
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let parsed = PowerLimitTable::parse(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::MacFlavor;

    #[test]
    fn test_toml_roundtrip_through_file() {
        let dir = std::env::temp_dir().join(format!("rwnx-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("platform.toml");

        let config = PlatformConfig {
            mode: FirmwareMode::RfTest,
            country_code: "DE".into(),
            variant: BuildVariant {
                mac: MacFlavor::FHost,
                dpd: true,
                ..Default::default()
            },
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        let loaded = PlatformConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.region(), RegionCode::Etsi);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: PlatformConfig = toml::from_str(
            r#"
            country_code = "US"
            mode = "dpd_calib"

            [variant]
            tl4 = true
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, FirmwareMode::DpdCalib);
        assert!(config.variant.tl4);
        assert!(!config.variant.dpd);
        assert_eq!(config.region(), RegionCode::Fcc);
        assert!(config.load_user_config().unwrap().is_none());
    }

    #[test]
    fn test_mac_flavor_uses_firmware_base_names() {
        let config: PlatformConfig = toml::from_str(
            r#"
            [variant]
            mac = "fhost"
            "#,
        )
        .unwrap();
        assert_eq!(config.variant.mac, MacFlavor::FHost);

        let text = toml::to_string(&PlatformConfig::default()).unwrap();
        assert!(text.contains(r#"mac = "fullmac""#), "{}", text);
    }

    #[test]
    fn test_missing_userconfig_file_is_error() {
        let config = PlatformConfig {
            userconfig_path: Some(PathBuf::from("/nonexistent/rwnx/userconfig.txt")),
            ..Default::default()
        };
        assert!(config.load_user_config().is_err());
    }
}
