//! Firmware artifact names.
//!
//! These must match the file names installed in the firmware directory
//! byte for byte; artifact discovery does no normalisation.

/// Platform settings file.
pub const RWNX_CONFIG_FW_NAME: &str = "rwnx_settings.ini";
/// PHY configuration for the Trident RF.
pub const RWNX_PHY_CONFIG_TRD_NAME: &str = "rwnx_trident.ini";
/// PHY configuration for the Karst RF.
pub const RWNX_PHY_CONFIG_KARST_NAME: &str = "rwnx_karst.ini";
/// AGC microcode.
pub const RWNX_AGC_FW_NAME: &str = "agcram.bin";
/// LDPC decoder RAM image.
pub const RWNX_LDPC_RAM_NAME: &str = "ldpcram.bin";
/// FCU ramcode.
pub const RWNX_FCU_FW_NAME: &str = "fcuram.bin";

/// MAC firmware base name, fullmac build.
pub const RWNX_MAC_FW_BASE_NAME_FULLMAC: &str = "fmacfw";
/// MAC firmware base name, fhost build.
pub const RWNX_MAC_FW_BASE_NAME_FHOST: &str = "fhostfw";

/// MAC firmware extension on TL4 builds.
pub const RWNX_MAC_FW_TL4_EXT: &str = ".hex";
/// MAC firmware primary extension on non-TL4 builds.
pub const RWNX_MAC_FW_EXT: &str = ".ihex";
/// MAC firmware fallback extension on non-TL4 builds.
pub const RWNX_MAC_FW_EXT2: &str = ".bin";

/// DPD calibration result kept from a previous calibration run (8800DC).
pub const FW_DPDRESULT_NAME_8800DC: &str = "aic_dpdresult_lite_8800dc.bin";
