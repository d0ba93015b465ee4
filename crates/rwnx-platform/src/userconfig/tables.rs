//! Transmit-power and calibration tables carried by the user config.
//!
//! Power levels are signed dBm values, offsets/losses signed dB.

use super::parser::{EntryError, parse_array, parse_bool, parse_i8, parse_table, parse_u8};
use crate::regulatory::Band;

/// Assign `key` from `value` if it names one of the listed fields.
///
/// The value is fully parsed before the field is touched, so a bad entry
/// leaves the table as it was.
macro_rules! apply_fields {
    ($table:ident, $key:ident, $value:ident; $($field:ident => $parse:expr),* $(,)?) => {
        match $key {
            $(stringify!($field) => {
                $table.$field = $parse($value)?;
                Ok(())
            })*
            _ => Err(EntryError::UnknownKey($key.to_string())),
        }
    };
}

/// A table that can be filled one `key=value` entry at a time.
pub trait ConfigSection {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), EntryError>;
}

/// Rate selector for power-level lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rate {
    /// 802.11b rate index 0..=3 (1, 2, 5.5, 11 Mbps).
    Dsss(usize),
    /// Legacy OFDM rate index 0..=7 (6..54 Mbps).
    Ofdm(usize),
    /// HT/VHT MCS 0..=9.
    HtVht(usize),
    /// HE MCS 0..=11.
    He(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPowerLevelV1 {
    pub enable: bool,
    pub dsss: i8,
    pub ofdmlowrate_2g4: i8,
    pub ofdm64qam_2g4: i8,
    pub ofdm256qam_2g4: i8,
    pub ofdm1024qam_2g4: i8,
    pub ofdmlowrate_5g: i8,
    pub ofdm64qam_5g: i8,
    pub ofdm256qam_5g: i8,
    pub ofdm1024qam_5g: i8,
}

impl ConfigSection for TxPowerLevelV1 {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), EntryError> {
        apply_fields!(self, key, value;
            enable => parse_bool,
            dsss => parse_i8,
            ofdmlowrate_2g4 => parse_i8,
            ofdm64qam_2g4 => parse_i8,
            ofdm256qam_2g4 => parse_i8,
            ofdm1024qam_2g4 => parse_i8,
            ofdmlowrate_5g => parse_i8,
            ofdm64qam_5g => parse_i8,
            ofdm256qam_5g => parse_i8,
            ofdm1024qam_5g => parse_i8,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPowerLevelV2 {
    pub enable: bool,
    pub pwrlvl_11b_11ag_2g4: [i8; 12],
    pub pwrlvl_11n_11ac_2g4: [i8; 10],
    pub pwrlvl_11ax_2g4: [i8; 12],
}

impl ConfigSection for TxPowerLevelV2 {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), EntryError> {
        apply_fields!(self, key, value;
            enable => parse_bool,
            pwrlvl_11b_11ag_2g4 => parse_array::<12>,
            pwrlvl_11n_11ac_2g4 => parse_array::<10>,
            pwrlvl_11ax_2g4 => parse_array::<12>,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPowerLevelV3 {
    pub enable: bool,
    pub pwrlvl_11b_11ag_2g4: [i8; 12],
    pub pwrlvl_11n_11ac_2g4: [i8; 10],
    pub pwrlvl_11ax_2g4: [i8; 12],
    pub pwrlvl_11a_5g: [i8; 12],
    pub pwrlvl_11n_11ac_5g: [i8; 10],
    pub pwrlvl_11ax_5g: [i8; 12],
}

impl ConfigSection for TxPowerLevelV3 {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), EntryError> {
        apply_fields!(self, key, value;
            enable => parse_bool,
            pwrlvl_11b_11ag_2g4 => parse_array::<12>,
            pwrlvl_11n_11ac_2g4 => parse_array::<10>,
            pwrlvl_11ax_2g4 => parse_array::<12>,
            pwrlvl_11a_5g => parse_array::<12>,
            pwrlvl_11n_11ac_5g => parse_array::<10>,
            pwrlvl_11ax_5g => parse_array::<12>,
        )
    }
}

/// V3 layout with 11b and 11ag split for 2.4 GHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPowerLevelV4 {
    pub enable: bool,
    pub pwrlvl_11b_2g4: [i8; 4],
    pub pwrlvl_11ag_2g4: [i8; 8],
    pub pwrlvl_11n_11ac_2g4: [i8; 10],
    pub pwrlvl_11ax_2g4: [i8; 12],
    pub pwrlvl_11a_5g: [i8; 12],
    pub pwrlvl_11n_11ac_5g: [i8; 10],
    pub pwrlvl_11ax_5g: [i8; 12],
}

impl ConfigSection for TxPowerLevelV4 {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), EntryError> {
        apply_fields!(self, key, value;
            enable => parse_bool,
            pwrlvl_11b_2g4 => parse_array::<4>,
            pwrlvl_11ag_2g4 => parse_array::<8>,
            pwrlvl_11n_11ac_2g4 => parse_array::<10>,
            pwrlvl_11ax_2g4 => parse_array::<12>,
            pwrlvl_11a_5g => parse_array::<12>,
            pwrlvl_11n_11ac_5g => parse_array::<10>,
            pwrlvl_11ax_5g => parse_array::<12>,
        )
    }
}

/// Transmit power level table, one variant per schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPowerLevel {
    V1(TxPowerLevelV1),
    V2(TxPowerLevelV2),
    V3(TxPowerLevelV3),
    V4(TxPowerLevelV4),
}

fn at<const N: usize>(table: &[i8; N], idx: usize) -> Option<i8> {
    table.get(idx).copied()
}

impl TxPowerLevel {
    pub fn version(&self) -> u8 {
        match self {
            TxPowerLevel::V1(_) => 1,
            TxPowerLevel::V2(_) => 2,
            TxPowerLevel::V3(_) => 3,
            TxPowerLevel::V4(_) => 4,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            TxPowerLevel::V1(t) => t.enable,
            TxPowerLevel::V2(t) => t.enable,
            TxPowerLevel::V3(t) => t.enable,
            TxPowerLevel::V4(t) => t.enable,
        }
    }

    /// Power level for `rate` in `band`, read from this version only.
    ///
    /// `None` when the table is disabled or this version has no entry for
    /// the band/rate.
    pub fn level_for(&self, band: Band, rate: Rate) -> Option<i8> {
        if !self.is_enabled() {
            return None;
        }
        match (self, band) {
            (TxPowerLevel::V1(t), Band::Band2G4) => match rate {
                Rate::Dsss(i) if i < 4 => Some(t.dsss),
                Rate::Ofdm(i) if i < 8 => Some(t.ofdmlowrate_2g4),
                Rate::HtVht(0..=7) | Rate::He(0..=7) => Some(t.ofdm64qam_2g4),
                Rate::HtVht(8..=9) | Rate::He(8..=9) => Some(t.ofdm256qam_2g4),
                Rate::He(10..=11) => Some(t.ofdm1024qam_2g4),
                _ => None,
            },
            (TxPowerLevel::V1(t), Band::Band5G) => match rate {
                Rate::Ofdm(i) if i < 8 => Some(t.ofdmlowrate_5g),
                Rate::HtVht(0..=7) | Rate::He(0..=7) => Some(t.ofdm64qam_5g),
                Rate::HtVht(8..=9) | Rate::He(8..=9) => Some(t.ofdm256qam_5g),
                Rate::He(10..=11) => Some(t.ofdm1024qam_5g),
                _ => None,
            },
            (TxPowerLevel::V2(t), Band::Band2G4) => {
                legacy_2g4(&t.pwrlvl_11b_11ag_2g4, &t.pwrlvl_11n_11ac_2g4, &t.pwrlvl_11ax_2g4, rate)
            }
            (TxPowerLevel::V2(_), Band::Band5G) => None,
            (TxPowerLevel::V3(t), Band::Band2G4) => {
                legacy_2g4(&t.pwrlvl_11b_11ag_2g4, &t.pwrlvl_11n_11ac_2g4, &t.pwrlvl_11ax_2g4, rate)
            }
            (TxPowerLevel::V3(t), Band::Band5G) => {
                table_5g(&t.pwrlvl_11a_5g, &t.pwrlvl_11n_11ac_5g, &t.pwrlvl_11ax_5g, rate)
            }
            (TxPowerLevel::V4(t), Band::Band2G4) => match rate {
                Rate::Dsss(i) => at(&t.pwrlvl_11b_2g4, i),
                Rate::Ofdm(i) => at(&t.pwrlvl_11ag_2g4, i),
                Rate::HtVht(m) => at(&t.pwrlvl_11n_11ac_2g4, m),
                Rate::He(m) => at(&t.pwrlvl_11ax_2g4, m),
            },
            (TxPowerLevel::V4(t), Band::Band5G) => {
                table_5g(&t.pwrlvl_11a_5g, &t.pwrlvl_11n_11ac_5g, &t.pwrlvl_11ax_5g, rate)
            }
        }
    }
}

// 11b rates occupy slots 0..4 of the combined 11b/11ag array, 11ag slots 4..12.
fn legacy_2g4(b_ag: &[i8; 12], n_ac: &[i8; 10], ax: &[i8; 12], rate: Rate) -> Option<i8> {
    match rate {
        Rate::Dsss(i) if i < 4 => at(b_ag, i),
        Rate::Ofdm(i) if i < 8 => at(b_ag, 4 + i),
        Rate::HtVht(m) => at(n_ac, m),
        Rate::He(m) => at(ax, m),
        _ => None,
    }
}

fn table_5g(a: &[i8; 12], n_ac: &[i8; 10], ax: &[i8; 12], rate: Rate) -> Option<i8> {
    match rate {
        Rate::Dsss(_) => None,
        Rate::Ofdm(i) if i < 8 => at(a, 4 + i),
        Rate::Ofdm(_) => None,
        Rate::HtVht(m) => at(n_ac, m),
        Rate::He(m) => at(ax, m),
    }
}

/// Per-sub-band power level adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPowerLevelAdjust {
    pub enable: bool,
    pub pwrlvl_adj_tbl_2g4: [i8; 3],
    pub pwrlvl_adj_tbl_5g: [i8; 6],
}

impl ConfigSection for TxPowerLevelAdjust {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), EntryError> {
        apply_fields!(self, key, value;
            enable => parse_bool,
            pwrlvl_adj_tbl_2g4 => parse_array::<3>,
            pwrlvl_adj_tbl_5g => parse_array::<6>,
        )
    }
}

/// Board insertion loss compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPowerLoss {
    pub loss_enable: bool,
    pub loss_value: i8,
}

impl TxPowerLoss {
    /// Loss to compensate, 0 when disabled.
    pub fn effective_loss(&self) -> i8 {
        if self.loss_enable { self.loss_value } else { 0 }
    }
}

impl ConfigSection for TxPowerLoss {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), EntryError> {
        apply_fields!(self, key, value;
            loss_enable => parse_bool,
            loss_value => parse_i8,
        )
    }
}

/// Per-channel-group power offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPowerOffset {
    pub enable: bool,
    pub chan_1_4: i8,
    pub chan_5_9: i8,
    pub chan_10_13: i8,
    pub chan_36_64: i8,
    pub chan_100_120: i8,
    pub chan_122_140: i8,
    pub chan_142_165: i8,
}

impl TxPowerOffset {
    /// Offset for `channel`, `None` when disabled or outside every group.
    pub fn offset_for_channel(&self, channel: u16) -> Option<i8> {
        if !self.enable {
            return None;
        }
        match channel {
            1..=4 => Some(self.chan_1_4),
            5..=9 => Some(self.chan_5_9),
            10..=13 => Some(self.chan_10_13),
            36..=64 => Some(self.chan_36_64),
            100..=120 => Some(self.chan_100_120),
            122..=140 => Some(self.chan_122_140),
            142..=165 => Some(self.chan_142_165),
            _ => None,
        }
    }
}

impl ConfigSection for TxPowerOffset {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), EntryError> {
        apply_fields!(self, key, value;
            enable => parse_bool,
            chan_1_4 => parse_i8,
            chan_5_9 => parse_i8,
            chan_10_13 => parse_i8,
            chan_36_64 => parse_i8,
            chan_100_120 => parse_i8,
            chan_122_140 => parse_i8,
            chan_142_165 => parse_i8,
        )
    }
}

/// Rate-group x sub-band offsets in half-dB steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPowerOffset2xV1 {
    pub enable: bool,
    pub pwrofst2x_tbl_2g4: [[i8; 3]; 3],
    pub pwrofst2x_tbl_5g: [[i8; 6]; 3],
}

impl ConfigSection for TxPowerOffset2xV1 {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), EntryError> {
        apply_fields!(self, key, value;
            enable => parse_bool,
            pwrofst2x_tbl_2g4 => parse_table::<3, 3>,
            pwrofst2x_tbl_5g => parse_table::<3, 6>,
        )
    }
}

/// Per-antenna variant of [`TxPowerOffset2xV1`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPowerOffset2xV2 {
    pub enable: bool,
    pub pwrofst2x_tbl_2g4_ant0: [[i8; 3]; 3],
    pub pwrofst2x_tbl_5g_ant0: [[i8; 6]; 3],
    pub pwrofst2x_tbl_2g4_ant1: [[i8; 3]; 3],
    pub pwrofst2x_tbl_5g_ant1: [[i8; 6]; 3],
}

impl ConfigSection for TxPowerOffset2xV2 {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), EntryError> {
        apply_fields!(self, key, value;
            enable => parse_bool,
            pwrofst2x_tbl_2g4_ant0 => parse_table::<3, 3>,
            pwrofst2x_tbl_5g_ant0 => parse_table::<3, 6>,
            pwrofst2x_tbl_2g4_ant1 => parse_table::<3, 3>,
            pwrofst2x_tbl_5g_ant1 => parse_table::<3, 6>,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPowerOffset2x {
    V1(TxPowerOffset2xV1),
    V2(TxPowerOffset2xV2),
}

impl TxPowerOffset2x {
    pub fn version(&self) -> u8 {
        match self {
            TxPowerOffset2x::V1(_) => 1,
            TxPowerOffset2x::V2(_) => 2,
        }
    }

    /// Half-dB offset for a rate group (0..3) and sub-band on `antenna`.
    ///
    /// V1 has a single table shared by every antenna.
    pub fn offset(
        &self,
        band: Band,
        rate_group: usize,
        sub_band: usize,
        antenna: usize,
    ) -> Option<i8> {
        let (tbl_2g4, tbl_5g) = match self {
            TxPowerOffset2x::V1(t) if t.enable => (&t.pwrofst2x_tbl_2g4, &t.pwrofst2x_tbl_5g),
            TxPowerOffset2x::V2(t) if t.enable => match antenna {
                0 => (&t.pwrofst2x_tbl_2g4_ant0, &t.pwrofst2x_tbl_5g_ant0),
                1 => (&t.pwrofst2x_tbl_2g4_ant1, &t.pwrofst2x_tbl_5g_ant1),
                _ => return None,
            },
            _ => return None,
        };
        match band {
            Band::Band2G4 => tbl_2g4.get(rate_group)?.get(sub_band).copied(),
            Band::Band5G => tbl_5g.get(rate_group)?.get(sub_band).copied(),
        }
    }
}

/// Crystal load capacitance trim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrystalCap {
    pub enable: bool,
    pub xtal_cap: u8,
    pub xtal_cap_fine: u8,
}

impl Default for CrystalCap {
    fn default() -> Self {
        Self {
            enable: false,
            xtal_cap: 24,
            xtal_cap_fine: 31,
        }
    }
}

impl ConfigSection for CrystalCap {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), EntryError> {
        apply_fields!(self, key, value;
            enable => parse_bool,
            xtal_cap => parse_u8,
            xtal_cap_fine => parse_u8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_rejects_without_touching() {
        let mut t = TxPowerLevelV2::default();
        t.apply("pwrlvl_11n_11ac_2g4", "1,2,3,4,5,6,7,8,9,10").unwrap();
        let before = t;

        assert!(t.apply("pwrlvl_11n_11ac_2g4", "1,2,3").is_err());
        assert!(t.apply("pwrlvl_11n_11ac_2g4", "1,2,3,4,5,6,7,8,9,999").is_err());
        assert!(matches!(
            t.apply("pwrlvl_bogus", "1"),
            Err(EntryError::UnknownKey(_))
        ));
        assert_eq!(t, before);
    }

    #[test]
    fn test_v1_lookup_maps_rate_groups() {
        let t = TxPowerLevel::V1(TxPowerLevelV1 {
            enable: true,
            dsss: 20,
            ofdmlowrate_2g4: 19,
            ofdm64qam_2g4: 18,
            ofdm256qam_2g4: 16,
            ofdm1024qam_2g4: 14,
            ofdmlowrate_5g: 17,
            ofdm64qam_5g: 15,
            ofdm256qam_5g: 13,
            ofdm1024qam_5g: 11,
        });
        assert_eq!(t.level_for(Band::Band2G4, Rate::Dsss(3)), Some(20));
        assert_eq!(t.level_for(Band::Band2G4, Rate::HtVht(9)), Some(16));
        assert_eq!(t.level_for(Band::Band2G4, Rate::He(11)), Some(14));
        assert_eq!(t.level_for(Band::Band5G, Rate::Dsss(0)), None);
        assert_eq!(t.level_for(Band::Band5G, Rate::He(5)), Some(15));
    }

    #[test]
    fn test_v2_has_no_5g() {
        let mut v2 = TxPowerLevelV2 {
            enable: true,
            ..Default::default()
        };
        v2.pwrlvl_11b_11ag_2g4 = [20, 20, 20, 20, 18, 18, 18, 18, 18, 18, 16, 16];
        let t = TxPowerLevel::V2(v2);
        assert_eq!(t.level_for(Band::Band2G4, Rate::Ofdm(7)), Some(16));
        assert_eq!(t.level_for(Band::Band5G, Rate::Ofdm(0)), None);
    }

    #[test]
    fn test_disabled_table_yields_nothing() {
        let t = TxPowerLevel::V4(TxPowerLevelV4::default());
        assert_eq!(t.level_for(Band::Band2G4, Rate::Dsss(0)), None);
    }

    #[test]
    fn test_offset_for_channel() {
        let t = TxPowerOffset {
            enable: true,
            chan_1_4: 1,
            chan_5_9: 2,
            chan_10_13: 3,
            chan_36_64: -1,
            chan_100_120: -2,
            chan_122_140: -3,
            chan_142_165: -4,
        };
        assert_eq!(t.offset_for_channel(4), Some(1));
        assert_eq!(t.offset_for_channel(13), Some(3));
        assert_eq!(t.offset_for_channel(14), None);
        assert_eq!(t.offset_for_channel(149), Some(-4));
        assert_eq!(TxPowerOffset::default().offset_for_channel(1), None);
    }

    #[test]
    fn test_offset2x_per_antenna() {
        let mut v2 = TxPowerOffset2xV2 {
            enable: true,
            ..Default::default()
        };
        v2.pwrofst2x_tbl_5g_ant1[2][5] = -6;
        let t = TxPowerOffset2x::V2(v2);
        assert_eq!(t.offset(Band::Band5G, 2, 5, 1), Some(-6));
        assert_eq!(t.offset(Band::Band5G, 2, 5, 0), Some(0));
        assert_eq!(t.offset(Band::Band5G, 2, 5, 2), None);
        assert_eq!(t.offset(Band::Band2G4, 3, 0, 0), None);
    }

    #[test]
    fn test_loss_and_xtal_defaults() {
        assert_eq!(TxPowerLoss::default().effective_loss(), 0);
        let xtal = CrystalCap::default();
        assert_eq!((xtal.xtal_cap, xtal.xtal_cap_fine), (24, 31));
    }
}
