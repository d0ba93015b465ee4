//! User configuration: transmit power and calibration tables.
//!
//! A `UserConfig` is built once by [`UserConfig::parse`] and is read-only
//! afterwards. There are no setters; reparse to change anything.
//!
//! # Format
//!
//! ```text
//! # comment
//! [txpwr_lvl_v3]
//! enable=1
//! pwrlvl_11b_11ag_2g4=20,20,20,20,20,20,20,20,18,18,16,16
//!
//! [xtal_cap]
//! enable=1
//! xtal_cap=0x18
//! ```
//!
//! Unknown sections are skipped silently. Bad entries are skipped with a
//! warning in the returned [`ParseReport`] and never partially applied.

pub mod parser;
pub mod tables;

use tracing::{debug, info};

pub use parser::{EntryError, ParseError, ParseReport, ParseWarning, WarningKind};
pub use tables::{
    ConfigSection, CrystalCap, Rate, TxPowerLevel, TxPowerLevelAdjust, TxPowerLevelV1,
    TxPowerLevelV2, TxPowerLevelV3, TxPowerLevelV4, TxPowerLoss, TxPowerOffset, TxPowerOffset2x,
    TxPowerOffset2xV1, TxPowerOffset2xV2,
};

use parser::{Line, WarningKind as Kind, classify, lines_of};

/// A table family with several schema versions.
pub trait Versioned {
    fn version(&self) -> u8;
}

impl Versioned for TxPowerLevel {
    fn version(&self) -> u8 {
        TxPowerLevel::version(self)
    }
}

impl Versioned for TxPowerOffset2x {
    fn version(&self) -> u8 {
        TxPowerOffset2x::version(self)
    }
}

/// Populated versions of one table family, at most one per version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedTable<T> {
    versions: Vec<T>,
}

impl<T> Default for VersionedTable<T> {
    fn default() -> Self {
        Self {
            versions: Vec::new(),
        }
    }
}

impl<T: Versioned> VersionedTable<T> {
    fn from_populated(mut versions: Vec<T>) -> Self {
        versions.sort_by_key(|t| t.version());
        versions.dedup_by_key(|t| t.version());
        Self { versions }
    }

    /// Highest populated version. Lower versions are never consulted.
    pub fn most_specific(&self) -> Option<&T> {
        self.versions.last()
    }

    pub fn get(&self, version: u8) -> Option<&T> {
        self.versions.iter().find(|t| t.version() == version)
    }

    pub fn populated_versions(&self) -> Vec<u8> {
        self.versions.iter().map(Versioned::version).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Parsed user configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserConfig {
    txpwr_lvl: VersionedTable<TxPowerLevel>,
    txpwr_lvl_adj: TxPowerLevelAdjust,
    txpwr_loss: TxPowerLoss,
    txpwr_ofst: TxPowerOffset,
    txpwr_ofst2x: VersionedTable<TxPowerOffset2x>,
    xtal_cap: CrystalCap,
}

/// Section currently being filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    TxPwrLvl(u8),
    TxPwrLvlAdj,
    TxPwrLoss,
    TxPwrOfst,
    TxPwrOfst2x(u8),
    XtalCap,
    Ignored,
}

impl Section {
    fn from_name(name: &str) -> Self {
        match name {
            "txpwr_lvl" => Section::TxPwrLvl(1),
            "txpwr_lvl_v2" => Section::TxPwrLvl(2),
            "txpwr_lvl_v3" => Section::TxPwrLvl(3),
            "txpwr_lvl_v4" => Section::TxPwrLvl(4),
            "txpwr_lvl_adj" => Section::TxPwrLvlAdj,
            "txpwr_loss" => Section::TxPwrLoss,
            "txpwr_ofst" => Section::TxPwrOfst,
            "txpwr_ofst2x" => Section::TxPwrOfst2x(1),
            "txpwr_ofst2x_v2" => Section::TxPwrOfst2x(2),
            "xtal_cap" => Section::XtalCap,
            _ => Section::Ignored,
        }
    }
}

/// Working copies of every table; a version counts as populated once one
/// of its entries applies.
#[derive(Default)]
struct Builder {
    lvl_v1: Option<TxPowerLevelV1>,
    lvl_v2: Option<TxPowerLevelV2>,
    lvl_v3: Option<TxPowerLevelV3>,
    lvl_v4: Option<TxPowerLevelV4>,
    ofst2x_v1: Option<TxPowerOffset2xV1>,
    ofst2x_v2: Option<TxPowerOffset2xV2>,
    config: UserConfig,
}

/// Apply to a copy so a failed entry cannot mark the version populated.
fn apply_versioned<T: ConfigSection + Default + Clone>(
    slot: &mut Option<T>,
    key: &str,
    value: &str,
) -> Result<(), EntryError> {
    let mut table = slot.clone().unwrap_or_default();
    table.apply(key, value)?;
    *slot = Some(table);
    Ok(())
}

impl Builder {
    fn apply(&mut self, section: Section, key: &str, value: &str) -> Result<(), EntryError> {
        match section {
            Section::TxPwrLvl(1) => apply_versioned(&mut self.lvl_v1, key, value),
            Section::TxPwrLvl(2) => apply_versioned(&mut self.lvl_v2, key, value),
            Section::TxPwrLvl(3) => apply_versioned(&mut self.lvl_v3, key, value),
            Section::TxPwrLvl(_) => apply_versioned(&mut self.lvl_v4, key, value),
            Section::TxPwrLvlAdj => self.config.txpwr_lvl_adj.apply(key, value),
            Section::TxPwrLoss => self.config.txpwr_loss.apply(key, value),
            Section::TxPwrOfst => self.config.txpwr_ofst.apply(key, value),
            Section::TxPwrOfst2x(1) => apply_versioned(&mut self.ofst2x_v1, key, value),
            Section::TxPwrOfst2x(_) => apply_versioned(&mut self.ofst2x_v2, key, value),
            Section::XtalCap => self.config.xtal_cap.apply(key, value),
            Section::Ignored => Ok(()),
        }
    }

    fn finish(self) -> UserConfig {
        let levels = [
            self.lvl_v1.map(TxPowerLevel::V1),
            self.lvl_v2.map(TxPowerLevel::V2),
            self.lvl_v3.map(TxPowerLevel::V3),
            self.lvl_v4.map(TxPowerLevel::V4),
        ];
        let ofst2x = [
            self.ofst2x_v1.map(TxPowerOffset2x::V1),
            self.ofst2x_v2.map(TxPowerOffset2x::V2),
        ];
        UserConfig {
            txpwr_lvl: VersionedTable::from_populated(levels.into_iter().flatten().collect()),
            txpwr_ofst2x: VersionedTable::from_populated(ofst2x.into_iter().flatten().collect()),
            ..self.config
        }
    }
}

impl UserConfig {
    /// Parse the first `size` bytes of `buffer`.
    ///
    /// Fails only if `size` is larger than the buffer; everything else,
    /// including a line that is not UTF-8, degrades to a warning.
    pub fn parse(buffer: &[u8], size: usize) -> Result<(Self, ParseReport), ParseError> {
        let lines = lines_of(buffer, size)?;
        let mut report = ParseReport::default();
        let mut builder = Builder::default();
        let mut section: Option<Section> = None;

        for (line, raw) in lines {
            let Some(raw) = raw else {
                report.warn(line, Kind::Malformed);
                continue;
            };
            match classify(raw) {
                Line::Blank => {}
                Line::Section(name) => {
                    let s = Section::from_name(name);
                    if s == Section::Ignored {
                        debug!(line, section = name, "Ignoring unknown section");
                    }
                    section = Some(s);
                }
                Line::Malformed => report.warn(line, Kind::Malformed),
                Line::Entry { key, value } => match section {
                    None => report.warn(line, Kind::OutsideSection),
                    Some(Section::Ignored) => {}
                    Some(s) => match builder.apply(s, key, value) {
                        Ok(()) => report.applied += 1,
                        Err(error) => report.warn(
                            line,
                            Kind::Entry {
                                key: key.to_string(),
                                error,
                            },
                        ),
                    },
                },
            }
        }

        let config = builder.finish();
        info!(
            applied = report.applied,
            warnings = report.warnings.len(),
            txpwr_lvl_versions = ?config.txpwr_lvl.populated_versions(),
            "User config parsed"
        );
        Ok((config, report))
    }

    /// Most specific populated transmit power level table.
    pub fn tx_power_level(&self) -> Option<&TxPowerLevel> {
        self.txpwr_lvl.most_specific()
    }

    pub fn tx_power_level_version(&self, version: u8) -> Option<&TxPowerLevel> {
        self.txpwr_lvl.get(version)
    }

    pub fn tx_power_levels(&self) -> &VersionedTable<TxPowerLevel> {
        &self.txpwr_lvl
    }

    pub fn tx_power_level_adjust(&self) -> &TxPowerLevelAdjust {
        &self.txpwr_lvl_adj
    }

    pub fn tx_power_loss(&self) -> &TxPowerLoss {
        &self.txpwr_loss
    }

    pub fn tx_power_offset(&self) -> &TxPowerOffset {
        &self.txpwr_ofst
    }

    /// Most specific populated 2x offset table.
    pub fn tx_power_offset2x(&self) -> Option<&TxPowerOffset2x> {
        self.txpwr_ofst2x.most_specific()
    }

    pub fn tx_power_offset2x_version(&self, version: u8) -> Option<&TxPowerOffset2x> {
        self.txpwr_ofst2x.get(version)
    }

    pub fn crystal_cap(&self) -> &CrystalCap {
        &self.xtal_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regulatory::Band;

    fn parse(text: &str) -> (UserConfig, ParseReport) {
        UserConfig::parse(text.as_bytes(), text.len()).unwrap()
    }

    #[test]
    fn test_good_section_and_malformed_entry() {
        let text = "\
[txpwr_lvl_v2]
enable=1
pwrlvl_11b_11ag_2g4=20,20,20,20,18,18,18,18,18,18,16,16
pwrlvl_11n_11ac_2g4=18,18,18,18,18,18,16,16,15
pwrlvl_11ax_2g4=18,18,18,18,18,18,16,16,15,15,14,14
";
        let (config, report) = parse(text);

        // The 9-element 11n/11ac row is rejected; the rest of the table stands.
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].line, 4);
        assert!(matches!(
            &report.warnings[0].kind,
            WarningKind::Entry { key, error: EntryError::WrongLength { expected: 10, actual: 9 } }
                if key == "pwrlvl_11n_11ac_2g4"
        ));
        assert_eq!(report.applied, 3);

        let TxPowerLevel::V2(t) = config.tx_power_level().unwrap() else {
            panic!("expected v2 table");
        };
        assert!(t.enable);
        assert_eq!(t.pwrlvl_11b_11ag_2g4[0], 20);
        assert_eq!(t.pwrlvl_11n_11ac_2g4, [0; 10]);
        assert_eq!(t.pwrlvl_11ax_2g4[11], 14);
    }

    #[test]
    fn test_most_specific_version_wins() {
        let text = "\
[txpwr_lvl]
enable=1
dsss=9
[txpwr_lvl_v3]
enable=1
pwrlvl_11a_5g=0,0,0,0,17,17,17,17,17,17,15,15
";
        let (config, _) = parse(text);
        assert_eq!(config.tx_power_levels().populated_versions(), vec![1, 3]);

        let level = config.tx_power_level().unwrap();
        assert_eq!(level.version(), 3);
        assert_eq!(level.level_for(Band::Band5G, Rate::Ofdm(0)), Some(17));
        // v3 has zeroed 11b slots; the v1 dsss value must not leak in.
        assert_eq!(level.level_for(Band::Band2G4, Rate::Dsss(0)), Some(0));

        let TxPowerLevel::V1(v1) = config.tx_power_level_version(1).unwrap() else {
            panic!("expected v1 table");
        };
        assert_eq!(v1.dsss, 9);
    }

    #[test]
    fn test_section_with_only_bad_entries_is_not_populated() {
        let text = "\
[txpwr_lvl]
enable=1
[txpwr_lvl_v4]
pwrlvl_11b_2g4=1,2
";
        let (config, report) = parse(text);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(config.tx_power_level().unwrap().version(), 1);
        assert!(config.tx_power_level_version(4).is_none());
    }

    #[test]
    fn test_unknown_sections_are_ignored() {
        let text = "\
[bt_coex]
whatever=1
garbage line inside unknown section is still malformed
[txpwr_loss]
loss_enable=1
loss_value=2
";
        let (config, report) = parse(text);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::Malformed);
        assert_eq!(config.tx_power_loss().effective_loss(), 2);
    }

    #[test]
    fn test_entry_outside_section() {
        let (config, report) = parse("enable=1\n[xtal_cap]\nxtal_cap=0x10\n");
        assert_eq!(report.warnings[0].kind, WarningKind::OutsideSection);
        assert_eq!(config.crystal_cap().xtal_cap, 16);
        assert_eq!(config.crystal_cap().xtal_cap_fine, 31);
    }

    #[test]
    fn test_defaults_when_absent() {
        let (config, report) = parse("# nothing here\n\n");
        assert!(!report.has_warnings());
        assert!(config.tx_power_level().is_none());
        assert!(config.tx_power_offset2x().is_none());
        assert_eq!(*config.crystal_cap(), CrystalCap::default());
        assert_eq!(*config.tx_power_offset(), TxPowerOffset::default());
    }

    #[test]
    fn test_offset2x_tables() {
        let text = "\
[txpwr_ofst2x]
enable=1
pwrofst2x_tbl_2g4=1,1,1;2,2,2;3,3,3
[txpwr_ofst2x_v2]
enable=1
pwrofst2x_tbl_2g4_ant1=4,4,4;5,5,5;6,6,-6
";
        let (config, report) = parse(text);
        assert!(!report.has_warnings());
        let ofst = config.tx_power_offset2x().unwrap();
        assert_eq!(ofst.version(), 2);
        assert_eq!(ofst.offset(Band::Band2G4, 2, 2, 1), Some(-6));
        assert_eq!(
            config
                .tx_power_offset2x_version(1)
                .unwrap()
                .offset(Band::Band2G4, 1, 0, 0),
            Some(2)
        );
    }

    #[test]
    fn test_parse_respects_size() {
        let text = "[txpwr_loss]\nloss_enable=1\nloss_value=5\n";
        // Cut right before the loss_value line.
        let size = text.find("loss_value").unwrap();
        let (config, _) = UserConfig::parse(text.as_bytes(), size).unwrap();
        assert!(config.tx_power_loss().loss_enable);
        assert_eq!(config.tx_power_loss().loss_value, 0);

        assert!(UserConfig::parse(text.as_bytes(), text.len() + 1).is_err());
    }

    #[test]
    fn test_non_utf8_lines_do_not_abort() {
        let buf = b"# board rev \xB0C\n[txpwr_loss]\n\
                    loss_enable=1\nloss_value=\xB03\nloss_value=3\n";
        let (config, report) = UserConfig::parse(buf, buf.len()).unwrap();
        assert_eq!(config.tx_power_loss().effective_loss(), 3);
        assert_eq!(report.applied, 2);
        assert_eq!(
            report.warnings,
            vec![ParseWarning {
                line: 4,
                kind: Kind::Malformed,
            }]
        );
    }
}
