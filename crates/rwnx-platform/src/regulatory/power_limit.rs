//! Per-region transmit power limits.
//!
//! File format, one row per line:
//!
//! ```text
//! # band bw region channels      limits
//! 2g4   20 FCC    1-11          20
//! 5g    40 ETSI   36,40,44,48   17,17,16,16
//! ```
//!
//! `limits` is either one value for every listed channel or a list of the
//! same length as the expanded channel list.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::info;

use super::channel::{Band, Bandwidth, channel_to_freq, freq_to_channel};
use super::region_index;
use crate::userconfig::EntryError;
use crate::userconfig::parser::{
    ParseError, ParseReport, WarningKind, lines_of, parse_i8, parse_int,
};

/// Returned when no limit applies. Not a power level.
pub const POWER_LEVEL_INVALID_VAL: i8 = 127;

/// Typed view of a raw lookup result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerLimit {
    /// Limit in dBm.
    Limit(i8),
    /// No table entry; apply the conservative default.
    NoLimit,
}

impl PowerLimit {
    pub fn raw(&self) -> i8 {
        match self {
            PowerLimit::Limit(v) => *v,
            PowerLimit::NoLimit => POWER_LEVEL_INVALID_VAL,
        }
    }

    pub fn unwrap_or(self, default: i8) -> i8 {
        match self {
            PowerLimit::Limit(v) => v,
            PowerLimit::NoLimit => default,
        }
    }
}

impl From<i8> for PowerLimit {
    fn from(raw: i8) -> Self {
        if raw == POWER_LEVEL_INVALID_VAL {
            PowerLimit::NoLimit
        } else {
            PowerLimit::Limit(raw)
        }
    }
}

impl fmt::Display for PowerLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerLimit::Limit(v) => write!(f, "{} dBm", v),
            PowerLimit::NoLimit => write!(f, "no limit"),
        }
    }
}

/// An entry reachable by channel but not by its frequency.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{band} channel {channel} @ {bw} region {region}: channel lookup {by_channel}, frequency lookup {by_frequency}")]
pub struct Disagreement {
    pub band: Band,
    pub channel: u16,
    pub bw: Bandwidth,
    pub region: u8,
    pub by_channel: i8,
    pub by_frequency: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    band: Band,
    region: u8,
    channel: u16,
    bw: Bandwidth,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PowerLimitTable {
    entries: HashMap<Key, i8>,
}

fn bad(token: &str) -> EntryError {
    EntryError::InvalidNumber(token.to_string())
}

fn parse_channels(band: Band, s: &str) -> Result<Vec<u16>, EntryError> {
    let mut channels = Vec::new();
    for item in s.split(',').map(str::trim) {
        let (lo, hi) = match item.split_once('-') {
            Some((a, b)) => (parse_int(a)?, parse_int(b)?),
            None => {
                let ch = parse_int(item)?;
                (ch, ch)
            }
        };
        if lo > hi {
            return Err(bad(item));
        }
        for ch in lo..=hi {
            let ch = u16::try_from(ch).map_err(|_| bad(item))?;
            // Only channels that also have a center frequency are accepted.
            if channel_to_freq(band, ch).is_none() {
                return Err(EntryError::OutOfRange {
                    value: ch as i64,
                    min: 1,
                    max: if band == Band::Band2G4 { 14 } else { 196 },
                });
            }
            channels.push(ch);
        }
    }
    Ok(channels)
}

/// A stated limit. The sentinel is reserved for "no entry".
fn parse_limit(s: &str) -> Result<i8, EntryError> {
    let limit = parse_i8(s)?;
    if limit == POWER_LEVEL_INVALID_VAL {
        return Err(EntryError::OutOfRange {
            value: limit as i64,
            min: i8::MIN as i64,
            max: POWER_LEVEL_INVALID_VAL as i64 - 1,
        });
    }
    Ok(limit)
}

fn parse_row(fields: &[&str]) -> Result<Vec<(Key, i8)>, EntryError> {
    let [band, bw, region, channels, limits] = fields else {
        return Err(EntryError::WrongLength {
            expected: 5,
            actual: fields.len(),
        });
    };
    let band = Band::parse(band).ok_or_else(|| EntryError::UnknownKey(band.to_string()))?;
    let bw = parse_int(bw)
        .ok()
        .and_then(|mhz| u16::try_from(mhz).ok())
        .and_then(Bandwidth::from_mhz)
        .ok_or_else(|| bad(bw))?;
    let region = region_index(region);
    let channels = parse_channels(band, channels)?;

    let limits = limits
        .split(',')
        .map(parse_limit)
        .collect::<Result<Vec<_>, _>>()?;
    let limits = match limits.len() {
        1 => vec![limits[0]; channels.len()],
        n if n == channels.len() => limits,
        n => {
            return Err(EntryError::WrongLength {
                expected: channels.len(),
                actual: n,
            });
        }
    };

    Ok(channels
        .into_iter()
        .zip(limits)
        .map(|(channel, limit)| {
            (
                Key {
                    band,
                    region,
                    channel,
                    bw,
                },
                limit,
            )
        })
        .collect())
}

impl PowerLimitTable {
    /// Parse a power-limit file. Bad rows are skipped and reported; later
    /// rows override earlier ones for the same key.
    pub fn parse(buffer: &[u8]) -> Result<(Self, ParseReport), ParseError> {
        let lines = lines_of(buffer, buffer.len())?;
        let mut table = Self::default();
        let mut report = ParseReport::default();

        for (number, raw) in lines {
            let Some(raw) = raw else {
                report.warn(number, WarningKind::Malformed);
                continue;
            };
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            match parse_row(&fields) {
                Ok(rows) => {
                    table.entries.extend(rows);
                    report.applied += 1;
                }
                Err(error) => report.warn(
                    number,
                    WarningKind::Entry {
                        key: fields.first().copied().unwrap_or_default().to_string(),
                        error,
                    },
                ),
            }
        }

        info!(
            rows = report.applied,
            entries = table.entries.len(),
            warnings = report.warnings.len(),
            "Power limit table parsed"
        );
        Ok((table, report))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Limit for a channel, or [`POWER_LEVEL_INVALID_VAL`].
    pub fn by_channel(&self, band: Band, channel: u16, bw: Bandwidth, region: u8) -> i8 {
        let key = Key {
            band,
            region,
            channel,
            bw,
        };
        self.entries
            .get(&key)
            .copied()
            .unwrap_or(POWER_LEVEL_INVALID_VAL)
    }

    /// Limit for a center frequency in MHz, or [`POWER_LEVEL_INVALID_VAL`].
    pub fn by_frequency(&self, band: Band, freq_mhz: u16, bw: Bandwidth, region: u8) -> i8 {
        match freq_to_channel(band, freq_mhz) {
            Some(channel) => self.by_channel(band, channel, bw, region),
            None => POWER_LEVEL_INVALID_VAL,
        }
    }

    /// Channel lookup with the band taken from the channel number.
    pub fn channel_power_limit(&self, channel: u16, region: u8, bw: Bandwidth) -> i8 {
        self.by_channel(Band::of_channel(channel), channel, bw, region)
    }

    /// Check every entry resolves to the same value by channel and by
    /// frequency.
    pub fn verify_channel_frequency_agreement(&self) -> Result<(), Disagreement> {
        for (key, &limit) in &self.entries {
            let by_frequency = match channel_to_freq(key.band, key.channel) {
                Some(freq) => self.by_frequency(key.band, freq, key.bw, key.region),
                None => POWER_LEVEL_INVALID_VAL,
            };
            if by_frequency != limit {
                return Err(Disagreement {
                    band: key.band,
                    channel: key.channel,
                    bw: key.bw,
                    region: key.region,
                    by_channel: limit,
                    by_frequency,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regulatory::RegionCode;

    const TABLE: &str = "\
# band bw region channels limits
2g4 20 FCC 1-11 20
2g4 40 FCC 3-9 18
2g4 20 ETSI 1-13 17
5g 20 FCC 36,40,44,48 17,17,16,16
5g 80 JP 36-48 14
";

    fn table() -> PowerLimitTable {
        let (table, report) = PowerLimitTable::parse(TABLE.as_bytes()).unwrap();
        assert!(!report.has_warnings(), "{:?}", report.warnings);
        table
    }

    #[test]
    fn test_present_entry_is_exact() {
        let t = table();
        let fcc = RegionCode::Fcc.index();
        assert_eq!(t.by_channel(Band::Band2G4, 6, Bandwidth::Bw20, fcc), 20);
        assert_eq!(t.by_channel(Band::Band2G4, 6, Bandwidth::Bw40, fcc), 18);
        assert_eq!(t.by_channel(Band::Band5G, 44, Bandwidth::Bw20, fcc), 16);
        assert_eq!(
            t.by_channel(Band::Band2G4, 13, Bandwidth::Bw20, RegionCode::Etsi.index()),
            17
        );
    }

    #[test]
    fn test_missing_entry_is_sentinel() {
        let t = table();
        let fcc = RegionCode::Fcc.index();
        // Channel 12 only exists for ETSI.
        assert_eq!(t.by_channel(Band::Band2G4, 12, Bandwidth::Bw20, fcc), 127);
        // No 80 MHz entries for FCC.
        assert_eq!(t.by_channel(Band::Band5G, 36, Bandwidth::Bw80, fcc), 127);
        assert_eq!(
            t.by_channel(Band::Band2G4, 1, Bandwidth::Bw20, RegionCode::Default.index()),
            POWER_LEVEL_INVALID_VAL
        );
        assert_eq!(
            PowerLimit::from(t.by_channel(Band::Band5G, 149, Bandwidth::Bw20, fcc)),
            PowerLimit::NoLimit
        );
    }

    #[test]
    fn test_frequency_lookup() {
        let t = table();
        let fcc = RegionCode::Fcc.index();
        assert_eq!(t.by_frequency(Band::Band2G4, 2437, Bandwidth::Bw20, fcc), 20);
        assert_eq!(t.by_frequency(Band::Band5G, 5200, Bandwidth::Bw20, fcc), 17);
        assert_eq!(t.by_frequency(Band::Band5G, 5201, Bandwidth::Bw20, fcc), 127);
        assert_eq!(
            t.by_frequency(Band::Band5G, 5220, Bandwidth::Bw80, RegionCode::Jp.index()),
            14
        );
    }

    #[test]
    fn test_channel_and_frequency_agree() {
        let t = table();
        assert!(t.verify_channel_frequency_agreement().is_ok());
        for region in RegionCode::ALL {
            for ch in 1..=14 {
                let freq = channel_to_freq(Band::Band2G4, ch).unwrap();
                assert_eq!(
                    t.by_channel(Band::Band2G4, ch, Bandwidth::Bw20, region.index()),
                    t.by_frequency(Band::Band2G4, freq, Bandwidth::Bw20, region.index())
                );
            }
        }
    }

    #[test]
    fn test_channel_power_limit_derives_band() {
        let t = table();
        let fcc = RegionCode::Fcc.index();
        assert_eq!(t.channel_power_limit(1, fcc, Bandwidth::Bw20), 20);
        assert_eq!(t.channel_power_limit(48, fcc, Bandwidth::Bw20), 16);
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let text = "\
2g4 20 FCC 1-3 20
2g4 25 FCC 1 20
2g4 20 FCC 15 20
5g 20 FCC 36,40 1,2,3
2g4 20 FCC
6g 20 FCC 1 10
";
        let (t, report) = PowerLimitTable::parse(text.as_bytes()).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.warnings.len(), 5);
        assert_eq!(report.warnings[0].line, 2);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_sentinel_is_not_a_stated_limit() {
        let text = "2g4 20 FCC 1 127\n2g4 20 FCC 2,3 126,127\n2g4 20 FCC 4 126\n";
        let (t, report) = PowerLimitTable::parse(text.as_bytes()).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.warnings.len(), 2);
        assert!(matches!(
            &report.warnings[0].kind,
            WarningKind::Entry {
                error: EntryError::OutOfRange { value: 127, max: 126, .. },
                ..
            }
        ));
        assert_eq!(t.len(), 1);
        let fcc = RegionCode::Fcc.index();
        assert_eq!(t.by_channel(Band::Band2G4, 4, Bandwidth::Bw20, fcc), 126);
        assert_eq!(
            PowerLimit::from(t.by_channel(Band::Band2G4, 1, Bandwidth::Bw20, fcc)),
            PowerLimit::NoLimit
        );
    }

    #[test]
    fn test_undecodable_line_skips_only_itself() {
        let buf = b"# r\xE9gion FCC\n2g4 20 F\xCCC 1 10\n2g4 20 FCC 1-11 20\n";
        let (t, report) = PowerLimitTable::parse(buf).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].line, 2);
        assert_eq!(report.warnings[0].kind, WarningKind::Malformed);
        assert_eq!(t.channel_power_limit(6, RegionCode::Fcc.index(), Bandwidth::Bw20), 20);
    }

    #[test]
    fn test_power_limit_helper() {
        assert_eq!(PowerLimit::from(127), PowerLimit::NoLimit);
        assert_eq!(PowerLimit::from(0), PowerLimit::Limit(0));
        assert_eq!(PowerLimit::NoLimit.unwrap_or(10), 10);
        assert_eq!(PowerLimit::NoLimit.raw(), POWER_LEVEL_INVALID_VAL);
    }

    #[test]
    fn test_table_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PowerLimitTable>();
    }
}
