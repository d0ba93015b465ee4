//! Regulatory region resolution.
//!
//! Country codes collapse into a handful of regulatory regions; the region
//! index then keys into the power-limit tables.

pub mod channel;
pub mod power_limit;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use channel::{Band, Bandwidth, channel_to_freq, freq_to_channel};
pub use power_limit::{POWER_LEVEL_INVALID_VAL, PowerLimit, PowerLimitTable};

/// Coarse regulatory domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RegionCode {
    Srrc = 0,
    Fcc = 1,
    Etsi = 2,
    Jp = 3,
    Default = 4,
}

impl RegionCode {
    pub const ALL: [RegionCode; 5] = [
        RegionCode::Srrc,
        RegionCode::Fcc,
        RegionCode::Etsi,
        RegionCode::Jp,
        RegionCode::Default,
    ];

    /// Index of this region in the power-limit tables.
    pub const fn index(&self) -> u8 {
        *self as u8
    }

    pub const fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(Self::Srrc),
            1 => Some(Self::Fcc),
            2 => Some(Self::Etsi),
            3 => Some(Self::Jp),
            4 => Some(Self::Default),
            _ => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            RegionCode::Srrc => "SRRC",
            RegionCode::Fcc => "FCC",
            RegionCode::Etsi => "ETSI",
            RegionCode::Jp => "JP",
            RegionCode::Default => "DEFAULT",
        }
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Country code -> region. Anything not listed is DEFAULT.
const CCODE_REGIONS: &[(&str, RegionCode)] = &[
    ("CN", RegionCode::Srrc),
    ("US", RegionCode::Fcc),
    ("CA", RegionCode::Fcc),
    ("MX", RegionCode::Fcc),
    ("TW", RegionCode::Fcc),
    ("PR", RegionCode::Fcc),
    ("GU", RegionCode::Fcc),
    ("AS", RegionCode::Fcc),
    ("VI", RegionCode::Fcc),
    ("JP", RegionCode::Jp),
    ("AT", RegionCode::Etsi),
    ("BE", RegionCode::Etsi),
    ("BG", RegionCode::Etsi),
    ("CH", RegionCode::Etsi),
    ("CY", RegionCode::Etsi),
    ("CZ", RegionCode::Etsi),
    ("DE", RegionCode::Etsi),
    ("DK", RegionCode::Etsi),
    ("EE", RegionCode::Etsi),
    ("ES", RegionCode::Etsi),
    ("FI", RegionCode::Etsi),
    ("FR", RegionCode::Etsi),
    ("GB", RegionCode::Etsi),
    ("GR", RegionCode::Etsi),
    ("HR", RegionCode::Etsi),
    ("HU", RegionCode::Etsi),
    ("IE", RegionCode::Etsi),
    ("IS", RegionCode::Etsi),
    ("IT", RegionCode::Etsi),
    ("LI", RegionCode::Etsi),
    ("LT", RegionCode::Etsi),
    ("LU", RegionCode::Etsi),
    ("LV", RegionCode::Etsi),
    ("MT", RegionCode::Etsi),
    ("NL", RegionCode::Etsi),
    ("NO", RegionCode::Etsi),
    ("PL", RegionCode::Etsi),
    ("PT", RegionCode::Etsi),
    ("RO", RegionCode::Etsi),
    ("SE", RegionCode::Etsi),
    ("SI", RegionCode::Etsi),
    ("SK", RegionCode::Etsi),
];

/// Region for an ISO country code.
///
/// Exact, case-sensitive match. Unknown codes map to
/// [`RegionCode::Default`]; a missing regulatory identity must not block
/// bring-up.
pub fn region_for(country_code: &str) -> RegionCode {
    CCODE_REGIONS
        .iter()
        .find(|(cc, _)| *cc == country_code)
        .map(|(_, region)| *region)
        .unwrap_or(RegionCode::Default)
}

/// Region for a region name as written in power-limit files.
pub fn region_by_name(name: &str) -> RegionCode {
    RegionCode::ALL
        .iter()
        .copied()
        .find(|r| r.name() == name)
        .unwrap_or(RegionCode::Default)
}

/// Power-limit table index for a region name.
pub fn region_index(name: &str) -> u8 {
    region_by_name(name).index()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_country_codes() {
        assert_eq!(region_for("CN"), RegionCode::Srrc);
        assert_eq!(region_for("US"), RegionCode::Fcc);
        assert_eq!(region_for("DE"), RegionCode::Etsi);
        assert_eq!(region_for("GB"), RegionCode::Etsi);
        assert_eq!(region_for("JP"), RegionCode::Jp);
    }

    #[test]
    fn test_unknown_and_case_mismatch_default() {
        assert_eq!(region_for("ZZ"), RegionCode::Default);
        assert_eq!(region_for(""), RegionCode::Default);
        assert_eq!(region_for("us"), RegionCode::Default);
        assert_eq!(region_for("USA"), RegionCode::Default);
    }

    #[test]
    fn test_region_index() {
        assert_eq!(region_index("SRRC"), 0);
        assert_eq!(region_index("FCC"), 1);
        assert_eq!(region_index("ETSI"), 2);
        assert_eq!(region_index("JP"), 3);
        assert_eq!(region_index("KCC"), 4);
        for region in RegionCode::ALL {
            assert_eq!(RegionCode::from_index(region.index()), Some(region));
        }
    }
}
