//! Band, bandwidth and channel/frequency conversion.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    /// 2.4 GHz
    Band2G4,
    /// 5 GHz
    Band5G,
}

impl Band {
    /// Band a channel number belongs to (1..=14 is 2.4 GHz).
    pub fn of_channel(channel: u16) -> Self {
        if channel <= 14 { Band::Band2G4 } else { Band::Band5G }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "2g4" | "2.4G" | "2.4g" => Some(Band::Band2G4),
            "5g" | "5G" => Some(Band::Band5G),
            _ => None,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Band2G4 => write!(f, "2.4GHz"),
            Band::Band5G => write!(f, "5GHz"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bandwidth {
    Bw20,
    Bw40,
    Bw80,
}

impl Bandwidth {
    pub fn mhz(&self) -> u16 {
        match self {
            Bandwidth::Bw20 => 20,
            Bandwidth::Bw40 => 40,
            Bandwidth::Bw80 => 80,
        }
    }

    pub fn from_mhz(mhz: u16) -> Option<Self> {
        match mhz {
            20 => Some(Bandwidth::Bw20),
            40 => Some(Bandwidth::Bw40),
            80 => Some(Bandwidth::Bw80),
            _ => None,
        }
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MHz", self.mhz())
    }
}

/// Center frequency (MHz) of `channel` in `band`.
pub fn channel_to_freq(band: Band, channel: u16) -> Option<u16> {
    match band {
        Band::Band2G4 => match channel {
            14 => Some(2484),
            1..=13 => Some(2407 + channel * 5),
            _ => None,
        },
        Band::Band5G => match channel {
            1..=196 => Some(5000 + channel * 5),
            _ => None,
        },
    }
}

/// Channel number of center frequency `freq` (MHz) in `band`.
pub fn freq_to_channel(band: Band, freq: u16) -> Option<u16> {
    match band {
        Band::Band2G4 => match freq {
            2484 => Some(14),
            2412..=2472 if (freq - 2407) % 5 == 0 => Some((freq - 2407) / 5),
            _ => None,
        },
        Band::Band5G => match freq {
            5005..=5980 if freq % 5 == 0 => Some((freq - 5000) / 5),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_2g4_conversion() {
        assert_eq!(channel_to_freq(Band::Band2G4, 1), Some(2412));
        assert_eq!(channel_to_freq(Band::Band2G4, 13), Some(2472));
        assert_eq!(channel_to_freq(Band::Band2G4, 14), Some(2484));
        assert_eq!(channel_to_freq(Band::Band2G4, 15), None);
        assert_eq!(freq_to_channel(Band::Band2G4, 2437), Some(6));
        assert_eq!(freq_to_channel(Band::Band2G4, 2484), Some(14));
        assert_eq!(freq_to_channel(Band::Band2G4, 2413), None);
    }

    #[test]
    fn test_5g_conversion() {
        assert_eq!(channel_to_freq(Band::Band5G, 36), Some(5180));
        assert_eq!(channel_to_freq(Band::Band5G, 165), Some(5825));
        assert_eq!(freq_to_channel(Band::Band5G, 5180), Some(36));
        assert_eq!(freq_to_channel(Band::Band5G, 5745), Some(149));
        assert_eq!(freq_to_channel(Band::Band5G, 2412), None);
    }

    #[test]
    fn test_band_of_channel() {
        assert_eq!(Band::of_channel(14), Band::Band2G4);
        assert_eq!(Band::of_channel(36), Band::Band5G);
    }
}
