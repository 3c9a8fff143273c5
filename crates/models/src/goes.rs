/// GOES satellites with public imagery in the NOAA object store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Satellite {
    #[serde(rename = "GOES-16")]
    Goes16,
    #[serde(rename = "GOES-18")]
    Goes18,
    #[serde(rename = "GOES-19")]
    Goes19,
}

impl Satellite {
    pub const ALL: [Satellite; 3] = [Satellite::Goes16, Satellite::Goes18, Satellite::Goes19];

    pub fn as_str(&self) -> &'static str {
        match self {
            Satellite::Goes16 => "GOES-16",
            Satellite::Goes18 => "GOES-18",
            Satellite::Goes19 => "GOES-19",
        }
    }
}

impl std::fmt::Display for Satellite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Satellite {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GOES-16" => Ok(Satellite::Goes16),
            "GOES-18" => Ok(Satellite::Goes18),
            "GOES-19" => Ok(Satellite::Goes19),
            other => Err(ParseError::Satellite(other.to_string())),
        }
    }
}

impl TryFrom<String> for Satellite {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Geographic scan coverage of the ABI instrument.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Sector {
    FullDisk,
    #[serde(rename = "CONUS")]
    Conus,
    Mesoscale1,
    Mesoscale2,
}

impl Sector {
    pub const ALL: [Sector; 4] = [
        Sector::FullDisk,
        Sector::Conus,
        Sector::Mesoscale1,
        Sector::Mesoscale2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::FullDisk => "FullDisk",
            Sector::Conus => "CONUS",
            Sector::Mesoscale1 => "Mesoscale1",
            Sector::Mesoscale2 => "Mesoscale2",
        }
    }

    /// Nominal scan cadence of this sector, in minutes.
    pub fn cadence_minutes(&self) -> u32 {
        match self {
            Sector::FullDisk => 10,
            Sector::Conus => 5,
            Sector::Mesoscale1 | Sector::Mesoscale2 => 1,
        }
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sector {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FullDisk" => Ok(Sector::FullDisk),
            "CONUS" => Ok(Sector::Conus),
            "Mesoscale1" => Ok(Sector::Mesoscale1),
            "Mesoscale2" => Ok(Sector::Mesoscale2),
            other => Err(ParseError::Sector(other.to_string())),
        }
    }
}

impl TryFrom<String> for Sector {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One of the sixteen ABI spectral channels, C01 through C16.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Band(u8);

impl Band {
    pub fn new(channel: u8) -> Result<Self, ParseError> {
        if (1..=16).contains(&channel) {
            Ok(Self(channel))
        } else {
            Err(ParseError::Band(format!("C{channel:02}")))
        }
    }

    pub fn channel(&self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Band> {
        (1..=16).map(Band)
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{:02}", self.0)
    }
}

impl std::fmt::Debug for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::str::FromStr for Band {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "GEOCOLOR" {
            return Err(ParseError::Geocolor);
        }
        let digits = s
            .strip_prefix('C')
            .and_then(|d| d.parse::<u8>().ok())
            .ok_or_else(|| ParseError::Band(s.to_string()))?;
        Band::new(digits).map_err(|_| ParseError::Band(s.to_string()))
    }
}

impl TryFrom<String> for Band {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl serde::Serialize for Band {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Band {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let s = std::borrow::Cow::<'de, str>::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unknown satellite {0:?}; valid satellites are GOES-16, GOES-18, GOES-19")]
    Satellite(String),
    #[error("unknown sector {0:?}; valid sectors are FullDisk, CONUS, Mesoscale1, Mesoscale2")]
    Sector(String),
    #[error("unknown band {0:?}; valid bands are C01 through C16")]
    Band(String),
    #[error(
        "GEOCOLOR is a pre-rendered composite available via CDN only and cannot \
         be fetched from S3; use bands C01-C16"
    )]
    Geocolor,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn satellite_and_sector_round_trip() {
        for sat in Satellite::ALL {
            assert_eq!(sat.as_str().parse::<Satellite>().unwrap(), sat);
        }
        for sector in Sector::ALL {
            assert_eq!(sector.as_str().parse::<Sector>().unwrap(), sector);
        }
    }

    #[test]
    fn band_parses_and_formats() {
        let band: Band = "C02".parse().unwrap();
        assert_eq!(band.channel(), 2);
        assert_eq!(band.to_string(), "C02");
        assert_eq!(Band::all().count(), 16);

        assert!("C00".parse::<Band>().is_err());
        assert!("C17".parse::<Band>().is_err());
        assert!("02".parse::<Band>().is_err());
    }

    #[test]
    fn geocolor_is_rejected_with_cdn_hint() {
        let err = "GEOCOLOR".parse::<Band>().unwrap_err();
        assert!(err.to_string().contains("CDN"));
    }

    #[test]
    fn band_json_uses_channel_string() {
        let band: Band = serde_json::from_str("\"C13\"").unwrap();
        assert_eq!(serde_json::to_string(&band).unwrap(), "\"C13\"");
    }

    #[test]
    fn sector_cadences() {
        assert_eq!(Sector::FullDisk.cadence_minutes(), 10);
        assert_eq!(Sector::Conus.cadence_minutes(), 5);
        assert_eq!(Sector::Mesoscale1.cadence_minutes(), 1);
    }
}
