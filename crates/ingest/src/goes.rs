//! GOES-R series naming: buckets, ABI L2 CMIP products, object-key parsing,
//! and satellite availability metadata.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use models::{Band, Satellite, Sector};

pub fn bucket(satellite: Satellite) -> &'static str {
    match satellite {
        Satellite::Goes16 => "noaa-goes16",
        Satellite::Goes18 => "noaa-goes18",
        Satellite::Goes19 => "noaa-goes19",
    }
}

/// Sector → ABI L2 Cloud & Moisture Imagery product.
pub fn product(sector: Sector) -> &'static str {
    match sector {
        Sector::FullDisk => "ABI-L2-CMIPF",
        Sector::Conus => "ABI-L2-CMIPC",
        Sector::Mesoscale1 | Sector::Mesoscale2 => "ABI-L2-CMIPM",
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Availability {
    pub available_from: &'static str,
    pub available_to: Option<&'static str>,
    pub status: &'static str,
    pub description: &'static str,
}

/// Static availability windows, used to explain empty listings for
/// historical satellites.
pub fn availability(satellite: Satellite) -> Availability {
    match satellite {
        Satellite::Goes16 => Availability {
            available_from: "2017-01-01",
            available_to: Some("2025-04-07"),
            status: "historical",
            description: "GOES-East (historical, replaced by GOES-19)",
        },
        Satellite::Goes18 => Availability {
            available_from: "2022-01-01",
            available_to: None,
            status: "active",
            description: "GOES-West (active)",
        },
        Satellite::Goes19 => Availability {
            available_from: "2024-01-01",
            available_to: None,
            status: "active",
            description: "GOES-East (active, replaced GOES-16)",
        },
    }
}

pub fn band_description(band: Band) -> &'static str {
    match band.channel() {
        1 => "Blue (0.47µm)",
        2 => "Red (0.64µm)",
        3 => "Veggie (0.86µm)",
        4 => "Cirrus (1.37µm)",
        5 => "Snow/Ice (1.61µm)",
        6 => "Cloud Particle (2.24µm)",
        7 => "Shortwave IR (3.9µm)",
        8 => "Upper-level WV (6.2µm)",
        9 => "Mid-level WV (6.9µm)",
        10 => "Lower-level WV (7.3µm)",
        11 => "Cloud-top Phase (8.4µm)",
        12 => "Ozone (9.6µm)",
        13 => "Clean IR (10.3µm)",
        14 => "IR (11.2µm)",
        15 => "Dirty IR (12.3µm)",
        16 => "CO2 (13.3µm)",
        _ => unreachable!("bands are validated on construction"),
    }
}

/// Key prefix for one UTC hour: `{product}/{year}/{doy:03}/{hour:02}/`.
pub fn hour_prefix(sector: Sector, hour: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{:03}/{:02}/",
        product(sector),
        hour.year(),
        hour.ordinal(),
        hour.hour()
    )
}

/// Every hour prefix overlapping `[start, end]`, in order.
pub fn hour_prefixes(sector: Sector, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut current = start
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(start);
    let end_ceil = end
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(end)
        + Duration::hours(1);

    while current < end_ceil {
        prefixes.push(hour_prefix(sector, current));
        current += Duration::hours(1);
    }
    prefixes
}

/// Extract the scan-start timestamp from an object key. Keys embed
/// `_sYYYYDOYHHMMSSx` where the trailing digit is tenths of a second.
pub fn parse_scan_time(key: &str) -> Option<DateTime<Utc>> {
    let (_, rest) = key.split_once("_s")?;
    if rest.len() < 14 || !rest.as_bytes()[..14].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let year: i32 = rest[0..4].parse().ok()?;
    let doy: u32 = rest[4..7].parse().ok()?;
    let hour: u32 = rest[7..9].parse().ok()?;
    let minute: u32 = rest[9..11].parse().ok()?;
    let second: u32 = rest[11..13].parse().ok()?;

    let date = chrono::NaiveDate::from_yo_opt(year, doy)?;
    let time = chrono::NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Filename filter: band marker `-M{3,4,6}C{band}_` must match, and for the
/// mesoscale sectors the product code distinguishes `CMIPM1` from `CMIPM2`.
pub fn matches_sector_and_band(key: &str, sector: Sector, band: Band) -> bool {
    let filename = key.rsplit('/').next().unwrap_or(key);

    let band_found = ["M3", "M4", "M6"]
        .iter()
        .any(|mode| filename.contains(&format!("-{mode}{band}_")));
    if !band_found {
        return false;
    }

    match sector {
        Sector::Mesoscale1 => filename.contains("CMIPM1"),
        Sector::Mesoscale2 => filename.contains("CMIPM2"),
        _ => true,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CONUS_KEY: &str = "ABI-L2-CMIPC/2024/166/12/OR_ABI-L2-CMIPC-M6C02_G19_s20241661200210_e20241661202583_c20241661203088.nc";

    #[test]
    fn scan_time_round_trips_byte_for_byte() {
        // s2024166120021 → 2024-06-14T12:00:21Z (day 166 of a leap year).
        let parsed = parse_scan_time(CONUS_KEY).unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2024, 6, 14, 12, 0, 21).unwrap()
        );
    }

    #[test]
    fn scan_time_rejects_malformed_keys() {
        assert!(parse_scan_time("no-timestamp-here.nc").is_none());
        assert!(parse_scan_time("OR_ABI_sABCDEFGHIJKLMN_x.nc").is_none());
        assert!(parse_scan_time("OR_ABI_s2024").is_none());
    }

    #[test]
    fn band_marker_must_match() {
        let band2: Band = "C02".parse().unwrap();
        let band13: Band = "C13".parse().unwrap();
        assert!(matches_sector_and_band(CONUS_KEY, Sector::Conus, band2));
        assert!(!matches_sector_and_band(CONUS_KEY, Sector::Conus, band13));
    }

    #[test]
    fn mesoscale_product_code_discriminates_sectors() {
        let m1_key = "ABI-L2-CMIPM/2024/166/12/OR_ABI-L2-CMIPM1-M6C02_G19_s20241661200210_e20241661200273_c20241661200341.nc";
        let band: Band = "C02".parse().unwrap();
        assert!(matches_sector_and_band(m1_key, Sector::Mesoscale1, band));
        assert!(!matches_sector_and_band(m1_key, Sector::Mesoscale2, band));

        let m2_key = m1_key.replace("CMIPM1", "CMIPM2");
        assert!(matches_sector_and_band(&m2_key, Sector::Mesoscale2, band));
        assert!(!matches_sector_and_band(&m2_key, Sector::Mesoscale1, band));
    }

    #[test]
    fn hour_prefix_layout() {
        let hour = Utc.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).unwrap();
        assert_eq!(
            hour_prefix(Sector::FullDisk, hour),
            "ABI-L2-CMIPF/2024/166/12/"
        );
    }

    #[test]
    fn hour_prefixes_cover_the_window_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 6, 14, 12, 10, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 14, 14, 5, 0).unwrap();
        let prefixes = hour_prefixes(Sector::Conus, start, end);
        assert_eq!(
            prefixes,
            vec![
                "ABI-L2-CMIPC/2024/166/12/",
                "ABI-L2-CMIPC/2024/166/13/",
                "ABI-L2-CMIPC/2024/166/14/",
            ]
        );
    }
}
