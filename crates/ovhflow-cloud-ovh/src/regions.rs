//! Failover IP geolocation to region compatibility

const EUROPE: &[&str] = &["GRA1", "SBG1"];
const NORTH_AMERICA: &[&str] = &["BHS1"];

/// Regions in which a failover IP with the given geolocation can be routed.
///
/// Unknown geolocations yield an empty slice.
pub fn regions_for_geolocation(geoloc: &str) -> &'static [&'static str] {
    match geoloc.to_ascii_uppercase().as_str() {
        "BE" | "CZ" | "FI" | "FR" | "DE" | "IE" | "IT" | "LT" | "NL" | "PL" | "PT" | "ES"
        | "UK" => EUROPE,
        "CA" | "US" => NORTH_AMERICA,
        _ => &[],
    }
}

pub fn is_region_compatible(geoloc: &str, region: &str) -> bool {
    regions_for_geolocation(geoloc).contains(&region)
}
