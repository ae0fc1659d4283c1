/// Station registry for the bloom forecasting service.
///
/// Defines the canonical list of observation stations whose data force the
/// ocean model, along with their metadata. This is the single source of
/// truth for station identifiers — the configuration file is validated
/// against it so a typo fails at load time rather than as a silent empty
/// download.

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// Which web service a station belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationKind {
    /// Hourly meteorological / wind records from the climate data service.
    Climate,
    /// Sub-daily discharge readings from the river gauge service.
    RiverGauge,
}

/// Metadata for a single observation station.
pub struct Station {
    /// Identifier used in web service requests.
    pub station_id: &'static str,
    /// Official station name.
    pub name: &'static str,
    pub kind: StationKind,
    /// Human-readable description of the station's role in the forecast.
    pub description: &'static str,
}

/// All stations used to build forcing data, main forcing sources first.
pub static STATION_REGISTRY: &[Station] = &[
    Station {
        station_id: "6831",
        name: "Sandheads CS",
        kind: StationKind::Climate,
        description: "Lightstation at the river mouth in the middle of the \
                      strait. Sole source of over-water wind velocity; the \
                      date of its last complete day sets the forcing data \
                      date for the whole run.",
    },
    Station {
        station_id: "889",
        name: "Vancouver Intl Airport",
        kind: StationKind::Climate,
        description: "Airport station on the strait's eastern shore. Source \
                      of air temperature, relative humidity, and the weather \
                      descriptions mapped to cloud fraction.",
    },
    Station {
        station_id: "08MF005",
        name: "Fraser River at Hope",
        kind: StationKind::RiverGauge,
        description: "Major river gauge. Dominates the freshwater flux into \
                      the strait.",
    },
    Station {
        station_id: "08HB002",
        name: "Englishman River near Parksville",
        kind: StationKind::RiverGauge,
        description: "Substitute gauge for the minor rivers of the strait's \
                      western shore; scaled by a configured factor to stand \
                      in for the discontinued aggregate gauge.",
    },
];

/// Looks up a station by identifier. Returns `None` if not found.
pub fn find_station(station_id: &str) -> Option<&'static Station> {
    STATION_REGISTRY.iter().find(|s| s.station_id == station_id)
}

/// Checks that a station id is registered with the expected kind.
pub fn is_registered(station_id: &str, kind: StationKind) -> bool {
    find_station(station_id).map(|s| s.kind == kind).unwrap_or(false)
}

/// Returns the ids of all registered stations of one kind.
pub fn station_ids(kind: StationKind) -> Vec<&'static str> {
    STATION_REGISTRY
        .iter()
        .filter(|s| s.kind == kind)
        .map(|s| s.station_id)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_duplicate_station_ids() {
        let mut seen = std::collections::HashSet::new();
        for station in STATION_REGISTRY {
            assert!(
                seen.insert(station.station_id),
                "duplicate station id '{}' found in STATION_REGISTRY",
                station.station_id
            );
        }
    }

    #[test]
    fn test_climate_station_ids_are_numeric() {
        // The climate service addresses stations by numeric id; a
        // non-numeric entry would be silently dropped from its response.
        for station in STATION_REGISTRY {
            if station.kind == StationKind::Climate {
                assert!(
                    station.station_id.chars().all(|c| c.is_ascii_digit()),
                    "climate station id for '{}' should be numeric, got '{}'",
                    station.name,
                    station.station_id
                );
            }
        }
    }

    #[test]
    fn test_river_gauge_ids_have_water_survey_format() {
        // Gauge ids are 2 digits + 2 letters + 3 digits, e.g. 08MF005.
        for station in STATION_REGISTRY {
            if station.kind == StationKind::RiverGauge {
                let id = station.station_id;
                assert_eq!(id.len(), 7, "gauge id '{}' should be 7 characters", id);
                assert!(id[..2].chars().all(|c| c.is_ascii_digit()));
                assert!(id[2..4].chars().all(|c| c.is_ascii_uppercase()));
                assert!(id[4..].chars().all(|c| c.is_ascii_digit()));
            }
        }
    }

    #[test]
    fn test_find_station_returns_correct_entry() {
        let station = find_station("6831").expect("Sandheads should be in registry");
        assert_eq!(station.kind, StationKind::Climate);
        assert!(station.name.contains("Sandheads"));
    }

    #[test]
    fn test_find_station_returns_none_for_unknown_id() {
        assert!(find_station("0000000").is_none());
    }

    #[test]
    fn test_is_registered_checks_kind_as_well_as_id() {
        assert!(is_registered("08MF005", StationKind::RiverGauge));
        assert!(!is_registered("08MF005", StationKind::Climate));
    }

    #[test]
    fn test_station_ids_filters_by_kind() {
        let climate = station_ids(StationKind::Climate);
        let gauges = station_ids(StationKind::RiverGauge);
        assert_eq!(climate.len() + gauges.len(), STATION_REGISTRY.len());
        assert!(climate.contains(&"889"));
        assert!(gauges.contains(&"08HB002"));
    }
}
