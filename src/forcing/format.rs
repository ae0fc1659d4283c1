/// Forcing file line rendering.
///
/// Renders finished (trimmed, patched) series into the fixed-column text
/// grammars the simulation reads. Formatters are lazy iterators producing
/// one line at a time, in chronological order, with no reordering or
/// filtering; lines carry no trailing newline — the writer owns that.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::model::WindComponents;

// ---------------------------------------------------------------------------
// Meteorological quantities: one line per day, 24 hourly values
// ---------------------------------------------------------------------------

/// `<station_id> <YYYY> <MM> <DD> 42` followed by 24 space-separated values
/// with 2 decimal places. The station id and the quantity id 42 are carried
/// in the file grammar but not read by the simulation.
pub fn meteo_lines<'a>(
    station_id: &'a str,
    samples: &'a [(NaiveDateTime, f64)],
) -> impl Iterator<Item = String> + 'a {
    samples.chunks_exact(24).map(move |day| {
        let timestamp = day[0].0;
        let mut line = format!(
            "{} {} 42",
            station_id,
            timestamp.format("%Y %m %d")
        );
        for (_, value) in day {
            line.push_str(&format!(" {:.2}", value));
        }
        line
    })
}

// ---------------------------------------------------------------------------
// Wind: one line per hour
// ---------------------------------------------------------------------------

/// `<DD> <MM> <YYYY> <hour.1> <cross.6> <along.6>`.
pub fn wind_lines(
    samples: &[(NaiveDateTime, WindComponents)],
) -> impl Iterator<Item = String> + '_ {
    samples.iter().map(|(timestamp, wind)| {
        format!(
            "{} {:.1} {:.6} {:.6}",
            timestamp.format("%d %m %Y"),
            timestamp.hour() as f64,
            wind.cross,
            wind.along
        )
    })
}

// ---------------------------------------------------------------------------
// River flow: one line per day
// ---------------------------------------------------------------------------

/// `<YYYY> <MM> <DD> <flow>` with the flow in 6-significant-digit
/// scientific notation.
pub fn river_lines(samples: &[(NaiveDate, f64)]) -> impl Iterator<Item = String> + '_ {
    samples.iter().map(|(date, flow)| {
        format!("{} {}", date.format("%Y %m %d"), format_scientific(*flow))
    })
}

/// C-style `%e` rendering: 6 fractional digits in the mantissa and a
/// signed 2-digit exponent, e.g. `4.200000e+03`. Rust's `{:e}` drops
/// trailing zeros and pads nothing, so this is done by hand.
pub fn format_scientific(value: f64) -> String {
    if value == 0.0 {
        return "0.000000e+00".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();
    let mut exponent = magnitude.log10().floor() as i32;
    let mut mantissa = magnitude / 10f64.powi(exponent);
    if mantissa < 1.0 {
        mantissa *= 10.0;
        exponent -= 1;
    }
    // Rounding the mantissa to 6 places can carry it up to 10.0
    if mantissa + 5e-7 >= 10.0 {
        mantissa /= 10.0;
        exponent += 1;
    }
    let exp_sign = if exponent < 0 { '-' } else { '+' };
    format!("{}{:.6}e{}{:02}", sign, mantissa, exp_sign, exponent.abs())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn hour_of(y: i32, mo: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    // --- Meteo ---------------------------------------------------------------

    #[test]
    fn test_meteo_line_matches_grammar_byte_for_byte() {
        let samples: Vec<(NaiveDateTime, f64)> =
            (0..24).map(|h| (hour_of(2025, 9, 25, h), 215.0)).collect();
        let line = meteo_lines("889", &samples).next().unwrap();
        let expected = format!("889 2025 09 25 42{}", " 215.00".repeat(24));
        assert_eq!(line, expected);
    }

    #[test]
    fn test_meteo_lines_one_per_whole_day() {
        let mut samples = Vec::new();
        for d in 25..=26 {
            for h in 0..24 {
                samples.push((hour_of(2025, 9, d, h), 10.0));
            }
        }
        let lines: Vec<String> = meteo_lines("889", &samples).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("889 2025 09 25 42"));
        assert!(lines[1].starts_with("889 2025 09 26 42"));
    }

    // --- Wind ----------------------------------------------------------------

    #[test]
    fn test_wind_line_matches_grammar_byte_for_byte() {
        let samples = vec![(
            hour_of(2025, 9, 25, 9),
            WindComponents { cross: 1.0, along: 2.0 },
        )];
        let line = wind_lines(&samples).next().unwrap();
        assert_eq!(line, "25 09 2025 9.0 1.000000 2.000000");
    }

    #[test]
    fn test_wind_line_round_trips_to_stated_precision() {
        let samples = vec![(
            hour_of(2025, 12, 3, 23),
            WindComponents { cross: -3.141593, along: 0.000001 },
        )];
        let line = wind_lines(&samples).next().unwrap();
        let fields: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[0].parse::<u32>().unwrap(), 3);
        assert_eq!(fields[1].parse::<u32>().unwrap(), 12);
        assert_eq!(fields[2].parse::<i32>().unwrap(), 2025);
        assert_eq!(fields[3].parse::<f64>().unwrap(), 23.0);
        assert_eq!(fields[4].parse::<f64>().unwrap(), -3.141593);
        assert_eq!(fields[5].parse::<f64>().unwrap(), 0.000001);
    }

    // --- River ---------------------------------------------------------------

    #[test]
    fn test_river_line_matches_grammar_byte_for_byte() {
        let samples = vec![(NaiveDate::from_ymd_opt(2025, 9, 27).unwrap(), 4200.0)];
        let line = river_lines(&samples).next().unwrap();
        assert_eq!(line, "2025 09 27 4.200000e+03");
    }

    #[test]
    fn test_format_scientific_cases() {
        assert_eq!(format_scientific(4200.0), "4.200000e+03");
        assert_eq!(format_scientific(4300.0), "4.300000e+03");
        assert_eq!(format_scientific(0.0), "0.000000e+00");
        assert_eq!(format_scientific(1.0), "1.000000e+00");
        assert_eq!(format_scientific(-351.5), "-3.515000e+02");
        assert_eq!(format_scientific(0.0042), "4.200000e-03");
    }

    #[test]
    fn test_format_scientific_mantissa_carry() {
        // 9.9999996 rounds up to 10.000000, which must carry into the
        // exponent instead.
        assert_eq!(format_scientific(9.9999996), "1.000000e+01");
    }
}
