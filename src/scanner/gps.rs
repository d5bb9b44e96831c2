//! Conversion of sexagesimal GPS coordinates to decimal degrees.

use crate::error::GpsParseError;

/// Parse `"deg/1 min/1 sec/100"` into decimal degrees.
pub fn parse_coordinate(coordinate: &str) -> Result<f64, GpsParseError> {
    let parts: Vec<&str> = coordinate.split_whitespace().collect();
    let [degrees, minutes, seconds] = parts.as_slice() else {
        return Err(GpsParseError::InvalidCoordinate(coordinate.to_string()));
    };

    Ok(dms_to_decimal(
        parse_fraction(degrees)?,
        parse_fraction(minutes)?,
        parse_fraction(seconds)?,
    ))
}

/// Parse `"numerator/denominator"`.
pub fn parse_fraction(fraction: &str) -> Result<f64, GpsParseError> {
    let invalid = || GpsParseError::InvalidFraction(fraction.to_string());

    let (numerator, denominator) = fraction.split_once('/').ok_or_else(invalid)?;
    let numerator: f64 = numerator.trim().parse().map_err(|_| invalid())?;
    let denominator: f64 = denominator.trim().parse().map_err(|_| invalid())?;

    if denominator == 0.0 {
        return Err(GpsParseError::ZeroDenominator(fraction.to_string()));
    }
    Ok(numerator / denominator)
}

/// Negate a coordinate for the southern or western hemisphere.
pub fn apply_hemisphere(value: f64, reference: Option<&str>) -> f64 {
    match reference.map(str::trim) {
        Some(r) if r.eq_ignore_ascii_case("S") || r.eq_ignore_ascii_case("W") => -value.abs(),
        _ => value,
    }
}

fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_coordinate() {
        let value = parse_coordinate("55/1 45/1 3600/100").unwrap();
        assert!(close(value, 55.0 + 45.0 / 60.0 + 36.0 / 3600.0));
    }

    #[test]
    fn test_wrong_part_count() {
        assert_eq!(
            parse_coordinate("55/1 45/1"),
            Err(GpsParseError::InvalidCoordinate("55/1 45/1".to_string()))
        );
    }

    #[test]
    fn test_malformed_fraction() {
        assert!(matches!(
            parse_coordinate("55 45/1 0/1"),
            Err(GpsParseError::InvalidFraction(_))
        ));
        assert!(matches!(
            parse_fraction("a/b"),
            Err(GpsParseError::InvalidFraction(_))
        ));
        assert!(matches!(
            parse_fraction("1/0"),
            Err(GpsParseError::ZeroDenominator(_))
        ));
    }

    #[test]
    fn test_apply_hemisphere() {
        assert!(close(apply_hemisphere(10.5, Some("S")), -10.5));
        assert!(close(apply_hemisphere(10.5, Some("W")), -10.5));
        assert!(close(apply_hemisphere(10.5, Some("N")), 10.5));
        assert!(close(apply_hemisphere(10.5, None), 10.5));
    }
}
