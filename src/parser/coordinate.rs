use crate::models::Coordinate;
use regex_lite::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn width(&self) -> usize {
        match self {
            Axis::Latitude => 5,
            Axis::Longitude => 6,
        }
    }

    fn hemispheres(&self) -> &'static str {
        match self {
            Axis::Latitude => "'N' or 'S'",
            Axis::Longitude => "'E' or 'W'",
        }
    }
}

/// Accepted region as `[min_lon, min_lat, max_lon, max_lat]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min_lon: -180.0,
            min_lat: -90.0,
            max_lon: 180.0,
            max_lat: 90.0,
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([min_lon, min_lat, max_lon, max_lat]: [f64; 4]) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }
}

impl BoundingBox {
    fn range(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::Latitude => (self.min_lat, self.max_lat),
            Axis::Longitude => (self.min_lon, self.max_lon),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("Unrecognized hemisphere '{found}', expecting {expected}")]
    Hemisphere { found: String, expected: &'static str },

    #[error("Expected degrees and minutes in '{0}'")]
    MissingTokens(String),

    #[error("String conversion failed for '{0}'")]
    InvalidNumber(String),

    #[error("Degrees out of range ({degrees}, allowed {min} to {max})")]
    DegreesOutOfRange { degrees: f64, min: f64, max: f64 },

    #[error("Minutes out of range ({0})")]
    MinutesOutOfRange(f64),
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[+-]?\d+\.?\d*").expect("number pattern is valid"))
}

/// Numeric tokens in order of appearance.
pub(crate) fn numeric_tokens(text: &str) -> impl Iterator<Item = &str> {
    number_pattern().find_iter(text).map(|m| m.as_str())
}

/// Parse a header line such as `* NMEA Latitude = 27 59.54 N`.
///
/// The first two numeric tokens are degrees and minutes and the final
/// character is the hemisphere. Whole degrees, signed by hemisphere, must lie
/// within `bounds` for the axis and minutes must lie in `[0, 60)`.
pub fn parse_coordinate(
    line: &str,
    axis: Axis,
    bounds: &BoundingBox,
) -> Result<Coordinate, CoordinateError> {
    let line = line.trim();

    let mut tokens = numeric_tokens(line);
    let (degrees_text, minutes_text) = match (tokens.next(), tokens.next()) {
        (Some(degrees), Some(minutes)) => (degrees, minutes),
        _ => return Err(CoordinateError::MissingTokens(line.to_string())),
    };

    let hemisphere = line.chars().last().unwrap_or(' ');
    let factor = match (axis, hemisphere) {
        (Axis::Latitude, 'N') | (Axis::Longitude, 'E') => 1.0,
        (Axis::Latitude, 'S') | (Axis::Longitude, 'W') => -1.0,
        _ => {
            return Err(CoordinateError::Hemisphere {
                found: hemisphere.to_string(),
                expected: axis.hemispheres(),
            })
        }
    };

    let degrees: f64 = degrees_text
        .parse()
        .map_err(|_| CoordinateError::InvalidNumber(degrees_text.to_string()))?;
    let minutes: f64 = minutes_text
        .parse()
        .map_err(|_| CoordinateError::InvalidNumber(minutes_text.to_string()))?;

    let (min, max) = bounds.range(axis);
    let signed_degrees = degrees * factor;
    if !(min..=max).contains(&signed_degrees) {
        return Err(CoordinateError::DegreesOutOfRange {
            degrees: signed_degrees,
            min,
            max,
        });
    }

    if !(0.0..60.0).contains(&minutes) {
        return Err(CoordinateError::MinutesOutOfRange(minutes));
    }

    let magnitude = degrees.abs() + minutes / 60.0;
    // Nearest thousandth of a degree, so 1 0.06 N encodes as 01001
    let thousandths = (magnitude * 1000.0).round() as u64;

    Ok(Coordinate {
        signed: magnitude * factor,
        encoded: format!("{:0width$}", thousandths, width = axis.width()),
    })
}
