use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use std::fmt;

/// A validated position component: the signed decimal value and the
/// unsigned thousandths-of-a-degree digits KKYY carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub signed: f64,
    pub encoded: String,
}

/// WMO code table 3333 global quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
}

impl Quadrant {
    pub fn from_position(latitude: f64, longitude: f64) -> Self {
        match (latitude >= 0.0, longitude >= 0.0) {
            (true, true) => Quadrant::NorthEast,
            (true, false) => Quadrant::NorthWest,
            (false, true) => Quadrant::SouthEast,
            (false, false) => Quadrant::SouthWest,
        }
    }

    pub fn code(&self) -> char {
        match self {
            Quadrant::NorthEast => '1',
            Quadrant::SouthEast => '3',
            Quadrant::SouthWest => '5',
            Quadrant::NorthWest => '7',
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Station metadata gathered from a CTD file header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationMetadata {
    /// `DDMMY`, Y being the last digit of the year
    pub date: Option<String>,
    /// `HHMM`
    pub time: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
    pub latitude: Option<Coordinate>,
    pub longitude: Option<Coordinate>,
    pub ship: Option<String>,
    pub cruise: Option<String>,
    pub station: Option<String>,
    pub cast: Option<String>,
    pub depth: Option<String>,
    pub temperature_column: Option<usize>,
    pub depth_column: Option<usize>,
    pub salinity_column: Option<usize>,
    pub oxygen_column: Option<usize>,
    pub declared_lines: Option<usize>,
    pub declared_values: Option<usize>,
}

impl StationMetadata {
    pub fn quadrant(&self) -> Option<Quadrant> {
        match (&self.latitude, &self.longitude) {
            (Some(lat), Some(lon)) => Some(Quadrant::from_position(lat.signed, lon.signed)),
            _ => None,
        }
    }

    /// Names of the mandatory fields that were not found in the header.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let checks = [
            ("datetime", self.date.is_some() && self.time.is_some()),
            ("latitude", self.latitude.is_some()),
            ("longitude", self.longitude.is_some()),
            ("temperature index", self.temperature_column.is_some()),
            ("depth index", self.depth_column.is_some()),
            ("salinity index", self.salinity_column.is_some()),
            ("data line count", self.declared_lines.is_some()),
            ("data value count", self.declared_values.is_some()),
        ];

        checks
            .iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn column_layout(&self) -> Option<ColumnLayout> {
        Some(ColumnLayout {
            depth: self.depth_column?,
            temperature: self.temperature_column?,
            salinity: self.salinity_column?,
            oxygen: self.oxygen_column,
            declared_values: self.declared_values?,
        })
    }
}

/// Where each parameter sits within a whitespace-separated data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub depth: usize,
    pub temperature: usize,
    pub salinity: usize,
    pub oxygen: Option<usize>,
    pub declared_values: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementSample {
    pub depth: f64,
    pub temperature: f64,
    pub salinity: f64,
    pub oxygen: Option<f64>,
}

/// One KKYY data group: depth, temperature and salinity codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedSample {
    pub depth: u32,
    pub temperature: u32,
    pub salinity: u32,
}

const DEPTH_BASE: i64 = 20000;
const TEMPERATURE_BASE: i64 = 30000;
const SALINITY_BASE: i64 = 40000;
const MAX_FIELD: i64 = 9999;

impl EncodedSample {
    pub fn from_sample(sample: &MeasurementSample) -> Result<Self> {
        let metres = sample.depth.trunc();
        if !(0.0..=MAX_FIELD as f64).contains(&metres) {
            return Err(AppError::InvalidData(format!(
                "Depth {} outside encodable range 0-{} m",
                sample.depth, MAX_FIELD
            )));
        }

        let temperature = hundredths(sample.temperature)
            .filter(|h| h.abs() <= MAX_FIELD)
            .ok_or_else(|| {
                AppError::InvalidData(format!(
                    "Temperature {} cannot be encoded",
                    sample.temperature
                ))
            })?;

        let salinity = hundredths(sample.salinity)
            .filter(|h| (0..=MAX_FIELD).contains(h))
            .ok_or_else(|| {
                AppError::InvalidData(format!("Salinity {} cannot be encoded", sample.salinity))
            })?;

        Ok(Self {
            depth: (DEPTH_BASE + metres as i64) as u32,
            temperature: (TEMPERATURE_BASE + temperature) as u32,
            salinity: (SALINITY_BASE + salinity) as u32,
        })
    }
}

impl fmt::Display for EncodedSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05} {:05} {:05}", self.depth, self.temperature, self.salinity)
    }
}

/// Round to two decimals on the shortest decimal representation of `value`,
/// half away from zero, and return the result in hundredths.
///
/// Working on the decimal digits keeps `18.345` at `1835` where binary
/// rounding would give `1834`.
fn hundredths(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }

    let text = value.to_string();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    let whole: i64 = whole.parse().ok()?;
    let mut fraction = fraction.bytes().map(|b| i64::from(b - b'0'));
    let tenths = fraction.next().unwrap_or(0);
    let hundredths = fraction.next().unwrap_or(0);
    let carry = i64::from(fraction.next().is_some_and(|d| d >= 5));

    let magnitude = whole.checked_mul(100)? + tenths * 10 + hundredths + carry;
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(depth: f64, temperature: f64, salinity: f64) -> MeasurementSample {
        MeasurementSample {
            depth,
            temperature,
            salinity,
            oxygen: None,
        }
    }

    #[test]
    fn test_quadrant_sign_combinations() {
        assert_eq!(Quadrant::from_position(27.99, 92.99).code(), '1');
        assert_eq!(Quadrant::from_position(27.99, -92.99).code(), '7');
        assert_eq!(Quadrant::from_position(-27.99, 92.99).code(), '3');
        assert_eq!(Quadrant::from_position(-27.99, -92.99).code(), '5');
    }

    #[test]
    fn test_quadrant_zero_is_north_east() {
        assert_eq!(Quadrant::from_position(0.0, 0.0), Quadrant::NorthEast);
    }

    #[test]
    fn test_encode_reference_sample() {
        let encoded = EncodedSample::from_sample(&sample(12.7, 18.345, 35.67)).unwrap();
        assert_eq!(encoded.to_string(), "20012 31835 43567");
    }

    #[test]
    fn test_encode_truncates_depth_and_rounds_values() {
        let encoded = EncodedSample::from_sample(&sample(0.4, 9.004, 0.5)).unwrap();
        assert_eq!(encoded.depth, 20000);
        assert_eq!(encoded.temperature, 30900);
        assert_eq!(encoded.salinity, 40050);
    }

    #[test]
    fn test_encode_negative_temperature() {
        let encoded = EncodedSample::from_sample(&sample(5.0, -1.5, 34.0)).unwrap();
        assert_eq!(encoded.temperature, 29850);
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert!(EncodedSample::from_sample(&sample(-3.0, 10.0, 35.0)).is_err());
        assert!(EncodedSample::from_sample(&sample(12000.0, 10.0, 35.0)).is_err());
        assert!(EncodedSample::from_sample(&sample(10.0, 150.0, 35.0)).is_err());
        assert!(EncodedSample::from_sample(&sample(10.0, 10.0, -1.0)).is_err());
        assert!(EncodedSample::from_sample(&sample(10.0, f64::NAN, 35.0)).is_err());
    }

    #[test]
    fn test_hundredths_rounding() {
        assert_eq!(hundredths(18.345), Some(1835));
        assert_eq!(hundredths(18.344), Some(1834));
        assert_eq!(hundredths(-0.125), Some(-13));
        assert_eq!(hundredths(35.0), Some(3500));
        assert_eq!(hundredths(f64::INFINITY), None);
    }

    #[test]
    fn test_missing_fields_on_empty_metadata() {
        let metadata = StationMetadata::default();
        assert!(!metadata.is_complete());
        assert_eq!(metadata.missing_fields().len(), 8);
        assert!(metadata.quadrant().is_none());
        assert!(metadata.column_layout().is_none());
    }
}
