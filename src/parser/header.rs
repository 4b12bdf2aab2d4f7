use super::coordinate::{numeric_tokens, parse_coordinate, Axis, BoundingBox};
use crate::models::StationMetadata;
use chrono::{Datelike, NaiveDateTime, TimeZone, Timelike, Utc};
use tracing::{debug, info, warn};

/// Sentinel separating the header from the data section.
pub const END_OF_HEADER: &str = "*END*";

const UPLOAD_TIME_FORMAT: &str = "%b %d %Y %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderField {
    UploadTime,
    InstrumentLatitude,
    InstrumentLongitude,
    OperatorLatitude,
    OperatorLongitude,
    ColumnName,
    DataLines,
    DataValues,
    Ship,
    Cruise,
    Station,
    Depth,
    Cast,
}

/// Header markers, usually found at the start of a line.
const HEADER_MARKERS: &[(&str, HeaderField)] = &[
    ("* System UpLoad Time =", HeaderField::UploadTime),
    ("* NMEA Latitude =", HeaderField::InstrumentLatitude),
    ("* NMEA Longitude =", HeaderField::InstrumentLongitude),
    ("* Latitude", HeaderField::OperatorLatitude),
    ("* Longitude", HeaderField::OperatorLongitude),
    ("# name", HeaderField::ColumnName),
    ("# nvalues", HeaderField::DataLines),
    ("# nquan", HeaderField::DataValues),
    ("** Ship", HeaderField::Ship),
    ("** Cruise", HeaderField::Cruise),
    ("** Station", HeaderField::Station),
    ("** Depth", HeaderField::Depth),
    ("** Cast", HeaderField::Cast),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parameter {
    Temperature,
    Depth,
    Salinity,
    Oxygen,
}

/// Physical parameters located through `# name` declarations.
const PARAMETERS: &[(&str, Parameter)] = &[
    ("Temperature", Parameter::Temperature),
    ("Depth", Parameter::Depth),
    ("Salinity", Parameter::Salinity),
    ("Oxygen, SBE 43 [mg/l]", Parameter::Oxygen),
];

/// Result of scanning a file header.
#[derive(Debug, Clone)]
pub struct HeaderScan {
    pub metadata: StationMetadata,
    /// Byte offset of the first data line.
    pub data_offset: usize,
    /// Number of lines consumed by the header, sentinel included.
    pub header_lines: usize,
    pub end_found: bool,
}

/// Incrementally populates [`StationMetadata`] from header lines.
pub struct HeaderExtractor {
    bounds: BoundingBox,
    metadata: StationMetadata,
}

impl HeaderExtractor {
    pub fn new(bounds: BoundingBox) -> Self {
        Self {
            bounds,
            metadata: StationMetadata::default(),
        }
    }

    /// Apply every catalog marker found in `line`. Malformed values are
    /// logged and leave the field unset.
    pub fn scan_line(&mut self, line: &str) {
        let line = line.trim();
        for (marker, field) in HEADER_MARKERS {
            if line.contains(marker) {
                self.apply(*field, line);
            }
        }
    }

    pub fn finish(self) -> StationMetadata {
        let metadata = self.metadata;
        debug!("Date/Time: {:?} {:?}", metadata.date, metadata.time);
        debug!("Latitude: {:?}", metadata.latitude.as_ref().map(|c| &c.encoded));
        debug!("Longitude: {:?}", metadata.longitude.as_ref().map(|c| &c.encoded));
        debug!(
            "Columns: temperature {:?}, depth {:?}, salinity {:?}, oxygen {:?}",
            metadata.temperature_column,
            metadata.depth_column,
            metadata.salinity_column,
            metadata.oxygen_column
        );
        debug!(
            "Declared {:?} data lines of {:?} values",
            metadata.declared_lines, metadata.declared_values
        );
        metadata
    }

    fn apply(&mut self, field: HeaderField, line: &str) {
        match field {
            HeaderField::UploadTime => self.set_datetime(line),
            HeaderField::InstrumentLatitude => self.set_instrument_position(Axis::Latitude, line),
            HeaderField::InstrumentLongitude => {
                self.set_instrument_position(Axis::Longitude, line)
            }
            HeaderField::OperatorLatitude => self.set_operator_position(Axis::Latitude, line),
            HeaderField::OperatorLongitude => self.set_operator_position(Axis::Longitude, line),
            HeaderField::ColumnName => self.set_columns(line),
            HeaderField::DataLines => {
                if let Some(count) = first_integer(line) {
                    self.metadata.declared_lines = Some(count);
                }
            }
            HeaderField::DataValues => {
                if let Some(count) = first_integer(line) {
                    self.metadata.declared_values = Some(count);
                }
            }
            HeaderField::Ship => self.metadata.ship = Some(free_text(line)),
            HeaderField::Cruise => self.metadata.cruise = Some(free_text(line)),
            HeaderField::Station => self.metadata.station = Some(free_text(line)),
            HeaderField::Depth => self.metadata.depth = Some(free_text(line)),
            HeaderField::Cast => self.metadata.cast = Some(free_text(line)),
        }
    }

    fn set_datetime(&mut self, line: &str) {
        let text = line.split_once('=').map(|(_, rest)| rest).unwrap_or(line).trim();

        match NaiveDateTime::parse_from_str(text, UPLOAD_TIME_FORMAT) {
            Ok(naive) => {
                self.metadata.date = Some(format!(
                    "{:02}{:02}{}",
                    naive.day(),
                    naive.month(),
                    naive.year().rem_euclid(10)
                ));
                self.metadata.time = Some(format!("{:02}{:02}", naive.hour(), naive.minute()));
                self.metadata.observed_at = Some(Utc.from_utc_datetime(&naive));
                debug!(
                    "date {:?} time {:?}",
                    self.metadata.date, self.metadata.time
                );
            }
            Err(e) => warn!("Unable to parse upload time '{}': {}", text, e),
        }
    }

    fn slot(&mut self, axis: Axis) -> &mut Option<crate::models::Coordinate> {
        match axis {
            Axis::Latitude => &mut self.metadata.latitude,
            Axis::Longitude => &mut self.metadata.longitude,
        }
    }

    fn set_instrument_position(&mut self, axis: Axis, line: &str) {
        match parse_coordinate(line, axis, &self.bounds) {
            Ok(coordinate) => *self.slot(axis) = Some(coordinate),
            Err(e) => warn!(
                "Instrument {:?} rejected: {} (will try the operator entry) - {}",
                axis, e, line
            ),
        }
    }

    fn set_operator_position(&mut self, axis: Axis, line: &str) {
        if self.slot(axis).is_some() {
            return;
        }

        match parse_coordinate(line, axis, &self.bounds) {
            Ok(coordinate) => {
                info!("Using operator-entered {:?}: {}", axis, line);
                *self.slot(axis) = Some(coordinate);
            }
            Err(e) => warn!("Operator {:?} rejected: {} - {}", axis, e, line),
        }
    }

    fn set_columns(&mut self, line: &str) {
        for (name, parameter) in PARAMETERS {
            if !line.contains(name) {
                continue;
            }

            let slot = match parameter {
                Parameter::Temperature => &mut self.metadata.temperature_column,
                Parameter::Depth => &mut self.metadata.depth_column,
                Parameter::Salinity => &mut self.metadata.salinity_column,
                Parameter::Oxygen => &mut self.metadata.oxygen_column,
            };

            if slot.is_some() {
                debug!("Ignoring later {:?} declaration: {}", parameter, line);
                continue;
            }

            if let Some(index) = first_integer(line) {
                *slot = Some(index);
            }
        }
    }
}

/// Scan header lines of `content` until the end-of-header sentinel.
pub fn extract_header(content: &str, bounds: BoundingBox) -> HeaderScan {
    let mut extractor = HeaderExtractor::new(bounds);
    let mut offset = 0;
    let mut header_lines = 0;
    let mut end_found = false;

    for raw in content.split_inclusive('\n') {
        offset += raw.len();
        header_lines += 1;

        if raw.contains(END_OF_HEADER) {
            end_found = true;
            break;
        }
        extractor.scan_line(raw);
    }

    if !end_found {
        warn!("No {} marker found; file has no data section", END_OF_HEADER);
    }

    HeaderScan {
        metadata: extractor.finish(),
        data_offset: offset,
        header_lines,
        end_found,
    }
}

fn first_integer(line: &str) -> Option<usize> {
    let Some(token) = numeric_tokens(line).next() else {
        warn!("Unable to find quantity in '{}'", line);
        return None;
    };

    match token.parse::<usize>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Cast to integer failed for '{}' in '{}': {}", token, line, e);
            None
        }
    }
}

fn free_text(line: &str) -> String {
    line.split_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or(line)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(lines: &[&str]) -> StationMetadata {
        let mut extractor = HeaderExtractor::new(BoundingBox::default());
        for line in lines {
            extractor.scan_line(line);
        }
        extractor.finish()
    }

    #[test]
    fn test_upload_time() {
        let metadata = scan(&["* System UpLoad Time = May 08 2013 18:35:13"]);
        assert_eq!(metadata.date.as_deref(), Some("08053"));
        assert_eq!(metadata.time.as_deref(), Some("1835"));
        assert_eq!(
            metadata.observed_at.unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2013-05-08 18:35:13"
        );
    }

    #[test]
    fn test_malformed_upload_time_is_skipped() {
        let metadata = scan(&["* System UpLoad Time = sometime last week"]);
        assert!(metadata.date.is_none());
        assert!(metadata.observed_at.is_none());
    }

    #[test]
    fn test_operator_position_used_when_instrument_fails() {
        let metadata = scan(&[
            "* NMEA Latitude = 27 75.00 N",
            "** Latitude: 27 59.54 N",
        ]);
        assert_eq!(metadata.latitude.unwrap().encoded, "27992");
    }

    #[test]
    fn test_instrument_position_wins_over_operator() {
        let metadata = scan(&[
            "** Longitude: 090 00.00 W",
            "* NMEA Longitude = 092 59.95 W",
            "** Longitude: 091 00.00 W",
        ]);
        assert_eq!(metadata.longitude.unwrap().encoded, "092999");
    }

    #[test]
    fn test_column_declarations() {
        let metadata = scan(&[
            "# nquan = 5",
            "# nvalues = 120",
            "# name 0 = depSM: Depth [salt water, m]",
            "# name 1 = t090C: Temperature [ITS-90, deg C]",
            "# name 2 = sal00: Salinity, Practical [PSU]",
            "# name 3 = sbeox0Mg/L: Oxygen, SBE 43 [mg/l]",
            "# name 4 = potemp090C: Potential Temperature [ITS-90, deg C]",
        ]);
        assert_eq!(metadata.depth_column, Some(0));
        assert_eq!(metadata.temperature_column, Some(1));
        assert_eq!(metadata.salinity_column, Some(2));
        assert_eq!(metadata.oxygen_column, Some(3));
        assert_eq!(metadata.declared_values, Some(5));
        assert_eq!(metadata.declared_lines, Some(120));
    }

    #[test]
    fn test_free_text_fields() {
        let metadata = scan(&[
            "** Ship: R/V Test",
            "** Cruise: 1305",
            "** Station: B12",
            "** Cast: 004",
            "** Depth: 35",
        ]);
        assert_eq!(metadata.ship.as_deref(), Some("R/V Test"));
        assert_eq!(metadata.cruise.as_deref(), Some("1305"));
        assert_eq!(metadata.station.as_deref(), Some("B12"));
        assert_eq!(metadata.cast.as_deref(), Some("004"));
        assert_eq!(metadata.depth.as_deref(), Some("35"));
    }

    #[test]
    fn test_extract_header_stops_at_sentinel() {
        let content = "* System UpLoad Time = May 08 2013 18:35:13\n*END*\n** Ship: ignored\n";
        let scan = extract_header(content, BoundingBox::default());
        assert!(scan.end_found);
        assert_eq!(scan.header_lines, 2);
        assert_eq!(&content[scan.data_offset..], "** Ship: ignored\n");
        assert!(scan.metadata.ship.is_none());
    }
}
