//! KKYY message encoding.
//!
//! ```text
//! KKYY DDMMY HHMM/ QLLLLL LLLLLL 88872 83099
//! 2DDDD 3TTTT 4SSSS
//! 99999 CALLSIGN
//! ```

use crate::error::{AppError, Result};
use crate::models::{EncodedSample, StationMetadata};
use crate::parser::CtdFile;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Station-type groups required by the receiving server.
const STATION_TYPE_GROUPS: &str = "88872 83099";
const TRAILER_GROUP: &str = "99999";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KkyyMessage {
    pub header: String,
    pub groups: Vec<EncodedSample>,
    pub callsign: String,
}

impl fmt::Display for KkyyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        for group in &self.groups {
            writeln!(f, "{}", group)?;
        }
        writeln!(f, "{} {}", TRAILER_GROUP, self.callsign)
    }
}

pub fn header_line(metadata: &StationMetadata) -> Result<String> {
    let missing = || {
        AppError::Parse(format!(
            "Header incomplete: missing {}",
            metadata.missing_fields().join(", ")
        ))
    };

    let date = metadata.date.as_deref().ok_or_else(missing)?;
    let time = metadata.time.as_deref().ok_or_else(missing)?;
    let latitude = metadata.latitude.as_ref().ok_or_else(missing)?;
    let longitude = metadata.longitude.as_ref().ok_or_else(missing)?;
    let quadrant = metadata.quadrant().ok_or_else(missing)?;

    Ok(format!(
        "KKYY {} {}/ {}{} {} {}",
        date, time, quadrant, latitude.encoded, longitude.encoded, STATION_TYPE_GROUPS
    ))
}

/// Build a message from complete metadata and encoded groups. Fails when
/// the metadata is incomplete or there are no groups.
pub fn encode_message<I>(metadata: &StationMetadata, samples: I, callsign: &str) -> Result<KkyyMessage>
where
    I: IntoIterator<Item = EncodedSample>,
{
    if !metadata.is_complete() {
        return Err(AppError::Parse(format!(
            "Header incomplete: missing {}",
            metadata.missing_fields().join(", ")
        )));
    }

    let header = header_line(metadata)?;
    let groups: Vec<EncodedSample> = samples.into_iter().collect();

    if groups.is_empty() {
        return Err(AppError::NoSamples("no data lines could be encoded".to_string()));
    }

    if let Some(declared) = metadata.declared_lines {
        if groups.len() != declared {
            warn!(
                "Number of data lines in file != number declared in header (got {}, expected {})",
                groups.len(),
                declared
            );
        }
    }

    Ok(KkyyMessage {
        header,
        groups,
        callsign: callsign.to_string(),
    })
}

/// Encode a parsed CTD file and write the message to `output`.
pub fn convert_file(ctd: &CtdFile, callsign: &str, output: &Path) -> Result<KkyyMessage> {
    let metadata = ctd.metadata();
    if !metadata.is_complete() {
        return Err(AppError::Parse(format!(
            "Header incomplete: missing {}",
            metadata.missing_fields().join(", ")
        )));
    }

    let mut samples = ctd.encoded_samples()?;
    let groups: Vec<EncodedSample> = samples.by_ref().collect();
    let stats = samples.stats();
    if stats.warnings() > 0 {
        warn!(
            "Data section: {} groups encoded, {} lines skipped, {} column-count mismatches",
            stats.encoded,
            stats.skipped(),
            stats.column_mismatches
        );
    }

    let message = encode_message(metadata, groups, callsign)?;

    info!("Writing {}", output.display());
    std::fs::write(output, message.to_string())?;

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinate;

    fn complete_metadata() -> StationMetadata {
        StationMetadata {
            date: Some("08053".to_string()),
            time: Some("1835".to_string()),
            latitude: Some(Coordinate {
                signed: 27.9923,
                encoded: "27992".to_string(),
            }),
            longitude: Some(Coordinate {
                signed: -92.9992,
                encoded: "092999".to_string(),
            }),
            temperature_column: Some(1),
            depth_column: Some(0),
            salinity_column: Some(2),
            declared_lines: Some(2),
            declared_values: Some(3),
            ..StationMetadata::default()
        }
    }

    fn group(depth: u32, temperature: u32, salinity: u32) -> EncodedSample {
        EncodedSample {
            depth,
            temperature,
            salinity,
        }
    }

    #[test]
    fn test_header_line() {
        assert_eq!(
            header_line(&complete_metadata()).unwrap(),
            "KKYY 08053 1835/ 727992 092999 88872 83099"
        );
    }

    #[test]
    fn test_message_layout() {
        let message = encode_message(
            &complete_metadata(),
            vec![group(20001, 32812, 43610), group(20002, 32800, 43620)],
            "WTEC",
        )
        .unwrap();

        assert_eq!(
            message.to_string(),
            "KKYY 08053 1835/ 727992 092999 88872 83099\n\
             20001 32812 43610\n\
             20002 32800 43620\n\
             99999 WTEC\n"
        );
    }

    #[test]
    fn test_empty_samples_rejected() {
        let result = encode_message(&complete_metadata(), Vec::new(), "WTEC");
        assert!(matches!(result, Err(AppError::NoSamples(_))));
    }

    #[test]
    fn test_incomplete_metadata_rejected() {
        let mut metadata = complete_metadata();
        metadata.salinity_column = None;
        let result = encode_message(&metadata, vec![group(20001, 32812, 43610)], "WTEC");
        assert!(matches!(result, Err(AppError::Parse(_))));
    }

    #[test]
    fn test_count_mismatch_is_not_fatal() {
        let message =
            encode_message(&complete_metadata(), vec![group(20001, 32812, 43610)], "WTEC").unwrap();
        assert_eq!(message.groups.len(), 1);
    }
}
