//! Sea-Bird CNV parsing: header metadata, coordinates and the data section.

pub mod coordinate;
pub mod data;
pub mod header;

pub use coordinate::{parse_coordinate, Axis, BoundingBox, CoordinateError};
pub use data::{DataSection, DecodeStats, EncodedSection};
pub use header::{extract_header, HeaderExtractor, HeaderScan, END_OF_HEADER};

use crate::error::{AppError, Result};
use crate::models::StationMetadata;
use std::path::Path;

/// A CTD file whose header has been scanned.
///
/// The metadata is fixed once the header has been read; the data section is
/// decoded lazily and may be walked any number of times.
#[derive(Debug, Clone)]
pub struct CtdFile {
    content: String,
    metadata: StationMetadata,
    data_offset: usize,
    header_lines: usize,
}

impl CtdFile {
    pub fn parse(content: impl Into<String>, bounds: BoundingBox) -> Self {
        let content = content.into();
        let scan = extract_header(&content, bounds);

        Self {
            content,
            metadata: scan.metadata,
            data_offset: scan.data_offset,
            header_lines: scan.header_lines,
        }
    }

    pub fn read<P: AsRef<Path>>(path: P, bounds: BoundingBox) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::parse(content, bounds))
    }

    pub fn metadata(&self) -> &StationMetadata {
        &self.metadata
    }

    pub fn is_complete(&self) -> bool {
        self.metadata.is_complete()
    }

    /// Raw-mode samples, starting again from the first data line.
    pub fn samples(&self) -> Result<DataSection<'_>> {
        let layout = self.metadata.column_layout().ok_or_else(|| {
            AppError::Parse(format!(
                "Header lacks column layout: missing {}",
                self.metadata.missing_fields().join(", ")
            ))
        })?;

        Ok(DataSection::new(
            &self.content[self.data_offset..],
            self.header_lines + 1,
            layout,
        ))
    }

    /// Encoded-mode samples, starting again from the first data line.
    pub fn encoded_samples(&self) -> Result<EncodedSection<'_>> {
        Ok(self.samples()?.encoded())
    }
}
