use crate::models::{ColumnLayout, EncodedSample, MeasurementSample};
use std::iter::Enumerate;
use std::str::Lines;
use tracing::warn;

/// Counters for everything the decoder noticed while walking the data section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub lines: usize,
    pub empty_lines: usize,
    pub samples: usize,
    pub encoded: usize,
    pub column_mismatches: usize,
    pub missing_columns: usize,
    pub invalid_values: usize,
    pub encode_failures: usize,
}

impl DecodeStats {
    /// Lines dropped from the output sequence.
    pub fn skipped(&self) -> usize {
        self.missing_columns + self.invalid_values + self.encode_failures
    }

    /// Every logged warning, including column-count mismatches on lines
    /// that were still used.
    pub fn warnings(&self) -> usize {
        self.column_mismatches + self.skipped()
    }
}

/// Lazy raw-mode decoder over the data section of a CTD file.
///
/// Each iterator makes a single pass; ask the parsed file for a new one to
/// read the section again.
pub struct DataSection<'a> {
    lines: Enumerate<Lines<'a>>,
    first_line: usize,
    layout: ColumnLayout,
    stats: DecodeStats,
}

impl<'a> DataSection<'a> {
    /// `first_line` is the 1-based file line number of the first data line,
    /// used only for log messages.
    pub fn new(data: &'a str, first_line: usize, layout: ColumnLayout) -> Self {
        Self {
            lines: data.lines().enumerate(),
            first_line,
            layout,
            stats: DecodeStats::default(),
        }
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// Switch to encoded mode.
    pub fn encoded(self) -> EncodedSection<'a> {
        EncodedSection { samples: self }
    }

    fn decode_line(&mut self, line_number: usize, line: &str) -> Option<MeasurementSample> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let layout = self.layout;

        if tokens.len() != layout.declared_values {
            self.stats.column_mismatches += 1;
            warn!(
                "Line {}: number of data values != number declared in header (got {}, expected {})",
                line_number,
                tokens.len(),
                layout.declared_values
            );
        }

        let (depth, temperature, salinity) = match (
            tokens.get(layout.depth),
            tokens.get(layout.temperature),
            tokens.get(layout.salinity),
        ) {
            (Some(d), Some(t), Some(s)) => (*d, *t, *s),
            _ => {
                self.stats.missing_columns += 1;
                warn!(
                    "Line {}: missing columns (depth {} temperature {} salinity {}, {} values present)",
                    line_number,
                    layout.depth,
                    layout.temperature,
                    layout.salinity,
                    tokens.len()
                );
                return None;
            }
        };

        let parsed = (
            depth.parse::<f64>(),
            temperature.parse::<f64>(),
            salinity.parse::<f64>(),
        );
        let (Ok(depth), Ok(temperature), Ok(salinity)) = parsed else {
            self.stats.invalid_values += 1;
            warn!(
                "Line {}: non-numeric depth/temperature/salinity in '{}'",
                line_number,
                line.trim()
            );
            return None;
        };

        let oxygen = layout
            .oxygen
            .and_then(|index| tokens.get(index))
            .and_then(|token| token.parse::<f64>().ok());

        Some(MeasurementSample {
            depth,
            temperature,
            salinity,
            oxygen,
        })
    }
}

impl Iterator for DataSection<'_> {
    type Item = MeasurementSample;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, line) = self.lines.next()?;
            self.stats.lines += 1;

            if line.trim().is_empty() {
                self.stats.empty_lines += 1;
                continue;
            }

            if let Some(sample) = self.decode_line(self.first_line + index, line) {
                self.stats.samples += 1;
                return Some(sample);
            }
        }
    }
}

/// Encoded-mode decoder: yields KKYY groups, skipping samples that cannot
/// be encoded.
pub struct EncodedSection<'a> {
    samples: DataSection<'a>,
}

impl EncodedSection<'_> {
    pub fn stats(&self) -> &DecodeStats {
        self.samples.stats()
    }
}

impl Iterator for EncodedSection<'_> {
    type Item = EncodedSample;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let sample = self.samples.next()?;
            match EncodedSample::from_sample(&sample) {
                Ok(encoded) => {
                    self.samples.stats.encoded += 1;
                    return Some(encoded);
                }
                Err(e) => {
                    self.samples.stats.encode_failures += 1;
                    warn!("Skipping data line that cannot be encoded: {}", e);
                }
            }
        }
    }
}
