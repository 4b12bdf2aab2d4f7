use crate::error::{AppError, Result};
use crate::filename::CtdFileName;
use crate::models::{MeasurementSample, StationMetadata};
use crate::parser::CtdFile;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CSV_HEADER: [&str; 11] = [
    "Ship",
    "Cruise",
    "DateUTC",
    "TimeUTC",
    "Station",
    "Cast",
    "Longitude",
    "Latitude",
    "WaterDepthM",
    "SampleDepthM",
    "OxMgL",
];

#[derive(Debug, Clone, PartialEq)]
pub enum BottomExport {
    Written {
        path: PathBuf,
        sample: MeasurementSample,
    },
    /// The bottom sample had no oxygen reading, so nothing was written.
    NoOxygen { sample: MeasurementSample },
}

/// Append the bottom (last decoded) sample of a cast to the per-ship
/// dissolved-oxygen file in `out_dir`.
pub fn export_bottom_sample<I>(
    metadata: &StationMetadata,
    samples: I,
    file: &CtdFileName,
    out_dir: &Path,
) -> Result<BottomExport>
where
    I: IntoIterator<Item = MeasurementSample>,
{
    let bottom = samples
        .into_iter()
        .last()
        .ok_or_else(|| AppError::NoSamples(format!("{} has an empty data section", file.name)))?;

    let Some(oxygen) = bottom.oxygen else {
        debug!("No oxygen reading at the bottom of {}", file.name);
        return Ok(BottomExport::NoOxygen { sample: bottom });
    };

    let (latitude, longitude, observed_at) = match (
        metadata.latitude.as_ref(),
        metadata.longitude.as_ref(),
        metadata.observed_at,
    ) {
        (Some(lat), Some(lon), Some(at)) => (lat, lon, at),
        _ => {
            return Err(AppError::InvalidData(format!(
                "{} lacks position or time for the bottom DO record",
                file.name
            )))
        }
    };

    let path = out_dir.join(file.bottom_do_name());
    debug!("DO file name is {}", path.display());
    let needs_header = !path.exists();

    let output = OpenOptions::new().create(true).append(true).open(&path)?;
    let mut writer = csv::Writer::from_writer(output);

    if needs_header {
        writer.write_record(CSV_HEADER)?;
    }

    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    writer.write_record([
        text(&metadata.ship),
        text(&metadata.cruise),
        observed_at.format("%d%b%Y").to_string().to_uppercase(),
        observed_at.format("%H:%M:%S").to_string(),
        text(&metadata.station),
        text(&metadata.cast),
        format!("{:.6}", longitude.signed),
        format!("{:.6}", latitude.signed),
        text(&metadata.depth),
        format!("{:?}", bottom.depth),
        format!("{:?}", oxygen),
    ])?;
    writer.flush()?;

    Ok(BottomExport::Written {
        path,
        sample: bottom,
    })
}

/// Decode the whole data section of `ctd` again and export its bottom sample.
pub fn write_bottom_do(ctd: &CtdFile, file: &CtdFileName, out_dir: &Path) -> Result<BottomExport> {
    let samples = ctd.samples()?;
    export_bottom_sample(ctd.metadata(), samples, file, out_dir)
}
