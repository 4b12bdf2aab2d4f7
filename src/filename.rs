use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\S{4})_(\d{12})_(\d{3})\.cnv$").expect("filename pattern is valid")
    })
}

/// A source file named `CCCC_YYYYMMDDHHMM_DDD.cnv`: ship callsign,
/// date-time group and cast number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtdFileName {
    pub name: String,
    pub callsign: String,
    pub dtg: String,
    pub cast: String,
}

impl CtdFileName {
    pub fn parse(name: &str) -> Option<Self> {
        let caps = filename_pattern().captures(name)?;

        Some(Self {
            name: name.to_string(),
            callsign: caps[1].to_string(),
            dtg: caps[2].to_string(),
            cast: caps[3].to_string(),
        })
    }

    /// `YYYYMMDD` part of the date-time group.
    pub fn date(&self) -> &str {
        &self.dtg[..8]
    }

    /// Where the downloaded file is kept: `<data_dir>/<callsign>/<YYYYMMDD>/<name>`.
    pub fn local_path(&self, data_dir: &Path) -> PathBuf {
        data_dir
            .join(&self.callsign)
            .join(self.date())
            .join(&self.name)
    }

    pub fn kkyy_name(&self) -> String {
        let stem = self.name.trim_end_matches(".cnv");
        format!("{}_out.txt", stem)
    }

    pub fn bottom_do_name(&self) -> String {
        format!("HypoxiaWatch_{}_{}.dat", self.callsign, &self.dtg[..6])
    }
}

/// Case-insensitive check for the marker operators use to withdraw a file.
pub fn is_excluded(name: &str, marker: &str) -> bool {
    !marker.is_empty() && name.to_lowercase().contains(&marker.to_lowercase())
}
