use crate::bottom_do::{self, BottomExport};
use crate::config::ShipFilter;
use crate::error::Result;
use crate::filename::{is_excluded, CtdFileName};
use crate::ftp::{DestinationConnector, DestinationSession, SourceConnector, SourceSession};
use crate::kkyy;
use crate::ledger::Ledger;
use crate::parser::{BoundingBox, CtdFile};
use crate::retry::RetryPolicy;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub data_dir: PathBuf,
    pub bounds: BoundingBox,
    pub exclusion_marker: String,
    pub ships: ShipFilter,
    pub retry: RetryPolicy,
}

/// What happened during one scan cycle. Counts describe the final attempt,
/// except `uploaded` which accumulates across retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub attempts: u32,
    pub candidates: usize,
    pub converted: usize,
    pub failed: usize,
    pub uploaded: usize,
    pub abandoned: bool,
}

/// A converted file ready for upload.
#[derive(Debug, Clone)]
pub struct Converted {
    pub upload_name: String,
    pub kkyy_path: PathBuf,
    pub content: String,
    pub ctd: CtdFile,
}

/// Scan / fetch / convert / upload over a source and an optional
/// destination. Without a destination the transfer runs dry: files are
/// converted locally but nothing is sent and the ledger is left alone.
#[derive(Debug, Clone)]
pub struct Transfer<S, D> {
    source: S,
    destination: Option<D>,
    settings: TransferSettings,
}

impl<S, D> Transfer<S, D>
where
    S: SourceConnector,
    D: DestinationConnector,
{
    pub fn new(source: S, destination: Option<D>, settings: TransferSettings) -> Self {
        Self {
            source,
            destination,
            settings,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.destination.is_none()
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Run one scan cycle, retrying the whole cycle on transient errors.
    /// Never fails: an exhausted cycle is reported as abandoned and its
    /// remaining files are picked up next time.
    pub fn run_cycle(&self) -> CycleReport {
        let mut ledger = Ledger::load(&self.settings.data_dir);
        // Bottom DO rows already appended, kept across retries
        let mut exported = HashSet::new();
        let mut report = CycleReport::default();
        let policy = self.settings.retry;

        let result = policy.run("Scan cycle", |attempt| {
            report.attempts = attempt;
            self.attempt_cycle(&mut ledger, &mut exported, &mut report)
        });

        if let Err(e) = result {
            error!(
                "Abandoning scan cycle after {} attempts: {}",
                report.attempts, e
            );
            report.abandoned = true;
        }

        report
    }

    /// Names from a remote listing worth processing, in listing order.
    pub fn select_candidates(&self, names: Vec<String>, ledger: &Ledger) -> Vec<CtdFileName> {
        names
            .into_iter()
            .filter(|name| !is_excluded(name, &self.settings.exclusion_marker))
            .filter(|name| !ledger.contains(name))
            .filter_map(|name| CtdFileName::parse(&name))
            .filter(|file| self.settings.ships.matches_callsign(&file.callsign))
            .collect()
    }

    fn attempt_cycle(
        &self,
        ledger: &mut Ledger,
        exported: &mut HashSet<String>,
        report: &mut CycleReport,
    ) -> Result<()> {
        report.candidates = 0;
        report.converted = 0;
        report.failed = 0;

        let mut source = self.source.connect()?;
        let names = source.list()?;
        let candidates = self.select_candidates(names, ledger);
        report.candidates = candidates.len();

        if candidates.is_empty() {
            info!("No new files detected");
            return source.disconnect();
        }

        info!("Found {} new files", candidates.len());

        let mut destination = match &self.destination {
            Some(connector) => Some(connector.connect()?),
            None => None,
        };

        for file in &candidates {
            if ledger.contains(&file.name) {
                debug!("{} already uploaded during this cycle", file.name);
                continue;
            }

            info!("Downloading file {}", file.name);
            let lines = source.retrieve_lines(&file.name)?;

            let converted = match self.convert(file, &lines) {
                Ok(converted) => converted,
                Err(e) => {
                    warn!("Conversion of {} failed: {}", file.name, e);
                    report.failed += 1;
                    continue;
                }
            };
            report.converted += 1;

            if exported.insert(file.name.clone()) {
                self.export_bottom_do(&converted.ctd, file);
            }

            if let Some(session) = destination.as_mut() {
                info!("Uploading {}", converted.kkyy_path.display());
                session.store(&converted.upload_name, &converted.content)?;
                report.uploaded += 1;

                if let Err(e) = ledger.record(&file.name) {
                    error!(
                        "Uploaded {} but could not record it in {}: {}",
                        file.name,
                        ledger.path().display(),
                        e
                    );
                }
            }
        }

        if let Some(session) = destination {
            session.disconnect()?;
        }
        source.disconnect()
    }

    /// Store the downloaded lines locally and write the KKYY message next
    /// to them.
    pub fn convert(&self, file: &CtdFileName, lines: &[String]) -> Result<Converted> {
        let local_path = file.local_path(&self.settings.data_dir);
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = lines.join("\n");
        std::fs::write(&local_path, &content)?;

        let ctd = CtdFile::parse(content, self.settings.bounds);
        let kkyy_path = local_path.with_file_name(file.kkyy_name());
        let message = kkyy::convert_file(&ctd, &file.callsign, &kkyy_path)?;

        Ok(Converted {
            upload_name: file.kkyy_name(),
            kkyy_path,
            content: message.to_string(),
            ctd,
        })
    }

    /// Append the bottom dissolved-oxygen reading. Failures are logged only.
    pub fn export_bottom_do(&self, ctd: &CtdFile, file: &CtdFileName) {
        match bottom_do::write_bottom_do(ctd, file, &self.settings.data_dir) {
            Ok(BottomExport::Written { path, sample }) => {
                debug!(
                    "Bottom DO {:?} mg/l at {} m written to {}",
                    sample.oxygen,
                    sample.depth,
                    path.display()
                );
            }
            Ok(BottomExport::NoOxygen { .. }) => {
                debug!("{} has no bottom oxygen reading", file.name);
            }
            Err(e) => warn!("Bottom DO export for {} skipped: {}", file.name, e),
        }
    }
}
