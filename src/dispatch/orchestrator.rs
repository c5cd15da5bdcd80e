//! One dispatch pass over the configured base directories.
//!
//! Projects are processed by a bounded pool of blocking workers. Within a
//! project, bindings always run in registration order.

use super::binding::{panic_message, AnalysisBinding, DispatchMode};
use crate::metadata::load_metadata;
use crate::models::{
    BindingOutcome, BindingRecord, PassSummary, ProjectDirectory, ProjectReport, ProjectStatus,
};
use crate::scanner::{ProjectScanner, ScanConfig};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Dispatch};

/// Settings for a pass.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub scan: ScanConfig,
    /// Spaces substituted for each tab before parsing metadata.
    pub tab_width: usize,
    /// Maximum number of projects processed at once.
    pub concurrency: usize,
    pub mode: DispatchMode,
    /// Halt the pass on the first analysis failure.
    pub fail_fast: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            tab_width: 4,
            concurrency: 1,
            mode: DispatchMode::Execute,
            fail_fast: false,
        }
    }
}

/// Runs every binding against every discovered project.
#[derive(Clone)]
pub struct Orchestrator {
    settings: DispatchSettings,
    bindings: Arc<Vec<AnalysisBinding>>,
    dispatch: Dispatch,
}

impl Orchestrator {
    /// Create an orchestrator that logs through `dispatch`.
    pub fn new(settings: DispatchSettings, bindings: Vec<AnalysisBinding>, dispatch: Dispatch) -> Self {
        Self {
            settings,
            bindings: Arc::new(bindings),
            dispatch,
        }
    }

    pub fn bindings(&self) -> &[AnalysisBinding] {
        &self.bindings
    }

    /// Perform one full pass. Nothing carries over between passes.
    pub async fn run(&self) -> PassSummary {
        let start = Instant::now();
        let projects = tracing::dispatcher::with_default(&self.dispatch, || {
            let projects = ProjectScanner::new(self.settings.scan.clone()).scan();
            info!(
                "Found {} project(s), {} analysis binding(s)",
                projects.len(),
                self.bindings.len()
            );
            projects
        });

        let halted = Arc::new(AtomicBool::new(false));
        let concurrency = self.settings.concurrency.max(1);

        let mut reports: Vec<(usize, ProjectReport)> = stream::iter(projects.into_iter().enumerate())
            .map(|(index, project)| {
                let this = self.clone();
                let halted = halted.clone();
                async move { (index, this.spawn_project(project, halted).await) }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        reports.sort_by_key(|(index, _)| *index);
        let reports: Vec<ProjectReport> = reports.into_iter().map(|(_, r)| r).collect();

        let mut summary = PassSummary::from_reports(&reports, start.elapsed());
        // A failure in the very last binding halts nothing but still counts
        summary.halted |= halted.load(Ordering::SeqCst);
        summary
    }

    /// Process one project on the blocking pool, containing any crash.
    async fn spawn_project(&self, project: ProjectDirectory, halted: Arc<AtomicBool>) -> ProjectReport {
        if halted.load(Ordering::SeqCst) {
            return ProjectReport::new(project, ProjectStatus::Halted);
        }

        let this = self.clone();
        let worker_project = project.clone();
        let handle = tokio::task::spawn_blocking(move || {
            tracing::dispatcher::with_default(&this.dispatch, || {
                this.process_project(worker_project, &halted)
            })
        });

        match handle.await {
            Ok(report) => report,
            Err(e) => {
                let message = if e.is_panic() {
                    format!("worker panicked: {}", panic_message(&*e.into_panic()))
                } else {
                    format!("worker cancelled: {}", e)
                };
                tracing::dispatcher::with_default(&self.dispatch, || {
                    error!("Processing {} failed: {}", project.path.display(), message);
                });
                ProjectReport::new(project, ProjectStatus::Crashed(message))
            }
        }
    }

    /// Load metadata for one project and run every binding in order.
    pub fn process_project(&self, project: ProjectDirectory, halted: &AtomicBool) -> ProjectReport {
        let span = info_span!("project", dir = %project.name);
        let _guard = span.enter();

        if halted.load(Ordering::SeqCst) {
            return ProjectReport::new(project, ProjectStatus::Halted);
        }

        info!("Processing folder: {}", project.name);

        let metadata = match load_metadata(
            &project.path,
            &self.settings.scan.metadata_file,
            self.settings.tab_width,
        ) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                warn!("Metadata disappeared from {}", project.path.display());
                return ProjectReport::new(project, ProjectStatus::Vanished);
            }
            Err(e) => {
                error!(path = %e.path().display(), "{}", e);
                return ProjectReport::new(project, ProjectStatus::Malformed(e.to_string()));
            }
        };

        let mut records = Vec::with_capacity(self.bindings.len());
        for binding in self.bindings.iter() {
            let outcome = if halted.load(Ordering::SeqCst) {
                BindingOutcome::Halted
            } else {
                binding.dispatch(&project.path, &metadata, self.settings.mode)
            };

            debug!("{}: {}", binding.name(), outcome);
            if self.settings.fail_fast && matches!(outcome, BindingOutcome::Failed(_)) {
                warn!("Halting pass after {} failed", binding.name());
                halted.store(true, Ordering::SeqCst);
            }

            records.push(BindingRecord {
                analysis: binding.name().to_string(),
                outcome,
            });
        }

        debug!("Finished {}", project.name);
        ProjectReport::new(project, ProjectStatus::Dispatched(records))
    }
}
