//! Data models for a dispatch pass.
//!
//! This module contains the records produced while dispatching analyses
//! over project directories, and the summary aggregated from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A directory under a base directory that holds a metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDirectory {
    /// Final path component (the folder name).
    pub name: String,
    /// Base directory joined with the folder name.
    pub path: PathBuf,
}

impl ProjectDirectory {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// What a single binding did for a single project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum BindingOutcome {
    /// The directory path does not contain the binding's scope.
    OutOfScope,
    /// The predicate rejected the project's metadata.
    NotEligible,
    /// Dry run: the analysis would have been invoked.
    WouldRun,
    /// The analysis ran to completion.
    Completed,
    /// Construction or execution of the analysis failed.
    Failed(String),
    /// Skipped because an earlier failure halted the pass.
    Halted,
}

impl fmt::Display for BindingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingOutcome::OutOfScope => write!(f, "out of scope"),
            BindingOutcome::NotEligible => write!(f, "not eligible"),
            BindingOutcome::WouldRun => write!(f, "would run"),
            BindingOutcome::Completed => write!(f, "completed"),
            BindingOutcome::Failed(e) => write!(f, "failed: {}", e),
            BindingOutcome::Halted => write!(f, "halted"),
        }
    }
}

/// Outcome of one binding, tagged with the analysis name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRecord {
    pub analysis: String,
    pub outcome: BindingOutcome,
}

/// How processing of a project directory ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Metadata loaded; every binding was attempted.
    Dispatched(Vec<BindingRecord>),
    /// The metadata document could not be read or parsed.
    Malformed(String),
    /// The metadata document disappeared after discovery.
    Vanished,
    /// The worker processing this directory died.
    Crashed(String),
    /// Never started because the pass was halted.
    Halted,
}

/// Everything that happened to one project during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project: ProjectDirectory,
    pub status: ProjectStatus,
}

impl ProjectReport {
    pub fn new(project: ProjectDirectory, status: ProjectStatus) -> Self {
        Self { project, status }
    }

    /// Binding records, empty unless the project was dispatched.
    pub fn records(&self) -> &[BindingRecord] {
        match &self.status {
            ProjectStatus::Dispatched(records) => records,
            _ => &[],
        }
    }
}

/// A failed analysis invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub project: String,
    pub analysis: String,
    pub error: String,
}

/// Aggregate counts for a pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    /// Project directories found by discovery.
    pub discovered: usize,
    /// Projects whose metadata loaded and whose bindings were attempted.
    pub dispatched: usize,
    /// Projects skipped because of unreadable or invalid metadata.
    pub malformed: usize,
    pub vanished: usize,
    pub crashed: usize,
    /// Projects never started because the pass was halted.
    pub halted_projects: usize,

    pub completed: usize,
    pub would_run: usize,
    pub not_eligible: usize,
    pub out_of_scope: usize,
    pub failed: usize,
    pub halted_bindings: usize,

    pub failures: Vec<FailureRecord>,
    /// Whether a fail-fast stop cut the pass short.
    pub halted: bool,
    pub duration_seconds: f64,
}

impl PassSummary {
    /// Creates a summary from project reports.
    pub fn from_reports(reports: &[ProjectReport], duration: Duration) -> Self {
        let mut summary = Self {
            discovered: reports.len(),
            duration_seconds: duration.as_secs_f64(),
            ..Self::default()
        };

        for report in reports {
            match &report.status {
                ProjectStatus::Dispatched(_) => summary.dispatched += 1,
                ProjectStatus::Malformed(_) => summary.malformed += 1,
                ProjectStatus::Vanished => summary.vanished += 1,
                ProjectStatus::Crashed(error) => {
                    summary.crashed += 1;
                    summary.failures.push(FailureRecord {
                        project: report.project.name.clone(),
                        analysis: String::new(),
                        error: error.clone(),
                    });
                }
                ProjectStatus::Halted => summary.halted_projects += 1,
            }

            for record in report.records() {
                match &record.outcome {
                    BindingOutcome::OutOfScope => summary.out_of_scope += 1,
                    BindingOutcome::NotEligible => summary.not_eligible += 1,
                    BindingOutcome::WouldRun => summary.would_run += 1,
                    BindingOutcome::Completed => summary.completed += 1,
                    BindingOutcome::Failed(error) => {
                        summary.failed += 1;
                        summary.failures.push(FailureRecord {
                            project: report.project.name.clone(),
                            analysis: record.analysis.clone(),
                            error: error.clone(),
                        });
                    }
                    BindingOutcome::Halted => summary.halted_bindings += 1,
                }
            }
        }

        summary.halted = summary.halted_projects > 0 || summary.halted_bindings > 0;
        summary
    }

    /// Invocations that actually reached an analysis (or would have, in a dry run).
    pub fn invocations(&self) -> usize {
        self.completed + self.failed + self.would_run
    }
}
