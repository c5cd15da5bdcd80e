//! Conditional dispatch of analyses over project directories.
//!
//! This module binds analyses to eligibility predicates and directory
//! scopes, and runs the eligible subset for every discovered project.

pub mod binding;
pub mod command;
pub mod orchestrator;

pub use binding::{install_panic_hook, AnalysisBinding, DispatchMode};
pub use command::CommandFactory;
pub use orchestrator::{DispatchSettings, Orchestrator};

use crate::config::AnalysisConfig;
use crate::reference::ReferenceSet;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::debug;

/// Build the ordered binding list from configured analyses.
///
/// Disabled entries are dropped; order is otherwise preserved.
pub fn bindings_from_config(
    analyses: &[AnalysisConfig],
    references: Option<&Arc<ReferenceSet>>,
) -> Result<Vec<AnalysisBinding>> {
    let mut bindings = Vec::with_capacity(analyses.len());

    for analysis in analyses {
        if !analysis.enabled {
            debug!("Analysis {} is disabled", analysis.name);
            continue;
        }

        if analysis.name.trim().is_empty() {
            bail!("Analysis with command {:?} has no name", analysis.command);
        }

        if analysis.predicate.needs_references() && references.is_none() {
            bail!(
                "Analysis '{}' uses predicate '{}' but no reference_map is configured",
                analysis.name,
                analysis.predicate
            );
        }
        let predicate = analysis
            .predicate
            .resolve(references)
            .with_context(|| format!("Cannot resolve predicate for '{}'", analysis.name))?;

        let factory = CommandFactory::new(analysis.name.clone(), &analysis.command)?;
        bindings.push(AnalysisBinding::new(Arc::new(factory), predicate).with_scope(&analysis.scope));
    }

    Ok(bindings)
}
