//! Analyses backed by external programs.
//!
//! Each configured analysis is a command line; `{dir}` and `{project}` in the
//! arguments are replaced with the project directory and its folder name.

use super::binding::{Analysis, AnalysisFactory};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

const DIR_PLACEHOLDER: &str = "{dir}";
const PROJECT_PLACEHOLDER: &str = "{project}";

/// Builds [`CommandAnalysis`] units from a command template.
#[derive(Debug, Clone)]
pub struct CommandFactory {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandFactory {
    /// `command[0]` is the program, the rest are argument templates.
    pub fn new(name: impl Into<String>, command: &[String]) -> Result<Self> {
        let name = name.into();
        let (program, args) = match command.split_first() {
            Some((program, args)) if !program.trim().is_empty() => (program.clone(), args.to_vec()),
            _ => bail!("Analysis '{}' has an empty command", name),
        };

        Ok(Self {
            name,
            program,
            args,
        })
    }

    fn render_args(&self, project_dir: &Path) -> Vec<String> {
        let dir = project_dir.to_string_lossy();
        let project = project_dir
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        self.args
            .iter()
            .map(|arg| {
                arg.replace(DIR_PLACEHOLDER, &dir)
                    .replace(PROJECT_PLACEHOLDER, &project)
            })
            .collect()
    }
}

impl AnalysisFactory for CommandFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, project_dir: &Path) -> Result<Box<dyn Analysis>> {
        Ok(Box::new(CommandAnalysis {
            name: self.name.clone(),
            program: self.program.clone(),
            args: self.render_args(project_dir),
            project_dir: project_dir.to_path_buf(),
        }))
    }
}

/// One external program invocation for one project.
#[derive(Debug)]
pub struct CommandAnalysis {
    name: String,
    program: String,
    args: Vec<String>,
    project_dir: PathBuf,
}

impl Analysis for CommandAnalysis {
    fn run(&mut self) -> Result<()> {
        debug!("{}: {} {:?}", self.name, self.program, self.args);

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .with_context(|| format!("Failed to start '{}'", self.program))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!("[{}] {}", self.name, line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            bail!(
                "'{}' exited with {} for {}: {}",
                self.program,
                output.status,
                self.project_dir.display(),
                last.trim()
            );
        }

        Ok(())
    }
}
