//! Analysis bindings: one analysis, one predicate, one scope.

use crate::metadata::ProjectMetadata;
use crate::models::BindingOutcome;
use crate::predicates::Predicate;
use anyhow::{anyhow, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Once};
use tracing::subscriber::NoSubscriber;
use tracing::{error, info};

/// A runnable analysis unit, bound to one project directory.
pub trait Analysis: Send {
    /// Perform the analysis. Output is the analysis's own business.
    fn run(&mut self) -> Result<()>;
}

/// Builds analysis units for project directories.
pub trait AnalysisFactory: Send + Sync {
    /// Name used in logs and summaries.
    fn name(&self) -> &str;

    /// Construct the analysis for `project_dir`.
    fn create(&self, project_dir: &Path) -> Result<Box<dyn Analysis>>;
}

/// Whether bindings invoke analyses or only report that they would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    #[default]
    Execute,
    DryRun,
}

/// Couples an analysis with the conditions under which it runs.
#[derive(Clone)]
pub struct AnalysisBinding {
    factory: Arc<dyn AnalysisFactory>,
    predicate: Predicate,
    scope: String,
}

impl std::fmt::Debug for AnalysisBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisBinding")
            .field("analysis", &self.factory.name())
            .field("predicate", &self.predicate)
            .field("scope", &self.scope)
            .finish()
    }
}

impl AnalysisBinding {
    /// Bind `factory` to `predicate` with no scope restriction.
    pub fn new(factory: Arc<dyn AnalysisFactory>, predicate: Predicate) -> Self {
        Self {
            factory,
            predicate,
            scope: String::new(),
        }
    }

    /// Restrict to directory paths containing `scope`. Empty matches everything.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn name(&self) -> &str {
        self.factory.name()
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Substring match of the scope against the directory path.
    pub fn in_scope(&self, project_dir: &Path) -> bool {
        self.scope.is_empty() || project_dir.to_string_lossy().contains(self.scope.as_str())
    }

    /// Decide whether to run for this project, then run.
    ///
    /// Failures and panics inside the analysis are logged here and returned
    /// as [`BindingOutcome::Failed`].
    pub fn dispatch(
        &self,
        project_dir: &Path,
        metadata: &ProjectMetadata,
        mode: DispatchMode,
    ) -> BindingOutcome {
        if !self.in_scope(project_dir) {
            return BindingOutcome::OutOfScope;
        }

        let name = self.name();
        let dir = project_dir.display();

        if !self.predicate.evaluate(metadata) {
            info!(
                "Required conditions not met for {} in {}. Skipping analysis.",
                name, dir
            );
            return BindingOutcome::NotEligible;
        }

        if mode == DispatchMode::DryRun {
            info!("Would run {} for {}", name, dir);
            return BindingOutcome::WouldRun;
        }

        info!("Running {} for {}", name, dir);
        match self.invoke(project_dir) {
            Ok(()) => BindingOutcome::Completed,
            Err(e) => {
                error!("{} failed for {}: {:#}", name, dir, e);
                BindingOutcome::Failed(format!("{:#}", e))
            }
        }
    }

    fn invoke(&self, project_dir: &Path) -> Result<()> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut analysis = self.factory.create(project_dir)?;
            analysis.run()
        }));

        match result {
            Ok(outcome) => outcome,
            Err(payload) => Err(anyhow!("analysis panicked: {}", panic_message(&*payload))),
        }
    }
}

/// Report panics through the thread's tracing dispatcher instead of raw stderr.
///
/// Threads with no subscriber keep the previous hook. Installing twice is a no-op.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if tracing::dispatcher::get_default(|d| d.is::<NoSubscriber>()) {
                previous(info);
                return;
            }
            match info.location() {
                Some(at) => error!("Panic at {}:{}: {}", at.file(), at.line(), panic_message(info.payload())),
                None => error!("Panic: {}", panic_message(info.payload())),
            }
        }));
    });
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording analyses shared by dispatch tests.

    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Log of (analysis, directory) invocations, in call order.
    pub type CallLog = Arc<Mutex<Vec<(String, PathBuf)>>>;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Behavior {
        Succeed,
        Fail,
        Panic,
        FailToConstruct,
    }

    pub struct RecordingFactory {
        pub name: String,
        pub behavior: Behavior,
        pub calls: CallLog,
        pub created: Arc<Mutex<usize>>,
    }

    impl RecordingFactory {
        pub fn new(name: &str, calls: &CallLog) -> Self {
            Self::with_behavior(name, calls, Behavior::Succeed)
        }

        pub fn with_behavior(name: &str, calls: &CallLog, behavior: Behavior) -> Self {
            Self {
                name: name.to_string(),
                behavior,
                calls: calls.clone(),
                created: Arc::new(Mutex::new(0)),
            }
        }
    }

    struct RecordingAnalysis {
        name: String,
        dir: PathBuf,
        behavior: Behavior,
        calls: CallLog,
    }

    impl Analysis for RecordingAnalysis {
        fn run(&mut self) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((self.name.clone(), self.dir.clone()));
            match self.behavior {
                Behavior::Succeed | Behavior::FailToConstruct => Ok(()),
                Behavior::Fail => Err(anyhow!("crawler returned an error")),
                Behavior::Panic => panic!("crawler blew up"),
            }
        }
    }

    impl AnalysisFactory for RecordingFactory {
        fn name(&self) -> &str {
            &self.name
        }

        fn create(&self, project_dir: &Path) -> Result<Box<dyn Analysis>> {
            *self.created.lock().unwrap() += 1;
            if self.behavior == Behavior::FailToConstruct {
                return Err(anyhow!("cannot construct {}", self.name));
            }
            Ok(Box::new(RecordingAnalysis {
                name: self.name.clone(),
                dir: project_dir.to_path_buf(),
                behavior: self.behavior,
                calls: self.calls.clone(),
            }))
        }
    }

    pub fn call_log() -> CallLog {
        Arc::new(Mutex::new(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::path::PathBuf;

    fn meta(yaml: &str) -> ProjectMetadata {
        ProjectMetadata::new(serde_yaml::from_str(yaml).unwrap())
    }

    fn binding(factory: RecordingFactory, predicate: Predicate) -> AnalysisBinding {
        AnalysisBinding::new(Arc::new(factory), predicate)
    }

    #[test]
    fn test_scope_mismatch_never_invokes() {
        let calls = call_log();
        let b = binding(RecordingFactory::new("CoinGeckoCrawler", &calls), Predicate::Always)
            .with_scope("cex");

        let outcome = b.dispatch(Path::new("stablecoin/usdt"), &meta("{}"), DispatchMode::Execute);
        assert_eq!(outcome, BindingOutcome::OutOfScope);
        assert!(calls.lock().unwrap().is_empty());

        let outcome = b.dispatch(Path::new("cex/binance"), &meta("{}"), DispatchMode::Execute);
        assert_eq!(outcome, BindingOutcome::Completed);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![("CoinGeckoCrawler".to_string(), PathBuf::from("cex/binance"))]
        );
    }

    #[test]
    fn test_empty_scope_matches_everything() {
        let calls = call_log();
        let b = binding(RecordingFactory::new("SosoValue", &calls), Predicate::Always);
        assert!(b.in_scope(Path::new("anything/at/all")));
        assert!(b.in_scope(Path::new("")));
    }

    #[test]
    fn test_predicate_false_skips() {
        let calls = call_log();
        let factory = RecordingFactory::new("Twitter", &calls);
        let created = factory.created.clone();
        let b = binding(factory, Predicate::SocialLink("twitter".to_string()));

        let outcome = b.dispatch(Path::new("cex/okx"), &meta("links: {twitter: \"\"}"), DispatchMode::Execute);
        assert_eq!(outcome, BindingOutcome::NotEligible);
        assert_eq!(*created.lock().unwrap(), 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dry_run_does_not_construct() {
        let calls = call_log();
        let factory = RecordingFactory::new("Twitter", &calls);
        let created = factory.created.clone();
        let b = binding(factory, Predicate::Always);

        let outcome = b.dispatch(Path::new("cex/okx"), &meta("{}"), DispatchMode::DryRun);
        assert_eq!(outcome, BindingOutcome::WouldRun);
        assert_eq!(*created.lock().unwrap(), 0);
    }

    #[test]
    fn test_failures_are_contained() {
        let calls = call_log();
        let dir = Path::new("cex/okx");

        for behavior in [Behavior::Fail, Behavior::Panic, Behavior::FailToConstruct] {
            let b = binding(
                RecordingFactory::with_behavior("Flaky", &calls, behavior),
                Predicate::Always,
            );
            let outcome = b.dispatch(dir, &meta("{}"), DispatchMode::Execute);
            assert!(
                matches!(outcome, BindingOutcome::Failed(_)),
                "{:?} gave {:?}",
                behavior,
                outcome
            );
        }

        let panicked = binding(
            RecordingFactory::with_behavior("Flaky", &calls, Behavior::Panic),
            Predicate::Always,
        )
        .dispatch(dir, &meta("{}"), DispatchMode::Execute);
        assert_eq!(
            panicked,
            BindingOutcome::Failed("analysis panicked: crawler blew up".to_string())
        );
    }

    #[test]
    fn test_binding_is_reusable() {
        let calls = call_log();
        let b = binding(RecordingFactory::new("SosoValue", &calls), Predicate::Always);
        let m = meta("{}");

        for dir in ["cex/okx", "stablecoin/dai", "cex/okx"] {
            assert_eq!(b.dispatch(Path::new(dir), &m, DispatchMode::Execute), BindingOutcome::Completed);
        }
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(&*payload), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
