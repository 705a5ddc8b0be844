use jiff::Zoned;
use std::fmt;

/// Terminal state of one module in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Not processed: ignored on this branch or locked by another process
    Skipped(String),
    NoUpdate(String),
    Updated {
        from: String,
        to: String,
        simulated: bool,
    },
    Failed(String),
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Skipped(reason) => write!(f, "skipped: {reason}"),
            ModuleStatus::NoUpdate(reason) => write!(f, "no update: {reason}"),
            ModuleStatus::Updated {
                from,
                to,
                simulated,
            } => {
                write!(f, "{from} -> {to}")?;
                if *simulated {
                    f.write_str(" (simulated)")?;
                }
                Ok(())
            }
            ModuleStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutcome {
    pub module: String,
    pub status: ModuleStatus,
}

/// Everything that happened during one run, owned by the caller.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcomes: Vec<ModuleOutcome>,
    /// `(module, message)` for every failure plus non-terminal problems
    pub errors: Vec<(String, String)>,
    pub started: Zoned,
    pub finished: Option<Zoned>,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            outcomes: Vec::new(),
            errors: Vec::new(),
            started: Zoned::now(),
            finished: None,
        }
    }

    /// Record the final status of a module. Failures also land in `errors`.
    pub fn record(&mut self, module: &str, status: ModuleStatus) {
        if let ModuleStatus::Failed(reason) = &status {
            self.errors.push((module.to_string(), reason.clone()));
        }
        self.outcomes.push(ModuleOutcome {
            module: module.to_string(),
            status,
        });
    }

    /// Record a problem that did not stop the module.
    pub fn record_error(&mut self, module: &str, message: impl Into<String>) {
        self.errors.push((module.to_string(), message.into()));
    }

    pub fn finish(&mut self) {
        self.finished = Some(Zoned::now());
    }

    pub fn updates(&self) -> impl Iterator<Item = &ModuleOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ModuleStatus::Updated { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &ModuleOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ModuleStatus::Failed(_)))
    }

    #[cfg(test)]
    pub fn status_of(&self, module: &str) -> Option<&ModuleStatus> {
        self.outcomes
            .iter()
            .find(|o| o.module == module)
            .map(|o| &o.status)
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Wall clock seconds between start and finish.
    pub fn elapsed_secs(&self) -> Option<i64> {
        let finished = self.finished.as_ref()?;
        Some(finished.timestamp().as_second() - self.started.timestamp().as_second())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_errors() {
        let mut summary = RunSummary::new();
        summary.record("gtk4", ModuleStatus::NoUpdate("already current".into()));
        summary.record("mutter", ModuleStatus::Failed("Push failed".into()));
        summary.record(
            "gnome-shell",
            ModuleStatus::Updated {
                from: "48.0".into(),
                to: "48.1".into(),
                simulated: false,
            },
        );

        assert_eq!(summary.failures().count(), 1);
        assert_eq!(summary.updates().count(), 1);
        assert_eq!(
            summary.errors,
            vec![("mutter".to_string(), "Push failed".to_string())]
        );
        assert!(!summary.is_success());
    }

    #[test]
    fn secondary_errors_keep_outcome() {
        let mut summary = RunSummary::new();
        summary.record_error("gtk4", "Sync to rawhide failed");
        summary.record(
            "gtk4",
            ModuleStatus::Updated {
                from: "4.18.0".into(),
                to: "4.18.1".into(),
                simulated: false,
            },
        );
        assert_eq!(summary.failures().count(), 0);
        assert_eq!(summary.errors.len(), 1);
        assert!(matches!(
            summary.status_of("gtk4"),
            Some(ModuleStatus::Updated { .. })
        ));
    }

    #[test]
    fn finish_sets_elapsed() {
        let mut summary = RunSummary::new();
        assert_eq!(summary.elapsed_secs(), None);
        summary.finish();
        assert!(summary.elapsed_secs().unwrap() >= 0);
    }

    #[test]
    fn status_display() {
        let status = ModuleStatus::Updated {
            from: "47.0".into(),
            to: "47.1".into(),
            simulated: true,
        };
        assert_eq!(status.to_string(), "47.0 -> 47.1 (simulated)");
    }
}
