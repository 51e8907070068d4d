//! Provisioning lifecycle — ordered steps, runner, and audit reports
//!
//! The lifecycle is an explicit ordered list of steps sharing one
//! interface; the runner calls them positionally, never by name:
//!
//! 1. `check_ready` on every step — the first `false` defers the whole run
//!    (non-fatal; the orchestrator decides whether to skip, fail, or wait)
//! 2. `apply` on every step — first error aborts
//! 3. `finalize` on every step — the coda, only reached when every apply
//!    succeeded, never interleaved with them

pub mod cert;
pub mod hba;
pub mod rules;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::Result;
use crate::config::ProvisionConfig;
use crate::exec::{CommandExecutor, ExecOutput};

pub use cert::CertStep;
pub use hba::HbaStep;

/// Read-only view of a provisioning run's collaborators.
///
/// The config is owned by the caller for the task's whole duration; the
/// executor is the injected capability through which every external tool
/// is reached.
pub struct ProvisionContext<'a> {
    /// Run configuration (immutable for the duration of the task)
    pub config: &'a ProvisionConfig,
    /// External command capability
    pub executor: &'a dyn CommandExecutor,
}

/// One provisioning step in the ordered lifecycle.
#[async_trait]
pub trait ProvisionStep: Send + Sync {
    /// Short step name used in reports and logs
    fn name(&self) -> &'static str;

    /// Report whether the host is in a state where this step may run.
    /// No side effects.
    async fn check_ready(&self, ctx: &ProvisionContext<'_>) -> Result<bool>;

    /// Perform the step's mutation and return an audit report.
    async fn apply(&self, ctx: &ProvisionContext<'_>) -> Result<StepReport>;

    /// Coda work for this step; runs only after every step applied cleanly.
    async fn finalize(&self, ctx: &ProvisionContext<'_>) -> Result<()>;
}

/// Audit record of one applied step.
#[derive(Debug, Serialize)]
pub struct StepReport {
    /// Step name
    pub step: &'static str,
    /// File written by the step, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Full content written, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Raw outputs of external tools invoked by the step, in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<ExecOutput>,
}

impl StepReport {
    /// Report for a step that only invoked external tools
    #[must_use]
    pub fn commands(step: &'static str, commands: Vec<ExecOutput>) -> Self {
        Self {
            step,
            path: None,
            content: None,
            commands,
        }
    }

    /// Report for a step that wrote a file
    #[must_use]
    pub fn written(step: &'static str, path: PathBuf, content: String) -> Self {
        Self {
            step,
            path: Some(path),
            content: Some(content),
            commands: Vec::new(),
        }
    }
}

/// Outcome of a whole run.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "step")]
pub enum RunOutcome {
    /// Every step applied and finalized
    Completed,
    /// A precondition was not met; nothing was mutated
    Deferred(&'static str),
}

/// Serializable audit report of one provisioning run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Terminal outcome
    #[serde(flatten)]
    pub outcome: RunOutcome,
    /// Per-step reports, in execution order (empty when deferred)
    pub steps: Vec<StepReport>,
}

/// Positional step runner.
pub struct StepRunner {
    steps: Vec<Box<dyn ProvisionStep>>,
}

impl StepRunner {
    /// The standard lifecycle: rule merge, then certificate trust.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            steps: vec![Box::new(HbaStep), Box::new(CertStep)],
        }
    }

    /// Build a runner over an explicit step list (tests).
    #[must_use]
    pub fn new(steps: Vec<Box<dyn ProvisionStep>>) -> Self {
        Self { steps }
    }

    /// Check every step's precondition, in order.
    ///
    /// Returns the name of the first step that is not ready, or `None`
    /// when the host is ready for the full run.
    pub async fn check(&self, ctx: &ProvisionContext<'_>) -> Result<Option<&'static str>> {
        for step in &self.steps {
            if !step.check_ready(ctx).await? {
                return Ok(Some(step.name()));
            }
        }
        Ok(None)
    }

    /// Run the full lifecycle.
    ///
    /// No step retries internally; the first fatal error aborts the
    /// remaining lifecycle and propagates to the orchestrator.
    pub async fn run(&self, ctx: &ProvisionContext<'_>) -> Result<RunReport> {
        if let Some(step) = self.check(ctx).await? {
            warn!(step, "precondition not met, deferring run");
            return Ok(RunReport {
                outcome: RunOutcome::Deferred(step),
                steps: Vec::new(),
            });
        }

        let mut reports = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            info!(step = step.name(), "applying");
            reports.push(step.apply(ctx).await?);
        }

        for step in &self.steps {
            step.finalize(ctx).await?;
        }

        info!("provisioning run complete");
        Ok(RunReport {
            outcome: RunOutcome::Completed,
            steps: reports,
        })
    }
}
