//! Host-based authentication rule merge
//!
//! Appends the managed rule block to the cluster's existing `pg_hba.conf`.
//! Pure concatenation: existing lines are never reordered, deduplicated, or
//! dropped, and the managed block always lands last. The merge is
//! intentionally *not* idempotent — running it twice appends the block
//! twice. Orchestrators must run this step at most once per host lifetime
//! (see DESIGN.md).

use async_trait::async_trait;
use tracing::{debug, info};

use crate::provision::rules;
use crate::provision::{ProvisionContext, ProvisionStep, StepReport};
use crate::{Error, Result};

/// Rule-merge step: precondition on the target file, then append the
/// managed block.
pub struct HbaStep;

#[async_trait]
impl ProvisionStep for HbaStep {
    fn name(&self) -> &'static str {
        "hba"
    }

    /// The expected `pg_hba.conf` for `(version, instance)` exists.
    ///
    /// Absence is a normal "not ready" signal, not an error.
    async fn check_ready(&self, ctx: &ProvisionContext<'_>) -> Result<bool> {
        let cluster = &ctx.config.cluster;
        rules::validate_segment("cluster.version", &cluster.version)?;
        rules::validate_segment("cluster.instance", &cluster.instance)?;

        let target = rules::hba_path(&cluster.conf_root, &cluster.version, &cluster.instance);
        let ready = tokio::fs::try_exists(&target).await?;
        debug!(target = %target.display(), ready, "hba precondition");
        Ok(ready)
    }

    /// Load the per-version template, then overwrite the target with
    /// `existing lines ++ managed block`.
    async fn apply(&self, ctx: &ProvisionContext<'_>) -> Result<StepReport> {
        let cluster = &ctx.config.cluster;

        // Gates supported versions; the appended block itself is the
        // compiled-in constant, not template content.
        let template =
            rules::load_template(&ctx.config.templates.directory, &cluster.version).await?;
        debug!(
            version = %cluster.version,
            template_lines = template.len(),
            "rule template loaded"
        );

        let target = rules::hba_path(&cluster.conf_root, &cluster.version, &cluster.instance);
        let existing = match tokio::fs::read_to_string(&target).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::TargetMissing(target));
            }
            Err(e) => return Err(e.into()),
        };

        let content = merge_rules(&existing);
        tokio::fs::write(&target, &content).await?;

        info!(
            target = %target.display(),
            appended = rules::HBA_RULE_BLOCK.len(),
            "managed hba entries appended"
        );
        Ok(StepReport::written("hba", target, content))
    }

    async fn finalize(&self, _ctx: &ProvisionContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Concatenate the managed rule block onto `existing`, newline-joined.
fn merge_rules(existing: &str) -> String {
    let mut lines: Vec<&str> = existing.split('\n').collect();
    lines.extend_from_slice(rules::HBA_RULE_BLOCK);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_preserves_existing_content_as_prefix() {
        let existing = "local all all trust\nhost all all 127.0.0.1/32 md5\n";
        let merged = merge_rules(existing);
        assert!(merged.starts_with(existing));
    }

    #[test]
    fn merge_appends_block_exactly_once_per_invocation() {
        let once = merge_rules("local all all trust\n");
        let twice = merge_rules(&once);

        let marker = rules::HBA_RULE_BLOCK[0];
        assert_eq!(once.matches(marker).count(), 1);
        // Not idempotent by design: a second run doubles the block.
        assert_eq!(twice.matches(marker).count(), 2);
    }

    #[test]
    fn merged_content_ends_with_commented_catch_all() {
        let merged = merge_rules("local all all trust\n");
        let last = merged.split('\n').next_back().unwrap();
        assert_eq!(last, *rules::HBA_RULE_BLOCK.last().unwrap());
    }

    #[test]
    fn merge_matches_reference_scenario_line_by_line() {
        // version "9.3", instance "prod1", existing single trust line
        let merged = merge_rules("local all all trust\n");
        let mut expected: Vec<&str> = vec!["local all all trust", ""];
        expected.extend_from_slice(rules::HBA_RULE_BLOCK);
        assert_eq!(merged.split('\n').collect::<Vec<_>>(), expected);
    }
}
