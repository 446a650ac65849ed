//! `cleanup` command: close leftover incognito windows

use crate::browser::{executable_name, resolve_browser};
use crate::config::{GRACE_PERIOD, KILL_PERIOD};
use crate::core::models::ProcessSet;
use crate::core::ownership::{Ownership, OwnershipClassifier};
use crate::core::process_tree::ProcessSnapshot;
use crate::terminator::ProcessTerminator;
use anyhow::Result;
use std::path::Path;

/// Outcome of a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub targeted: ProcessSet,
    pub unreached: ProcessSet,
}

/// Stop every incognito process of the browser not in `protected`.
pub async fn sweep_incognito(target: &str, protected: &ProcessSet) -> Result<SweepReport> {
    let snapshot = ProcessSnapshot::take()?;
    let targeted =
        OwnershipClassifier::new(target, protected).eligible(&snapshot, Ownership::IncognitoSweep);
    let report = ProcessTerminator::default()
        .terminate(&targeted, GRACE_PERIOD, KILL_PERIOD)
        .await;
    Ok(SweepReport {
        targeted,
        unreached: report.survivors(),
    })
}

pub async fn execute(browser: Option<&Path>) -> Result<SweepReport> {
    let browser = resolve_browser(browser)?;
    let target = executable_name(&browser);
    tracing::info!(%target, "sweeping incognito processes");
    sweep_incognito(&target, &ProcessSet::new()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_without_matches_is_empty() {
        let report = sweep_incognito("no-such-browser-here", &ProcessSet::new())
            .await
            .unwrap();
        assert!(report.targeted.is_empty());
        assert!(report.unreached.is_empty());
    }
}
