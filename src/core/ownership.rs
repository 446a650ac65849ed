//! Ownership classification
//!
//! Decides which running processes belong to this run and may be terminated.
//! The protected set, captured before anything was launched, always wins: no
//! mode ever returns one of its ids.
//!
//! Two strategies exist because the browser behaves differently per mode:
//!
//! - [`Ownership::Tree`]: we hold the primary pid. Its descendants in the
//!   snapshot are ours, and so is anything left in its process group, which
//!   is how helpers reparented to init after their parent exited are found.
//!   The group exists because the launcher puts the browser in a fresh
//!   process group at spawn time (Unix).
//! - [`Ownership::IncognitoSweep`]: no usable pid. Incognito windows share no
//!   profile directory with us, so the incognito flag on the command line is
//!   the only ownership signal left. Everything not protected that matches the
//!   executable and carries the flag is treated as ours.

use crate::config::INCOGNITO_FLAG;
use crate::core::models::{ProcessId, ProcessSet};
use crate::core::process_tree::ProcessSnapshot;

/// Which ownership signal to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Tree { primary: ProcessId },
    IncognitoSweep,
}

#[derive(Debug, Clone)]
pub struct OwnershipClassifier<'a> {
    target: &'a str,
    protected: &'a ProcessSet,
}

impl<'a> OwnershipClassifier<'a> {
    /// `target` is the browser executable name; `protected` the pre-run capture.
    pub fn new(target: &'a str, protected: &'a ProcessSet) -> Self {
        Self { target, protected }
    }

    /// Ids eligible for termination under `mode`.
    pub fn eligible(&self, snapshot: &ProcessSnapshot, mode: Ownership) -> ProcessSet {
        let candidates = match mode {
            Ownership::Tree { primary } => {
                let mut owned = snapshot.descendants_of(primary);
                if snapshot.contains(primary) {
                    owned.insert(primary);
                }
                // a group outlives its leader, and its id is not reused while
                // members remain
                owned.extend(snapshot.group_members(primary));
                owned
            }
            Ownership::IncognitoSweep => snapshot
                .records()
                .iter()
                .filter(|record| {
                    record.matches_executable(self.target) && record.has_flag(INCOGNITO_FLAG)
                })
                .map(|record| record.id)
                .collect(),
        };

        candidates
            .into_iter()
            .filter(|pid| !self.protected.contains(pid))
            .collect()
    }

    /// Union of several modes against the same snapshot.
    pub fn eligible_any(&self, snapshot: &ProcessSnapshot, modes: &[Ownership]) -> ProcessSet {
        modes
            .iter()
            .flat_map(|mode| self.eligible(snapshot, *mode))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ProcessRecord;
    use pretty_assertions::assert_eq;

    fn chrome(id: ProcessId, parent: ProcessId, incognito: bool) -> ProcessRecord {
        let mut args = vec!["/opt/google/chrome/chrome".to_string()];
        if incognito {
            args.push("--incognito".to_string());
        }
        ProcessRecord::new(id, "chrome")
            .with_args(args)
            .with_parent(Some(parent))
    }

    fn snapshot() -> ProcessSnapshot {
        ProcessSnapshot::from_records(vec![
            ProcessRecord::new(1, "init"),
            // user's own browser, running before we started
            chrome(50, 1, false),
            chrome(51, 50, false),
            // user's own incognito window
            chrome(60, 1, true),
            // our launch
            chrome(100, 1, true),
            chrome(101, 100, false),
            ProcessRecord::new(102, "cat").with_parent(Some(101)),
            // helper orphaned into our process group
            chrome(103, 1, false).with_process_group(Some(100)),
            // unrelated incognito-flagged program
            ProcessRecord::new(70, "firefox").with_args(["firefox", "--incognito"]),
        ])
    }

    #[test]
    fn test_tree_mode_takes_primary_descendants_and_group() {
        let protected = ProcessSet::from([50, 51, 60]);
        let classifier = OwnershipClassifier::new("chrome", &protected);
        assert_eq!(
            classifier.eligible(&snapshot(), Ownership::Tree { primary: 100 }),
            ProcessSet::from([100, 101, 102, 103])
        );
    }

    #[test]
    fn test_tree_mode_filters_protected_descendants() {
        let protected = ProcessSet::from([101]);
        let classifier = OwnershipClassifier::new("chrome", &protected);
        let eligible = classifier.eligible(&snapshot(), Ownership::Tree { primary: 100 });
        assert!(!eligible.contains(&101));
        assert!(eligible.contains(&102));
    }

    #[test]
    fn test_tree_mode_with_exited_primary() {
        let protected = ProcessSet::new();
        let classifier = OwnershipClassifier::new("chrome", &protected);
        assert!(classifier
            .eligible(&snapshot(), Ownership::Tree { primary: 4242 })
            .is_empty());
    }

    #[test]
    fn test_tree_mode_finds_group_after_leader_exit() {
        let snapshot = ProcessSnapshot::from_records(vec![
            ProcessRecord::new(1, "init"),
            chrome(201, 1, false).with_process_group(Some(200)),
            chrome(202, 201, false).with_process_group(Some(200)),
        ]);
        let protected = ProcessSet::new();
        let classifier = OwnershipClassifier::new("chrome", &protected);
        assert_eq!(
            classifier.eligible(&snapshot, Ownership::Tree { primary: 200 }),
            ProcessSet::from([201, 202])
        );
    }

    #[test]
    fn test_incognito_sweep_protects_pre_existing_window() {
        let protected = ProcessSet::from([50, 51, 60]);
        let classifier = OwnershipClassifier::new("chrome", &protected);
        assert_eq!(
            classifier.eligible(&snapshot(), Ownership::IncognitoSweep),
            ProcessSet::from([100])
        );
    }

    #[test]
    fn test_incognito_sweep_with_empty_protected_set_takes_everything_flagged() {
        let protected = ProcessSet::new();
        let classifier = OwnershipClassifier::new("chrome", &protected);
        assert_eq!(
            classifier.eligible(&snapshot(), Ownership::IncognitoSweep),
            ProcessSet::from([60, 100])
        );
    }

    #[test]
    fn test_protected_ids_never_eligible() {
        let snapshot = snapshot();
        let all: Vec<ProcessId> = snapshot.records().iter().map(|r| r.id).collect();
        // every subset built from a sliding window of the pid list
        for start in 0..all.len() {
            for end in start..=all.len() {
                let protected: ProcessSet = all[start..end].iter().copied().collect();
                let classifier = OwnershipClassifier::new("chrome", &protected);
                let eligible = classifier.eligible_any(
                    &snapshot,
                    &[Ownership::Tree { primary: 100 }, Ownership::IncognitoSweep],
                );
                assert!(eligible.is_disjoint(&protected), "protected {protected:?} leaked");
            }
        }
    }
}
