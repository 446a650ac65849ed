//! Process table snapshots
//!
//! A [`ProcessSnapshot`] is the whole process table read once. Everything that
//! needs ancestry or names (protected-set capture, ownership classification)
//! works on one snapshot so that a pid recycled after the read can never be
//! mistaken for the process that was seen.
//!
//! Platform strategy:
//! - Linux/macOS: psutil for names, command lines and parents, nix for groups
//! - Windows: sysinfo

use crate::core::models::{ProcessId, ProcessRecord, ProcessSet};
use crate::error::SnapshotError;
use crate::platform;
use std::collections::{HashMap, HashSet, VecDeque};

/// Point-in-time view of running processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    records: Vec<ProcessRecord>,
}

impl ProcessSnapshot {
    /// Read the live process table.
    ///
    /// Processes that exit mid-read, or that we may not inspect, are left out.
    pub fn take() -> Result<Self, SnapshotError> {
        let records = platform::list_processes()?;
        Ok(Self { records })
    }

    /// Build a snapshot from records gathered elsewhere.
    pub fn from_records(records: Vec<ProcessRecord>) -> Self {
        Self { records }
    }

    /// Ids of every running instance of `target`, best effort.
    ///
    /// Enumeration failure yields an empty set: an unreadable process table
    /// must not stop a run, it only weakens protection.
    pub fn capture(target: &str) -> ProcessSet {
        match Self::take() {
            Ok(snapshot) => snapshot.matching(target),
            Err(err) => {
                tracing::warn!(error = %err, "process enumeration failed; protected set is empty");
                ProcessSet::new()
            }
        }
    }

    pub fn records(&self) -> &[ProcessRecord] {
        &self.records
    }

    pub fn get(&self, pid: ProcessId) -> Option<&ProcessRecord> {
        self.records.iter().find(|record| record.id == pid)
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.get(pid).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids of instances of `target` in this snapshot.
    pub fn matching(&self, target: &str) -> ProcessSet {
        self.records
            .iter()
            .filter(|record| record.matches_executable(target))
            .map(|record| record.id)
            .collect()
    }

    /// All processes whose parent chain leads to `root`, excluding `root`.
    ///
    /// Breadth-first over parent links recorded in this snapshot. A record
    /// that names itself as parent is ignored.
    pub fn descendants_of(&self, root: ProcessId) -> ProcessSet {
        let mut children: HashMap<ProcessId, Vec<ProcessId>> = HashMap::new();
        for record in &self.records {
            if let Some(parent) = record.parent_id {
                if parent != record.id {
                    children.entry(parent).or_default().push(record.id);
                }
            }
        }

        let mut found = ProcessSet::new();
        let mut visited: HashSet<ProcessId> = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(pid) = queue.pop_front() {
            if let Some(kids) = children.get(&pid) {
                for &child in kids {
                    if visited.insert(child) {
                        found.insert(child);
                        queue.push_back(child);
                    }
                }
            }
        }
        found
    }

    /// Ids of processes in process group `group`.
    pub fn group_members(&self, group: ProcessId) -> ProcessSet {
        self.records
            .iter()
            .filter(|record| record.process_group == Some(group))
            .map(|record| record.id)
            .collect()
    }
}
