//! Process-lifetime registry of run and install jobs

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use clevert_actions::RunJob;
use clevert_extensions::InstallJob;

/// Jobs by id. Entries are never evicted.
#[derive(Debug, Default)]
pub struct JobRegistry {
    runs: RwLock<BTreeMap<String, Arc<RunJob>>>,
    installs: RwLock<BTreeMap<String, Arc<InstallJob>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_run(&self, job: Arc<RunJob>) {
        self.runs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job.id.clone(), job);
    }

    pub fn insert_install(&self, job: Arc<InstallJob>) {
        self.installs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job.id.clone(), job);
    }

    pub fn run(&self, id: &str) -> Option<Arc<RunJob>> {
        self.runs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn install(&self, id: &str) -> Option<Arc<InstallJob>> {
        self.installs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Snapshot of all run jobs in id order
    pub fn runs(&self) -> Vec<Arc<RunJob>> {
        self.runs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Snapshot of all install jobs in id order
    pub fn installs(&self) -> Vec<Arc<InstallJob>> {
        self.installs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_in_id_order() {
        let registry = JobRegistry::new();
        for id in ["1700000001_000000", "1700000000_000001", "1700000000_000000"] {
            registry.insert_run(RunJob::failed(id.into(), "t".into(), "boom"));
        }
        let ids: Vec<String> = registry.runs().iter().map(|j| j.id.clone()).collect();
        assert_eq!(
            ids,
            vec!["1700000000_000000", "1700000000_000001", "1700000001_000000"]
        );
        assert!(registry.run("1700000000_000001").is_some());
        assert!(registry.run("missing").is_none());
        assert!(registry.installs().is_empty());
    }
}
