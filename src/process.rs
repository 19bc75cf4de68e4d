//! Per-process working directory tracking
//!
//! filemon interleaves records from every process of a build step. Each pid
//! has its own cwd; one global "last directory" hint follows whichever process
//! is active. Transitions here are pure bookkeeping: callers resolve paths
//! before handing them over, so the tracker never touches the filesystem.

use std::collections::{BTreeMap, HashMap};

use crate::record::Pid;

/// Process state for one meta file
#[derive(Debug, Clone, Default)]
pub struct ProcessState {
    /// Working directory from the `CWD` header
    baseline: String,
    cwds: HashMap<Pid, String>,
    last_dirs: HashMap<Pid, String>,
    /// Cached values for the active pid
    active: Option<Pid>,
    cwd: String,
    last_dir: String,
    /// pid -> executed path, until the matching exit
    pending: BTreeMap<Pid, String>,
}

impl ProcessState {
    pub fn new(baseline: impl Into<String>) -> Self {
        let baseline = baseline.into();
        Self {
            cwd: baseline.clone(),
            last_dir: baseline.clone(),
            baseline,
            ..Default::default()
        }
    }

    /// Reseed from a `CWD` header line
    pub fn set_baseline(&mut self, cwd: &str) {
        self.baseline = cwd.to_string();
        self.cwd = cwd.to_string();
        self.last_dir = cwd.to_string();
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    /// Working directory of the active pid
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Global last-directory hint
    pub fn last_dir(&self) -> &str {
        &self.last_dir
    }

    pub fn set_last_dir(&mut self, dir: &str) {
        self.last_dir = dir.to_string();
    }

    /// Make `pid` the active context
    ///
    /// Only does work when the pid changes, so bursts of records from one
    /// process cost a single comparison each.
    pub fn switch_to(&mut self, pid: Pid) {
        if self.active == Some(pid) {
            return;
        }
        if let Some(prev) = self.active {
            self.last_dirs.insert(prev, self.last_dir.clone());
        }
        self.cwd = self
            .cwds
            .get(&pid)
            .cloned()
            .unwrap_or_else(|| self.baseline.clone());
        self.last_dir = self
            .last_dirs
            .get(&pid)
            .cloned()
            .unwrap_or_else(|| self.baseline.clone());
        self.active = Some(pid);
    }

    /// `F pid child`: the child inherits the active pid's cwd and last dir
    pub fn fork(&mut self, pid: Pid, child: Pid) {
        self.switch_to(pid);
        self.last_dirs.insert(pid, self.last_dir.clone());
        self.cwds.insert(child, self.cwd.clone());
        self.last_dirs.insert(child, self.last_dir.clone());
        self.active = Some(child);
    }

    /// `C pid dir` with `dir` already resolved
    pub fn chdir(&mut self, pid: Pid, dir: &str) {
        self.switch_to(pid);
        self.cwd = dir.to_string();
        self.last_dir = dir.to_string();
        self.cwds.insert(pid, dir.to_string());
        self.last_dirs.insert(pid, dir.to_string());
    }

    /// `E pid path`
    pub fn exec(&mut self, pid: Pid, path: &str) {
        self.switch_to(pid);
        self.pending.insert(pid, path.to_string());
    }

    /// `X pid`
    pub fn exit(&mut self, pid: Pid) {
        self.switch_to(pid);
        self.pending.remove(&pid);
    }

    /// Execs still waiting for an exit, in pid order
    pub fn pending_execs(&self) -> impl Iterator<Item = (Pid, &str)> + '_ {
        self.pending.iter().map(|(pid, path)| (*pid, path.as_str()))
    }
}
