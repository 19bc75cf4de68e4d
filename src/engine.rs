//! Meta file engine
//!
//! Replays a filemon capture record by record:
//!
//! - `INIT`: only the `CWD` header and the version record matter
//! - `ACTIVE`: process records update [`ProcessState`]; reads, execs and
//!   link sources are resolved and classified against the configured roots
//! - `DONE`: the capture must have had a version record, a termination
//!   comment, and no exec without a matching exit (setuid/setgid programs
//!   excepted)
//!
//! Dependencies accumulate across every meta file parsed by one engine until
//! [`MetaFileEngine::reset`]; process state is fresh for each file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::deps::{DependencyList, Dependencies};
use crate::error::{DanglingExec, MetaError, Result};
use crate::filesystem::{FileSystem, HostFs};
use crate::output::DependencyReport;
use crate::path::{abspath, real_divergence, resolve, split_dir};
use crate::process::ProcessState;
use crate::record::{TraceReader, TraceRecord};
use crate::roots::{RootMatcher, DIRDEP_MARKER};

/// First filemon protocol version that distinguishes write from read-write
pub const FIRST_SPLIT_WRITE_VERSION: u32 = 4;

/// Engine state while a meta file is being replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    Active,
    Done,
}

/// What a path is being looked at for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Exec,
    Read,
    Write,
}

/// Extracts DIRDEPS and SRC_DIRDEPS from meta files
pub struct MetaFileEngine<F: FileSystem = HostFs> {
    config: Arc<Config>,
    fs: F,
    deps: Dependencies,
    process: ProcessState,
    state: EngineState,
    name: String,
    version: u32,
    terminated: bool,
}

impl MetaFileEngine<HostFs> {
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_fs(config, HostFs)
    }
}

impl<F: FileSystem> MetaFileEngine<F> {
    /// Engine answering filesystem queries through `fs`
    pub fn with_fs(config: Arc<Config>, fs: F) -> Self {
        Self {
            config,
            fs,
            deps: Dependencies::new(),
            process: ProcessState::default(),
            state: EngineState::Init,
            name: String::new(),
            version: 0,
            terminated: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn obj_deps(&self) -> &DependencyList {
        &self.deps.obj_deps
    }

    pub fn src_deps(&self) -> &DependencyList {
        &self.deps.src_deps
    }

    pub fn file_deps(&self) -> &DependencyList {
        &self.deps.file_deps
    }

    /// Snapshot of everything discovered so far
    pub fn report(&self) -> DependencyReport {
        DependencyReport::from_dependencies(&self.deps)
    }

    /// Forget all dependencies, seen paths and process state
    pub fn reset(&mut self) {
        self.deps.clear();
        self.begin("");
    }

    fn begin(&mut self, name: &str) {
        let baseline = self.config.curdir().unwrap_or_default().to_string();
        self.process = ProcessState::new(baseline);
        self.state = EngineState::Init;
        self.name = name.to_string();
        self.version = 0;
        self.terminated = false;
    }

    /// Parse a meta file from disk
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| MetaError::Io {
            file: path.to_path_buf(),
            source,
        })?;
        self.parse_reader(&path.display().to_string(), BufReader::new(file))
    }

    /// Parse meta file text held in memory
    pub fn parse_str(&mut self, name: &str, text: &str) -> Result<()> {
        self.parse_reader(name, text.as_bytes())
    }

    /// Parse a meta file from any buffered reader
    pub fn parse_reader<R: BufRead>(&mut self, name: &str, reader: R) -> Result<()> {
        self.begin(name);
        debug!(file = name, "parsing meta file");
        if let Some(curdir) = self.config.curdir() {
            self.deps.seen.insert(curdir);
        }

        let mut reader = TraceReader::new(name, reader);
        for item in reader.by_ref() {
            let (line, record) = item?;
            self.dispatch(line, record)?;
        }
        self.finish(reader.line())
    }

    fn dispatch(&mut self, line: usize, record: TraceRecord) -> Result<()> {
        trace!(line, ?record, "record");
        if self.state == EngineState::Init {
            match record {
                TraceRecord::Cwd(dir) => {
                    debug!(file = %self.name, cwd = %dir, "initial cwd");
                    self.process.set_baseline(&dir);
                }
                TraceRecord::Version(version) => {
                    self.version = version;
                    self.state = EngineState::Active;
                }
                _ => {}
            }
            return Ok(());
        }

        if self.terminated && !matches!(record, TraceRecord::Comment(_)) {
            warn!(file = %self.name, line, "ignoring record after end of capture");
            return Ok(());
        }

        let terminates = record.is_termination();
        match record {
            TraceRecord::Version(_) => {
                return Err(MetaError::DuplicateVersion {
                    file: self.name.clone(),
                    line,
                })
            }
            TraceRecord::Cwd(_) => {}
            TraceRecord::Comment(_) => self.terminated |= terminates,
            TraceRecord::Fork { pid, child } => self.process.fork(pid, child),
            TraceRecord::Chdir { pid, dir } => {
                self.process.switch_to(pid);
                let cwd = abspath(
                    &self.fs,
                    &dir,
                    self.process.cwd(),
                    Some(self.process.last_dir()),
                )
                .unwrap_or(dir);
                let cwd = cwd.strip_suffix("/.").unwrap_or(&cwd).to_string();
                debug!(pid, cwd = %cwd, "chdir");
                self.process.chdir(pid, &cwd);
            }
            TraceRecord::Exit { pid } => self.process.exit(pid),
            TraceRecord::Exec { pid, path } => {
                self.process.switch_to(pid);
                let program = abspath(
                    &self.fs,
                    &path,
                    self.process.cwd(),
                    Some(self.process.last_dir()),
                )
                .unwrap_or_else(|| path.clone());
                self.process.exec(pid, &program);
                if !self.deps.seen.contains(&path) {
                    self.parse_path(&path, &path, Access::Exec);
                }
            }
            TraceRecord::Read { pid, path } => {
                self.process.switch_to(pid);
                if path != "." && !self.deps.seen.contains(&path) {
                    self.parse_path(&path, &path, Access::Read);
                }
            }
            TraceRecord::Write { pid, path } => {
                self.process.switch_to(pid);
                if !self.deps.seen.contains(&path) {
                    let access = if self.config.classify_legacy_writes()
                        && self.version < FIRST_SPLIT_WRITE_VERSION
                    {
                        Access::Read
                    } else {
                        Access::Write
                    };
                    self.parse_path(&path, &path, access);
                }
            }
            TraceRecord::Link { pid, src, dst } => {
                self.process.switch_to(pid);
                if !self.deps.seen.contains(&src) {
                    self.parse_path(&src, &src, Access::Read);
                    self.parse_path(&dst, &src, Access::Write);
                }
            }
        }
        Ok(())
    }

    /// Resolve one path and classify it
    fn parse_path(&mut self, path: &str, raw: &str, access: Access) {
        if path.ends_with(DIRDEP_MARKER) {
            return;
        }
        if self.config.is_excluded(path) {
            trace!(path, "excluded");
            return;
        }

        let cwd = self.process.cwd().to_string();
        let last_dir = self.process.last_dir().to_string();
        let Some(resolved) = resolve(&self.fs, path, &cwd, Some(&last_dir)) else {
            return;
        };
        let (dir, base) = split_dir(&resolved);
        if self.deps.seen.contains(&dir) {
            trace!(dir = %dir, "seen");
            return;
        }
        let Some(dir) = abspath(&self.fs, &dir, &cwd, Some(&last_dir)) else {
            return;
        };
        let rdir = real_divergence(&self.fs, &dir);
        let path = if dir == "/" {
            format!("/{base}")
        } else {
            format!("{dir}/{base}")
        };
        trace!(raw, dir = %dir, rdir = ?rdir, path = %path, "resolved");

        if matches!(access, Access::Read | Access::Write) {
            let is_context_dir = path == last_dir
                || path == cwd
                || path == self.process.baseline()
                || Some(path.as_str()) == self.config.curdir();
            if is_context_dir {
                trace!(path = %path, "skipping working directory");
                return;
            }
            if self.fs.is_dir(&path) {
                self.process.set_last_dir(&path);
                trace!(last_dir = %path, "last dir");
                return;
            }
        }
        if access == Access::Write {
            return;
        }

        if Some(dir.as_str()) == self.config.curdir() {
            return;
        }

        let matcher = RootMatcher::new(&self.config, &self.fs);
        if matcher.is_src(&base, &dir, rdir.as_deref(), &mut self.deps) {
            mark_raw_seen(&mut self.deps, raw);
            if rdir.is_none() {
                return;
            }
        }

        let found = std::iter::once(dir.as_str())
            .chain(rdir.as_deref())
            .any(|candidate| matcher.find_obj(candidate, &base, &mut self.deps).is_some());
        if !found {
            trace!(raw, "no root matched");
            mark_raw_seen(&mut self.deps, raw);
            self.deps.seen.insert(&dir);
        }
    }

    /// Validate the end of the stream
    fn finish(&mut self, line: usize) -> Result<()> {
        if self.state == EngineState::Init {
            return Err(MetaError::NotACapture {
                file: self.name.clone(),
                line,
            });
        }
        self.state = EngineState::Done;
        if !self.terminated {
            return Err(MetaError::Truncated {
                file: self.name.clone(),
                line,
            });
        }

        let mut dangling = Vec::new();
        for (pid, path) in self.process.pending_execs() {
            if self.fs.is_setid(path) {
                debug!(pid, path, "setid exec without exit tolerated");
                continue;
            }
            warn!(file = %self.name, pid, path, "exec without exit");
            dangling.push(DanglingExec {
                pid,
                path: path.to_string(),
            });
        }
        if !dangling.is_empty() {
            return Err(MetaError::DanglingExec {
                file: self.name.clone(),
                line,
                execs: dangling,
            });
        }
        debug!(
            file = %self.name,
            dirdeps = self.deps.obj_deps.len(),
            src_dirdeps = self.deps.src_deps.len(),
            seen = self.deps.seen.len(),
            "meta file done"
        );
        Ok(())
    }
}

/// Remember a raw trace path; relative ones depend on the cwd and are not kept
fn mark_raw_seen(deps: &mut Dependencies, raw: &str) {
    if raw.starts_with('/') {
        deps.seen.insert(raw);
    }
}
