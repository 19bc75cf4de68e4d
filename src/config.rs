//! Engine configuration
//!
//! A [`Config`] is built once and never changes afterwards; engines share it
//! through `Arc<Config>`. Root lists carry a trailing `/`, include each root's
//! real path when it differs, and are sorted longest-first so the most specific
//! root wins a prefix match.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MetaError, Result};
use crate::filesystem::FileSystem;

/// Machine name meaning "object dirs are not machine-qualified"
pub const MACHINE_NONE: &str = "none";

/// Machine name used for host tools
pub const MACHINE_HOST: &str = "host";

/// Immutable engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    srctops: Vec<String>,
    objroots: Vec<String>,
    machine: String,
    machine_arch: String,
    target_spec: String,
    host_target: String,
    suffixes: Vec<String>,
    dirdep_suffix: Option<Regex>,
    excludes: Vec<String>,
    curdir: Option<String>,
    reldir: Option<String>,
    dpdeps: Option<PathBuf>,
    classify_legacy_writes: bool,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Source roots, longest first
    pub fn srctops(&self) -> &[String] {
        &self.srctops
    }

    /// Object roots, longest first
    pub fn objroots(&self) -> &[String] {
        &self.objroots
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn machine_arch(&self) -> &str {
        &self.machine_arch
    }

    pub fn target_spec(&self) -> &str {
        &self.target_spec
    }

    pub fn host_target(&self) -> &str {
        &self.host_target
    }

    /// Recognized `.dirdep` suffixes, longest first
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    pub fn curdir(&self) -> Option<&str> {
        self.curdir.as_deref()
    }

    pub fn reldir(&self) -> Option<&str> {
        self.reldir.as_deref()
    }

    /// Per-file output path; per-file tracking is on when set
    pub fn dpdeps(&self) -> Option<&Path> {
        self.dpdeps.as_deref()
    }

    pub fn tracks_files(&self) -> bool {
        self.dpdeps.is_some()
    }

    pub fn classify_legacy_writes(&self) -> bool {
        self.classify_legacy_writes
    }

    /// True if `path` starts with a configured exclude prefix
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excludes
            .iter()
            .any(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
    }

    /// Remove one recognized target-spec suffix from a `.dirdep` token
    pub fn strip_suffix<'a>(&self, token: &'a str) -> &'a str {
        match &self.dirdep_suffix {
            Some(re) => re
                .captures(token)
                .and_then(|caps| caps.get(1))
                .map_or(token, |m| m.as_str()),
            None => token,
        }
    }
}

/// Collects configuration before [`ConfigBuilder::build`] freezes it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigBuilder {
    pub srctops: Vec<String>,
    pub objroots: Vec<String>,
    pub machine: Option<String>,
    pub machine_arch: Option<String>,
    pub target_spec: Option<String>,
    pub host_target: Option<String>,
    pub excludes: Vec<String>,
    pub curdir: Option<String>,
    pub reldir: Option<String>,
    pub dpdeps: Option<PathBuf>,
    pub classify_legacy_writes: bool,
}

/// The TOML form of a configuration file
pub type ConfigFile = ConfigBuilder;

impl ConfigBuilder {
    /// Load a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| MetaError::Io {
            file: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text)
            .map_err(|e| MetaError::Config(format!("{}: {e}", path.display())))
    }

    /// Layer `other` on top: lists extend, scalars set in `other` win
    pub fn merge(mut self, other: ConfigBuilder) -> Self {
        self.srctops.extend(other.srctops);
        self.objroots.extend(other.objroots);
        self.excludes.extend(other.excludes);
        self.machine = other.machine.or(self.machine);
        self.machine_arch = other.machine_arch.or(self.machine_arch);
        self.target_spec = other.target_spec.or(self.target_spec);
        self.host_target = other.host_target.or(self.host_target);
        self.curdir = other.curdir.or(self.curdir);
        self.reldir = other.reldir.or(self.reldir);
        self.dpdeps = other.dpdeps.or(self.dpdeps);
        self.classify_legacy_writes |= other.classify_legacy_writes;
        self
    }

    pub fn srctop(mut self, root: impl Into<String>) -> Self {
        self.srctops.push(root.into());
        self
    }

    pub fn objroot(mut self, root: impl Into<String>) -> Self {
        self.objroots.push(root.into());
        self
    }

    pub fn machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = Some(machine.into());
        self
    }

    pub fn machine_arch(mut self, arch: impl Into<String>) -> Self {
        self.machine_arch = Some(arch.into());
        self
    }

    pub fn target_spec(mut self, spec: impl Into<String>) -> Self {
        self.target_spec = Some(spec.into());
        self
    }

    pub fn host_target(mut self, target: impl Into<String>) -> Self {
        self.host_target = Some(target.into());
        self
    }

    pub fn exclude(mut self, prefix: impl Into<String>) -> Self {
        self.excludes.push(prefix.into());
        self
    }

    pub fn curdir(mut self, dir: impl Into<String>) -> Self {
        self.curdir = Some(dir.into());
        self
    }

    pub fn reldir(mut self, dir: impl Into<String>) -> Self {
        self.reldir = Some(dir.into());
        self
    }

    pub fn dpdeps(mut self, path: impl Into<PathBuf>) -> Self {
        self.dpdeps = Some(path.into());
        self
    }

    pub fn classify_legacy_writes(mut self, enabled: bool) -> Self {
        self.classify_legacy_writes = enabled;
        self
    }

    /// Freeze the configuration, resolving root real paths through `fs`
    pub fn build(self, fs: &dyn FileSystem) -> Result<Config> {
        let machine = self.machine.unwrap_or_else(|| MACHINE_NONE.to_string());
        if machine.is_empty() {
            return Err(MetaError::Config("machine name is empty".to_string()));
        }
        let machine_arch = self.machine_arch.unwrap_or_else(|| machine.clone());
        let target_spec = self.target_spec.unwrap_or_else(|| machine.clone());
        let host_target = self.host_target.unwrap_or_default();

        let srctops = root_list("source", &self.srctops, fs)?;
        let objroots = root_list("object", &self.objroots, fs)?;

        let suffixes = suffix_list(&target_spec, &machine, &machine_arch);
        let dirdep_suffix = suffix_regex(&suffixes)?;

        Ok(Config {
            srctops,
            objroots,
            machine,
            machine_arch,
            target_spec,
            host_target,
            suffixes,
            dirdep_suffix,
            excludes: self.excludes,
            curdir: self.curdir,
            reldir: self.reldir,
            dpdeps: self.dpdeps,
            classify_legacy_writes: self.classify_legacy_writes,
        })
    }
}

fn with_slash(root: &str) -> String {
    if root.ends_with('/') {
        root.to_string()
    } else {
        format!("{root}/")
    }
}

/// Each root plus its real path, deduplicated, longest first
fn root_list(kind: &str, roots: &[String], fs: &dyn FileSystem) -> Result<Vec<String>> {
    let mut list: Vec<String> = Vec::new();
    for root in roots {
        if root.is_empty() {
            return Err(MetaError::Config(format!("empty {kind} root")));
        }
        let real = fs.realpath(root.trim_end_matches('/'));
        for entry in [with_slash(root), with_slash(&real)] {
            if !list.contains(&entry) {
                list.push(entry);
            }
        }
    }
    list.sort_by_key(|root| std::cmp::Reverse(root.len()));
    Ok(list)
}

/// `.spec`, each comma-prefix of a compound spec, `.machine`, `.machine_arch`
fn suffix_list(target_spec: &str, machine: &str, machine_arch: &str) -> Vec<String> {
    let mut suffixes: Vec<String> = Vec::new();
    let mut push = |s: String| {
        if s.len() > 1 && !suffixes.contains(&s) {
            suffixes.push(s);
        }
    };

    let parts: Vec<&str> = target_spec.split(',').collect();
    for n in (1..=parts.len()).rev() {
        push(format!(".{}", parts[..n].join(",")));
    }
    push(format!(".{machine}"));
    push(format!(".{machine_arch}"));

    suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));
    suffixes
}

fn suffix_regex(suffixes: &[String]) -> Result<Option<Regex>> {
    if suffixes.is_empty() {
        return Ok(None);
    }
    let alternatives: Vec<String> = suffixes.iter().map(|s| regex::escape(s)).collect();
    let pattern = format!("^(.+?)(?:{})$", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| MetaError::Config(format!("bad target spec suffix: {e}")))
}
