//! Filesystem queries used during path resolution
//!
//! Resolution needs a handful of blocking lookups: does a path exist, is it a
//! directory, where does it really live, what does a `.dirdep` marker say, and
//! is an executable setuid/setgid. [`HostFs`] answers them from the running
//! system; [`MemoryFs`] answers them from an in-memory tree so the engine can be
//! exercised deterministically.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::io::{BufRead, BufReader};
use std::os::unix::fs::PermissionsExt;

use crate::path::cleanpath;

/// Capability interface over the filesystem
pub trait FileSystem {
    /// True if `path` exists, following symlinks
    fn exists(&self, path: &str) -> bool;

    /// True if `path` is a directory, following symlinks
    fn is_dir(&self, path: &str) -> bool;

    /// Canonical location of `path` with symlinks expanded.
    ///
    /// Returns `path` unchanged when it cannot be resolved.
    fn realpath(&self, path: &str) -> String;

    /// First line of a regular file, without the line terminator
    fn read_first_line(&self, path: &str) -> Option<String>;

    /// True if `path` carries the setuid or setgid bit
    fn is_setid(&self, path: &str) -> bool;
}

/// The real filesystem of the running host
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFs;

impl FileSystem for HostFs {
    fn exists(&self, path: &str) -> bool {
        fs::metadata(path).is_ok()
    }

    fn is_dir(&self, path: &str) -> bool {
        fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    fn realpath(&self, path: &str) -> String {
        fs::canonicalize(path)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.to_string())
    }

    fn read_first_line(&self, path: &str) -> Option<String> {
        let file = fs::File::open(path).ok()?;
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line).ok()?;
        Some(line.trim_end_matches(['\n', '\r']).to_string())
    }

    fn is_setid(&self, path: &str) -> bool {
        let setid = (libc::S_ISUID | libc::S_ISGID) as u32;
        fs::metadata(path)
            .map(|m| m.permissions().mode() & setid != 0)
            .unwrap_or(false)
    }
}

/// Maximum symlink expansions before a path is treated as unresolvable
const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone, Default)]
struct MemoryFile {
    contents: String,
    setid: bool,
}

/// In-memory filesystem for tests and benchmarks
///
/// ```
/// use meta2deps::filesystem::{FileSystem, MemoryFs};
///
/// let fs = MemoryFs::new()
///     .with_file("/src/lib/libc/gen/err.c", "")
///     .with_symlink("/obj/src", "/src");
/// assert!(fs.exists("/obj/src/lib/libc/gen/err.c"));
/// assert_eq!(fs.realpath("/obj/src/lib/libc"), "/src/lib/libc");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<String, MemoryFile>,
    dirs: BTreeSet<String>,
    links: BTreeMap<String, String>,
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        Self {
            files: BTreeMap::new(),
            dirs,
            links: BTreeMap::new(),
        }
    }

    /// Add a regular file; parent directories are created implicitly
    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        let path = cleanpath(path);
        self.add_parents(&path);
        self.files.insert(
            path,
            MemoryFile {
                contents: contents.to_string(),
                setid: false,
            },
        );
        self
    }

    /// Add a regular file with the setuid bit
    pub fn with_setid_file(mut self, path: &str) -> Self {
        let path = cleanpath(path);
        self.add_parents(&path);
        self.files.insert(
            path,
            MemoryFile {
                contents: String::new(),
                setid: true,
            },
        );
        self
    }

    /// Add a directory and its parents
    pub fn with_dir(mut self, path: &str) -> Self {
        let path = cleanpath(path);
        self.add_parents(&path);
        self.dirs.insert(path);
        self
    }

    /// Add a symlink at `path` pointing to `target` (absolute or relative)
    pub fn with_symlink(mut self, path: &str, target: &str) -> Self {
        let path = cleanpath(path);
        self.add_parents(&path);
        self.links.insert(path, target.to_string());
        self
    }

    fn add_parents(&mut self, path: &str) {
        let mut parent = path;
        while let Some((head, _)) = parent.rsplit_once('/') {
            if head.is_empty() {
                break;
            }
            self.dirs.insert(head.to_string());
            parent = head;
        }
    }

    /// Expand symlinks component by component
    fn expand(&self, path: &str) -> Option<String> {
        if !path.starts_with('/') {
            return None;
        }
        let mut pending: VecDeque<String> = cleanpath(path)
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        let mut resolved = String::new();
        let mut hops = 0;

        while let Some(component) = pending.pop_front() {
            let candidate = format!("{resolved}/{component}");
            match self.links.get(&candidate) {
                Some(target) => {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return None;
                    }
                    let target = if target.starts_with('/') {
                        target.clone()
                    } else {
                        format!("{resolved}/{target}")
                    };
                    let mut restart: VecDeque<String> = cleanpath(&target)
                        .split('/')
                        .filter(|c| !c.is_empty())
                        .map(str::to_string)
                        .collect();
                    restart.extend(pending.drain(..));
                    pending = restart;
                    resolved.clear();
                }
                None => resolved = candidate,
            }
        }

        if resolved.is_empty() {
            resolved.push('/');
        }
        Some(resolved)
    }

    fn file(&self, path: &str) -> Option<&MemoryFile> {
        self.expand(path).and_then(|p| self.files.get(&p))
    }
}

impl FileSystem for MemoryFs {
    fn exists(&self, path: &str) -> bool {
        match self.expand(path) {
            Some(p) => self.files.contains_key(&p) || self.dirs.contains(&p),
            None => false,
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        self.expand(path).is_some_and(|p| self.dirs.contains(&p))
    }

    fn realpath(&self, path: &str) -> String {
        self.expand(path).unwrap_or_else(|| path.to_string())
    }

    fn read_first_line(&self, path: &str) -> Option<String> {
        self.file(path)
            .map(|f| f.contents.lines().next().unwrap_or("").to_string())
    }

    fn is_setid(&self, path: &str) -> bool {
        self.file(path).is_some_and(|f| f.setid)
    }
}
