//! Classification of directories against source and object roots
//!
//! A resolved directory is checked first against the source roots, then
//! against the object roots. Both the lexical directory and its real location
//! are candidates, because an object dir may be a symlink into the source tree
//! (or the reverse).

use tracing::trace;

use crate::config::{Config, MACHINE_HOST, MACHINE_NONE};
use crate::deps::Dependencies;
use crate::filesystem::FileSystem;

/// Name of the per-directory marker overriding the derived object token
pub const DIRDEP_MARKER: &str = ".dirdep";

/// First root in `roots` that is a prefix of `path`
///
/// `roots` are sorted longest-first, so the deepest root wins.
pub fn find_top<'r>(path: &str, roots: &'r [String]) -> Option<&'r str> {
    roots
        .iter()
        .find(|root| path.starts_with(root.as_str()))
        .map(String::as_str)
}

/// Part of `path` below `root`; `.` when `path` is the root itself
fn relative<'a>(path: &'a str, root: &str) -> &'a str {
    match path.strip_prefix(root) {
        Some(rel) if !rel.is_empty() => rel,
        Some(_) => ".",
        None if root.strip_suffix('/') == Some(path) => ".",
        None => path,
    }
}

/// Classifies directories for one engine run
pub struct RootMatcher<'a> {
    config: &'a Config,
    fs: &'a dyn FileSystem,
}

impl<'a> RootMatcher<'a> {
    pub fn new(config: &'a Config, fs: &'a dyn FileSystem) -> Self {
        Self { config, fs }
    }

    /// Record `dir` (or `rdir`) as a source dependency if it is under a source root
    pub fn is_src(&self, base: &str, dir: &str, rdir: Option<&str>, deps: &mut Dependencies) -> bool {
        for candidate in std::iter::once(dir).chain(rdir) {
            let path = format!("{candidate}/{base}");
            let Some(srctop) = find_top(&path, self.config.srctops()) else {
                continue;
            };
            if self.config.tracks_files() {
                deps.file_deps.add(relative(&path, srctop));
            }
            let token = relative(candidate, srctop);
            trace!(dir = candidate, srctop, token, "source dependency");
            deps.src_deps.add(token);
            deps.seen.insert(candidate);
            return true;
        }
        false
    }

    /// Record an object dependency for `dir/base`; returns the matched root
    pub fn find_obj(&self, dir: &str, base: &str, deps: &mut Dependencies) -> Option<String> {
        let path = format!("{dir}/{base}");
        let objroot = find_top(&path, self.config.objroots())?;

        let token = match self.dirdep_marker(&path, dir) {
            Some(token) => token,
            None => match self.object_token(relative(dir, objroot)) {
                Some(token) => token,
                None => {
                    trace!(dir, objroot, "directly under machine dir, no token");
                    return None;
                }
            },
        };
        trace!(dir, objroot, token = %token, "object dependency");
        deps.obj_deps.add(&token);

        if self.config.tracks_files() && objroot.ends_with("/stage/") {
            if let Some((_, staged)) = relative(&path, objroot).split_once('/') {
                deps.file_deps.add(staged);
            }
        }
        Some(objroot.to_string())
    }

    /// Token from a `<path>.dirdep` or `<dir>/.dirdep` marker, if one exists
    pub fn dirdep_marker(&self, path: &str, dir: &str) -> Option<String> {
        let markers = [format!("{path}{DIRDEP_MARKER}"), format!("{dir}/{DIRDEP_MARKER}")];
        let marker = markers.iter().find(|m| self.fs.exists(m))?;
        let line = self.fs.read_first_line(marker)?;
        let token = line.trim_matches(|c: char| c == '#' || c.is_whitespace());
        if token.is_empty() {
            return None;
        }
        Some(self.config.strip_suffix(token).to_string())
    }

    /// Derive an object token from a path relative to an object root
    ///
    /// With machine `none` the relative path is the token. Otherwise its first
    /// component names the machine the object was built for: the current
    /// machine is dropped, any other one becomes a `.machine` suffix. A path
    /// with nothing below the machine component yields no token.
    pub fn object_token(&self, rel: &str) -> Option<String> {
        let machine = self.config.machine();
        if machine == MACHINE_NONE {
            return Some(rel.to_string());
        }
        let (obj_machine, rest) = rel.split_once('/')?;
        if rest.is_empty() {
            return None;
        }
        let host_exception = machine == MACHINE_HOST
            && !self.config.host_target().is_empty()
            && obj_machine == self.config.host_target();
        if obj_machine == machine || host_exception {
            Some(rest.to_string())
        } else {
            Some(format!("{rest}.{obj_machine}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryFs;

    fn config(builder: crate::config::ConfigBuilder) -> Config {
        builder.build(&MemoryFs::new()).unwrap()
    }

    #[test]
    fn test_find_top_longest_wins() {
        let roots = vec!["/s/sub/".to_string(), "/s/".to_string()];
        assert_eq!(find_top("/s/sub/sub2/file.c", &roots), Some("/s/sub/"));
        assert_eq!(find_top("/s/other/file.c", &roots), Some("/s/"));
        assert_eq!(find_top("/t/file.c", &roots), None);
        assert_eq!(find_top("/sub/file.c", &roots), None);
    }

    #[test]
    fn test_is_src_records_relative_dir() {
        let cfg = config(Config::builder().srctop("/s/").srctop("/s/sub/"));
        let fs = MemoryFs::new();
        let matcher = RootMatcher::new(&cfg, &fs);
        let mut deps = Dependencies::new();
        assert!(matcher.is_src("file.c", "/s/sub/sub2", None, &mut deps));
        assert_eq!(deps.src_deps.as_slice(), ["sub2"]);
        assert!(deps.seen.contains("/s/sub/sub2"));
        assert!(deps.file_deps.is_empty());
    }

    #[test]
    fn test_is_src_top_level_dir() {
        let cfg = config(Config::builder().srctop("/src"));
        let fs = MemoryFs::new();
        let matcher = RootMatcher::new(&cfg, &fs);
        let mut deps = Dependencies::new();
        assert!(matcher.is_src("Makefile.inc1", "/src", None, &mut deps));
        assert_eq!(deps.src_deps.as_slice(), ["."]);
    }

    #[test]
    fn test_is_src_uses_real_dir() {
        let cfg = config(Config::builder().srctop("/src").dpdeps("/tmp/files"));
        let fs = MemoryFs::new();
        let matcher = RootMatcher::new(&cfg, &fs);
        let mut deps = Dependencies::new();
        assert!(matcher.is_src("stdio.h", "/obj/include", Some("/src/include"), &mut deps));
        assert_eq!(deps.src_deps.as_slice(), ["include"]);
        assert_eq!(deps.file_deps.as_slice(), ["include/stdio.h"]);
        assert!(!matcher.is_src("x.h", "/usr/include", None, &mut deps));
    }

    #[test]
    fn test_object_token_machine_qualification() {
        let cfg = config(Config::builder().machine("amd64").objroot("/obj/"));
        let fs = MemoryFs::new();
        let matcher = RootMatcher::new(&cfg, &fs);
        assert_eq!(matcher.object_token("amd64/lib/libc").as_deref(), Some("lib/libc"));
        assert_eq!(matcher.object_token("i386/lib/libc").as_deref(), Some("lib/libc.i386"));
        assert_eq!(matcher.object_token("amd64"), None);
        assert_eq!(matcher.object_token("."), None);
    }

    #[test]
    fn test_object_token_machine_none() {
        let cfg = config(Config::builder().objroot("/obj/"));
        let fs = MemoryFs::new();
        let matcher = RootMatcher::new(&cfg, &fs);
        assert_eq!(matcher.object_token("amd64/lib/libc").as_deref(), Some("amd64/lib/libc"));
    }

    #[test]
    fn test_object_token_host_target_exception() {
        let cfg = config(
            Config::builder()
                .machine("host")
                .host_target("freebsd13-amd64")
                .objroot("/obj/"),
        );
        let fs = MemoryFs::new();
        let matcher = RootMatcher::new(&cfg, &fs);
        assert_eq!(
            matcher.object_token("freebsd13-amd64/usr.bin/lex").as_deref(),
            Some("usr.bin/lex")
        );
        assert_eq!(matcher.object_token("host/usr.bin/lex").as_deref(), Some("usr.bin/lex"));
        assert_eq!(
            matcher.object_token("amd64/usr.bin/lex").as_deref(),
            Some("usr.bin/lex.amd64")
        );
    }

    #[test]
    fn test_find_obj_derives_token() {
        let cfg = config(Config::builder().machine("amd64").objroot("/obj"));
        let fs = MemoryFs::new();
        let matcher = RootMatcher::new(&cfg, &fs);
        let mut deps = Dependencies::new();
        let root = matcher.find_obj("/obj/amd64/lib/libc", "file.o", &mut deps);
        assert_eq!(root.as_deref(), Some("/obj/"));
        matcher.find_obj("/obj/i386/lib/libc", "file.o", &mut deps);
        matcher.find_obj("/obj/amd64/lib/libc", "other.o", &mut deps);
        assert_eq!(deps.obj_deps.as_slice(), ["lib/libc", "lib/libc.i386"]);
        assert_eq!(matcher.find_obj("/usr/lib", "libc.so", &mut deps), None);
    }

    #[test]
    fn test_find_obj_file_directly_under_machine_dir() {
        let cfg = config(Config::builder().machine("amd64").objroot("/obj"));
        let fs = MemoryFs::new();
        let matcher = RootMatcher::new(&cfg, &fs);
        let mut deps = Dependencies::new();
        assert_eq!(matcher.find_obj("/obj/amd64", "Makefile.inc", &mut deps), None);
        assert!(deps.obj_deps.is_empty());
    }

    #[test]
    fn test_find_obj_prefers_dirdep_marker() {
        let cfg = config(Config::builder().machine("amd64").objroot("/obj"));
        let fs = MemoryFs::new()
            .with_file("/obj/amd64/gen/foo.h.dirdep", "# include/gen.amd64\n")
            .with_file("/obj/amd64/lib/libc/.dirdep", "lib/libc/special\n");
        let matcher = RootMatcher::new(&cfg, &fs);
        let mut deps = Dependencies::new();
        matcher.find_obj("/obj/amd64/gen", "foo.h", &mut deps);
        matcher.find_obj("/obj/amd64/lib/libc", "x.o", &mut deps);
        assert_eq!(deps.obj_deps.as_slice(), ["include/gen", "lib/libc/special"]);
    }

    #[test]
    fn test_blank_dirdep_marker_falls_back() {
        let cfg = config(Config::builder().machine("amd64").objroot("/obj"));
        let fs = MemoryFs::new().with_file("/obj/amd64/lib/m/.dirdep", "#\n");
        let matcher = RootMatcher::new(&cfg, &fs);
        assert_eq!(matcher.dirdep_marker("/obj/amd64/lib/m/x.o", "/obj/amd64/lib/m"), None);
    }

    #[test]
    fn test_stage_root_records_staged_file() {
        let cfg = config(
            Config::builder()
                .machine("amd64")
                .objroot("/obj/stage")
                .dpdeps("/obj/files"),
        );
        let fs = MemoryFs::new();
        let matcher = RootMatcher::new(&cfg, &fs);
        let mut deps = Dependencies::new();
        matcher.find_obj("/obj/stage/amd64/usr/include", "stdio.h", &mut deps);
        assert_eq!(deps.obj_deps.as_slice(), ["usr/include"]);
        assert_eq!(deps.file_deps.as_slice(), ["usr/include/stdio.h"]);
    }
}
