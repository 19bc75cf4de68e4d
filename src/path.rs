//! Path resolution for trace paths
//!
//! filemon records paths exactly as the traced process passed them to the
//! kernel, so most of them are relative to a working directory that has to be
//! reconstructed. [`resolve`] consults the filesystem to find the combination
//! that exists; [`cleanpath`] is the purely lexical cleanup applied afterwards.

use crate::filesystem::FileSystem;

/// Remove `.` segments and collapse `..` without touching the filesystem
///
/// A `..` with nothing left to pop is dropped. A leading `/` is preserved.
pub fn cleanpath(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            _ => stack.push(segment),
        }
    }
    let joined = stack.join("/");
    if path.starts_with('/') {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Strip any number of trailing `/.` segments
fn strip_trailing_dot(mut path: &str) -> &str {
    while let Some(stripped) = path.strip_suffix("/.") {
        path = stripped;
    }
    path
}

/// Last component removed; the parent of a top-level entry is `/`
fn parent(dir: &str) -> String {
    match dir.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((head, _)) => head.to_string(),
    }
}

/// Split a resolved path into `(dir, base)`
pub fn split_dir(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some(("", base)) => ("/".to_string(), base.to_string()),
        Some((dir, base)) => (dir.to_string(), base.to_string()),
        None => (String::new(), path.to_string()),
    }
}

/// Join a directory and a relative path with exactly one separator
fn join(dir: &str, path: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{path}")
    } else {
        format!("{dir}/{path}")
    }
}

/// Turn a trace path into an existing absolute path
///
/// Bare relative paths are tried under `last_dir` first, then under `cwd`:
/// processes tend to reference files relative to the directory they were
/// last seen working in. Returns `None` when no candidate exists.
pub fn resolve(
    fs: &dyn FileSystem,
    path: &str,
    cwd: &str,
    last_dir: Option<&str>,
) -> Option<String> {
    if path.is_empty() || path == "." {
        return Some(cwd.to_string());
    }
    let path = strip_trailing_dot(path);
    if path.starts_with('/') {
        return fs.exists(path).then(|| path.to_string());
    }
    if path.starts_with("./") {
        let mut rest = path;
        while let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped.trim_start_matches('/');
        }
        if rest.is_empty() {
            return Some(cwd.to_string());
        }
        return Some(join(cwd, rest));
    }

    let candidates = [last_dir.filter(|d| !d.is_empty() && *d != cwd), Some(cwd)];
    for dir in candidates.into_iter().flatten().filter(|d| !d.is_empty()) {
        if path == ".." {
            return Some(parent(dir));
        }
        let joined = join(dir, path);
        if fs.exists(&joined) {
            return Some(joined);
        }
    }
    None
}

/// Best-effort absolute form of a trace path
///
/// Falls back to the unresolved relative path when nothing exists, but an
/// absolute path that does not exist is unresolvable and yields `None`.
pub fn abspath(
    fs: &dyn FileSystem,
    path: &str,
    cwd: &str,
    last_dir: Option<&str>,
) -> Option<String> {
    let best = match resolve(fs, path, cwd, last_dir) {
        Some(resolved) => resolved,
        None if path.starts_with('/') => return None,
        None => path.to_string(),
    };
    Some(cleanpath(&best))
}

/// Real location of `dir` when it differs from the lexical one
pub fn real_divergence(fs: &dyn FileSystem, dir: &str) -> Option<String> {
    let rdir = fs.realpath(dir);
    (rdir != dir).then_some(rdir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryFs;

    fn tree() -> MemoryFs {
        MemoryFs::new()
            .with_file("/src/bin/cat/cat.c", "")
            .with_file("/src/include/stdio.h", "")
            .with_file("/obj/bin/cat/cat.o", "")
            .with_symlink("/obj/bin/cat/inc", "/src/include")
    }

    #[test]
    fn test_cleanpath_examples() {
        assert_eq!(cleanpath("a/./b/../c"), "a/c");
        assert_eq!(cleanpath("/a/../b"), "/b");
        assert_eq!(cleanpath("../a"), "a");
        assert_eq!(cleanpath("/../../x"), "/x");
        assert_eq!(cleanpath("//a//b/"), "/a/b");
        assert_eq!(cleanpath("/"), "/");
        assert_eq!(cleanpath("/a/.."), "/");
        assert_eq!(cleanpath("."), "");
    }

    #[test]
    fn test_resolve_dot_and_empty() {
        let fs = tree();
        assert_eq!(resolve(&fs, "", "/src/bin/cat", None).as_deref(), Some("/src/bin/cat"));
        assert_eq!(resolve(&fs, ".", "/src/bin/cat", None).as_deref(), Some("/src/bin/cat"));
    }

    #[test]
    fn test_resolve_absolute_requires_existence() {
        let fs = tree();
        assert_eq!(
            resolve(&fs, "/src/bin/cat/cat.c", "/", None).as_deref(),
            Some("/src/bin/cat/cat.c")
        );
        assert_eq!(resolve(&fs, "/src/bin/cat/gone.c", "/", None), None);
        assert_eq!(
            resolve(&fs, "/src/bin/cat/.", "/", None).as_deref(),
            Some("/src/bin/cat")
        );
    }

    #[test]
    fn test_resolve_dot_slash_prefix_is_lexical() {
        let fs = tree();
        assert_eq!(
            resolve(&fs, "././cat.c", "/src/bin/cat", Some("/obj/bin/cat")).as_deref(),
            Some("/src/bin/cat/cat.c")
        );
        assert_eq!(
            resolve(&fs, ".//missing.c", "/src/bin/cat", None).as_deref(),
            Some("/src/bin/cat/missing.c")
        );
    }

    #[test]
    fn test_resolve_dotdot_prefers_last_dir() {
        let fs = tree();
        assert_eq!(
            resolve(&fs, "..", "/src/bin/cat", Some("/obj/bin/cat")).as_deref(),
            Some("/obj/bin")
        );
        assert_eq!(resolve(&fs, "..", "/src/bin/cat", None).as_deref(), Some("/src/bin"));
        assert_eq!(resolve(&fs, "..", "/src", Some("")).as_deref(), Some("/"));
    }

    #[test]
    fn test_resolve_relative_last_dir_first() {
        let fs = MemoryFs::new()
            .with_file("/a/x.h", "")
            .with_file("/b/x.h", "");
        assert_eq!(resolve(&fs, "x.h", "/a", Some("/b")).as_deref(), Some("/b/x.h"));
        assert_eq!(resolve(&fs, "x.h", "/a", None).as_deref(), Some("/a/x.h"));
    }

    #[test]
    fn test_resolve_relative_falls_back_to_cwd() {
        let fs = tree();
        assert_eq!(
            resolve(&fs, "cat.c", "/src/bin/cat", Some("/obj/bin/cat")).as_deref(),
            Some("/src/bin/cat/cat.c")
        );
        assert_eq!(resolve(&fs, "nope.c", "/src/bin/cat", Some("/obj/bin/cat")), None);
    }

    #[test]
    fn test_abspath_unresolvable_absolute() {
        let fs = tree();
        assert_eq!(abspath(&fs, "/no/such/file", "/src", None), None);
    }

    #[test]
    fn test_abspath_cleans_best_effort_result() {
        let fs = tree();
        assert_eq!(
            abspath(&fs, "../cat/./cat.c", "/src/bin/cat", None).as_deref(),
            Some("/src/bin/cat/cat.c")
        );
        assert_eq!(
            abspath(&fs, "../lost/./x.c", "/nowhere", None).as_deref(),
            Some("lost/x.c")
        );
    }

    #[test]
    fn test_split_dir() {
        assert_eq!(split_dir("/a/b/c.c"), ("/a/b".to_string(), "c.c".to_string()));
        assert_eq!(split_dir("/c.c"), ("/".to_string(), "c.c".to_string()));
        assert_eq!(split_dir("c.c"), (String::new(), "c.c".to_string()));
    }

    #[test]
    fn test_real_divergence() {
        let fs = tree();
        assert_eq!(
            real_divergence(&fs, "/obj/bin/cat/inc").as_deref(),
            Some("/src/include")
        );
        assert_eq!(real_divergence(&fs, "/obj/bin/cat"), None);
    }
}
