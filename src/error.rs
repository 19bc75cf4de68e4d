//! Error types for meta file parsing
//!
//! Every fatal condition carries the meta file name and the line number the
//! reader had reached, so a driver can decide whether to abort a batch.

use std::fmt::Write as _;
use std::path::PathBuf;
use thiserror::Error;

use crate::record::Pid;

/// A process that exec'd and never exited before the capture ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingExec {
    pub pid: Pid,
    pub path: String,
}

/// Errors raised while configuring or running the engine
#[derive(Error, Debug)]
pub enum MetaError {
    #[error("{file}:{line}: not a filemon capture (no version record)")]
    NotACapture { file: String, line: usize },

    #[error("{file}:{line}: truncated capture (no termination comment)")]
    Truncated { file: String, line: usize },

    #[error("{file}:{line}: duplicate version record")]
    DuplicateVersion { file: String, line: usize },

    #[error("{file}:{line}: exec without exit: {}", describe_execs(.execs))]
    DanglingExec {
        file: String,
        line: usize,
        execs: Vec<DanglingExec>,
    },

    #[error("failed to read {}: {source}", .file.display())]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for meta file operations
pub type Result<T> = std::result::Result<T, MetaError>;

fn describe_execs(execs: &[DanglingExec]) -> String {
    let mut out = String::new();
    for (i, exec) in execs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "pid {} ({})", exec.pid, exec.path);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_capture_names_file_and_line() {
        let err = MetaError::NotACapture {
            file: "foo.o.meta".to_string(),
            line: 12,
        };
        assert_eq!(
            err.to_string(),
            "foo.o.meta:12: not a filemon capture (no version record)"
        );
    }

    #[test]
    fn test_dangling_exec_lists_every_pid() {
        let err = MetaError::DanglingExec {
            file: "x.meta".to_string(),
            line: 40,
            execs: vec![
                DanglingExec {
                    pid: 100,
                    path: "/usr/bin/cc".to_string(),
                },
                DanglingExec {
                    pid: 101,
                    path: "/bin/sh".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("pid 100 (/usr/bin/cc)"));
        assert!(msg.contains("pid 101 (/bin/sh)"));
    }

    #[test]
    fn test_io_error_has_source() {
        let err = MetaError::Io {
            file: PathBuf::from("/nope.meta"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/nope.meta"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
