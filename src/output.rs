//! Dependency report emission
//!
//! The in-memory lists keep discovery order. Only the per-file lines
//! (`DEPENDS_ON_FILE`, `DEPENDS_ON_DIR`) are sorted, at emission time.

use serde::{Deserialize, Serialize};

use crate::deps::Dependencies;

/// Format tag written into JSON reports
pub const JSON_FORMAT: &str = "meta2deps-json-v1";

/// Snapshot of the dependencies found in one or more meta files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    /// Object-tree tokens, in discovery order
    pub dirdeps: Vec<String>,
    /// Source-tree directories, in discovery order
    pub src_dirdeps: Vec<String>,
    /// Individual files (empty without per-file tracking)
    #[serde(default)]
    pub file_deps: Vec<String>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    format: &'static str,
    #[serde(flatten)]
    report: &'a DependencyReport,
}

impl DependencyReport {
    pub fn from_dependencies(deps: &Dependencies) -> Self {
        Self {
            dirdeps: deps.obj_deps.as_slice().to_vec(),
            src_dirdeps: deps.src_deps.as_slice().to_vec(),
            file_deps: deps.file_deps.as_slice().to_vec(),
        }
    }

    /// Object-tree tokens joined with newlines
    pub fn dirdeps_text(&self) -> String {
        self.dirdeps.join("\n")
    }

    /// Source-tree directories joined with newlines
    pub fn src_dirdeps_text(&self) -> String {
        self.src_dirdeps.join("\n")
    }

    /// Makefile fragment with `DIRDEPS` and `SRC_DIRDEPS`
    pub fn to_makefile(&self) -> String {
        let mut out = String::new();
        for (var, tokens) in [("DIRDEPS", &self.dirdeps), ("SRC_DIRDEPS", &self.src_dirdeps)] {
            if tokens.is_empty() {
                continue;
            }
            out.push_str(var);
            out.push_str(" = \\\n");
            for token in tokens {
                out.push('\t');
                out.push_str(token);
                out.push_str(" \\\n");
            }
            out.push('\n');
        }
        out
    }

    /// `DEPENDS_ON_FILE(file) += reldir`, sorted and unique
    pub fn depends_on_file_lines(&self, reldir: &str) -> Vec<String> {
        sorted_unique(&self.file_deps)
            .into_iter()
            .map(|file| format!("DEPENDS_ON_FILE({file}) += {reldir}"))
            .collect()
    }

    /// `DEPENDS_ON_DIR(token) += reldir`, sorted and unique
    pub fn depends_on_dir_lines(&self, reldir: &str) -> Vec<String> {
        sorted_unique(&self.dirdeps)
            .into_iter()
            .map(|token| format!("DEPENDS_ON_DIR({token}) += {reldir}"))
            .collect()
    }

    /// Pretty-printed JSON report
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&JsonReport {
            format: JSON_FORMAT,
            report: self,
        })
    }
}

fn sorted_unique(items: &[String]) -> Vec<&str> {
    let mut sorted: Vec<&str> = items.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}
