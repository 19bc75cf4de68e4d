//! meta2deps - build dependency extraction from filemon meta files
//!
//! A meta-mode build captures every file each build step touches. This
//! library replays such a capture and reports which source-tree and
//! object-tree directories the step depended on, so the build can derive
//! `DIRDEPS` and `SRC_DIRDEPS` instead of having them declared by hand.
//!
//! ```
//! use std::sync::Arc;
//! use meta2deps::config::Config;
//! use meta2deps::engine::MetaFileEngine;
//! use meta2deps::filesystem::MemoryFs;
//!
//! let fs = MemoryFs::new()
//!     .with_file("/src/bin/cat/cat.c", "")
//!     .with_file("/obj/amd64/lib/libc/libc.a", "");
//! let config = Config::builder()
//!     .srctop("/src")
//!     .objroot("/obj")
//!     .machine("amd64")
//!     .build(&fs)
//!     .unwrap();
//!
//! let mut engine = MetaFileEngine::with_fs(Arc::new(config), fs);
//! engine
//!     .parse_str(
//!         "cat.meta",
//!         "V 5\nR 1 /src/bin/cat/cat.c\nR 1 /obj/amd64/lib/libc/libc.a\n# Bye bye\n",
//!     )
//!     .unwrap();
//! assert_eq!(engine.src_deps().as_slice(), ["bin/cat"]);
//! assert_eq!(engine.obj_deps().as_slice(), ["lib/libc"]);
//! ```

pub mod cli;
pub mod config;
pub mod deps;
pub mod engine;
pub mod error;
pub mod filesystem;
pub mod output;
pub mod path;
pub mod process;
pub mod record;
pub mod roots;
