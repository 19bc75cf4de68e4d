#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use meta2deps::config::Config;
use meta2deps::engine::MetaFileEngine;
use meta2deps::filesystem::MemoryFs;
use meta2deps::record::TraceReader;

fuzz_target!(|data: &[u8]| {
    // The reader must not panic on raw bytes; headers carry arbitrary command lines
    for item in TraceReader::new("fuzz.meta", data) {
        let _ = item;
    }

    // The full engine must not panic either, on a tree with a symlink and a setid program
    let fs = MemoryFs::new()
        .with_file("/src/bin/cat/cat.c", "")
        .with_file("/obj/amd64/lib/libc/libc.a", "")
        .with_file("/obj/amd64/gen/.dirdep", "# gen.amd64\n")
        .with_setid_file("/usr/bin/su")
        .with_symlink("/obj/amd64/include", "/src/include");
    let Ok(config) = Config::builder()
        .srctop("/src")
        .objroot("/obj")
        .machine("amd64")
        .build(&fs)
    else {
        return;
    };
    let mut engine = MetaFileEngine::with_fs(Arc::new(config), fs);
    let _ = engine.parse_reader("fuzz.meta", data);
});
