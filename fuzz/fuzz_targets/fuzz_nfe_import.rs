#![no_main]

use libfuzzer_sys::fuzz_target;
use nfe_import::import::{ImportPipeline, MemoryStore, UploadedDocument};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(document) = UploadedDocument::from_xml(s) else {
        return;
    };
    // Anything that parses must go through review and import without panicking.
    let mut store = MemoryStore::new();
    let Ok(confirmed) = document.review(&store.catalog()).confirm() else {
        return;
    };
    let _ = ImportPipeline::default().run(&mut store, confirmed.plan());
});
