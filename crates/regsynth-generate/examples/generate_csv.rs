use std::path::PathBuf;

use regsynth_core::ReferenceCatalog;
use regsynth_generate::output::write_dataset;
use regsynth_generate::{GenerateOptions, GenerationEngine};

fn main() {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("out/example"));

    let options = GenerateOptions {
        record_count: 25,
        ..GenerateOptions::default()
    };
    let result = GenerationEngine::new(options)
        .generate(&ReferenceCatalog::builtin())
        .expect("generate dataset");
    let files = write_dataset(&out_dir, &result.dataset.to_tables()).expect("write dataset");

    println!(
        "wrote {} tables ({} bytes) to {}",
        files.table_paths.len(),
        files.bytes_written,
        files.dir.display()
    );
}
