use regsynth_core::ReferenceCatalog;
use schemars::schema_for;

fn main() {
    let schema = schema_for!(ReferenceCatalog);
    let json = serde_json::to_string_pretty(&schema).expect("serialize json schema");
    println!("{json}");
}
