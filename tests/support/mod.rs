use rollbook::{Document, MemoryStore, Rollbook, RollbookConfig};
use serde_json::Value;
use std::sync::Arc;

pub const TEST_SALT: &str = "test-salt";

#[allow(dead_code)]
pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}

#[allow(dead_code)]
pub fn rollbook() -> (Rollbook, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let rollbook = Rollbook::new(
        Arc::clone(&store) as Arc<dyn rollbook::DocumentStore>,
        RollbookConfig::with_salt(TEST_SALT),
    );
    (rollbook, store)
}
