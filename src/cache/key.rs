use serde_json::{Map, Value};

/// Stable JSON encoding of loader arguments.
///
/// Object keys are sorted recursively so argument maps that differ only in key
/// order hash identically; array order is preserved.
pub fn hash_key(args: &[Value]) -> String {
    let canonical: Vec<Value> = args.iter().map(canonicalize).collect();
    Value::Array(canonical).to_string()
}

/// Cache key of `name` called with `args`.
pub fn cache_key(name: &str, args: &[Value]) -> String {
    let mut key = String::with_capacity(name.len() + 16);
    key.push_str(name);
    key.push_str(&hash_key(args));
    key
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for k in keys {
                sorted.insert(k.clone(), canonicalize(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
