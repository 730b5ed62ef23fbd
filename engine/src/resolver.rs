//! Path resolution: pulling the values a search parameter compares against
//! out of a resource document.

use serde_json::Value;

/// Extracts field values from a record's content.
pub trait PathResolver: Send + Sync {
    /// Resolve `path` against `content`, returning every value it reaches.
    fn extract(&self, content: &Value, path: &str) -> Vec<Value>;
}

/// Resolver for dotted element paths over JSON documents.
///
/// Understands the subset of path syntax used by search parameter
/// declarations: `Type.element.child` with arrays flattened at every step,
/// `a | b` unions, and a leading type name (or `Resource`/`DomainResource`)
/// that is skipped when it names the root.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPathResolver;

impl JsonPathResolver {
    fn extract_one(content: &Value, path: &str) -> Vec<Value> {
        let mut segments = path.split('.').map(str::trim).filter(|s| !s.is_empty());

        let root_type = content.get("resourceType").and_then(Value::as_str);
        let mut current: Vec<&Value> = vec![content];

        if let Some(first) = segments.next() {
            let names_root = Some(first) == root_type
                || first == "Resource"
                || first == "DomainResource"
                || first.starts_with(char::is_uppercase);
            if !names_root {
                current = step(&current, first);
            }
        }

        for segment in segments {
            current = step(&current, segment);
            if current.is_empty() {
                break;
            }
        }

        current.into_iter().cloned().collect()
    }
}

fn step<'a>(nodes: &[&'a Value], field: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for node in nodes {
        match node.get(field) {
            Some(Value::Array(items)) => out.extend(items.iter().filter(|v| !v.is_null())),
            Some(Value::Null) | None => {}
            Some(value) => out.push(value),
        }
    }
    out
}

impl PathResolver for JsonPathResolver {
    fn extract(&self, content: &Value, path: &str) -> Vec<Value> {
        path.split('|')
            .flat_map(|branch| Self::extract_one(content, branch.trim()))
            .collect()
    }
}
