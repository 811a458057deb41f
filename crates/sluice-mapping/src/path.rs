//! JSONPath-style lookups over payload values.
//!
//! Supports the subset the `@path` directive and fan-out expressions need:
//! an optional `$` root marker, dotted child access, `[n]` array indexing,
//! `*` wildcards, and `..name` recursive descent. A malformed expression
//! matches nothing rather than erroring.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
  /// `.name` - child lookup, or every child when the name is `*`.
  Child(String),
  /// `[n]` - array index.
  Index(usize),
  /// `..name` - every value under `name` at any depth.
  Descend(String),
}

/// Evaluate `expr` against `root`, returning every matched value in
/// document order.
pub fn query<'a>(root: &'a Value, expr: &str) -> Vec<&'a Value> {
  let Some(segments) = parse(expr) else {
    return Vec::new();
  };

  let mut current = vec![root];
  for segment in &segments {
    let mut next = Vec::new();
    for value in current {
      match segment {
        Segment::Child(name) if name == "*" => match value {
          Value::Object(map) => next.extend(map.values()),
          Value::Array(items) => next.extend(items.iter()),
          _ => {}
        },
        Segment::Child(name) => {
          if let Some(found) = value.get(name.as_str()) {
            next.push(found);
          }
        }
        Segment::Index(index) => {
          if let Some(found) = value.get(index) {
            next.push(found);
          }
        }
        Segment::Descend(name) => collect_descendants(value, name, &mut next),
      }
    }
    current = next;
  }

  current
}

/// Collect every value stored under `name` anywhere below `value`, preorder.
fn collect_descendants<'a>(value: &'a Value, name: &str, out: &mut Vec<&'a Value>) {
  match value {
    Value::Object(map) => {
      for (key, child) in map {
        if key == name {
          out.push(child);
        }
        collect_descendants(child, name, out);
      }
    }
    Value::Array(items) => {
      for child in items {
        collect_descendants(child, name, out);
      }
    }
    _ => {}
  }
}

fn parse(expr: &str) -> Option<Vec<Segment>> {
  let mut rest = expr.trim();
  rest = rest.strip_prefix('$').unwrap_or(rest);

  let mut segments = Vec::new();
  while !rest.is_empty() {
    if let Some(tail) = rest.strip_prefix("..") {
      let end = tail
        .find(|c| c == '.' || c == '[')
        .unwrap_or(tail.len());
      if end == 0 {
        return None;
      }
      segments.push(Segment::Descend(tail[..end].to_string()));
      rest = &tail[end..];
    } else if let Some(tail) = rest.strip_prefix('.') {
      rest = tail;
      if rest.is_empty() {
        return None;
      }
    } else if let Some(tail) = rest.strip_prefix('[') {
      let close = tail.find(']')?;
      let token = tail[..close].trim();
      let segment = if let Some(quoted) = strip_quotes(token) {
        Segment::Child(quoted.to_string())
      } else {
        Segment::Index(token.parse().ok()?)
      };
      segments.push(segment);
      rest = &tail[close + 1..];
    } else {
      let end = rest
        .find(|c| c == '.' || c == '[')
        .unwrap_or(rest.len());
      segments.push(Segment::Child(rest[..end].to_string()));
      rest = &rest[end..];
    }
  }

  Some(segments)
}

fn strip_quotes(token: &str) -> Option<&str> {
  let inner = token
    .strip_prefix('\'')
    .and_then(|t| t.strip_suffix('\''))
    .or_else(|| token.strip_prefix('"').and_then(|t| t.strip_suffix('"')))?;
  Some(inner)
}
