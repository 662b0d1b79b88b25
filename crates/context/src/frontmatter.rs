//! YAML front-matter extraction.

use serde_yaml::Value;
use tracing::debug;

/// A document split into its front-matter fields and body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrontMatter<'a> {
    /// `(key, rendered value)` pairs in document order.
    pub fields: Vec<(String, String)>,
    pub body: &'a str,
}

impl FrontMatter<'_> {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Split `content` into front matter and body.
///
/// Front matter is a leading block fenced by `---` lines. A block that is
/// unterminated or not a YAML mapping is treated as ordinary body text.
pub fn split(content: &str) -> FrontMatter<'_> {
    let plain = FrontMatter {
        fields: Vec::new(),
        body: content,
    };
    let text = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return plain;
    };

    let mut offset = 0;
    let mut closing = None;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            closing = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let Some((yaml_end, body_start)) = closing else {
        return plain;
    };

    let yaml = &rest[..yaml_end];
    let mapping = match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(mapping)) => mapping,
        Ok(Value::Null) => Default::default(),
        Ok(_) => return plain,
        Err(e) => {
            debug!(error = %e, "Ignoring malformed front matter");
            return plain;
        }
    };

    let fields = mapping
        .iter()
        .map(|(key, value)| (render_value(key), render_value(value)))
        .collect();

    FrontMatter {
        fields,
        body: &rest[body_start..],
    }
}

/// Render a YAML value as display text.
///
/// Strings verbatim, sequences comma-joined, anything else as compact YAML.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Tagged(tagged) => render_value(&tagged.value),
        Value::Mapping(_) => serde_yaml::to_string(value)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
