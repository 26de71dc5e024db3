//! XML configuration documents
//!
//! Reads the element-per-key layout used by older deployments:
//!
//! ```xml
//! <config>
//!   <datetime_format>%Y%m%d%H</datetime_format>
//!   <n_keys>500</n_keys>
//!   <store><retry><max_attempts>5</max_attempts></retry></store>
//! </config>
//! ```
//!
//! Elements with children become tables, leaf elements become their trimmed
//! text. A repeated element overwrites the earlier one. Leaf values are typed
//! by key name so the result deserializes like the TOML form.

use toml::{Table, Value};
use xmlparser::{ElementEnd, Token, Tokenizer};

use crate::error::{Error, Result};

const INTEGER_KEYS: &[&str] = &[
    "time_delay",
    "n_keys",
    "n_loops",
    "n_workers",
    "max_attempts",
    "initial_backoff_ms",
    "max_backoff_ms",
];

const BOOLEAN_KEYS: &[&str] = &["force_path_style"];

struct Element {
    name: String,
    text: String,
    children: Table,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            text: String::new(),
            children: Table::new(),
        }
    }
}

/// Parse a document into a table keyed by the root element's children
pub(crate) fn parse_document(content: &str) -> Result<Table> {
    let mut open: Vec<Element> = Vec::new();
    let mut root: Option<Table> = None;

    for token in Tokenizer::from(content) {
        let token = token.map_err(|e| Error::Config(format!("invalid XML: {e}")))?;
        match token {
            Token::ElementStart { local, .. } => {
                if root.is_some() {
                    return Err(Error::Config(
                        "invalid XML: more than one root element".to_string(),
                    ));
                }
                open.push(Element::new(local.as_str()));
            }
            Token::ElementEnd {
                end: ElementEnd::Empty | ElementEnd::Close(..),
                ..
            } => {
                let Some(element) = open.pop() else {
                    return Err(Error::Config("invalid XML: unbalanced closing tag".to_string()));
                };
                let Some(parent) = open.last_mut() else {
                    root = Some(element.children);
                    continue;
                };
                match leaf_or_table(&element.name, element.text, element.children)? {
                    Some(value) => parent.children.insert(element.name, value),
                    None => parent.children.remove(&element.name),
                };
            }
            Token::Text { text } => {
                if let Some(element) = open.last_mut() {
                    element.text.push_str(&unescape(text.as_str()));
                }
            }
            Token::Cdata { text, .. } => {
                if let Some(element) = open.last_mut() {
                    element.text.push_str(text.as_str());
                }
            }
            _ => {}
        }
    }

    if let Some(element) = open.last() {
        return Err(Error::Config(format!(
            "invalid XML: element <{}> is not closed",
            element.name
        )));
    }
    root.ok_or_else(|| Error::Config("invalid XML: no root element".to_string()))
}

/// Empty leaves are dropped so the key falls back to its default
fn leaf_or_table(key: &str, text: String, children: Table) -> Result<Option<Value>> {
    if !children.is_empty() {
        return Ok(Some(Value::Table(children)));
    }
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let value = if INTEGER_KEYS.contains(&key) {
        let n = text.parse::<i64>().map_err(|_| {
            Error::Config(format!("key {key}: fail to convert value '{text}' to int"))
        })?;
        Value::Integer(n)
    } else if BOOLEAN_KEYS.contains(&key) {
        let b = text.parse::<bool>().map_err(|_| {
            Error::Config(format!("key {key}: expected true or false, got '{text}'"))
        })?;
        Value::Boolean(b)
    } else {
        Value::String(text.to_string())
    };
    Ok(Some(value))
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
