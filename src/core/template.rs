//! 整合區塊使用的小型模板語言。
//!
//! - `${integration.url}`：輸出欄位值，數字區段可索引陣列（`${integration.media.0.url}`）
//! - `[% if integration.url %] ... [% endif %]`：值非空時輸出
//! - `[% for lab in integration.media %] ... [% endfor %]`：逐項輸出
//!
//! 其他文字（包括 `{{#paragraph}}` 這類 TeamServer 標記）原樣保留。

use crate::utils::error::{IntegrationError, Result};
use regex::Regex;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var(Vec<String>),
    If {
        path: Vec<String>,
        body: Vec<Node>,
    },
    For {
        binding: String,
        path: Vec<String>,
        body: Vec<Node>,
    },
}

enum Frame {
    Root,
    If(Vec<String>),
    For(String, Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let tag_re = Regex::new(r"\[%\s*(.*?)\s*%\]|\$\{\s*([^}]*?)\s*\}")
            .map_err(|e| template_error(&format!("invalid tag pattern: {}", e)))?;

        let mut stack: Vec<(Frame, Vec<Node>)> = vec![(Frame::Root, Vec::new())];
        let mut last = 0;

        for caps in tag_re.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                push_node(&mut stack, Node::Text(source[last..whole.start()].to_string()));
            }
            last = whole.end();

            if let Some(var) = caps.get(2) {
                push_node(&mut stack, Node::Var(split_path(var.as_str())?));
                continue;
            }

            let statement = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let words: Vec<&str> = statement.split_whitespace().collect();
            match words.as_slice() {
                ["if", path] => stack.push((Frame::If(split_path(path)?), Vec::new())),
                ["for", binding, "in", path] => {
                    stack.push((Frame::For(binding.to_string(), split_path(path)?), Vec::new()))
                }
                ["endif"] => match stack.pop() {
                    Some((Frame::If(path), body)) => push_node(&mut stack, Node::If { path, body }),
                    _ => return Err(template_error("`endif` without matching `if`")),
                },
                ["endfor"] => match stack.pop() {
                    Some((Frame::For(binding, path), body)) => {
                        push_node(&mut stack, Node::For { binding, path, body })
                    }
                    _ => return Err(template_error("`endfor` without matching `for`")),
                },
                _ => {
                    return Err(template_error(&format!(
                        "unknown statement `[% {} %]`",
                        statement
                    )))
                }
            }
        }

        if last < source.len() {
            push_node(&mut stack, Node::Text(source[last..].to_string()));
        }

        match stack.pop() {
            Some((Frame::Root, nodes)) if stack.is_empty() => Ok(Self { nodes }),
            _ => Err(template_error("unclosed `if` or `for` block")),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(&path)?;
        tracing::debug!("Loaded template from {}", path.as_ref().display());
        Self::parse(&source)
    }

    /// 未知欄位輸出為空字串
    pub fn render(&self, context: &Value) -> String {
        let mut out = String::new();
        let mut scope = Vec::new();
        render_nodes(&self.nodes, context, &mut scope, &mut out);
        out
    }
}

fn push_node(stack: &mut [(Frame, Vec<Node>)], node: Node) {
    if let Some((_, nodes)) = stack.last_mut() {
        nodes.push(node);
    }
}

fn split_path(path: &str) -> Result<Vec<String>> {
    let segments: Vec<String> = path.split('.').map(|s| s.trim().to_string()).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(template_error(&format!("invalid variable path `{}`", path)));
    }
    Ok(segments)
}

fn template_error(message: &str) -> IntegrationError {
    IntegrationError::TemplateError {
        message: message.to_string(),
    }
}

fn render_nodes(nodes: &[Node], context: &Value, scope: &mut Vec<(String, Value)>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(path) => {
                if let Some(value) = lookup(path, context, scope) {
                    out.push_str(&display(value));
                }
            }
            Node::If { path, body } => {
                if lookup(path, context, scope).is_some_and(is_truthy) {
                    render_nodes(body, context, scope, out);
                }
            }
            Node::For {
                binding,
                path,
                body,
            } => {
                let items = match lookup(path, context, scope) {
                    Some(Value::Array(items)) => items.clone(),
                    _ => continue,
                };
                for item in items {
                    scope.push((binding.clone(), item));
                    render_nodes(body, context, scope, out);
                    scope.pop();
                }
            }
        }
    }
}

fn lookup<'a>(path: &[String], context: &'a Value, scope: &'a [(String, Value)]) -> Option<&'a Value> {
    let (head, rest) = path.split_first()?;
    let mut current = scope
        .iter()
        .rev()
        .find(|(name, _)| name == head)
        .map(|(_, value)| value)
        .or_else(|| context.get(head.as_str()))?;

    for segment in rest {
        current = match current {
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(segment.as_str())?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
