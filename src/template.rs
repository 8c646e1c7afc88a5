//! Server-side HTML rendering for the schoolbook pages.
//!
//! A minimal Django-style engine: `{{ variable }}` with dotted paths,
//! `{% if %}`/`{% else %}`/`{% endif %}`, `{% for item in items %}`,
//! `{% block %}` with `{% extends "base.html" %}` inheritance, and a
//! `{% tailwind %}` tag that injects the Tailwind CDN script.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::server::Response;

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(\{\{.*?\}\}|\{%.*?%\})").expect("valid template regex"));

/// Supported value types for the render context.
#[derive(Clone)]
pub enum TemplateValue {
    String(String),
    Bool(bool),
    Number(f64),
    List(Vec<TemplateValue>),
    Object(HashMap<String, TemplateValue>),
}

pub type Context = HashMap<String, TemplateValue>;

impl TemplateValue {
    pub fn as_string(&self) -> String {
        match self {
            TemplateValue::String(s) => s.clone(),
            TemplateValue::Bool(b) => b.to_string(),
            TemplateValue::Number(n) => n.to_string(),
            TemplateValue::List(_) | TemplateValue::Object(_) => String::new(),
        }
    }

    /// Truthiness for `{% if %}`: true booleans, non-empty strings, lists,
    /// and objects, and non-zero numbers.
    fn is_truthy(&self) -> bool {
        match self {
            TemplateValue::Bool(b) => *b,
            TemplateValue::String(s) => !s.is_empty(),
            TemplateValue::Number(n) => *n != 0.0,
            TemplateValue::List(items) => !items.is_empty(),
            TemplateValue::Object(map) => !map.is_empty(),
        }
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

#[derive(Debug, Clone)]
enum Token {
    Text(String),
    Variable(String),
    Tag(String),
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Variable(String),
    If {
        condition: String,
        then_body: Vec<Node>,
        else_body: Vec<Node>,
    },
    For {
        var_name: String,
        list_name: String,
        body: Vec<Node>,
    },
    Block {
        name: String,
        body: Vec<Node>,
    },
    Extends(String),
    Tailwind,
}

fn tokenize(content: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut last_end = 0;
    for mat in TAG_RE.find_iter(content) {
        if mat.start() > last_end {
            tokens.push(Token::Text(content[last_end..mat.start()].to_string()));
        }
        let m = mat.as_str();
        if m.starts_with("{{") {
            let inner = m.trim_start_matches("{{").trim_end_matches("}}").trim();
            tokens.push(Token::Variable(inner.to_string()));
        } else {
            let inner = m.trim_start_matches("{%").trim_end_matches("%}").trim();
            tokens.push(Token::Tag(inner.to_string()));
        }
        last_end = mat.end();
    }
    if last_end < content.len() {
        tokens.push(Token::Text(content[last_end..].to_string()));
    }
    tokens
}

fn parse(tokens: &[Token]) -> Vec<Node> {
    let mut idx = 0;
    parse_nodes(tokens, &mut idx, &[])
}

/// Recursive descent over the token stream until one of `end_tags`.
fn parse_nodes(tokens: &[Token], idx: &mut usize, end_tags: &[&str]) -> Vec<Node> {
    let mut nodes = Vec::new();
    while *idx < tokens.len() {
        match &tokens[*idx] {
            Token::Text(t) => {
                nodes.push(Node::Text(t.clone()));
                *idx += 1;
            }
            Token::Variable(v) => {
                nodes.push(Node::Variable(v.clone()));
                *idx += 1;
            }
            Token::Tag(tag) => {
                let t = tag.trim();
                if end_tags.contains(&t) {
                    break;
                }
                if let Some(rest) = t.strip_prefix("extends ") {
                    nodes.push(Node::Extends(rest.trim_matches('"').to_string()));
                    *idx += 1;
                    continue;
                }
                if let Some(name) = t.strip_prefix("block ") {
                    *idx += 1;
                    let body = parse_nodes(tokens, idx, &["endblock"]);
                    *idx += 1; // skip endblock
                    nodes.push(Node::Block {
                        name: name.to_string(),
                        body,
                    });
                    continue;
                }
                if let Some(cond) = t.strip_prefix("if ") {
                    *idx += 1;
                    let then_body = parse_nodes(tokens, idx, &["else", "endif"]);
                    let mut else_body = Vec::new();
                    if let Some(Token::Tag(tt)) = tokens.get(*idx) {
                        if tt.trim() == "else" {
                            *idx += 1;
                            else_body = parse_nodes(tokens, idx, &["endif"]);
                        }
                    }
                    *idx += 1; // skip endif
                    nodes.push(Node::If {
                        condition: cond.to_string(),
                        then_body,
                        else_body,
                    });
                    continue;
                }
                if let Some(rest) = t.strip_prefix("for ") {
                    let parts: Vec<&str> = rest.split_whitespace().collect();
                    if parts.len() == 3 && parts[1] == "in" {
                        *idx += 1;
                        let body = parse_nodes(tokens, idx, &["endfor"]);
                        *idx += 1; // skip endfor
                        nodes.push(Node::For {
                            var_name: parts[0].to_string(),
                            list_name: parts[2].to_string(),
                            body,
                        });
                        continue;
                    }
                }
                if t == "tailwind" {
                    nodes.push(Node::Tailwind);
                    *idx += 1;
                    continue;
                }
                // Unknown tag: skip
                *idx += 1;
            }
        }
    }
    nodes
}

/// Resolve a dotted path `a.b.c` within the context.
fn resolve_variable<'a>(name: &str, context: &'a Context) -> Option<&'a TemplateValue> {
    let mut current: Option<&TemplateValue> = None;
    for (i, key) in name.split('.').enumerate() {
        if i == 0 {
            current = context.get(key);
        } else if let Some(TemplateValue::Object(map)) = current {
            current = map.get(key);
        } else {
            return None;
        }
    }
    current
}

/// Replace blocks in the base AST with same-named child blocks.
fn merge_blocks(nodes: &[Node], child_blocks: &HashMap<String, Vec<Node>>) -> Vec<Node> {
    nodes
        .iter()
        .map(|node| match node {
            Node::Block { name, body } => match child_blocks.get(name) {
                Some(child) => Node::Block {
                    name: name.clone(),
                    body: child.clone(),
                },
                None => Node::Block {
                    name: name.clone(),
                    body: merge_blocks(body, child_blocks),
                },
            },
            Node::If {
                condition,
                then_body,
                else_body,
            } => Node::If {
                condition: condition.clone(),
                then_body: merge_blocks(then_body, child_blocks),
                else_body: merge_blocks(else_body, child_blocks),
            },
            Node::For {
                var_name,
                list_name,
                body,
            } => Node::For {
                var_name: var_name.clone(),
                list_name: list_name.clone(),
                body: merge_blocks(body, child_blocks),
            },
            other => other.clone(),
        })
        .collect()
}

fn render_nodes(nodes: &[Node], context: &Context) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Variable(name) => {
                if let Some(val) = resolve_variable(name, context) {
                    out.push_str(&val.as_string());
                }
            }
            Node::If {
                condition,
                then_body,
                else_body,
            } => {
                let truthy = resolve_variable(condition, context)
                    .map(TemplateValue::is_truthy)
                    .unwrap_or(false);
                if truthy {
                    out.push_str(&render_nodes(then_body, context));
                } else {
                    out.push_str(&render_nodes(else_body, context));
                }
            }
            Node::For {
                var_name,
                list_name,
                body,
            } => {
                if let Some(TemplateValue::List(items)) =
                    resolve_variable(list_name, context).cloned()
                {
                    for item in items {
                        let mut local = context.clone();
                        local.insert(var_name.clone(), item);
                        out.push_str(&render_nodes(body, &local));
                    }
                }
            }
            Node::Block { body, .. } => out.push_str(&render_nodes(body, context)),
            Node::Extends(_) => {}
            Node::Tailwind => {
                out.push_str(r#"<script src="https://cdn.tailwindcss.com"></script>"#);
            }
        }
    }
    out
}

/// Render template source without file lookup or inheritance. Blocks
/// defined in the source replace same-named blocks inline.
pub fn render_str(source: &str, context: &Context) -> String {
    let nodes = parse(&tokenize(source));
    let mut blocks = HashMap::new();
    for node in &nodes {
        if let Node::Block { name, body } = node {
            blocks.insert(name.clone(), body.clone());
        }
    }
    render_nodes(&merge_blocks(&nodes, &blocks), context)
}

/// Load `name` from the template directory, merge it into its base
/// template when it extends one, and render to an HTML response.
pub fn render_template(dir: &str, name: &str, context: &Context) -> Response {
    let child_path = Path::new(dir).join(name);
    let child = match std::fs::read_to_string(&child_path) {
        Ok(c) => c,
        Err(_) => {
            debug!("Template {} not found", child_path.display());
            return Response::html(format!("Template '{}' not found", name), 404);
        }
    };
    let child_nodes = parse(&tokenize(&child));

    let mut child_blocks = HashMap::new();
    let mut base_name: Option<String> = None;
    for node in &child_nodes {
        if let Node::Extends(base) = node {
            base_name = Some(base.clone());
        }
        if let Node::Block { name, body } = node {
            child_blocks.insert(name.clone(), body.clone());
        }
    }

    let html = match base_name {
        Some(base) => {
            let base_path = Path::new(dir).join(&base);
            let base_content = std::fs::read_to_string(&base_path)
                .unwrap_or_else(|_| format!("Template '{}' not found", base));
            let base_nodes = parse(&tokenize(&base_content));
            render_nodes(&merge_blocks(&base_nodes, &child_blocks), context)
        }
        None => render_nodes(&merge_blocks(&child_nodes, &child_blocks), context),
    };

    Response::html(html, 200)
}
