//! Blob path patterns
//!
//! A trigger registration watches `container/template`, where the template
//! may contain `{name}` placeholders:
//! - `images/{name}.png` matches `cats/tom.png` and binds `name = cats/tom`
//! - `images/raw/` matches everything below `raw/`
//! - `images` (container only) matches every object in the container

use regex::Regex;
use std::collections::HashMap;

use crate::utils::validate_container_name;
use crate::{Error, Result};

/// Values captured from an object path by a pattern's placeholders
pub type BindingData = HashMap<String, String>;

#[derive(Debug, Clone)]
pub struct BlobPathPattern {
    container: String,
    template: String,
    parameters: Vec<String>,
    regex: Regex,
}

impl BlobPathPattern {
    /// Parse `container[/template]`
    pub fn parse(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();
        let (container, template) = match pattern.split_once('/') {
            Some((container, template)) => (container, template),
            None => (pattern, ""),
        };

        if container.contains('{') || container.contains('}') {
            return Err(Error::InvalidPattern(format!(
                "Container name must not contain placeholders: {}",
                pattern
            )));
        }
        validate_container_name(container)?;

        let (parameters, regex) = compile_template(template)?;

        Ok(Self {
            container: container.to_string(),
            template: template.to_string(),
            parameters,
            regex,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match a path inside the watched container and return its binding data
    pub fn bind(&self, path: &str) -> Option<BindingData> {
        let captures = self.regex.captures(path)?;
        let mut bindings = BindingData::new();
        for name in &self.parameters {
            if let Some(value) = captures.name(name) {
                bindings.insert(name.clone(), value.as_str().to_string());
            }
        }
        Some(bindings)
    }
}

impl std::fmt::Display for BlobPathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.template.is_empty() {
            write!(f, "{}", self.container)
        } else {
            write!(f, "{}/{}", self.container, self.template)
        }
    }
}

fn compile_template(template: &str) -> Result<(Vec<String>, Regex)> {
    let mut parameters: Vec<String> = Vec::new();
    let mut expr = String::from("^");
    let mut literal = String::new();
    let mut chars = template.chars().peekable();
    let mut last_was_parameter = false;

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(Error::InvalidPattern(format!(
                        "Unterminated placeholder in '{}'",
                        template
                    )));
                }
                if !is_identifier(&name) {
                    return Err(Error::InvalidPattern(format!(
                        "Invalid placeholder name '{}' in '{}'",
                        name, template
                    )));
                }
                if parameters.contains(&name) {
                    return Err(Error::InvalidPattern(format!(
                        "Duplicate placeholder '{}' in '{}'",
                        name, template
                    )));
                }
                if last_was_parameter && literal.is_empty() {
                    return Err(Error::InvalidPattern(format!(
                        "Adjacent placeholders are ambiguous in '{}'",
                        template
                    )));
                }

                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(&format!("(?P<{}>.+?)", name));
                parameters.push(name);
                last_was_parameter = true;
            }
            '}' => {
                return Err(Error::InvalidPattern(format!(
                    "Unmatched '}}' in '{}'",
                    template
                )));
            }
            _ => {
                literal.push(c);
                last_was_parameter = false;
            }
        }
    }

    expr.push_str(&regex::escape(&literal));
    if template.is_empty() || template.ends_with('/') {
        expr.push_str(".*");
    }
    expr.push('$');

    let regex = Regex::new(&expr)
        .map_err(|e| Error::InvalidPattern(format!("{}: {}", template, e)))?;
    Ok((parameters, regex))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
