use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("Missing value for prompt variable '{0}'")]
    MissingVariable(String),
}

/// String template with declared `{name}` placeholders.
///
/// Formatting is a single left-to-right pass: substituted values are never
/// rescanned, and braces that do not enclose a declared name are copied
/// through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    /// Create a template from its text and declared variable names.
    /// Duplicate names are dropped, first occurrence wins.
    pub fn new<I, S>(template: impl Into<String>, input_variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let template = template.into();
        let mut declared: Vec<String> = Vec::new();
        for var in input_variables {
            let var = var.into();
            if !declared.contains(&var) {
                declared.push(var);
            }
        }

        for var in &declared {
            if !template.contains(&format!("{{{}}}", var)) {
                debug!(variable = %var, "declared prompt variable has no placeholder");
            }
        }

        Self {
            template,
            input_variables: declared,
        }
    }

    /// Create a template whose variables are the `{identifier}` placeholders
    /// found in the text, in order of first appearance
    pub fn from_template(template: impl Into<String>) -> Self {
        let template = template.into();
        let mut names: Vec<String> = Vec::new();
        let mut rest = template.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            match placeholder(after) {
                Some(name) if is_identifier(name) => {
                    if !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                    rest = &after[name.len() + 1..];
                }
                _ => rest = after,
            }
        }
        Self::new(template, names)
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Substitute every declared variable.
    ///
    /// Fails on the first declared variable (in declaration order) that has
    /// no entry in `values`. Extra entries in `values` are ignored.
    pub fn format(&self, values: &HashMap<String, String>) -> Result<String, PromptError> {
        if let Some(missing) = self
            .input_variables
            .iter()
            .find(|var| !values.contains_key(var.as_str()))
        {
            return Err(PromptError::MissingVariable(missing.clone()));
        }

        let mut output = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            output.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match placeholder(after) {
                Some(name) if self.is_declared(name) => {
                    output.push_str(&values[name]);
                    rest = &after[name.len() + 1..];
                }
                _ => {
                    output.push('{');
                    rest = after;
                }
            }
        }
        output.push_str(rest);

        Ok(output)
    }

    fn is_declared(&self, name: &str) -> bool {
        self.input_variables.iter().any(|var| var == name)
    }
}

/// Text between an opening brace (already consumed) and the next closing
/// brace, provided no other opening brace intervenes
fn placeholder(after_open: &str) -> Option<&str> {
    let close = after_open.find('}')?;
    let name = &after_open[..close];
    if name.contains('{') {
        None
    } else {
        Some(name)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}
