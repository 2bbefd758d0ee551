//! Write-once store of step results used for evidence substitution.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::ContextError;

/// A single `result_name -> value` binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub name: String,
    pub value: String,
}

/// Insertion-ordered mapping from result name to step output.
///
/// Grows monotonically: one binding per completed step, never removed or
/// overwritten.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ContextStore {
    bindings: Vec<Binding>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`. Rebinding an existing name is rejected.
    pub fn bind(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ContextError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ContextError::AlreadyBound { name });
        }
        self.index.insert(name.clone(), self.bindings.len());
        self.bindings.push(Binding {
            name,
            value: value.into(),
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&idx| self.bindings[idx].value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings in insertion order.
    pub fn all(&self) -> &[Binding] {
        &self.bindings
    }

    /// Replace every bound name in `text` with its value.
    ///
    /// Single left-to-right pass: at each position the longest matching name
    /// wins, and inserted values are not rescanned. `#E1` therefore never
    /// rewrites the prefix of `#E10`, and a value that mentions another name
    /// is copied verbatim.
    pub fn substitute(&self, text: &str) -> String {
        if self.bindings.is_empty() {
            return text.to_string();
        }

        let mut by_length: Vec<&Binding> = self
            .bindings
            .iter()
            .filter(|b| !b.name.is_empty())
            .collect();
        by_length.sort_by(|a, b| b.name.len().cmp(&a.name.len()));

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while !rest.is_empty() {
            let matched = by_length.iter().find(|b| rest.starts_with(&b.name));
            if let Some(binding) = matched {
                out.push_str(&binding.value);
                rest = &rest[binding.name.len()..];
                continue;
            }
            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                out.push(ch);
            }
            rest = chars.as_str();
        }
        out
    }
}
