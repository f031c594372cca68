//! Wiring resolver.
//!
//! Maps `"<block>.<output>"` names to registers. Names are published as
//! soon as a block's outputs are allocated, so a later block can reference
//! them; resolution happens once, while directives are applied. A bare
//! block name refers to its `out` output.

use std::collections::HashMap;

use tk_core::RegisterId;

use crate::register::{InputRef, RegisterArena};

pub const DEFAULT_OUTPUT: &str = "out";

#[derive(Debug, Default)]
pub struct OutputDirectory {
    names: HashMap<String, RegisterId>,
    order: Vec<String>,
}

impl OutputDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn qualified(block: &str, output: &str) -> String {
        format!("{block}.{output}")
    }

    /// Publish a block output. Returns `false` if the name was taken.
    pub fn publish(&mut self, block: &str, output: &str, id: RegisterId) -> bool {
        let name = Self::qualified(block, output);
        if self.names.contains_key(&name) {
            return false;
        }
        self.order.push(name.clone());
        self.names.insert(name, id);
        true
    }

    pub fn resolve(&self, reference: &str) -> Option<RegisterId> {
        let reference = reference.trim();
        if reference.contains('.') {
            self.names.get(reference).copied()
        } else {
            self.names
                .get(&Self::qualified(reference, DEFAULT_OUTPUT))
                .copied()
        }
    }

    /// Resolve a reference to a read handle on an existing register.
    pub fn resolve_input(&self, arena: &RegisterArena, reference: &str) -> Option<InputRef> {
        self.resolve(reference).and_then(|id| arena.reader(id))
    }

    /// Published names in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, RegisterId)> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.names.get(name).map(|id| (name.as_str(), *id)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_and_resolve() {
        let mut arena = RegisterArena::new();
        let mut dir = OutputDirectory::new();
        let out = arena.alloc().unwrap();
        let err = arena.alloc().unwrap();

        assert!(dir.publish("pd1", "out", out.id()));
        assert!(dir.publish("pd1", "error", err.id()));
        assert!(!dir.publish("pd1", "error", err.id()));

        assert_eq!(dir.resolve("pd1.error"), Some(err.id()));
        assert_eq!(dir.resolve("pd1"), Some(out.id()));
        assert_eq!(dir.resolve(" pd1.out "), Some(out.id()));
        assert_eq!(dir.resolve("pd1.diff"), None);
        assert_eq!(dir.resolve("pd2"), None);

        assert!(dir.resolve_input(&arena, "pd1.error").is_some());
        let names: Vec<_> = dir.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["pd1.out", "pd1.error"]);
    }
}
