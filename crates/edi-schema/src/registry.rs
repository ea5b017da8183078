//! Concurrent cache of built templates

use crate::template::TemplateTree;
use crate::Result;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Name-keyed cache of immutable template trees
///
/// Lookups hand out `Arc` clones, so concurrent parses share one tree.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: DashMap<String, Arc<TemplateTree>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `tree` under `name`, replacing any previous entry
    pub fn register(&self, name: impl Into<String>, tree: TemplateTree) -> Arc<TemplateTree> {
        let tree = Arc::new(tree);
        self.templates.insert(name.into(), Arc::clone(&tree));
        tree
    }

    pub fn get(&self, name: &str) -> Option<Arc<TemplateTree>> {
        let found = self.templates.get(name).map(|entry| Arc::clone(entry.value()));
        if found.is_some() {
            debug!("Cache hit for template: {}", name);
        } else {
            trace!("Cache miss for template: {}", name);
        }
        found
    }

    /// Cached tree for `name`, building and storing it on a miss
    ///
    /// # Errors
    ///
    /// Propagates the error from `build`; nothing is cached in that case.
    pub fn get_or_build<F>(&self, name: &str, build: F) -> Result<Arc<TemplateTree>>
    where
        F: FnOnce() -> Result<TemplateTree>,
    {
        if let Some(tree) = self.get(name) {
            return Ok(tree);
        }
        let tree = build()?;
        Ok(Arc::clone(
            self.templates
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(tree))
                .value(),
        ))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<TemplateTree>> {
        self.templates.remove(name).map(|(_, tree)| tree)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NodeSpec;
    use std::thread;

    fn tree() -> TemplateTree {
        NodeSpec::envelope("ENV")
            .child(NodeSpec::segment("UNB"))
            .build("t")
            .unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let registry = TemplateRegistry::new();
        registry.register("orders", tree());
        assert!(registry.contains("orders"));
        assert_eq!(registry.get("orders").unwrap().name(), "t");
        assert!(registry.get("invoice").is_none());
        assert_eq!(registry.names(), vec!["orders".to_string()]);
    }

    #[test]
    fn test_get_or_build_builds_once() {
        let registry = TemplateRegistry::new();
        let first = registry.get_or_build("orders", || Ok(tree())).unwrap();
        let second = registry
            .get_or_build("orders", || panic!("should be cached"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_concurrent_readers_share_tree() {
        let registry = Arc::new(TemplateRegistry::new());
        let original = registry.register("orders", tree());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.get("orders").unwrap())
            })
            .collect();
        for handle in handles {
            assert!(Arc::ptr_eq(&handle.join().unwrap(), &original));
        }
    }
}
