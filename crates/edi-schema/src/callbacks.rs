//! Named element checks resolved while a template is built

use crate::{Error, Result};
use edi_ir::{DataElement, ElementCheck};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name-keyed registry of element checks
///
/// Templates refer to checks by name; the builder looks each name up
/// once and stores the closure on the element spec.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    checks: HashMap<String, ElementCheck>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `check` under `name`, replacing any previous entry
    pub fn register<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&DataElement) -> Option<String> + Send + Sync + 'static,
    {
        self.checks.insert(name.into(), Arc::new(check));
    }

    /// Builder-style [`register`](Self::register)
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&DataElement) -> Option<String> + Send + Sync + 'static,
    {
        self.register(name, check);
        self
    }

    /// Look up a check by name
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCallback`] when nothing is registered.
    pub fn resolve(&self, name: &str) -> Result<ElementCheck> {
        self.checks
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownCallback(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.checks.keys().collect();
        names.sort();
        f.debug_struct("CallbackRegistry").field("checks", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::{ElementKind, ElementSpec};

    #[test]
    fn test_resolve_registered_check() {
        let registry = CallbackRegistry::new().with("no_zeros", |el: &DataElement| {
            el.raw_at(0)
                .filter(|v| v.chars().all(|c| c == '0'))
                .map(|v| format!("'{v}' may not be all zeros"))
        });
        let check = registry.resolve("no_zeros").unwrap();

        let mut el = DataElement::new(Arc::new(ElementSpec::new("ST02", ElementKind::Char)));
        el.set("0000").unwrap();
        assert!(check(&el).is_some());
        el.set("0001").unwrap();
        assert!(check(&el).is_none());
    }

    #[test]
    fn test_unknown_callback() {
        let registry = CallbackRegistry::new();
        assert!(matches!(
            registry.resolve("missing"),
            Err(Error::UnknownCallback(name)) if name == "missing"
        ));
    }
}
