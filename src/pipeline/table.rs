use std::sync::Arc;

use axum::http::Method;

use super::route::{Controller, RouteDefinition};

/// One registered controller
#[derive(Debug, Clone)]
pub struct ControllerEntry {
    /// Mount prefix, `""` for the root controller
    pub prefix: String,
    /// Documentation tag
    pub tag: String,
    pub controller: Controller,
}

/// Controllers by prefix, in registration order.
///
/// Registering an existing prefix again overwrites that entry in place; the
/// two definitions are never merged.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<ControllerEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if an earlier registration was overwritten
    pub fn insert(&mut self, prefix: String, tag: String, controller: Controller) -> bool {
        let entry = ControllerEntry { prefix, tag, controller };
        match self.entries.iter_mut().find(|existing| existing.prefix == entry.prefix) {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.entries.push(entry);
                false
            }
        }
    }

    pub fn resolve(&self, prefix: &str, path: &str, method: &Method) -> Option<Arc<RouteDefinition>> {
        self.entries
            .iter()
            .find(|entry| entry.prefix == prefix)
            .and_then(|entry| entry.controller.lookup(path, method))
            .cloned()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ControllerEntry> {
        self.entries.iter()
    }

    /// Number of distinct (prefix, path) pairs
    pub fn route_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.controller.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(summary: &str) -> Controller {
        Controller::new()
            .get("/", RouteDefinition::new(|_ctx| async {}).summary(summary))
            .get("/blah", RouteDefinition::new(|_ctx| async {}))
    }

    #[test]
    fn re_registration_overwrites() {
        let mut table = RouteTable::new();
        assert!(!table.insert("/test".into(), "test".into(), controller("first")));
        assert!(!table.insert("".into(), "root".into(), Controller::new().get("/", RouteDefinition::new(|_ctx| async {}))));
        assert!(table.insert("/test".into(), "test".into(), Controller::new().get("/", RouteDefinition::new(|_ctx| async {}).summary("second"))));

        let definition = table.resolve("/test", "/", &Method::GET).unwrap();
        assert_eq!(definition.summary_text(), Some("second"));
        assert!(table.resolve("/test", "/blah", &Method::GET).is_none());

        // Overwritten entry keeps its registration slot
        let prefixes: Vec<&str> = table.entries().map(|e| e.prefix.as_str()).collect();
        assert_eq!(prefixes, ["/test", ""]);
    }

    #[test]
    fn route_count_is_distinct_prefix_path_pairs() {
        let mut table = RouteTable::new();
        table.insert("/a".into(), "a".into(), controller("a"));
        table.insert("/b".into(), "b".into(), controller("b").post("/", RouteDefinition::new(|_ctx| async {})));
        assert_eq!(table.route_count(), 4);
    }
}
