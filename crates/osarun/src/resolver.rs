//! # Class Resolver
//!
//! Decides which local proxy type stands in for a remote object, given the
//! class name the remote side reported.
//!
//! ## Algorithm
//!
//! 1. No class name: the dynamic proxy.
//! 2. An `array::` class name: the sequence proxy. The `function` class of
//!    bare callables: the dynamic proxy.
//! 3. A registered mapping (application map first, then defaults): that type.
//! 4. Otherwise, if an application can be asked, walk to the parent class and
//!    retry step 3.
//! 5. Chain exhausted: the dynamic proxy.
//!
//! ## Invariants
//!
//! - Each `(application, class)` pair walks the remote chain at most once per
//!   resolver; the outcome is memoized.
//! - A failed parent query, or a chain that revisits a class, ends the walk
//!   with the dynamic proxy. Resolution never fails.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use osapack::ARRAY_CLASS_PREFIX;

use crate::class_map::ClassRegistry;
use crate::class_map::ProxyClass;
use crate::error::Result;

/// Something that can name the parent of a remote class.
pub trait ParentLookup {
    /// Returns the parent class name, or `None` at the root of the hierarchy.
    fn parent_of_class(&self, class_name: &str) -> Result<Option<String>>;
}

/// Class name the remote side reports for bare callables.
pub const FUNCTION_CLASS: &str = "function";

type MemoKey = (Option<String>, String);

/// Memoizing resolver over one registry.
#[derive(Debug)]
pub struct ClassResolver {
    registry: Arc<ClassRegistry>,
    memo: DashMap<MemoKey, ProxyClass>,
}

impl ClassResolver {
    pub fn new(registry: Arc<ClassRegistry>) -> Self {
        Self { registry, memo: DashMap::new() }
    }

    /// Resolves a reported class name to a local proxy type.
    ///
    /// `parents` is the application that can answer parent-class queries, when
    /// one is known. Without it only the registry is consulted, and a miss is
    /// not memoized so a later call with an application can still walk.
    pub fn resolve(
        &self,
        app_name: Option<&str>,
        class_name: Option<&str>,
        parents: Option<&dyn ParentLookup>,
    ) -> ProxyClass {
        let Some(class_name) = class_name else {
            return ProxyClass::DYNAMIC;
        };
        if class_name.starts_with(ARRAY_CLASS_PREFIX) {
            return ProxyClass::ARRAY;
        }
        if class_name == FUNCTION_CLASS {
            return ProxyClass::DYNAMIC;
        }

        let key = (app_name.map(str::to_string), class_name.to_string());
        if let Some(hit) = self.memo.get(&key) {
            return *hit;
        }

        if let Some(found) = self.registry.lookup(app_name, class_name) {
            self.memo.insert(key, found);
            return found;
        }

        let Some(parents) = parents else {
            return ProxyClass::DYNAMIC;
        };

        let resolved = self.walk(app_name, class_name, parents);
        // Racing walks compute the same answer; last write wins.
        self.memo.insert(key, resolved);
        resolved
    }

    fn walk(&self, app_name: Option<&str>, class_name: &str, parents: &dyn ParentLookup) -> ProxyClass {
        let mut seen = HashSet::new();
        seen.insert(class_name.to_string());
        let mut current = class_name.to_string();

        loop {
            let parent = match parents.parent_of_class(&current) {
                Ok(Some(parent)) => parent,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(class = %current, error = %e, "parent class query failed");
                    break;
                }
            };

            if !seen.insert(parent.clone()) {
                tracing::warn!(class = %class_name, parent = %parent, "remote class chain loops");
                break;
            }

            tracing::debug!(class = %current, parent = %parent, "walking to parent class");
            if let Some(found) = self.registry.lookup(app_name, &parent) {
                return found;
            }
            current = parent;
        }

        tracing::debug!(class = %class_name, "no mapping in class chain, using dynamic proxy");
        ProxyClass::DYNAMIC
    }

    /// Number of memoized pairs.
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::error::Error;

    const DOCUMENT: ProxyClass = ProxyClass::new("test.document");
    const RECORD: ProxyClass = ProxyClass::new("test.record");

    /// Answers parent queries from a fixed table, counting every query.
    struct Hierarchy {
        parents: HashMap<String, String>,
        queries: RefCell<Vec<String>>,
        fail: bool,
    }

    impl Hierarchy {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                parents: pairs.iter().map(|(c, p)| (c.to_string(), p.to_string())).collect(),
                queries: RefCell::new(Vec::new()),
                fail: false,
            }
        }

        fn query_count(&self) -> usize {
            self.queries.borrow().len()
        }
    }

    impl ParentLookup for Hierarchy {
        fn parent_of_class(&self, class_name: &str) -> Result<Option<String>> {
            self.queries.borrow_mut().push(class_name.to_string());
            if self.fail {
                return Err(Error::Remote {
                    command: "parentOfClass".into(),
                    message: "no such class".into(),
                    number: None,
                });
            }
            Ok(self.parents.get(class_name).cloned())
        }
    }

    fn registry() -> Arc<ClassRegistry> {
        Arc::new(
            ClassRegistry::builder()
                .register_default("document", DOCUMENT)
                .register("Notes", "record", RECORD)
                .build(),
        )
    }

    #[test]
    fn test_null_and_array_classes() {
        let resolver = ClassResolver::new(registry());
        assert_eq!(resolver.resolve(None, None, None), ProxyClass::DYNAMIC);
        assert_eq!(resolver.resolve(None, Some("array::record"), None), ProxyClass::ARRAY);
        assert_eq!(resolver.memoized(), 0);
    }

    #[test]
    fn test_callables_need_no_parent_lookup() {
        let resolver = ClassResolver::new(registry());
        let hierarchy = Hierarchy::new(&[("function", "record")]);
        assert_eq!(resolver.resolve(Some("Notes"), Some("function"), Some(&hierarchy)), ProxyClass::DYNAMIC);
        assert_eq!(hierarchy.query_count(), 0);
    }

    #[test]
    fn test_direct_hit_needs_no_remote() {
        let resolver = ClassResolver::new(registry());
        let hierarchy = Hierarchy::new(&[]);
        assert_eq!(resolver.resolve(Some("Notes"), Some("record"), Some(&hierarchy)), RECORD);
        assert_eq!(resolver.resolve(Some("Notes"), Some("document"), Some(&hierarchy)), DOCUMENT);
        assert_eq!(hierarchy.query_count(), 0);
    }

    #[test]
    fn test_walks_to_registered_parent() {
        let resolver = ClassResolver::new(registry());
        let hierarchy = Hierarchy::new(&[("smartGroup", "group"), ("group", "record")]);

        assert_eq!(resolver.resolve(Some("Notes"), Some("smartGroup"), Some(&hierarchy)), RECORD);
        assert_eq!(*hierarchy.queries.borrow(), vec!["smartGroup", "group"]);
    }

    #[test]
    fn test_memoized_walk_is_deterministic() {
        let resolver = ClassResolver::new(registry());
        let hierarchy = Hierarchy::new(&[("smartGroup", "record")]);

        let first = resolver.resolve(Some("Notes"), Some("smartGroup"), Some(&hierarchy));
        let second = resolver.resolve(Some("Notes"), Some("smartGroup"), Some(&hierarchy));
        assert_eq!(first, second);
        assert_eq!(hierarchy.query_count(), 1);
    }

    #[test]
    fn test_app_scope_is_part_of_the_key() {
        let resolver = ClassResolver::new(registry());
        let hierarchy = Hierarchy::new(&[]);

        assert_eq!(resolver.resolve(Some("Notes"), Some("record"), Some(&hierarchy)), RECORD);
        assert_eq!(resolver.resolve(Some("Other"), Some("record"), Some(&hierarchy)), ProxyClass::DYNAMIC);
    }

    #[test]
    fn test_failed_query_falls_back() {
        let resolver = ClassResolver::new(registry());
        let mut hierarchy = Hierarchy::new(&[("x", "record")]);
        hierarchy.fail = true;

        assert_eq!(resolver.resolve(Some("Notes"), Some("x"), Some(&hierarchy)), ProxyClass::DYNAMIC);
        assert_eq!(hierarchy.query_count(), 1);
    }

    #[test]
    fn test_looping_chain_terminates() {
        let resolver = ClassResolver::new(registry());
        let hierarchy = Hierarchy::new(&[("a", "b"), ("b", "a")]);

        assert_eq!(resolver.resolve(Some("Notes"), Some("a"), Some(&hierarchy)), ProxyClass::DYNAMIC);
        assert_eq!(hierarchy.query_count(), 2);
    }

    #[test]
    fn test_miss_without_application_is_not_memoized() {
        let resolver = ClassResolver::new(registry());
        assert_eq!(resolver.resolve(Some("Notes"), Some("smartGroup"), None), ProxyClass::DYNAMIC);
        assert_eq!(resolver.memoized(), 0);

        let hierarchy = Hierarchy::new(&[("smartGroup", "record")]);
        assert_eq!(resolver.resolve(Some("Notes"), Some("smartGroup"), Some(&hierarchy)), RECORD);
    }

    proptest! {
        /// An unregistered chain whose `k`-th parent query answers null falls
        /// back after exactly `k` queries.
        #[test]
        fn prop_fallback_after_exactly_k_lookups(k in 1usize..12) {
            let resolver = ClassResolver::new(registry());
            let names: Vec<String> = (0..k).map(|i| format!("c{}", i)).collect();
            let pairs: Vec<(&str, &str)> = names
                .windows(2)
                .map(|w| (w[0].as_str(), w[1].as_str()))
                .collect();
            let hierarchy = Hierarchy::new(&pairs);

            let resolved = resolver.resolve(Some("Notes"), Some("c0"), Some(&hierarchy));
            prop_assert_eq!(resolved, ProxyClass::DYNAMIC);
            prop_assert_eq!(hierarchy.query_count(), k);

            resolver.resolve(Some("Notes"), Some("c0"), Some(&hierarchy));
            prop_assert_eq!(hierarchy.query_count(), k);
        }
    }
}
