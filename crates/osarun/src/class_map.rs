//! # Class Registry
//!
//! Maps remote class names to local proxy types, optionally scoped to one
//! application.
//!
//! ## Philosophy
//!
//! - **Explicit, not global**: A registry is an immutable value built once and
//!   handed to each session. Nothing is registered through process-wide state,
//!   so two sessions (or two tests) never see each other's mappings.
//! - **Versioned**: Every built registry carries a process-unique version, so
//!   logs and caches can tell registries apart.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::facade::Application;
use crate::facade::Facade;

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// A local proxy type, identified by name.
///
/// Facades declare one as `Facade::CLASS`; the registry maps remote class
/// names to these tokens.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct ProxyClass(&'static str);

impl ProxyClass {
    /// The generic dynamic proxy, used whenever no mapping applies.
    pub const DYNAMIC: ProxyClass = ProxyClass("dynamic");
    /// The sequence proxy, used for every `array::` class.
    pub const ARRAY: ProxyClass = ProxyClass("array");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for ProxyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// An immutable set of class mappings.
#[derive(Clone, Debug)]
pub struct ClassRegistry {
    version: u64,
    defaults: HashMap<String, ProxyClass>,
    apps: HashMap<String, HashMap<String, ProxyClass>>,
}

impl ClassRegistry {
    pub fn builder() -> ClassRegistryBuilder {
        ClassRegistryBuilder::default()
    }

    /// A registry with no mappings at all; everything resolves to the
    /// dynamic proxy.
    pub fn empty() -> Self {
        ClassRegistryBuilder::default().build()
    }

    /// The baseline registry: `application` maps to the generic `Application` facade.
    pub fn with_defaults() -> Self {
        Self::builder().register_default_facade::<Application>("application").build()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Looks up one class name. The application's own map wins over the
    /// default map.
    pub fn lookup(&self, app_name: Option<&str>, class_name: &str) -> Option<ProxyClass> {
        app_name
            .and_then(|app| self.apps.get(app))
            .and_then(|classes| classes.get(class_name))
            .or_else(|| self.defaults.get(class_name))
            .copied()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Collects mappings before a registry is frozen.
#[derive(Default)]
pub struct ClassRegistryBuilder {
    defaults: HashMap<String, ProxyClass>,
    apps: HashMap<String, HashMap<String, ProxyClass>>,
}

impl ClassRegistryBuilder {
    /// Maps `class_name` for every application without its own mapping.
    pub fn register_default(mut self, class_name: &str, class: ProxyClass) -> Self {
        self.defaults.insert(class_name.to_string(), class);
        self
    }

    /// Maps `class_name` for one application only.
    pub fn register(mut self, app_name: &str, class_name: &str, class: ProxyClass) -> Self {
        self.apps
            .entry(app_name.to_string())
            .or_default()
            .insert(class_name.to_string(), class);
        self
    }

    pub fn register_default_facade<F: Facade>(self, class_name: &str) -> Self {
        self.register_default(class_name, F::CLASS)
    }

    pub fn register_facade<F: Facade>(self, app_name: &str, class_name: &str) -> Self {
        self.register(app_name, class_name, F::CLASS)
    }

    /// Freezes the mappings under a fresh version.
    pub fn build(self) -> ClassRegistry {
        ClassRegistry {
            version: NEXT_VERSION.fetch_add(1, Ordering::Relaxed),
            defaults: self.defaults,
            apps: self.apps,
        }
    }
}
