//! Handler registry.
//!
//! Maps handler names to their implementation status. A retired handler
//! stays registered as a tombstone until the migration that removes its
//! rows has been applied everywhere, so name lookups made during a deploy
//! window keep resolving.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use super::model::ModuleProperties;
use crate::{Error, Result};

/// Handler name of the retired user-morphing module.
pub const ADMIN_MORPH_HANDLER: &str = "AdminMorph";

/// Migration that removes the `AdminMorph` rows.
pub const ADMIN_MORPH_MIGRATION: &str = "0047_remove_adminmorph";

const DEPRECATED_SUFFIX: &str = " (DEPRECATED)";

/// Whether a handler still does anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerStatus {
    /// Live handler.
    Active,
    /// Inert placeholder kept until `removed_by` has been applied.
    Tombstone {
        /// Name of the migration that removes this handler's rows.
        removed_by: String,
    },
}

/// One registered handler.
#[derive(Debug)]
pub struct HandlerEntry {
    name: String,
    properties: ModuleProperties,
    status: HandlerStatus,
    warned: AtomicBool,
}

impl HandlerEntry {
    /// A live handler.
    #[must_use]
    pub fn active(name: impl Into<String>, properties: ModuleProperties) -> Self {
        Self {
            name: name.into(),
            properties,
            status: HandlerStatus::Active,
            warned: AtomicBool::new(false),
        }
    }

    /// A tombstone for a removed handler.
    ///
    /// Titles gain a `(DEPRECATED)` suffix and the handler is no longer
    /// choosable.
    #[must_use]
    pub fn tombstone(
        name: impl Into<String>,
        properties: ModuleProperties,
        removed_by: impl Into<String>,
    ) -> Self {
        let properties = ModuleProperties {
            link_title: deprecated(&properties.link_title),
            admin_title: deprecated(&properties.admin_title),
            choosable: false,
            ..properties
        };

        Self {
            name: name.into(),
            properties,
            status: HandlerStatus::Tombstone {
                removed_by: removed_by.into(),
            },
            warned: AtomicBool::new(false),
        }
    }

    /// Handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler status.
    #[must_use]
    pub const fn status(&self) -> &HandlerStatus {
        &self.status
    }

    /// Returns true if this entry is a tombstone.
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        matches!(self.status, HandlerStatus::Tombstone { .. })
    }

    /// Whether the handler renders a page template. Tombstones never do.
    #[must_use]
    pub const fn uses_template(&self) -> bool {
        !self.is_tombstone()
    }

    /// Handler properties.
    ///
    /// The first read of a tombstone's properties logs a deprecation warning.
    pub fn properties(&self) -> &ModuleProperties {
        if let HandlerStatus::Tombstone { removed_by } = &self.status
            && !self.warned.swap(true, Ordering::Relaxed)
        {
            warn!(
                "Handler `{}` is deprecated and will be removed once `{removed_by}` is applied",
                self.name
            );
        }
        &self.properties
    }
}

fn deprecated(title: &str) -> String {
    if title.ends_with(DEPRECATED_SUFFIX) {
        title.to_string()
    } else {
        format!("{title}{DEPRECATED_SUFFIX}")
    }
}

/// Handler name to entry mapping, sorted by name.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    entries: BTreeMap<String, HandlerEntry>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(HandlerEntry::tombstone(
            ADMIN_MORPH_HANDLER,
            admin_morph_properties(),
            ADMIN_MORPH_MIGRATION,
        ));
        registry
    }

    /// Add or replace an entry.
    pub fn register(&mut self, entry: HandlerEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Look up an entry by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHandler`] if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<&HandlerEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::UnknownHandler(name.to_string()))
    }

    /// All entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = &HandlerEntry> {
        self.entries.values()
    }

    /// Replace an active handler with a tombstone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHandler`] if nothing is registered under `name`.
    pub fn retire(&mut self, name: &str, removed_by: &str) -> Result<()> {
        let entry = self
            .entries
            .remove(name)
            .ok_or_else(|| Error::UnknownHandler(name.to_string()))?;

        let tombstone = match entry.status {
            HandlerStatus::Active => HandlerEntry::tombstone(entry.name, entry.properties, removed_by),
            HandlerStatus::Tombstone { .. } => entry,
        };
        self.register(tombstone);
        Ok(())
    }

    /// Drop tombstones whose removing migration is in `applied`.
    ///
    /// Returns the purged handler names.
    pub fn purge_tombstones(&mut self, applied: &HashSet<String>) -> Vec<String> {
        let purged: Vec<String> = self
            .entries
            .values()
            .filter(|entry| {
                matches!(&entry.status, HandlerStatus::Tombstone { removed_by } if applied.contains(removed_by))
            })
            .map(|entry| entry.name.clone())
            .collect();

        for name in &purged {
            self.entries.remove(name);
        }
        purged
    }
}

/// Properties the `AdminMorph` module was registered with.
#[must_use]
pub fn admin_morph_properties() -> ModuleProperties {
    ModuleProperties {
        link_title: "Morph into User".to_string(),
        admin_title: "User Morphing Capability".to_string(),
        module_type: "manage".to_string(),
        seq: 34,
        choosable: true,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn learn_properties() -> ModuleProperties {
        ModuleProperties {
            link_title: "Sign up for classes".to_string(),
            admin_title: "Student Registration".to_string(),
            module_type: "learn".to_string(),
            seq: 10,
            choosable: true,
        }
    }

    #[test]
    fn test_builtin_admin_morph_tombstone() {
        let registry = HandlerRegistry::builtin();
        let entry = registry.get(ADMIN_MORPH_HANDLER).unwrap();

        assert!(entry.is_tombstone());
        assert!(!entry.uses_template());

        let properties = entry.properties();
        assert_eq!(properties.admin_title, "User Morphing Capability (DEPRECATED)");
        assert_eq!(properties.link_title, "Morph into User (DEPRECATED)");
        assert_eq!(properties.module_type, "manage");
        assert_eq!(properties.seq, 34);
        assert!(!properties.choosable);
    }

    #[test]
    fn test_tombstone_warns_once() {
        let entry = HandlerEntry::tombstone("Old", learn_properties(), "0001_remove_old");
        assert!(!entry.warned.load(Ordering::Relaxed));

        entry.properties();
        assert!(entry.warned.load(Ordering::Relaxed));
        entry.properties();
    }

    #[test]
    fn test_active_never_warns() {
        let entry = HandlerEntry::active("StudentReg", learn_properties());
        assert!(entry.uses_template());
        assert_eq!(entry.properties(), &learn_properties());
        assert!(!entry.warned.load(Ordering::Relaxed));
    }

    #[test]
    fn test_unknown_handler() {
        let registry = HandlerRegistry::builtin();
        assert!(matches!(
            registry.get("Nope"),
            Err(Error::UnknownHandler(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_retire_then_purge() {
        let mut registry = HandlerRegistry::new();
        registry.register(HandlerEntry::active("StudentReg", learn_properties()));
        registry.retire("StudentReg", "0100_remove_studentreg").unwrap();
        registry.retire("StudentReg", "0100_remove_studentreg").unwrap();

        let entry = registry.get("StudentReg").unwrap();
        assert_eq!(
            entry.status(),
            &HandlerStatus::Tombstone {
                removed_by: "0100_remove_studentreg".to_string()
            }
        );
        assert_eq!(entry.properties().link_title, "Sign up for classes (DEPRECATED)");

        let applied: HashSet<String> = ["0100_remove_studentreg".to_string()].into();
        assert_eq!(registry.purge_tombstones(&applied), vec!["StudentReg"]);
        assert!(registry.get("StudentReg").is_err());
    }

    #[test]
    fn test_purge_keeps_pending_tombstones_and_active_entries() {
        let mut registry = HandlerRegistry::builtin();
        registry.register(HandlerEntry::active("StudentReg", learn_properties()));

        assert!(registry.purge_tombstones(&HashSet::new()).is_empty());
        assert_eq!(registry.entries().count(), 2);

        let applied: HashSet<String> = [ADMIN_MORPH_MIGRATION.to_string()].into();
        assert_eq!(registry.purge_tombstones(&applied), vec![ADMIN_MORPH_HANDLER]);
        let names: Vec<_> = registry.entries().map(HandlerEntry::name).collect();
        assert_eq!(names, vec!["StudentReg"]);
    }

    #[test]
    fn test_retire_unknown() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.retire("Missing", "x").is_err());
    }
}
