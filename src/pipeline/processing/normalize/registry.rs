use std::collections::HashMap;

use super::normalizers::{DetailMapping, ListMapping, V1_DETAIL, V1_LIST, V2_DETAIL, V2_LIST};
use crate::domain::SchemaVersion;

/// Registry of schema-specific field mappings
pub struct MappingRegistry {
    lists: HashMap<SchemaVersion, &'static ListMapping>,
    details: HashMap<SchemaVersion, &'static DetailMapping>,
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingRegistry {
    /// Create a registry with the built-in registry schemas.
    ///
    /// Literature documents have no trial mapping: they never produce
    /// canonical trial records.
    pub fn new() -> Self {
        let mut registry = Self {
            lists: HashMap::new(),
            details: HashMap::new(),
        };
        registry.register_list(SchemaVersion::V1Fields, &V1_LIST);
        registry.register_list(SchemaVersion::V2Structured, &V2_LIST);
        registry.register_detail(SchemaVersion::V1Fields, &V1_DETAIL);
        registry.register_detail(SchemaVersion::V2Structured, &V2_DETAIL);
        registry
    }

    pub fn register_list(&mut self, version: SchemaVersion, mapping: &'static ListMapping) {
        self.lists.insert(version, mapping);
    }

    pub fn register_detail(&mut self, version: SchemaVersion, mapping: &'static DetailMapping) {
        self.details.insert(version, mapping);
    }

    pub fn list_mapping(&self, version: SchemaVersion) -> Option<&'static ListMapping> {
        self.lists.get(&version).copied()
    }

    pub fn detail_mapping(&self, version: SchemaVersion) -> Option<&'static DetailMapping> {
        self.details.get(&version).copied()
    }

    /// List the schema versions that yield trial records
    pub fn list_schemas(&self) -> Vec<SchemaVersion> {
        let mut schemas: Vec<SchemaVersion> = self.lists.keys().copied().collect();
        schemas.sort_by_key(|s| s.as_str());
        schemas
    }
}
