//! `SourcePair`: configuración completa de una consolidación legacy → master.
//!
//! Sustituye a los scripts por entidad: tipos legacy/master, extractores de
//! clave natural en orden de prioridad, campos transferibles, campos de
//! bookkeeping y la lista de `ReferenceSpec` a propagar.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::key::KeyExtractor;
use super::record::{EntityType, Record};
use super::reference::ReferenceSpec;
use crate::constants::{DEFAULT_BACK_POINTER_FIELD, DEFAULT_MIGRATED_MARKER_FIELD, STORE_MANAGED_FIELDS};
use crate::errors::MigrationError;

/// Regla de tombstone: un master con `field == value` no cuenta como vivo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tombstone {
    pub field: String,
    pub value: Value,
}

impl Tombstone {
    pub fn new(field: &str, value: Value) -> Self {
        Self { field: field.to_string(), value }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.field) == Some(&self.value)
    }
}

/// Campo transferible legacy → master (los nombres pueden diferir).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub legacy: String,
    pub master: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePair {
    pub name: String,
    pub legacy_type: EntityType,
    pub master_type: EntityType,
    /// Orden fijo: el primer extractor que encuentra coincidencia gana.
    pub key_extractors: Vec<KeyExtractor>,
    /// Campos relevantes para el merge. Vacío = todos los campos legacy salvo
    /// los excluidos, con el mismo nombre en el master.
    pub field_mappings: Vec<FieldMapping>,
    pub excluded_fields: Vec<String>,
    pub back_pointer_field: String,
    pub migrated_marker_field: String,
    pub tombstone: Option<Tombstone>,
    pub references: Vec<ReferenceSpec>,
    /// Pares cuyo mapa de identidades debe existir antes de propagar éste.
    pub depends_on: Vec<String>,
}

impl SourcePair {
    pub fn new(name: &str, legacy_type: &str, master_type: &str) -> Self {
        Self { name: name.to_string(),
               legacy_type: EntityType::new(legacy_type),
               master_type: EntityType::new(master_type),
               key_extractors: Vec::new(),
               field_mappings: Vec::new(),
               excluded_fields: Vec::new(),
               back_pointer_field: DEFAULT_BACK_POINTER_FIELD.to_string(),
               migrated_marker_field: DEFAULT_MIGRATED_MARKER_FIELD.to_string(),
               tombstone: None,
               references: Vec::new(),
               depends_on: Vec::new() }
    }

    pub fn key(mut self, extractor: KeyExtractor) -> Self {
        self.key_extractors.push(extractor);
        self
    }

    pub fn map_field(mut self, legacy: &str, master: &str) -> Self {
        self.field_mappings.push(FieldMapping { legacy: legacy.to_string(),
                                                master: master.to_string() });
        self
    }

    pub fn exclude(mut self, field: &str) -> Self {
        self.excluded_fields.push(field.to_string());
        self
    }

    pub fn back_pointer(mut self, field: &str) -> Self {
        self.back_pointer_field = field.to_string();
        self
    }

    pub fn migrated_marker(mut self, field: &str) -> Self {
        self.migrated_marker_field = field.to_string();
        self
    }

    pub fn tombstone(mut self, field: &str, value: Value) -> Self {
        self.tombstone = Some(Tombstone::new(field, value));
        self
    }

    pub fn reference(mut self, spec: ReferenceSpec) -> Self {
        self.references.push(spec);
        self
    }

    pub fn depends_on(mut self, pair: &str) -> Self {
        self.depends_on.push(pair.to_string());
        self
    }

    /// `true` si el master está vivo (no tombstoned).
    pub fn is_active(&self, master: &Record) -> bool {
        self.tombstone.as_ref().map(|t| !t.matches(master)).unwrap_or(true)
    }

    fn is_excluded(&self, field: &str) -> bool {
        STORE_MANAGED_FIELDS.contains(&field)
        || field == self.back_pointer_field
        || field == self.migrated_marker_field
        || self.excluded_fields.iter().any(|f| f == field)
    }

    /// Pares (campo legacy, campo master) relevantes para un registro legacy
    /// concreto, en orden estable.
    pub fn relevant_fields(&self, legacy: &Record) -> Vec<FieldMapping> {
        if !self.field_mappings.is_empty() {
            return self.field_mappings
                       .iter()
                       .filter(|m| !self.is_excluded(&m.legacy) && !self.is_excluded(&m.master))
                       .cloned()
                       .collect();
        }
        let mut names: Vec<&String> = legacy.fields.keys().filter(|k| !self.is_excluded(k)).collect();
        names.sort();
        names.into_iter()
             .map(|k| FieldMapping { legacy: k.clone(),
                                     master: k.clone() })
             .collect()
    }

    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.key_extractors.is_empty() {
            return Err(MigrationError::Validation(format!("par '{}': sin extractores de clave", self.name)));
        }
        if self.legacy_type == self.master_type {
            return Err(MigrationError::Validation(format!("par '{}': legacy y master son el mismo tipo", self.name)));
        }
        for spec in &self.references {
            spec.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::Fields;
    use serde_json::json;

    #[test]
    fn relevant_fields_skip_bookkeeping_and_store_fields() {
        let pair = SourcePair::new("p", "L", "M").key(KeyExtractor::field("c", "c", "c")).exclude("interno");
        let mut f = Fields::new();
        for k in ["id", "created_date", "nombre", "interno", "legacy_id", "c"] {
            f.insert(k.into(), json!("x"));
        }
        let names: Vec<String> = pair.relevant_fields(&Record::new("L1", "L", f)).into_iter().map(|m| m.legacy).collect();
        assert_eq!(names, vec!["c".to_string(), "nombre".to_string()]);
    }

    #[test]
    fn tombstone_marks_inactive() {
        let pair = SourcePair::new("p", "L", "M").tombstone("activo", json!(false));
        let mut f = Fields::new();
        f.insert("activo".into(), json!(false));
        assert!(!pair.is_active(&Record::new("M1", "M", f)));
        assert!(pair.is_active(&Record::new("M2", "M", Fields::new())));
    }

    #[test]
    fn validate_requires_extractors() {
        assert!(SourcePair::new("p", "L", "M").validate().is_err());
        assert!(SourcePair::new("p", "L", "L").key(KeyExtractor::field("c", "c", "c")).validate().is_err());
    }
}
