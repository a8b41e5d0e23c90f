//! Registro genérico del record store: `{ id, type, fields }`.
//!
//! El `id` lo asigna el store al crear y es inmutable. `fields` es un mapa
//! JSON abierto; este crate no impone esquema.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mapa de campos de un registro (orden de inserción irrelevante).
pub type Fields = Map<String, Value>;

/// Identificador opaco asignado por el record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Etiqueta del tipo de entidad (`Employee`, `EmployeeMasterDatabase`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(pub String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, entity_type: impl Into<EntityType>, fields: Fields) -> Self {
        Self { id: id.into(),
               entity_type: entity_type.into(),
               fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Valor del campo como texto recortado, `None` si está vacío.
    pub fn text(&self, field: &str) -> Option<String> {
        self.fields.get(field).and_then(value_as_text)
    }

    /// `true` si el campo falta o contiene un valor vacío.
    pub fn is_blank(&self, field: &str) -> bool {
        self.fields.get(field).map(is_empty_value).unwrap_or(true)
    }
}

/// Valor "vacío" para la política fill-gap: null, string en blanco, array u
/// objeto vacíos. Números y booleanos nunca son vacíos.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Representación textual de un escalar para usar como clave.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() { None } else { Some(t.to_string()) }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_values_follow_fill_gap_rules() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("   ")));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!({})));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
        assert!(!is_empty_value(&json!("x")));
    }

    #[test]
    fn record_serializes_type_key() {
        let mut f = Fields::new();
        f.insert("nombre".into(), json!("Ana"));
        let r = Record::new("E1", "Employee", f);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["type"], json!("Employee"));
        assert_eq!(v["id"], json!("E1"));
        assert_eq!(r.text("nombre").as_deref(), Some("Ana"));
        assert!(r.is_blank("direccion"));
    }

    #[test]
    fn record_from_owned_row_columns() {
        let (id, entity_type) = (String::from("M7"), String::from("MachineMasterDatabase"));
        let r = Record::new(id, entity_type, Fields::new());
        assert_eq!(r.id, RecordId::from("M7"));
        assert_eq!(r.entity_type.as_str(), "MachineMasterDatabase");
    }
}
