//! Extractores de clave natural.
//!
//! Cada extractor sabe derivar una clave desde el lado legacy y desde el lado
//! master; los nombres de campo pueden diferir entre ambos (`codigo` vs
//! `codigo_empleado`). Las claves vacías nunca se indexan ni se buscan.
use serde::{Deserialize, Serialize};

use super::record::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyKind {
    /// Valor exacto (recortado) de un campo: código de empleado, código de
    /// máquina.
    Field { legacy_field: String, master_field: String },
    /// Email recortado y en minúsculas.
    Email { legacy_field: String, master_field: String },
    /// Nombre normalizado a partir de uno o varios campos concatenados.
    NormalizedName {
        legacy_fields: Vec<String>,
        master_fields: Vec<String>,
    },
    /// Campo del master que guarda el id legacy de una migración anterior.
    /// Del lado legacy la clave es el propio `id`.
    BackPointer { master_field: String },
}

/// Extractor con nombre estable (aparece en logs y en `Match`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExtractor {
    pub name: String,
    pub kind: KeyKind,
}

impl KeyExtractor {
    pub fn field(name: &str, legacy_field: &str, master_field: &str) -> Self {
        Self { name: name.to_string(),
               kind: KeyKind::Field { legacy_field: legacy_field.to_string(),
                                      master_field: master_field.to_string() } }
    }

    pub fn email(name: &str, legacy_field: &str, master_field: &str) -> Self {
        Self { name: name.to_string(),
               kind: KeyKind::Email { legacy_field: legacy_field.to_string(),
                                      master_field: master_field.to_string() } }
    }

    pub fn normalized_name(name: &str, legacy_fields: &[&str], master_fields: &[&str]) -> Self {
        Self { name: name.to_string(),
               kind: KeyKind::NormalizedName { legacy_fields: legacy_fields.iter().map(|s| s.to_string()).collect(),
                                               master_fields: master_fields.iter().map(|s| s.to_string()).collect() } }
    }

    pub fn back_pointer(name: &str, master_field: &str) -> Self {
        Self { name: name.to_string(),
               kind: KeyKind::BackPointer { master_field: master_field.to_string() } }
    }

    /// `true` para extractores que dependen del contenido del registro y no de
    /// su id (los únicos útiles para la resolución secundaria de huérfanos).
    pub fn is_natural(&self) -> bool {
        !matches!(self.kind, KeyKind::BackPointer { .. })
    }

    pub fn legacy_key(&self, legacy: &Record) -> Option<String> {
        match &self.kind {
            KeyKind::Field { legacy_field, .. } => legacy.text(legacy_field),
            KeyKind::Email { legacy_field, .. } => email_key(legacy, legacy_field),
            KeyKind::NormalizedName { legacy_fields, .. } => name_key(legacy, legacy_fields),
            KeyKind::BackPointer { .. } => Some(legacy.id.to_string()),
        }
    }

    pub fn master_key(&self, master: &Record) -> Option<String> {
        match &self.kind {
            KeyKind::Field { master_field, .. } => master.text(master_field),
            KeyKind::Email { master_field, .. } => email_key(master, master_field),
            KeyKind::NormalizedName { master_fields, .. } => name_key(master, master_fields),
            KeyKind::BackPointer { master_field } => master.text(master_field),
        }
    }
}

fn email_key(record: &Record, field: &str) -> Option<String> {
    record.text(field).map(|s| s.to_lowercase())
}

fn name_key(record: &Record, fields: &[String]) -> Option<String> {
    let joined = fields.iter()
                       .filter_map(|f| record.text(f))
                       .collect::<Vec<_>>()
                       .join(" ");
    let n = normalize_name(&joined);
    if n.is_empty() { None } else { Some(n) }
}

/// Minúsculas, sin diacríticos, sin puntuación y con espacios colapsados.
pub fn normalize_name(input: &str) -> String {
    let folded: String = input.chars()
                              .flat_map(|c| c.to_lowercase())
                              .map(fold_diacritic)
                              .map(|c| if c.is_alphanumeric() { c } else { ' ' })
                              .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::Fields;
    use serde_json::json;

    fn rec(id: &str, pairs: &[(&str, serde_json::Value)]) -> Record {
        let mut f = Fields::new();
        for (k, v) in pairs {
            f.insert(k.to_string(), v.clone());
        }
        Record::new(id, "T", f)
    }

    #[test]
    fn normalize_folds_accents_and_spaces() {
        assert_eq!(normalize_name("  José   MUÑOZ-Pérez "), "jose munoz perez");
    }

    #[test]
    fn extractor_sides_use_their_own_fields() {
        let ex = KeyExtractor::field("code", "codigo", "codigo_empleado");
        let legacy = rec("L1", &[("codigo", json!(" E-07 "))]);
        let master = rec("M1", &[("codigo_empleado", json!("E-07"))]);
        assert_eq!(ex.legacy_key(&legacy), ex.master_key(&master));
    }

    #[test]
    fn numeric_codes_are_keys() {
        let ex = KeyExtractor::field("code", "codigo", "codigo");
        assert_eq!(ex.legacy_key(&rec("L1", &[("codigo", json!(42))])).as_deref(), Some("42"));
    }

    #[test]
    fn back_pointer_uses_legacy_id() {
        let ex = KeyExtractor::back_pointer("legacy", "legacy_id");
        let legacy = rec("L9", &[]);
        let master = rec("M9", &[("legacy_id", json!("L9"))]);
        assert_eq!(ex.legacy_key(&legacy).as_deref(), Some("L9"));
        assert_eq!(ex.master_key(&master).as_deref(), Some("L9"));
        assert!(!ex.is_natural());
    }

    #[test]
    fn empty_keys_are_none() {
        let ex = KeyExtractor::email("email", "email", "email");
        assert_eq!(ex.legacy_key(&rec("L1", &[("email", json!(""))])), None);
        let nm = KeyExtractor::normalized_name("name", &["nombre", "apellidos"], &["nombre"]);
        assert_eq!(nm.legacy_key(&rec("L1", &[])), None);
    }
}
