//! Resolutor de merge: decide skip / update / create para un registro legacy.
//!
//! Política fill-gap: un valor no vacío del master nunca se sobreescribe; los
//! huecos del master se rellenan con el valor legacy. El master es la fuente
//! autoritativa una vez poblado.
use serde_json::Value;

use crate::errors::MigrationError;
use crate::model::{is_empty_value, Fields, Record, RecordId, SourcePair};

#[derive(Debug, Clone, PartialEq)]
pub enum MergePlan {
    Create {
        fields: Fields,
        natural_key: Option<String>,
    },
    Update {
        master_id: RecordId,
        patch: Fields,
        natural_key: Option<String>,
    },
    Skip {
        master_id: RecordId,
        natural_key: Option<String>,
    },
}

impl MergePlan {
    pub fn natural_key(&self) -> Option<&str> {
        match self {
            MergePlan::Create { natural_key, .. }
            | MergePlan::Update { natural_key, .. }
            | MergePlan::Skip { natural_key, .. } => natural_key.as_deref(),
        }
    }
}

pub struct MergeResolver<'a> {
    pair: &'a SourcePair,
}

impl<'a> MergeResolver<'a> {
    pub fn new(pair: &'a SourcePair) -> Self {
        Self { pair }
    }

    /// Planifica el merge de `legacy` contra su master (si hubo coincidencia).
    /// `natural_key` es la clave natural preferida del legacy, `None` si no
    /// tiene ninguna.
    pub fn plan(&self, legacy: &Record, matched: Option<&Record>, natural_key: Option<String>) -> Result<MergePlan, MigrationError> {
        match matched {
            None => {
                if natural_key.is_none() {
                    return Err(MigrationError::Validation(format!("{}/{} sin clave natural", self.pair.legacy_type, legacy.id)));
                }
                Ok(MergePlan::Create { fields: self.fields_for_create(legacy),
                                       natural_key })
            }
            Some(master) => {
                let mut patch = fill_gaps(self.pair, legacy, master);
                if patch.is_empty() {
                    return Ok(MergePlan::Skip { master_id: master.id.clone(),
                                                natural_key });
                }
                if master.is_blank(&self.pair.back_pointer_field) {
                    patch.insert(self.pair.back_pointer_field.clone(), Value::String(legacy.id.to_string()));
                }
                Ok(MergePlan::Update { master_id: master.id.clone(),
                                       patch,
                                       natural_key })
            }
        }
    }

    /// Campos del master nuevo: transferibles no vacíos + back pointer +
    /// marca de migrado.
    pub fn fields_for_create(&self, legacy: &Record) -> Fields {
        let mut out = Fields::new();
        for m in self.pair.relevant_fields(legacy) {
            if let Some(v) = legacy.get(&m.legacy) {
                if !is_empty_value(v) {
                    out.insert(m.master, v.clone());
                }
            }
        }
        out.insert(self.pair.back_pointer_field.clone(), Value::String(legacy.id.to_string()));
        out.insert(self.pair.migrated_marker_field.clone(), Value::Bool(true));
        out
    }
}

/// Parche fill-gap: campos legacy no vacíos cuyo destino en el master falta o
/// está vacío.
pub fn fill_gaps(pair: &SourcePair, legacy: &Record, master: &Record) -> Fields {
    let mut patch = Fields::new();
    for m in pair.relevant_fields(legacy) {
        let Some(v) = legacy.get(&m.legacy) else { continue };
        if is_empty_value(v) {
            continue;
        }
        if master.is_blank(&m.master) {
            patch.insert(m.master, v.clone());
        }
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyExtractor;
    use serde_json::json;

    fn rec(id: &str, pairs: &[(&str, serde_json::Value)]) -> Record {
        let f: Fields = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        Record::new(id, "T", f)
    }

    fn pair() -> SourcePair {
        SourcePair::new("employees", "Employee", "EmployeeMasterDatabase").key(KeyExtractor::field("code", "codigo", "codigo"))
    }

    #[test]
    fn master_wins_and_gaps_are_filled() {
        let p = pair();
        let master = rec("M1", &[("codigo", json!("E1")), ("nombre", json!("Ana")), ("direccion", json!(""))]);
        let legacy = rec("L1", &[("codigo", json!("E1")), ("nombre", json!("Ana Garcia")), ("direccion", json!("Calle X"))]);
        let plan = MergeResolver::new(&p).plan(&legacy, Some(&master), Some("E1".into())).unwrap();
        match plan {
            MergePlan::Update { master_id, patch, .. } => {
                assert_eq!(master_id, RecordId::from("M1"));
                assert_eq!(patch.get("direccion"), Some(&json!("Calle X")));
                assert!(patch.get("nombre").is_none());
                assert_eq!(patch.get("legacy_id"), Some(&json!("L1")));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn nothing_new_means_skip() {
        let p = pair();
        let master = rec("M1", &[("codigo", json!("E1")), ("nombre", json!("Ana"))]);
        let legacy = rec("L1", &[("codigo", json!("E1")), ("nombre", json!("Otra")), ("telefono", json!(null))]);
        let plan = MergeResolver::new(&p).plan(&legacy, Some(&master), Some("E1".into())).unwrap();
        assert!(matches!(plan, MergePlan::Skip { .. }));
    }

    #[test]
    fn create_copies_transferable_fields_and_stamps() {
        let p = pair();
        let legacy = rec("L1", &[("id", json!("L1")), ("created_date", json!("2024-01-01")), ("codigo", json!("E1")), ("nombre", json!("Ana")), ("email", json!(""))]);
        let plan = MergeResolver::new(&p).plan(&legacy, None, Some("E1".into())).unwrap();
        let MergePlan::Create { fields, .. } = plan else { panic!("expected create") };
        assert_eq!(fields.get("nombre"), Some(&json!("Ana")));
        assert_eq!(fields.get("legacy_id"), Some(&json!("L1")));
        assert_eq!(fields.get("migrated_from_legacy"), Some(&json!(true)));
        assert!(fields.get("created_date").is_none());
        assert!(fields.get("id").is_none());
        assert!(fields.get("email").is_none());
    }

    #[test]
    fn missing_natural_key_is_validation_error() {
        let p = pair();
        let err = MergeResolver::new(&p).plan(&rec("L1", &[("nombre", json!("Ana"))]), None, None).unwrap_err();
        assert!(matches!(err, MigrationError::Validation(_)));
    }
}
