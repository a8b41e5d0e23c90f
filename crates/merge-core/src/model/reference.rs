//! `ReferenceSpec`: dónde guarda un tipo dependiente su clave foránea hacia la
//! entidad migrada, y qué hacer cuando la referencia no se puede resolver.
use serde::{Deserialize, Serialize};

use super::record::EntityType;
use crate::errors::MigrationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    /// Un campo con un id.
    Scalar,
    /// Varios campos con nombre propio, cada uno con un id
    /// (`operador_1..operador_8`).
    ScalarList,
    /// Un campo con una lista ordenada de ids.
    ArrayValue,
}

/// Política explícita para referencias huérfanas. Dejar el id colgando no es
/// una opción.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrphanPolicy {
    /// Poner el campo a null (campos opcionales de un solo valor).
    ClearField,
    /// Borrar el registro dependiente (asignaciones sin sentido sin la
    /// referencia).
    DeleteRecord,
    /// Quitar el elemento del array (sólo `ArrayValue`).
    RemoveElement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    pub entity_type: EntityType,
    pub field_kind: FieldKind,
    pub field_names: Vec<String>,
    pub orphan_policy: OrphanPolicy,
}

impl ReferenceSpec {
    pub fn scalar(entity_type: &str, field: &str, orphan_policy: OrphanPolicy) -> Self {
        Self { entity_type: EntityType::new(entity_type),
               field_kind: FieldKind::Scalar,
               field_names: vec![field.to_string()],
               orphan_policy }
    }

    pub fn scalar_list(entity_type: &str, fields: &[&str], orphan_policy: OrphanPolicy) -> Self {
        Self { entity_type: EntityType::new(entity_type),
               field_kind: FieldKind::ScalarList,
               field_names: fields.iter().map(|f| f.to_string()).collect(),
               orphan_policy }
    }

    /// Campos numerados `prefix_1..=prefix_n`.
    pub fn numbered(entity_type: &str, prefix: &str, count: usize, orphan_policy: OrphanPolicy) -> Self {
        Self { entity_type: EntityType::new(entity_type),
               field_kind: FieldKind::ScalarList,
               field_names: (1..=count).map(|i| format!("{prefix}_{i}")).collect(),
               orphan_policy }
    }

    pub fn array(entity_type: &str, field: &str) -> Self {
        Self { entity_type: EntityType::new(entity_type),
               field_kind: FieldKind::ArrayValue,
               field_names: vec![field.to_string()],
               orphan_policy: OrphanPolicy::RemoveElement }
    }

    /// Etiqueta corta para logs y reportes: `Tipo.campo1,campo2`.
    pub fn label(&self) -> String {
        format!("{}.{}", self.entity_type, self.field_names.join(","))
    }

    /// Comprueba la forma de la configuración.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.field_names.is_empty() {
            return Err(MigrationError::Validation(format!("{}: sin campos", self.entity_type)));
        }
        match (self.field_kind, self.orphan_policy) {
            (FieldKind::Scalar | FieldKind::ArrayValue, _) if self.field_names.len() != 1 => {
                Err(MigrationError::Validation(format!("{}: {:?} requiere exactamente un campo", self.label(), self.field_kind)))
            }
            (FieldKind::ArrayValue, OrphanPolicy::RemoveElement) => Ok(()),
            (FieldKind::ArrayValue, p) => {
                Err(MigrationError::Validation(format!("{}: arrays sólo admiten RemoveElement (recibido {:?})", self.label(), p)))
            }
            (_, OrphanPolicy::RemoveElement) => {
                Err(MigrationError::Validation(format!("{}: RemoveElement sólo aplica a arrays", self.label())))
            }
            _ => Ok(()),
        }
    }
}
