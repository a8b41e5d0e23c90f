//! Empleados: `Employee` (legacy) → `EmployeeMasterDatabase`.
//!
//! Claves en orden: back pointer de corridas previas, código de empleado,
//! email y nombre completo normalizado. Un master con `activo = false` está
//! dado de baja y no recibe coincidencias.
use merge_core::{KeyExtractor, OrphanPolicy, ReferenceSpec, SourcePair};
use serde_json::json;

use crate::machines;

pub const PAIR: &str = "employees";
pub const LEGACY_TYPE: &str = "Employee";
pub const MASTER_TYPE: &str = "EmployeeMasterDatabase";

/// Columnas `operador_1..operador_8` de la planificación diaria.
pub const PLANNING_OPERATOR_SLOTS: usize = 8;

pub fn pair() -> SourcePair {
    SourcePair::new(PAIR, LEGACY_TYPE, MASTER_TYPE).key(KeyExtractor::back_pointer("legacy_id", "legacy_id"))
                                                   .key(KeyExtractor::field("employee_code", "codigo_empleado", "codigo_empleado"))
                                                   .key(KeyExtractor::email("email", "email", "email"))
                                                   .key(KeyExtractor::normalized_name("full_name", &["nombre", "apellidos"], &["nombre", "apellidos"]))
                                                   .exclude("password_hash")
                                                   .exclude("last_login")
                                                   .tombstone("activo", json!(false))
                                                   .reference(ReferenceSpec::scalar("Absence", "employee_id", OrphanPolicy::DeleteRecord))
                                                   .reference(ReferenceSpec::scalar("EmployeeSkill", "employee_id", OrphanPolicy::DeleteRecord))
                                                   .reference(ReferenceSpec::scalar("MaintenanceOrder", "assigned_to", OrphanPolicy::ClearField))
                                                   .reference(ReferenceSpec::scalar(machines::SKILL_LEGACY_TYPE, "employee_id", OrphanPolicy::DeleteRecord))
                                                   .reference(ReferenceSpec::scalar(machines::SKILL_MASTER_TYPE, "employee_id", OrphanPolicy::ClearField))
                                                   .reference(ReferenceSpec::numbered("DailyPlanning",
                                                                                      "operador",
                                                                                      PLANNING_OPERATOR_SLOTS,
                                                                                      OrphanPolicy::ClearField))
                                                   .reference(ReferenceSpec::array("Team", "member_ids"))
}
