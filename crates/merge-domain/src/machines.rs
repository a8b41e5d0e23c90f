//! Máquinas y habilidades de máquina.
//!
//! `machine_skills` depende del mapa de identidades de máquinas (y del de
//! empleados): las habilidades legacy se consolidan cuando sus `machine_id`
//! y `employee_id` ya apuntan a masters. Los pares de máquinas y empleados
//! reescriben esos campos tanto en las habilidades legacy como en las master.
use merge_core::{KeyExtractor, OrphanPolicy, ReferenceSpec, SourcePair};
use serde_json::json;

pub const MACHINES_PAIR: &str = "machines";
pub const MACHINE_LEGACY_TYPE: &str = "Machine";
pub const MACHINE_MASTER_TYPE: &str = "MachineMasterDatabase";

pub const SKILLS_PAIR: &str = "machine_skills";
pub const SKILL_LEGACY_TYPE: &str = "MachineSkill";
pub const SKILL_MASTER_TYPE: &str = "MachineSkillMasterDatabase";

pub fn machines_pair() -> SourcePair {
    SourcePair::new(MACHINES_PAIR, MACHINE_LEGACY_TYPE, MACHINE_MASTER_TYPE)
        .key(KeyExtractor::back_pointer("legacy_id", "legacy_id"))
        .key(KeyExtractor::field("machine_code", "codigo", "codigo"))
        .key(KeyExtractor::normalized_name("name", &["nombre"], &["nombre"]))
        .tombstone("deleted", json!(true))
        .reference(ReferenceSpec::scalar(SKILL_LEGACY_TYPE, "machine_id", OrphanPolicy::DeleteRecord))
        .reference(ReferenceSpec::scalar(SKILL_MASTER_TYPE, "machine_id", OrphanPolicy::ClearField))
        .reference(ReferenceSpec::scalar("MaintenanceOrder", "machine_id", OrphanPolicy::ClearField))
        .reference(ReferenceSpec::array("ProductionLine", "machine_ids"))
}

/// Clave natural compuesta máquina + empleado.
pub fn machine_skills_pair() -> SourcePair {
    SourcePair::new(SKILLS_PAIR, SKILL_LEGACY_TYPE, SKILL_MASTER_TYPE)
        .key(KeyExtractor::back_pointer("legacy_id", "legacy_id"))
        .key(KeyExtractor::normalized_name("machine_employee", &["machine_id", "employee_id"], &["machine_id", "employee_id"]))
        .reference(ReferenceSpec::scalar("SkillCertification", "skill_id", OrphanPolicy::ClearField))
        .depends_on(MACHINES_PAIR)
        .depends_on(crate::employees::PAIR)
}
