//! Resolución de referencias huérfanas.
//!
//! Para una clave que ni es un master vivo ni está en el mapa de identidades:
//! se busca el registro original por el id viejo en la colección legacy, se
//! derivan sus claves naturales y se buscan en el índice master. Si tampoco
//! resuelve, la `ReferenceSpec` decide: limpiar el campo, quitar el elemento
//! del array o borrar el registro dependiente.
use std::collections::{HashMap, HashSet};

use log::debug;

use crate::detect::MasterIndex;
use crate::identity::IdentityMap;
use crate::model::{OrphanPolicy, Record, RecordId};

pub struct OrphanResolver {
    legacy: HashMap<RecordId, Record>,
    index: MasterIndex,
}

impl OrphanResolver {
    pub fn new(legacy: &[Record], index: MasterIndex) -> Self {
        Self { legacy: legacy.iter().map(|r| (r.id.clone(), r.clone())).collect(),
               index }
    }

    /// Resolución secundaria por clave natural del registro legacy original.
    pub fn recover(&self, stale_id: &str) -> Option<RecordId> {
        let original = self.legacy.get(&RecordId::new(stale_id))?;
        let m = self.index.find_natural(original)?;
        debug!("orphan recovered: {stale_id} -> {} via {}={}", m.master_id, m.extractor, m.key);
        Some(m.master_id)
    }
}

/// Resultado de resolver un id referenciado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Ya apunta a un master vivo.
    Valid,
    /// Reescrito vía mapa de identidades.
    Remapped(RecordId),
    /// Reescrito vía resolución secundaria.
    Recovered(RecordId),
    /// Apunta a un legacy cuyo merge falló en esta corrida: no se toca.
    Deferred,
    /// Sin resolución: aplicar política.
    Orphan,
}

/// Combina mapa de identidades, conjunto de masters vivos y resolución
/// secundaria, en ese orden. Los ids de `pending` nunca se tratan como
/// huérfanos.
pub struct ReferenceResolver<'a> {
    identity: &'a IdentityMap,
    live: &'a HashSet<RecordId>,
    orphans: &'a OrphanResolver,
    pending: Option<&'a HashSet<RecordId>>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(identity: &'a IdentityMap, live: &'a HashSet<RecordId>, orphans: &'a OrphanResolver) -> Self {
        Self { identity,
               live,
               orphans,
               pending: None }
    }

    /// Legacy ids cuyo create/update falló; sus referencias se conservan
    /// para que una re-ejecución las resuelva.
    pub fn with_pending(mut self, pending: &'a HashSet<RecordId>) -> Self {
        self.pending = Some(pending);
        self
    }

    pub fn resolve(&self, value: &str) -> Resolution {
        if let Some(new_id) = self.identity.resolve_str(value) {
            if new_id.as_str() == value {
                return Resolution::Valid;
            }
            return Resolution::Remapped(new_id.clone());
        }
        if self.live.contains(&RecordId::new(value)) {
            return Resolution::Valid;
        }
        match self.orphans.recover(value) {
            Some(id) if self.live.contains(&id) => Resolution::Recovered(id),
            _ if self.pending.is_some_and(|p| p.contains(&RecordId::new(value))) => Resolution::Deferred,
            _ => Resolution::Orphan,
        }
    }
}

/// Acción concreta aplicada a una referencia huérfana.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanAction {
    ClearField,
    RemoveElement,
    DeleteRecord,
}

impl From<OrphanPolicy> for OrphanAction {
    fn from(p: OrphanPolicy) -> Self {
        match p {
            OrphanPolicy::ClearField => OrphanAction::ClearField,
            OrphanPolicy::RemoveElement => OrphanAction::RemoveElement,
            OrphanPolicy::DeleteRecord => OrphanAction::DeleteRecord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fields, IdentityMappingEntry, KeyExtractor, MappingAction};
    use serde_json::json;

    fn rec(id: &str, pairs: &[(&str, serde_json::Value)]) -> Record {
        let f: Fields = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        Record::new(id, "T", f)
    }

    #[test]
    fn resolution_order_identity_live_secondary() {
        let extractors = vec![KeyExtractor::field("code", "codigo", "codigo")];
        let masters = vec![rec("M1", &[("codigo", json!("A"))]), rec("M2", &[("codigo", json!("B"))])];
        let index = MasterIndex::build(&extractors, &masters);
        // L2 no llegó al mapa (p.ej. su create falló) pero su código existe en master
        let legacy = vec![rec("L1", &[("codigo", json!("A"))]), rec("L2", &[("codigo", json!("B"))]), rec("L9", &[("codigo", json!("Z"))])];
        let orphans = OrphanResolver::new(&legacy, index);

        let mut identity = IdentityMap::new();
        identity.record(IdentityMappingEntry { old_id: "L1".into(),
                                               new_id: "M1".into(),
                                               natural_key: Some("A".into()),
                                               action: MappingAction::Skipped })
                .unwrap();
        let live: HashSet<RecordId> = ["M1", "M2"].iter().map(|s| RecordId::from(*s)).collect();
        let r = ReferenceResolver::new(&identity, &live, &orphans);

        assert_eq!(r.resolve("L1"), Resolution::Remapped("M1".into()));
        assert_eq!(r.resolve("M2"), Resolution::Valid);
        assert_eq!(r.resolve("L2"), Resolution::Recovered("M2".into()));
        assert_eq!(r.resolve("L9"), Resolution::Orphan);
        assert_eq!(r.resolve("nope"), Resolution::Orphan);

        // L9 no pudo escribirse: se conserva en vez de aplicar la política
        let pending: HashSet<RecordId> = [RecordId::from("L9")].into_iter().collect();
        let r = ReferenceResolver::new(&identity, &live, &orphans).with_pending(&pending);
        assert_eq!(r.resolve("L9"), Resolution::Deferred);
        assert_eq!(r.resolve("L2"), Resolution::Recovered("M2".into()));
        assert_eq!(r.resolve("nope"), Resolution::Orphan);
    }
}
