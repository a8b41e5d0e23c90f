use serde::{Deserialize, Serialize};

/// Fases de una corrida. `Error` es alcanzable desde cualquier fase no
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationPhase {
    Idle,
    Detecting,
    Merging,
    MappingComplete,
    Propagating,
    Verifying,
    Done,
    Error,
}

impl MigrationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationPhase::Done | MigrationPhase::Error)
    }

    pub fn can_transition(&self, to: MigrationPhase) -> bool {
        use MigrationPhase::*;
        match (self, to) {
            (Idle | Done | Error, Detecting) => true,
            (Detecting, Merging) => true,
            (Merging, MappingComplete) => true,
            (MappingComplete, Propagating) => true,
            (Propagating, Verifying) => true,
            (Verifying, Done) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationPhase::Idle => "idle",
            MigrationPhase::Detecting => "detecting",
            MigrationPhase::Merging => "merging",
            MigrationPhase::MappingComplete => "mapping_complete",
            MigrationPhase::Propagating => "propagating",
            MigrationPhase::Verifying => "verifying",
            MigrationPhase::Done => "done",
            MigrationPhase::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MigrationPhase::*;

    #[test]
    fn happy_path_is_linear() {
        let path = [Idle, Detecting, Merging, MappingComplete, Propagating, Verifying, Done];
        for w in path.windows(2) {
            assert!(w[0].can_transition(w[1]), "{:?} -> {:?}", w[0], w[1]);
        }
        assert!(Done.can_transition(Detecting));
    }

    #[test]
    fn propagation_needs_complete_mapping() {
        assert!(!Merging.can_transition(Propagating));
        assert!(!Detecting.can_transition(Verifying));
        assert!(!Verifying.can_transition(Propagating));
    }

    #[test]
    fn error_from_any_running_phase() {
        for p in [Idle, Detecting, Merging, MappingComplete, Propagating, Verifying] {
            assert!(p.can_transition(Error));
        }
        assert!(!Done.can_transition(Error));
        assert!(!Error.can_transition(Error));
    }
}
