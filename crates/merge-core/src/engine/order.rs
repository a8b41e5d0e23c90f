//! Orden de ejecución entre pares según `depends_on`.
use std::collections::{HashMap, HashSet};

use crate::errors::EngineError;
use crate::model::SourcePair;

/// Orden topológico estable: a igualdad de dependencias se respeta el orden
/// de declaración. Dependencia desconocida o ciclo = error de configuración.
pub fn plan_order(pairs: &[SourcePair]) -> Result<Vec<&SourcePair>, EngineError> {
    let by_name: HashMap<&str, &SourcePair> = pairs.iter().map(|p| (p.name.as_str(), p)).collect();
    for p in pairs {
        if let Some(dep) = p.depends_on.iter().find(|d| !by_name.contains_key(d.as_str())) {
            return Err(EngineError::UnknownPair(dep.clone()));
        }
    }

    let mut done: HashSet<&str> = HashSet::new();
    let mut ordered: Vec<&SourcePair> = Vec::with_capacity(pairs.len());
    while ordered.len() < pairs.len() {
        let next = pairs.iter()
                        .find(|p| !done.contains(p.name.as_str()) && p.depends_on.iter().all(|d| done.contains(d.as_str())));
        match next {
            Some(p) => {
                done.insert(p.name.as_str());
                ordered.push(p);
            }
            None => {
                let stuck: Vec<&str> = pairs.iter()
                                            .map(|p| p.name.as_str())
                                            .filter(|n| !done.contains(n))
                                            .collect();
                return Err(EngineError::DependencyCycle(stuck.join(", ")));
            }
        }
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, deps: &[&str]) -> SourcePair {
        deps.iter().fold(SourcePair::new(name, &format!("{name}_l"), &format!("{name}_m")), |p, d| p.depends_on(d))
    }

    #[test]
    fn dependencies_run_first() {
        let pairs = vec![pair("skills", &["machines"]), pair("employees", &[]), pair("machines", &[])];
        let names: Vec<&str> = plan_order(&pairs).unwrap().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["employees", "machines", "skills"]);
    }

    #[test]
    fn unknown_dependency_and_cycle() {
        assert_eq!(plan_order(&[pair("a", &["zzz"])]).unwrap_err(), EngineError::UnknownPair("zzz".into()));
        let err = plan_order(&[pair("a", &["b"]), pair("b", &["a"])]).unwrap_err();
        assert!(matches!(err, EngineError::DependencyCycle(_)));
    }
}
