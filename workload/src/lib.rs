//! Named map reduce applications.
//!
//! Workloads are never sent over the network. Every worker is built with the
//! same registry and resolves the name the coordinator sends it.

use std::collections::BTreeMap;

use anyhow::Result;
use bytes::Bytes;

use common::Workload;

pub mod avg;
pub mod grep;
pub mod sum;
pub mod vertex_degree;
pub mod wc;

/// Names of the built-in workloads.
pub const BUILTIN: [&str; 5] = ["avg", "grep", "sum", "vertex-degree", "wc"];

/// Resolve one of the built-in workloads by name.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "avg" => Some(Workload::new(avg::map, avg::reduce)),
        "grep" => Some(Workload::new(grep::map, grep::reduce)),
        "sum" => Some(Workload::new(sum::map, sum::reduce)),
        "vertex-degree" => Some(Workload::new(vertex_degree::map, vertex_degree::reduce)),
        "wc" => Some(Workload::new(wc::map, sum::reduce)),
        _ => None,
    }
}

/// The capability sets a worker can run, by name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    workloads: BTreeMap<String, Workload>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in workload.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for name in BUILTIN {
            if let Some(workload) = try_named(name) {
                registry.register(name, workload);
            }
        }
        registry
    }

    /// Add or replace a workload.
    pub fn register(&mut self, name: impl Into<String>, workload: Workload) -> &mut Self {
        self.workloads.insert(name.into(), workload);
        self
    }

    pub fn get(&self, name: &str) -> Option<Workload> {
        self.workloads.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.workloads.keys().map(String::as_str)
    }
}

/// Serialize a job's auxiliary arguments for the wire.
pub fn encode_aux(args: &[String]) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(args)?))
}

/// Decode auxiliary arguments. Empty bytes mean no arguments.
pub fn decode_aux(aux: &Bytes) -> Result<Vec<String>> {
    if aux.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(aux)?)
}


#[cfg(test)]
mod tests {
    use common::KeyValue;

    use super::*;

    #[test]
    fn builtin_registry_knows_every_name() {
        let registry = Registry::builtin();
        assert_eq!(registry.names().collect::<Vec<_>>(), BUILTIN.to_vec());
        assert!(registry.get("wc").is_some());
        assert!(registry.get("nope").is_none());
        assert!(try_named("nope").is_none());
    }

    #[test]
    fn registered_workloads_override_builtins() {
        fn silent_map(_kv: KeyValue, _aux: Bytes) -> common::MapOutput {
            common::utils::emit_none()
        }

        let mut registry = Registry::builtin();
        registry.register("sum", Workload::new(silent_map, sum::reduce));

        let sum = registry.get("sum").unwrap();
        let out = (sum.map_fn)(KeyValue::new("k", "1"), Bytes::new()).unwrap();
        assert_eq!(out.count(), 0);
    }

    #[test]
    fn aux_round_trips() {
        let args = vec!["needle".to_string(), "2".to_string()];
        assert_eq!(decode_aux(&encode_aux(&args).unwrap()).unwrap(), args);
        assert!(decode_aux(&Bytes::new()).unwrap().is_empty());
        assert!(decode_aux(&Bytes::from_static(b"{")).is_err());
    }
}
