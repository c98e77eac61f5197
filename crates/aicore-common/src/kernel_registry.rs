//! Registry of built kernels and the compile-time metadata they publish.
//!
//! Every kernel builder registers a [`KernelArtifact`] under its kernel name.
//! The artifact's [`CompileInfo`] is what the host-side tiling planner reads
//! (staging budget, execution-unit count, element sizes).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::DType;

/// Which operator a kernel implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    ScatterNdAdd,
    BroadcastTo,
    BinaryCrossEntropy,
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScatterNdAdd => write!(f, "ScatterNdAdd"),
            Self::BroadcastTo => write!(f, "BroadcastTo"),
            Self::BinaryCrossEntropy => write!(f, "BinaryCrossEntropy"),
        }
    }
}

/// Compile-time metadata, serialized as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompileInfo(Map<String, Value>);

impl CompileInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a nested unsigned integer, e.g. `["vars", "core_num"]`.
    pub fn get_u64(&self, path: &[&str]) -> Option<u64> {
        let (first, rest) = path.split_first()?;
        let mut cur = self.0.get(*first)?;
        for key in rest {
            cur = cur.get(*key)?;
        }
        cur.as_u64()
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

/// A built kernel as seen by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelArtifact {
    pub name: String,
    pub kind: KernelKind,
    /// Element type the kernel was specialised for.
    pub dtype: DType,
    pub compile_info: CompileInfo,
}

/// Name-keyed store of built kernels.
#[derive(Debug, Clone, Default)]
pub struct KernelRegistry {
    kernels: BTreeMap<String, KernelArtifact>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact, returning the one it replaced (rebuilds under the
    /// same name overwrite).
    pub fn register(&mut self, artifact: KernelArtifact) -> Option<KernelArtifact> {
        self.kernels.insert(artifact.name.clone(), artifact)
    }

    pub fn get(&self, name: &str) -> Option<&KernelArtifact> {
        self.kernels.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Registered kernel names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.kernels.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}
