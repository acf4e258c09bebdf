use dagcore::{FunctionSpec, GraphError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Insertion-ordered registry of function specs, keyed by name
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    specs: Vec<FunctionSpec>,
    index: HashMap<String, usize>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any existing spec of the same name
    /// in place.
    pub fn register(&mut self, spec: FunctionSpec) {
        match self.index.get(&spec.name) {
            Some(&position) => {
                tracing::debug!("Replacing function: {}", spec.name);
                self.specs[position] = spec;
            }
            None => {
                tracing::debug!("Registering function: {}", spec.name);
                self.index.insert(spec.name.clone(), self.specs.len());
                self.specs.push(spec);
            }
        }
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, spec: FunctionSpec) -> Self {
        self.register(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.index.get(name).map(|&position| &self.specs[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|spec| spec.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Merge `overrides` on top of this registry.
    ///
    /// An override replaces the base entry of the same name entirely; names
    /// unknown to the base are appended. Neither input is modified.
    pub fn with_overrides(&self, overrides: &FunctionRegistry) -> FunctionRegistry {
        let (merged, report) = self.merge(overrides);
        report.log();
        merged
    }

    /// Like [`with_overrides`](Self::with_overrides) but also returns which
    /// names were added and which replaced.
    pub fn merge(&self, overrides: &FunctionRegistry) -> (FunctionRegistry, OverrideReport) {
        let mut merged = self.clone();
        let mut report = OverrideReport::default();

        for spec in overrides.iter() {
            if merged.contains(&spec.name) {
                report.replaced.push(spec.name.clone());
            } else {
                report.added.push(spec.name.clone());
            }
            merged.register(spec.clone());
        }

        (merged, report)
    }

    /// Apply several override layers in order.
    ///
    /// Under [`OverridePolicy::RejectConflicts`] two layers supplying the same
    /// name is an error. Replacing a base entry never is.
    pub fn resolve_layers(
        &self,
        layers: &[FunctionRegistry],
        policy: OverridePolicy,
    ) -> Result<FunctionRegistry, GraphError> {
        if policy == OverridePolicy::RejectConflicts {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            for (layer_idx, layer) in layers.iter().enumerate() {
                for spec in layer.iter() {
                    if let Some(previous) = seen.insert(spec.name.as_str(), layer_idx) {
                        if previous != layer_idx {
                            tracing::error!("Override conflict on function: {}", spec.name);
                            return Err(GraphError::OverrideConflict(spec.name.clone()));
                        }
                    }
                }
            }
        }

        let mut effective = self.clone();
        for layer in layers {
            effective = effective.with_overrides(layer);
        }
        Ok(effective)
    }
}

impl FromIterator<FunctionSpec> for FunctionRegistry {
    fn from_iter<T: IntoIterator<Item = FunctionSpec>>(iter: T) -> Self {
        let mut registry = FunctionRegistry::new();
        for spec in iter {
            registry.register(spec);
        }
        registry
    }
}

/// How successive override layers that define the same name are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    /// The later layer wins
    #[default]
    LastWriteWins,
    /// Fail with `OverrideConflict`
    RejectConflicts,
}

/// Classification derived from a merge: which override names were new and
/// which replaced an existing entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideReport {
    pub added: Vec<String>,
    pub replaced: Vec<String>,
}

impl OverrideReport {
    fn log(&self) {
        if !self.added.is_empty() || !self.replaced.is_empty() {
            tracing::info!(
                "Applied overrides: {} added, {} replaced",
                self.added.len(),
                self.replaced.len()
            );
        }
        for name in &self.replaced {
            tracing::debug!("Function '{}' overridden", name);
        }
    }
}
