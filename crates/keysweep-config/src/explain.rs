use crate::{ConfigSource, KeysweepConfig, ProvenanceMap, ProvenancePath};
use serde::Serialize;
use std::fmt;

#[derive(Clone, Debug, Serialize)]
pub struct ExplainReport {
    pub config: KeysweepConfig,
    pub provenance: ProvenanceMap,
    pub warnings: Vec<String>,
}

impl ExplainReport {
    pub fn new(config: KeysweepConfig, provenance: ProvenanceMap, warnings: Vec<String>) -> Self {
        Self {
            config,
            provenance,
            warnings,
        }
    }

    pub fn as_json(&self) -> serde_json::Value {
        serde_json::json!({
            "config": &self.config,
            "provenance": self.provenance_as_vec(),
            "warnings": &self.warnings,
        })
    }

    fn provenance_as_vec(&self) -> Vec<(&ProvenancePath, &ConfigSource)> {
        self.provenance.iter().collect()
    }
}

impl fmt::Display for ExplainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "keysweep configuration (store={}, root={}, bind={})",
            self.config.store.kind, self.config.store.root, self.config.server.bind
        )?;
        for (path, source) in &self.provenance {
            if *source != ConfigSource::Default {
                writeln!(f, " - {path}: {source:?}")?;
            }
        }
        if !self.warnings.is_empty() {
            writeln!(f, "Warnings:")?;
            for warn in &self.warnings {
                writeln!(f, " ! {warn}")?;
            }
        }
        Ok(())
    }
}
