use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::KeyPair;

/// Directed relation edges of a note, keyed by relation label.
///
/// A label is present only while it has at least one target; removing the
/// last target drops the label. Targets keep insertion order and never repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Relations(BTreeMap<String, Vec<KeyPair>>);

impl Relations {
    /// Creates an empty relation map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `target` under `label`. Returns false if the edge already existed.
    pub fn insert(&mut self, label: &str, target: KeyPair) -> bool {
        let targets = self.0.entry(label.to_string()).or_default();
        if targets.contains(&target) {
            return false;
        }
        targets.push(target);
        true
    }

    /// Removes `target` from `label`. Returns false if the edge did not exist.
    pub fn remove(&mut self, label: &str, target: KeyPair) -> bool {
        let Some(targets) = self.0.get_mut(label) else {
            return false;
        };
        let before = targets.len();
        targets.retain(|t| *t != target);
        let removed = targets.len() != before;
        if targets.is_empty() {
            self.0.remove(label);
        }
        removed
    }

    /// Removes every edge to `target`, whatever its label. Returns the labels touched.
    pub fn remove_target(&mut self, target: KeyPair) -> Vec<String> {
        let labels: Vec<String> = self
            .0
            .iter()
            .filter(|(_, targets)| targets.contains(&target))
            .map(|(label, _)| label.clone())
            .collect();
        for label in &labels {
            self.remove(label, target);
        }
        labels
    }

    /// Returns true if the edge `label -> target` exists.
    pub fn contains(&self, label: &str, target: KeyPair) -> bool {
        self.0.get(label).is_some_and(|t| t.contains(&target))
    }

    /// Targets under `label`, empty if the label is absent.
    pub fn get(&self, label: &str) -> &[KeyPair] {
        self.0.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over every `(label, target)` edge.
    pub fn edges(&self) -> impl Iterator<Item = (&str, KeyPair)> + '_ {
        self.0
            .iter()
            .flat_map(|(label, targets)| targets.iter().map(move |t| (label.as_str(), *t)))
    }

    /// Iterates over labels that currently have targets.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<L: Into<String>> FromIterator<(L, KeyPair)> for Relations {
    fn from_iter<I: IntoIterator<Item = (L, KeyPair)>>(iter: I) -> Self {
        let mut relations = Relations::new();
        for (label, target) in iter {
            relations.insert(&label.into(), target);
        }
        relations
    }
}
