use serde::{Deserialize, Serialize};

/// Named configuration of the weighted edit-distance metric.
///
/// See [`Metric`](crate::distance::Metric) for how each field changes costs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorter {
    pub pk: u32,
    pub name: String,
    /// Leading characters of either word whose edits cost half.
    #[serde(default)]
    pub prefix: usize,
    /// Trailing characters of either word whose edits cost half.
    #[serde(default)]
    pub suffix: usize,
    /// Characters whose doubling or undoubling costs half.
    #[serde(default)]
    pub insertables: String,
    /// Groups of mutually substitutable characters.
    #[serde(default)]
    pub similars: Vec<String>,
}

impl Sorter {
    /// The plain, unweighted configuration stored as sorter `0`.
    pub fn default_sorter() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn prefix(mut self, prefix: usize) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn suffix(mut self, suffix: usize) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn insertables(mut self, insertables: impl Into<String>) -> Self {
        self.insertables = insertables.into();
        self
    }

    pub fn similar(mut self, group: impl Into<String>) -> Self {
        self.similars.push(group.into());
        self
    }
}
