//! Phrase canonicalization.
//!
//! A normalizer maps phrase text to the comparison key used by the indices.
//! Realms pick one by name; names the registry does not know resolve to the
//! default normalizer, registered under `""`.
//!
//! Every normalizer must be idempotent: applying it to its own output must
//! return that output unchanged.

use std::collections::BTreeMap;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Name of the default normalizer.
pub const DEFAULT_NORMALIZER: &str = "";

/// A named canonicalization function.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    pub name: &'static str,
    /// Human-readable summary, for display.
    pub description: &'static str,
    apply: fn(&str) -> String,
}

impl Normalizer {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        apply: fn(&str) -> String,
    ) -> Self {
        Self {
            name,
            description,
            apply,
        }
    }

    /// Normalizes `phrase`.
    #[must_use]
    pub fn apply(&self, phrase: &str) -> String {
        (self.apply)(phrase)
    }
}

/// Normalizers selectable by name.
#[derive(Debug, Clone)]
pub struct NormalizerRegistry {
    normalizers: BTreeMap<&'static str, Normalizer>,
}

impl Default for NormalizerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NormalizerRegistry {
    /// Registry holding the built-in normalizers.
    pub fn builtin() -> Self {
        let mut registry = Self {
            normalizers: BTreeMap::new(),
        };
        registry.register(Normalizer::new(
            DEFAULT_NORMALIZER,
            "Strips diacritics and punctuation, collapses whitespace, lowercases",
            default_normalize,
        ));
        registry.register(Normalizer::new(
            "exact",
            "Collapses whitespace and lowercases; keeps diacritics and punctuation",
            exact_normalize,
        ));
        registry.register(Normalizer::new(
            "loose",
            "Like the default, also dropping apostrophes and treating - and _ as spaces",
            loose_normalize,
        ));
        registry
    }

    /// Adds or replaces a normalizer.
    pub fn register(&mut self, normalizer: Normalizer) {
        self.normalizers.insert(normalizer.name, normalizer);
    }

    /// Looks up a normalizer, falling back to the default one.
    pub fn get(&self, name: &str) -> Normalizer {
        self.normalizers
            .get(name)
            .or_else(|| self.normalizers.get(DEFAULT_NORMALIZER))
            .copied()
            .unwrap_or(Normalizer::new(DEFAULT_NORMALIZER, "", default_normalize))
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.normalizers.contains_key(name)
    }

    /// Registered normalizers, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Normalizer> + '_ {
        self.normalizers.values()
    }
}

/// The default normalizer.
///
/// # Examples
///
/// ```
/// use phrasedex::normalizer::default_normalize;
///
/// assert_eq!(default_normalize("  Café   au Lait! "), "cafe au lait");
/// assert_eq!(default_normalize("rock'n'roll"), "rock'n'roll");
/// assert_eq!(default_normalize("well-known_fact"), "well-known_fact");
/// ```
#[must_use]
pub fn default_normalize(phrase: &str) -> String {
    // Lowercase first: some uppercase letters lowercase into a base letter
    // plus a combining mark, which the decomposition step then strips.
    let lowered = phrase.to_lowercase();
    let kept: String = lowered
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '\'' | '_' | '-'))
        .collect();
    collapse_whitespace(&kept)
}

fn exact_normalize(phrase: &str) -> String {
    collapse_whitespace(&phrase.to_lowercase())
}

fn loose_normalize(phrase: &str) -> String {
    let base = default_normalize(phrase);
    let spaced: String = base
        .chars()
        .filter(|c| *c != '\'')
        .map(|c| if matches!(c, '-' | '_') { ' ' } else { c })
        .collect();
    collapse_whitespace(&spaced)
}

/// Trims and collapses every whitespace run to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
