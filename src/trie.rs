//! Multi-pattern matcher compiler.
//!
//! Turns a list of literal words into one minimal regular expression that
//! matches any of them, case-insensitively and, optionally, only at word
//! boundaries. Shared prefixes and suffixes are factored out, single-character
//! alternatives become classes and repeated characters become counts, so
//! large word lists stay compact.
//!
//! # Examples
//!
//! ```
//! use phrasedex::trie::{TrieOptions, compile};
//!
//! let trie = compile(["sing", "sting", "string"], TrieOptions::default()).unwrap();
//! assert_eq!(trie.pattern(), r"(?<!\p{L})s(?:tr?)?ing(?!\p{L})");
//! assert!(trie.is_match("She will sing."));
//! assert!(!trie.is_match("singer"));
//! ```

mod compiler;
mod matcher;

use serde::{Deserialize, Serialize};

pub use matcher::CompiledTrie;

use compiler::{Token, condense, prepare_words, tokenize};
use matcher::{Dialect, Renderer};

/// Compilation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieOptions {
    /// Require words that start or end with a letter to be delimited by a
    /// non-letter or the edge of the text on that side.
    pub boundaries: bool,
}

impl Default for TrieOptions {
    fn default() -> Self {
        Self { boundaries: true }
    }
}

/// Compiles `words` into a single matcher.
///
/// An empty list (after dropping blank words) yields a matcher that never
/// matches. Errors only if the resulting expression exceeds the regex size
/// limit.
pub fn compile<I, S>(words: I, options: TrieOptions) -> Result<CompiledTrie, regex::Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let words = prepare_words(words);
    if words.is_empty() {
        return Ok(CompiledTrie::empty());
    }

    let seqs: Vec<_> = words
        .iter()
        .map(|w| tokenize(w, options.boundaries))
        .collect();
    let tree = condense(&seqs);
    let pattern = Renderer::new(Dialect::Lookaround).render(&tree);
    tracing::debug!(words = words.len(), pattern_len = pattern.len(), "compiled trie");

    // The `regex` crate cannot look behind, so words needing a left boundary
    // are only searched where the caller has checked the preceding character.
    let free: Vec<Vec<Token>> = seqs
        .iter()
        .filter(|seq| seq.first() != Some(&Token::LeftEdge))
        .cloned()
        .collect();
    let bounded_source =
        (free.len() < seqs.len()).then(|| Renderer::new(Dialect::Markers).render(&tree));
    let free_source =
        (!free.is_empty()).then(|| Renderer::new(Dialect::Markers).render(&condense(&free)));

    CompiledTrie::build(pattern, bounded_source.as_deref(), free_source.as_deref())
}
