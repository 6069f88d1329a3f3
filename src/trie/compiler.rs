use std::collections::{BTreeMap, BTreeSet};

use crate::normalizer::collapse_whitespace;

/// One unit of a word after preparation.
///
/// Edges are zero-width "not next to a letter" assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Token {
    LeftEdge,
    RightEdge,
    /// A whitespace run; matches one or more whitespace characters.
    Space,
    Char(char),
}

/// Condensed alternation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    /// Tokens matched one after another.
    Literal(Vec<Token>),
    /// Nodes matched one after another.
    Seq(Vec<Node>),
    /// A set of single characters.
    Class(Vec<char>),
    /// Any one of the alternatives; optionally none.
    Alt { alts: Vec<Node>, optional: bool },
}

/// Lowercases, trims, collapses whitespace, drops empties and duplicates.
pub(crate) fn prepare_words<I, S>(words: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| collapse_whitespace(&w.as_ref().to_lowercase()))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Splits a prepared word into tokens, adding edges where the word starts or
/// ends with a letter.
pub(crate) fn tokenize(word: &str, boundaries: bool) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(word.len() + 2);
    let chars: Vec<char> = word.chars().collect();

    if boundaries && chars.first().is_some_and(|c| c.is_alphabetic()) {
        tokens.push(Token::LeftEdge);
    }
    tokens.extend(chars.iter().map(|&c| {
        if c.is_whitespace() {
            Token::Space
        } else {
            Token::Char(c)
        }
    }));
    if boundaries && chars.last().is_some_and(|c| c.is_alphabetic()) {
        tokens.push(Token::RightEdge);
    }
    tokens
}

/// Condenses distinct token sequences into a single alternation tree.
///
/// `seqs` must be non-empty and free of duplicates.
pub(crate) fn condense(seqs: &[Vec<Token>]) -> Node {
    if let [only] = seqs {
        return Node::Literal(only.clone());
    }

    let prefix_len = common_prefix_len(seqs);
    let rests: Vec<&[Token]> = seqs.iter().map(|s| &s[prefix_len..]).collect();
    let suffix_len = common_suffix_len(&rests);

    let prefix = seqs[0][..prefix_len].to_vec();
    let suffix = rests[0][rests[0].len() - suffix_len..].to_vec();

    let mut optional = false;
    let mut groups: BTreeMap<Token, Vec<Vec<Token>>> = BTreeMap::new();
    for rest in &rests {
        let middle = &rest[..rest.len() - suffix_len];
        match middle.first() {
            None => optional = true,
            Some(&first) => groups.entry(first).or_default().push(middle.to_vec()),
        }
    }

    let mut singles = Vec::new();
    let mut alts = Vec::new();
    for (first, group) in groups {
        match (first, group.as_slice()) {
            (Token::Char(c), [only]) if only.len() == 1 => singles.push(c),
            _ => alts.push(condense(&group)),
        }
    }
    match singles.as_slice() {
        [] => {}
        [c] => alts.push(Node::Literal(vec![Token::Char(*c)])),
        _ => alts.push(Node::Class(singles)),
    }

    let mut parts = Vec::with_capacity(3);
    if !prefix.is_empty() {
        parts.push(Node::Literal(prefix));
    }
    if !alts.is_empty() {
        parts.push(Node::Alt { alts, optional });
    }
    if !suffix.is_empty() {
        parts.push(Node::Literal(suffix));
    }
    Node::Seq(parts)
}

fn common_prefix_len(seqs: &[Vec<Token>]) -> usize {
    let shortest = seqs.iter().map(Vec::len).min().unwrap_or(0);
    (0..shortest)
        .take_while(|&i| seqs.iter().all(|s| s[i] == seqs[0][i]))
        .count()
}

fn common_suffix_len(seqs: &[&[Token]]) -> usize {
    let shortest = seqs.iter().map(|s| s.len()).min().unwrap_or(0);
    (1..=shortest)
        .take_while(|&k| {
            let probe = seqs[0][seqs[0].len() - k];
            seqs.iter().all(|s| s[s.len() - k] == probe)
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(word: &str) -> Vec<Token> {
        word.chars().map(Token::Char).collect()
    }

    #[test]
    fn prepare_words_normalizes_and_deduplicates() {
        let words = prepare_words(["  New   York ", "new york", "", "   ", "Cat"]);
        assert_eq!(
            words.into_iter().collect::<Vec<_>>(),
            vec!["cat".to_string(), "new york".to_string()]
        );
    }

    #[test]
    fn tokenize_adds_edges_only_around_letters() {
        assert_eq!(
            tokenize("ab", true),
            vec![Token::LeftEdge, Token::Char('a'), Token::Char('b'), Token::RightEdge]
        );
        assert_eq!(tokenize("-a1", true), chars("-a1"));
        assert_eq!(tokenize("ab", false), chars("ab"));
        assert_eq!(
            tokenize("a b", false),
            vec![Token::Char('a'), Token::Space, Token::Char('b')]
        );
    }

    #[test]
    fn condense_extracts_prefix_and_suffix() {
        let node = condense(&[chars("sing"), chars("sting")]);
        assert_eq!(
            node,
            Node::Seq(vec![
                Node::Literal(chars("s")),
                Node::Alt {
                    alts: vec![Node::Literal(chars("t"))],
                    optional: true,
                },
                Node::Literal(chars("ing")),
            ])
        );
    }

    #[test]
    fn condense_collapses_single_chars_into_class() {
        let node = condense(&[chars("bat"), chars("cat"), chars("hat")]);
        assert_eq!(
            node,
            Node::Seq(vec![
                Node::Alt {
                    alts: vec![Node::Class(vec!['b', 'c', 'h'])],
                    optional: false,
                },
                Node::Literal(chars("at")),
            ])
        );
    }

    #[test]
    fn condense_groups_by_first_token() {
        let node = condense(&[chars("car"), chars("cat"), chars("dog")]);
        let Node::Seq(parts) = node else {
            panic!("expected a sequence");
        };
        let [Node::Alt { alts, optional }] = parts.as_slice() else {
            panic!("expected a lone alternation, got {parts:?}");
        };
        assert!(!optional);
        assert_eq!(alts.len(), 2);
        assert_eq!(alts[1], Node::Literal(chars("dog")));
    }
}
