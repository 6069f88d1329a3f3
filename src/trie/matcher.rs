use std::ops::Range;

use regex::{Regex, RegexBuilder};

use super::compiler::{Node, Token};

/// Pattern that matches nothing, used for an empty word list.
pub(crate) const NEVER: &str = r"[^\s\S]";

/// Target syntax of a rendered pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    /// Edges as lookbehind/lookahead assertions (PCRE, JavaScript, .NET).
    Lookaround,
    /// For the `regex` crate, which has no lookaround. Left edges render as
    /// nothing and are checked by the caller; right edges consume the
    /// following character and leave an empty named marker at the word end.
    Markers,
}

pub(crate) struct Renderer {
    dialect: Dialect,
    next_marker: usize,
}

impl Renderer {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            next_marker: 0,
        }
    }

    pub(crate) fn render(&mut self, node: &Node) -> String {
        match node {
            Node::Literal(tokens) => self.literal(tokens),
            Node::Seq(parts) => parts.iter().map(|p| self.render(p)).collect(),
            Node::Class(chars) => {
                let body: String = chars.iter().map(|&c| self.escape(c, true)).collect();
                format!("[{body}]")
            }
            Node::Alt { alts, optional } => {
                let mut rendered: Vec<(usize, String)> =
                    alts.iter().map(|a| (span(a), self.render(a))).collect();
                // Alternatives that can match more text go first, so
                // leftmost-first engines prefer the longer word.
                rendered.sort_by(|(a_span, a), (b_span, b)| {
                    b_span
                        .cmp(a_span)
                        .then_with(|| b.len().cmp(&a.len()))
                        .then_with(|| a.cmp(b))
                });
                let rendered: Vec<String> = rendered.into_iter().map(|(_, r)| r).collect();

                match (rendered.as_slice(), *optional) {
                    ([], _) => String::new(),
                    ([single], false) => single.clone(),
                    ([single], true) if is_atom(&alts[0]) => format!("{single}?"),
                    ([single], true) => format!("(?:{single})?"),
                    (_, optional) => {
                        let joined = rendered.join("|");
                        if optional {
                            format!("(?:{joined})?")
                        } else {
                            format!("(?:{joined})")
                        }
                    }
                }
            }
        }
    }

    fn literal(&mut self, tokens: &[Token]) -> String {
        let mut out = String::new();
        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                Token::Char(c) => {
                    let run = tokens[i..]
                        .iter()
                        .take_while(|t| **t == Token::Char(c))
                        .count();
                    let one = self.escape(c, false);
                    let repeated = format!("{one}{{{run}}}");
                    if run > 1 && repeated.len() <= one.len() * run {
                        out.push_str(&repeated);
                    } else {
                        out.push_str(&one.repeat(run));
                    }
                    i += run;
                    continue;
                }
                Token::Space => out.push_str(r"\s+"),
                Token::LeftEdge => out.push_str(self.left_edge()),
                Token::RightEdge => out.push_str(&self.right_edge()),
            }
            i += 1;
        }
        out
    }

    fn left_edge(&self) -> &'static str {
        match self.dialect {
            Dialect::Lookaround => r"(?<!\p{L})",
            Dialect::Markers => "",
        }
    }

    fn right_edge(&mut self) -> String {
        match self.dialect {
            Dialect::Lookaround => r"(?!\p{L})".to_string(),
            Dialect::Markers => {
                let n = self.next_marker;
                self.next_marker += 1;
                format!(r"(?P<e{n}>)(?:[^\p{{L}}]|$)")
            }
        }
    }

    fn escape(&self, c: char, in_class: bool) -> String {
        match self.dialect {
            Dialect::Markers => {
                let mut buf = [0u8; 4];
                regex::escape(c.encode_utf8(&mut buf))
            }
            // Only the escapes every lookbehind-capable engine accepts,
            // including JavaScript in unicode mode.
            Dialect::Lookaround => {
                let special = if in_class {
                    matches!(c, '\\' | ']' | '[' | '^' | '-')
                } else {
                    matches!(
                        c,
                        '\\' | '^' | '$' | '.' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']'
                            | '{' | '}' | '/'
                    )
                };
                if special { format!("\\{c}") } else { c.to_string() }
            }
        }
    }
}

/// Whether a node renders as a single quantifiable atom.
fn is_atom(node: &Node) -> bool {
    match node {
        Node::Class(_) => true,
        Node::Literal(tokens) => matches!(tokens.as_slice(), [Token::Char(_)]),
        _ => false,
    }
}

/// Most characters a node can match, counting a whitespace run as one.
fn span(node: &Node) -> usize {
    match node {
        Node::Literal(tokens) => tokens
            .iter()
            .filter(|t| matches!(t, Token::Char(_) | Token::Space))
            .count(),
        Node::Seq(parts) => parts.iter().map(span).sum(),
        Node::Class(_) => 1,
        Node::Alt { alts, .. } => alts.iter().map(span).max().unwrap_or(0),
    }
}

/// One compiled `regex` over a subset of the words.
#[derive(Debug, Clone)]
struct Searcher {
    regex: Regex,
    /// Capture indices of the word-end markers.
    ends: Vec<usize>,
}

impl Searcher {
    fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(true)
            .unicode(true)
            .size_limit(64 * (1 << 20))
            .build()?;
        let ends = regex
            .capture_names()
            .enumerate()
            .filter_map(|(index, name)| name.filter(|n| n.starts_with('e')).map(|_| index))
            .collect();
        Ok(Self { regex, ends })
    }

    /// Leftmost word starting at or after `from`.
    fn find_at(&self, text: &str, from: usize) -> Option<Range<usize>> {
        let caps = self.regex.captures_at(text, from)?;
        let whole = caps.get(0)?;
        let end = self
            .ends
            .iter()
            .find_map(|&i| caps.get(i))
            .map_or(whole.end(), |m| m.start());
        Some(whole.start()..end)
    }
}

/// Compiled, case-insensitive matcher over a word list.
///
/// Matching follows [`pattern`](Self::pattern): at each position the
/// preferred word is taken, and a word starting with a letter only matches
/// where it is not preceded by a letter.
#[derive(Debug, Clone)]
pub struct CompiledTrie {
    pattern: String,
    /// Every word; a match counts only where no letter precedes it.
    bounded: Option<Searcher>,
    /// Words that need no left boundary.
    free: Option<Searcher>,
}

impl CompiledTrie {
    pub(crate) fn empty() -> Self {
        Self {
            pattern: NEVER.to_string(),
            bounded: None,
            free: None,
        }
    }

    pub(crate) fn build(
        pattern: String,
        bounded: Option<&str>,
        free: Option<&str>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern,
            bounded: bounded.map(Searcher::new).transpose()?,
            free: free.map(Searcher::new).transpose()?,
        })
    }

    /// Portable pattern source with lookaround boundaries.
    ///
    /// Intended for engines that support lookbehind, with case-insensitive
    /// and Unicode flags enabled.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True if the matcher can never match, i.e. it was built from no words.
    pub fn is_empty(&self) -> bool {
        self.bounded.is_none() && self.free.is_none()
    }

    /// Returns true if any word occurs in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.next_match(text, 0).is_some()
    }

    /// Returns true if `text` is exactly one of the words.
    pub fn matches_whole(&self, text: &str) -> bool {
        self.next_match(text, 0)
            .is_some_and(|range| range == (0..text.len()))
    }

    /// Byte ranges of every non-overlapping word occurrence, left to right.
    ///
    /// Ranges cover the word only, never the neighbouring character used to
    /// check a boundary.
    pub fn find_iter(&self, text: &str) -> Vec<Range<usize>> {
        let mut found = Vec::new();
        let mut pos = 0;
        while let Some(range) = self.next_match(text, pos) {
            pos = if range.end > range.start {
                range.end
            } else {
                // Step past one character to avoid looping on an empty match.
                match text[range.start..].chars().next() {
                    Some(c) => range.start + c.len_utf8(),
                    None => text.len() + 1,
                }
            };
            found.push(range);
            if pos > text.len() {
                break;
            }
        }
        found
    }

    /// Leftmost match at or after `pos`.
    ///
    /// Where both searchers match at the same position and no letter
    /// precedes it, the full word list wins, as it does in the pattern.
    fn next_match(&self, text: &str, pos: usize) -> Option<Range<usize>> {
        let free = self.free.as_ref().and_then(|s| s.find_at(text, pos));

        let mut bounded = None;
        if let Some(searcher) = &self.bounded {
            let mut from = pos;
            while let Some(range) = searcher.find_at(text, from) {
                if free.as_ref().is_some_and(|f| range.start > f.start) {
                    break;
                }
                if !follows_letter(text, range.start) {
                    bounded = Some(range);
                    break;
                }
                let Some(c) = text[range.start..].chars().next() else {
                    break;
                };
                from = range.start + c.len_utf8();
            }
        }

        match (bounded, free) {
            (Some(b), Some(f)) => Some(if b.start <= f.start { b } else { f }),
            (b, f) => b.or(f),
        }
    }
}

/// True if the character before byte offset `at` is a letter.
fn follows_letter(text: &str, at: usize) -> bool {
    text[..at].chars().next_back().is_some_and(char::is_alphabetic)
}
