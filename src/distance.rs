//! Weighted edit distance used to rank "similar" phrases.
//!
//! A [`Metric`] is built from a [`Sorter`]. Every insertion, deletion and
//! substitution starts at cost 1 and is halved for each discount that applies:
//!
//! - the edit touches a *marginal* position, one of the first `prefix` or the
//!   last `suffix` characters of either word;
//! - an insertion or deletion of a character listed in `insertables` next to
//!   another occurrence of the same character (doubled letters);
//! - a substitution between two characters sharing a group in `similars`.
//!
//! Discounts multiply, so a marginal substitution of similar characters costs
//! 1/4. The metric is symmetric and `distance(w, w) == 0`.

use std::collections::HashSet;

use crate::models::Sorter;

const FULL: f64 = 1.0;
const DISCOUNT: f64 = 0.5;

/// A configured distance function.
///
/// # Examples
///
/// ```
/// use phrasedex::Sorter;
/// use phrasedex::distance::Metric;
///
/// let metric = Metric::new(&Sorter::named("german").similar("äa").insertables("s"));
/// assert_eq!(metric.distance("haus", "haus"), 0.0);
/// assert_eq!(metric.distance("hauss", "haus"), 0.5);
/// assert_eq!(metric.distance("häus", "haus"), 0.5);
/// assert_eq!(metric.distance("haus", "maus"), metric.distance("maus", "haus"));
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    prefix: usize,
    suffix: usize,
    insertables: HashSet<char>,
    /// Unordered pairs of substitutable characters, stored as `(min, max)`.
    similars: HashSet<(char, char)>,
}

impl Metric {
    pub fn new(sorter: &Sorter) -> Self {
        let mut similars = HashSet::new();
        for group in &sorter.similars {
            let chars: Vec<char> = group.chars().collect();
            for (i, &a) in chars.iter().enumerate() {
                for &b in &chars[i + 1..] {
                    if a != b {
                        similars.insert(ordered(a, b));
                    }
                }
            }
        }

        Self {
            prefix: sorter.prefix,
            suffix: sorter.suffix,
            insertables: sorter.insertables.chars().collect(),
            similars,
        }
    }

    /// Distance between two words.
    pub fn distance(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let (n, m) = (a.len(), b.len());

        // Full matrix: row i covers a[..i], column j covers b[..j].
        let mut cost = vec![vec![0.0_f64; m + 1]; n + 1];
        for i in 1..=n {
            cost[i][0] = cost[i - 1][0] + self.indel(&a, i, &b, 0);
        }
        for j in 1..=m {
            cost[0][j] = cost[0][j - 1] + self.indel(&b, j, &a, 0);
        }

        for i in 1..=n {
            for j in 1..=m {
                let delete = cost[i - 1][j] + self.indel(&a, i, &b, j);
                let insert = cost[i][j - 1] + self.indel(&b, j, &a, i);
                let substitute = cost[i - 1][j - 1] + self.substitution(&a, i, &b, j);
                cost[i][j] = delete.min(insert).min(substitute);
            }
        }

        cost[n][m]
    }

    /// Cost of removing `word[pos - 1]` while aligned at `other_pos` in the
    /// other word. Insertion into one word is deletion from the other, so a
    /// single function keeps both directions symmetric.
    fn indel(&self, word: &[char], pos: usize, other: &[char], other_pos: usize) -> f64 {
        let mut cost = FULL;
        let other_marginal =
            !other.is_empty() && self.is_marginal(other_pos.max(1), other.len());
        if self.is_marginal(pos, word.len()) || other_marginal {
            cost *= DISCOUNT;
        }

        let c = word[pos - 1];
        let doubled = (pos >= 2 && word[pos - 2] == c) || word.get(pos).is_some_and(|&n| n == c);
        if doubled && self.insertables.contains(&c) {
            cost *= DISCOUNT;
        }
        cost
    }

    fn substitution(&self, a: &[char], i: usize, b: &[char], j: usize) -> f64 {
        let (x, y) = (a[i - 1], b[j - 1]);
        if x == y {
            return 0.0;
        }

        let mut cost = FULL;
        if self.is_marginal(i, a.len()) || self.is_marginal(j, b.len()) {
            cost *= DISCOUNT;
        }
        if self.similars.contains(&ordered(x, y)) {
            cost *= DISCOUNT;
        }
        cost
    }

    /// Whether 1-based position `pos` of a word of length `len` lies in the
    /// discounted prefix or suffix.
    fn is_marginal(&self, pos: usize, len: usize) -> bool {
        pos <= self.prefix || pos + self.suffix > len
    }
}

fn ordered(a: char, b: char) -> (char, char) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Convenience wrapper building a metric for a single comparison.
pub fn distance(sorter: &Sorter, a: &str, b: &str) -> f64 {
    Metric::new(sorter).distance(a, b)
}
