use std::cmp::Ordering;
use std::fmt;

use strata_store::prefix_end;

/// Half-open key range `[start, end)`. An empty `end` is unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl Span {
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Every key that has `prefix` as a byte prefix.
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        let start = prefix.into();
        let end = prefix_end(&start);
        Self { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.end.is_empty()
    }

    /// True when no key can fall inside the span.
    pub fn is_empty(&self) -> bool {
        !self.is_unbounded() && self.start >= self.end
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start.as_slice() && (self.is_unbounded() || key < self.end.as_slice())
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            String::from_utf8_lossy(&self.start),
            String::from_utf8_lossy(&self.end)
        )
    }
}

/// Orders span ends with the unbounded end last.
fn cmp_end(a: &[u8], b: &[u8]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

/// A canonical set of spans: sorted by start, no two overlapping or touching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spans(Vec<Span>);

impl Spans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(span: Span) -> Self {
        Self::merge([span])
    }

    /// Reduce any collection of spans to canonical form.
    ///
    /// Empty spans are dropped. Overlapping spans are unioned, and so are
    /// spans where one ends exactly where the next starts since no key can
    /// sit between them.
    pub fn merge(spans: impl IntoIterator<Item = Span>) -> Self {
        let mut input: Vec<Span> = spans.into_iter().filter(|s| !s.is_empty()).collect();
        input.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| cmp_end(&a.end, &b.end)));

        let mut out: Vec<Span> = Vec::with_capacity(input.len());
        for span in input {
            match out.last_mut() {
                Some(last) if last.is_unbounded() || span.start <= last.end => {
                    if cmp_end(&span.end, &last.end) == Ordering::Greater {
                        last.end = span.end;
                    }
                }
                _ => out.push(span),
            }
        }
        Self(out)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Span> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Span] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Spans {
    type Item = &'a Span;
    type IntoIter = std::slice::Iter<'a, Span>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Span> for Spans {
    fn from_iter<I: IntoIterator<Item = Span>>(iter: I) -> Self {
        Self::merge(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    fn span(a: &str, b: &str) -> Span {
        Span::new(a.as_bytes(), b.as_bytes())
    }

    fn assert_canonical(spans: &Spans) {
        for pair in spans.as_slice().windows(2) {
            assert!(pair[0].start < pair[1].start);
            assert!(!pair[0].is_unbounded());
            assert!(pair[0].end < pair[1].start, "{} touches {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn overlapping_spans_union() {
        let merged = Spans::merge([span("k3", "k6"), span("k1", "k4")]);
        assert_eq!(merged.as_slice(), &[span("k1", "k6")]);
    }

    #[test]
    fn disjoint_spans_stay_apart() {
        let merged = Spans::merge([span("k3", "k4"), span("k1", "k2")]);
        assert_eq!(merged.as_slice(), &[span("k1", "k2"), span("k3", "k4")]);
    }

    #[test]
    fn adjacent_spans_merge() {
        let merged = Spans::merge([span("k2", "k3"), span("k1", "k2")]);
        assert_eq!(merged.as_slice(), &[span("k1", "k3")]);
    }

    #[test]
    fn contained_prefix_span_is_absorbed() {
        let outer = Span::prefix(b"/1/1/".to_vec());
        let inner = Span::prefix(b"/1/1/bae-1/".to_vec());
        let merged = Spans::merge([inner, outer.clone()]);
        assert_eq!(merged.as_slice(), &[outer]);
    }

    #[test]
    fn empty_spans_are_dropped() {
        let merged = Spans::merge([span("k5", "k5"), span("k7", "k6")]);
        assert!(merged.is_empty());
    }

    #[test]
    fn unbounded_end_swallows_later_spans() {
        let merged = Spans::merge([span("k9", "kz"), Span::new(b"k2".to_vec(), Vec::new())]);
        assert_eq!(merged.len(), 1);
        assert!(merged.as_slice()[0].is_unbounded());
        assert_eq!(merged.as_slice()[0].start, b"k2".to_vec());
    }

    #[test]
    fn merge_is_order_independent_and_idempotent() {
        let spans = vec![
            span("a", "c"),
            span("b", "d"),
            span("f", "g"),
            span("g", "h"),
            span("j", "k"),
            span("m", "m"),
            span("p", "r"),
            span("q", "qq"),
        ];
        let expected = Spans::merge(spans.clone());
        assert_canonical(&expected);

        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let mut shuffled = spans.clone();
            shuffled.shuffle(&mut rng);
            let merged = Spans::merge(shuffled);
            assert_eq!(merged, expected);
            assert_eq!(Spans::merge(merged.iter().cloned()), merged);
        }
    }

    #[test]
    fn contains_respects_half_open_bounds() {
        let s = span("k1", "k3");
        assert!(s.contains(b"k1"));
        assert!(s.contains(b"k2zzz"));
        assert!(!s.contains(b"k3"));
    }
}
