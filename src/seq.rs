//! Persistent ordered sequences.
//!
//! `Seq<T>` is an immutable, cheaply clonable list. Every operation that would
//! change it returns a new sequence and leaves the source untouched. Descriptor
//! trees, field lists and HID item streams are all built from it.

use std::fmt;
use std::ops::Add;
use std::sync::Arc;

/// Immutable ordered sequence backed by a shared slice.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Seq<T> {
    items: Arc<[T]>,
}

impl<T> Seq<T> {
    pub fn new() -> Self {
        Seq { items: Arc::from(Vec::new()) }
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// First element, `None` on an empty sequence.
    pub fn head(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Visit every element once, in order.
    pub fn foreach<F: FnMut(&T)>(&self, visit: F) {
        self.items.iter().for_each(visit)
    }

    /// Left fold over the sequence.
    pub fn fold<A, F: FnMut(A, &T) -> A>(&self, seed: A, combine: F) -> A {
        self.items.iter().fold(seed, combine)
    }

    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Seq<U> {
        self.items.iter().map(f).collect()
    }

    pub fn count<P: FnMut(&T) -> bool>(&self, mut pred: P) -> usize {
        self.items.iter().filter(|x| pred(x)).count()
    }

    /// Pairwise uniqueness under a caller-supplied equality.
    pub fn is_unique_by<F: Fn(&T, &T) -> bool>(&self, eq: F) -> bool {
        self.duplicates_by(eq).is_empty()
    }

    /// Every index pair `(i, j)` with `i < j` whose elements are equal under `eq`.
    ///
    /// Sequences here are bounded by descriptor element counts, so the quadratic
    /// scan is fine.
    pub fn duplicates_by<F: Fn(&T, &T) -> bool>(&self, eq: F) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for i in 0..self.items.len() {
            for j in (i + 1)..self.items.len() {
                if eq(&self.items[i], &self.items[j]) {
                    out.push((i, j));
                }
            }
        }
        out
    }
}

impl<T: Clone> Seq<T> {
    /// All but the first element, `None` on an empty sequence.
    pub fn tail(&self) -> Option<Seq<T>> {
        if self.items.is_empty() {
            return None;
        }
        Some(self.items[1..].iter().cloned().collect())
    }

    pub fn push_front(&self, item: T) -> Seq<T> {
        std::iter::once(item).chain(self.items.iter().cloned()).collect()
    }

    pub fn push_back(&self, item: T) -> Seq<T> {
        self.items.iter().cloned().chain(std::iter::once(item)).collect()
    }

    pub fn concat(&self, other: &Seq<T>) -> Seq<T> {
        self.items.iter().chain(other.items.iter()).cloned().collect()
    }

    /// Order-preserving subsequence of the elements matching `pred`.
    pub fn filter<P: FnMut(&T) -> bool>(&self, mut pred: P) -> Seq<T> {
        self.items.iter().filter(|x| pred(x)).cloned().collect()
    }

    /// `n` repetitions of `item`.
    pub fn generate(n: usize, item: T) -> Seq<T> {
        std::iter::repeat(item).take(n).collect()
    }
}

impl<T: PartialEq> Seq<T> {
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn is_unique(&self) -> bool {
        self.is_unique_by(|a, b| a == b)
    }
}

impl<T> Default for Seq<T> {
    fn default() -> Self {
        Seq::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Seq<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T> FromIterator<T> for Seq<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Seq { items: iter.into_iter().collect::<Vec<T>>().into() }
    }
}

impl<T> From<Vec<T>> for Seq<T> {
    fn from(v: Vec<T>) -> Self {
        Seq { items: v.into() }
    }
}

impl<'a, T> IntoIterator for &'a Seq<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Clone> Add for &Seq<T> {
    type Output = Seq<T>;

    fn add(self, rhs: &Seq<T>) -> Seq<T> {
        self.concat(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_leaves_source_unchanged() {
        let a: Seq<u8> = vec![1, 2].into();
        let b = a.push_back(3);
        let c = a.push_front(0);
        assert_eq!(a.as_slice(), &[1, 2]);
        assert_eq!(b.as_slice(), &[1, 2, 3]);
        assert_eq!(c.as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn head_and_tail_fail_on_empty() {
        let empty: Seq<u8> = Seq::new();
        assert!(empty.head().is_none());
        assert!(empty.tail().is_none());
        let s: Seq<u8> = vec![7, 8, 9].into();
        assert_eq!(s.head(), Some(&7));
        assert_eq!(s.tail().expect("tail").as_slice(), &[8, 9]);
    }

    #[test]
    fn filter_map_fold() {
        let s: Seq<u32> = (1..=6).collect();
        let even = s.filter(|x| x % 2 == 0);
        assert_eq!(even.as_slice(), &[2, 4, 6]);
        assert_eq!(even.map(|x| x * 10).as_slice(), &[20, 40, 60]);
        assert_eq!(s.fold(0, |acc, x| acc + x), 21);
        let flat = vec![Seq::from(vec![1u8]), Seq::from(vec![2, 3])]
            .iter()
            .fold(Seq::new(), |acc: Seq<u8>, s| acc.concat(s));
        assert_eq!(flat.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn foreach_visits_in_order() {
        let s: Seq<char> = "abc".chars().collect();
        let mut seen = String::new();
        s.foreach(|c| seen.push(*c));
        assert_eq!(seen, "abc");
    }

    #[test]
    fn generate_and_structural_equality() {
        let g = Seq::generate(3, 0xAAu8);
        assert_eq!(g, Seq::from(vec![0xAA, 0xAA, 0xAA]));
        assert_ne!(g, Seq::generate(2, 0xAAu8));
        assert!(Seq::<u8>::generate(0, 1).is_empty());
    }

    #[test]
    fn uniqueness_reports_every_pair() {
        let s: Seq<u8> = vec![1, 2, 1, 3, 1].into();
        assert!(!s.is_unique());
        assert_eq!(s.duplicates_by(|a, b| a == b), vec![(0, 2), (0, 4), (2, 4)]);
        let u: Seq<u8> = vec![1, 2, 3].into();
        assert!(u.is_unique());
        assert!(u.contains(&2));
        assert!(!u.contains(&5));
    }

    #[test]
    fn add_concatenates() {
        let a: Seq<u8> = vec![1].into();
        let b: Seq<u8> = vec![2, 3].into();
        assert_eq!((&a + &b).as_slice(), &[1, 2, 3]);
    }
}
