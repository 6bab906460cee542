use std::collections::HashMap;
use std::ops::AddAssign;

/// Insertion-ordered counter. `most_common` breaks ties by first appearance.
#[derive(Debug, Clone)]
pub struct Tally<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for Tally<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V: Copy + Default + AddAssign + PartialOrd> Tally<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, amount: V) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += amount,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), amount));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.index.get(key).map(|&i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, V)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// The `n` largest entries, largest first.
    pub fn most_common(&self, n: usize) -> Vec<(String, V)> {
        let mut sorted = self.entries.clone();
        // stable sort keeps first-seen order among equal values
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        sorted.truncate(n);
        sorted
    }
}
