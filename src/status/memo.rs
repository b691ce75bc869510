/// Caches one derived value until its key changes.
///
/// Keys are normally slot versions read from the store, so recomputation
/// happens only when an input slot was rewritten.
#[derive(Debug)]
pub struct Memo<K, V> {
    cached: Option<(K, V)>,
    computations: u64,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            cached: None,
            computations: 0,
        }
    }
}

impl<K: PartialEq, V: Clone> Memo<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some((cached_key, value)) = &self.cached {
            if *cached_key == key {
                return value.clone();
            }
        }
        let value = compute();
        self.computations += 1;
        self.cached = Some((key, value.clone()));
        value
    }

    /// How many times the value was actually computed.
    pub fn computations(&self) -> u64 {
        self.computations
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recomputes_only_on_key_change() {
        let mut memo: Memo<(u64, u64), String> = Memo::new();
        assert_eq!(memo.get_or_compute((1, 0), || "a".into()), "a");
        assert_eq!(memo.get_or_compute((1, 0), || "b".into()), "a");
        assert_eq!(memo.get_or_compute((2, 0), || "c".into()), "c");
        assert_eq!(memo.computations(), 2);

        memo.invalidate();
        assert_eq!(memo.get_or_compute((2, 0), || "d".into()), "d");
    }
}
