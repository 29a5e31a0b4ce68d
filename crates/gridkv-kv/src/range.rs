use crate::error::{KvError, KvResult};

/// Half-open key range `[start, end)` over raw byte keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeyRange {
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// The range of every key that begins with `prefix`.
    ///
    /// Fails for an empty or all-`0xFF` prefix, which has no strict upper
    /// bound and would otherwise cover the entire key space.
    pub fn prefix(prefix: &[u8]) -> KvResult<Self> {
        let mut end = prefix.to_vec();
        if !strinc(&mut end) {
            return Err(KvError::InvalidPrefix(prefix.to_vec()));
        }
        Ok(Self::new(prefix, end))
    }

    /// The range containing exactly `key`.
    pub fn single(key: &[u8]) -> Self {
        let mut end = Vec::with_capacity(key.len() + 1);
        end.extend_from_slice(key);
        end.push(0x00);
        Self::new(key, end)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start.as_slice() && key < self.end.as_slice()
    }

    pub fn intersects(&self, other: &KeyRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Increment a byte string to its strict upper bound.
///
/// Drops trailing `0xFF` bytes and increments the last remaining byte.
/// Returns `false` if nothing is left to increment.
fn strinc(data: &mut Vec<u8>) -> bool {
    while let Some(&last) = data.last() {
        if last < 0xFF {
            let len = data.len();
            data[len - 1] = last + 1;
            return true;
        }
        data.pop();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_range_covers_extensions() {
        let range = KeyRange::prefix(b"abc").unwrap();
        assert_eq!(range.end, b"abd".to_vec());
        assert!(range.contains(b"abc"));
        assert!(range.contains(b"abc:0000000001"));
        assert!(range.contains(b"abc\xff\xff"));
        assert!(!range.contains(b"abd"));
        assert!(!range.contains(b"ab"));
    }

    #[test]
    fn prefix_drops_trailing_ff() {
        let range = KeyRange::prefix(&[0x01, 0xFF, 0xFF]).unwrap();
        assert_eq!(range.end, vec![0x02]);
    }

    #[test]
    fn prefix_without_upper_bound_is_rejected() {
        assert!(matches!(KeyRange::prefix(b""), Err(KvError::InvalidPrefix(_))));
        assert!(matches!(
            KeyRange::prefix(&[0xFF, 0xFF]),
            Err(KvError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn single_contains_only_the_key() {
        let range = KeyRange::single(b"k");
        assert!(range.contains(b"k"));
        assert!(!range.contains(b"k\x00"));
        assert!(!range.contains(b"j"));
    }

    #[test]
    fn intersection() {
        let a = KeyRange::new(b"a".to_vec(), b"c".to_vec());
        let b = KeyRange::new(b"b".to_vec(), b"d".to_vec());
        let c = KeyRange::new(b"c".to_vec(), b"e".to_vec());
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(KeyRange::single(b"b").intersects(&a));
    }
}
