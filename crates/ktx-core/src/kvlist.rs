//! Key-Value Metadata
//!
//! Ordered mapping from metadata key to an opaque byte value, plus the
//! length-prefixed wire form both container versions share.

use ahash::RandomState;
use indexmap::IndexMap;

use crate::error::{KtxError, KtxResult};

/// Key under which the logical image orientation is stored
pub const KTX_ORIENTATION_KEY: &str = "KTXorientation";
/// Key under which the writing tool identifies itself
pub const KTX_WRITER_KEY: &str = "KTXwriter";

/// Ordered key-value metadata list.
///
/// Insertion order is preserved; adding an existing key replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashList {
    entries: IndexMap<String, Vec<u8>, RandomState>,
}

impl HashList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a key-value pair, replacing the value of an existing key
    pub fn add_kv_pair(&mut self, key: &str, value: &[u8]) -> KtxResult<()> {
        if key.is_empty() || key.contains('\0') {
            return Err(KtxError::invalid_value(format!("invalid metadata key {key:?}")));
        }
        self.entries.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    /// Remove a key, returning its value
    pub fn delete_kv_pair(&mut self, key: &str) -> Option<Vec<u8>> {
        self.entries.shift_remove(key)
    }

    /// Find the value of a key
    pub fn find_value(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Find a value and interpret it as a NUL-terminated UTF-8 string
    pub fn find_str(&self, key: &str) -> Option<&str> {
        let value = self.find_value(key)?;
        let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
        std::str::from_utf8(&value[..end]).ok()
    }

    /// Iterate entries in list order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Sort entries by key byte order
    pub fn sort(&mut self) {
        self.entries.sort_keys();
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Serialize to the container wire form.
    ///
    /// Each entry is a `u32` byte count of key, NUL and value, the bytes,
    /// then zero padding to a 4-byte boundary.
    pub fn serialize(&self, big_endian: bool) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, value) in &self.entries {
            let len = (key.len() + 1 + value.len()) as u32;
            let word = if big_endian { len.to_be_bytes() } else { len.to_le_bytes() };
            out.extend_from_slice(&word);
            out.extend_from_slice(key.as_bytes());
            out.push(0);
            out.extend_from_slice(value);
            out.resize(out.len().next_multiple_of(4), 0);
        }
        out
    }

    /// Parse the container wire form
    pub fn deserialize(bytes: &[u8], big_endian: bool) -> KtxResult<Self> {
        let mut list = Self::new();
        let mut rest = bytes;
        while rest.len() >= 4 {
            let word = [rest[0], rest[1], rest[2], rest[3]];
            let len = if big_endian {
                u32::from_be_bytes(word)
            } else {
                u32::from_le_bytes(word)
            };
            let len = len as usize;
            rest = &rest[4..];
            if len > rest.len() {
                return Err(KtxError::data(format!(
                    "metadata entry of {} bytes overruns block ({} left)",
                    len,
                    rest.len()
                )));
            }
            let entry = &rest[..len];
            let nul = entry
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| KtxError::data("metadata key is not NUL terminated"))?;
            let key = std::str::from_utf8(&entry[..nul])
                .map_err(|_| KtxError::data("metadata key is not UTF-8"))?;
            list.add_kv_pair(key, &entry[nul + 1..])
                .map_err(|_| KtxError::data(format!("invalid metadata key {key:?}")))?;
            rest = &rest[len.next_multiple_of(4).min(rest.len())..];
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order() {
        let mut list = HashList::new();
        list.add_kv_pair("zeta", b"1").unwrap();
        list.add_kv_pair("alpha", b"2").unwrap();
        list.add_kv_pair("mid", b"3").unwrap();

        let keys: Vec<_> = list.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_duplicate_replaces() {
        let mut list = HashList::new();
        list.add_kv_pair("a", b"old").unwrap();
        list.add_kv_pair("b", b"x").unwrap();
        list.add_kv_pair("a", b"new").unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list.find_value("a"), Some(&b"new"[..]));
        assert_eq!(list.iter().next().unwrap().0, "a");
    }

    #[test]
    fn test_invalid_keys() {
        let mut list = HashList::new();
        assert!(list.add_kv_pair("", b"v").is_err());
        assert!(list.add_kv_pair("a\0b", b"v").is_err());
    }

    #[test]
    fn test_find_str() {
        let mut list = HashList::new();
        list.add_kv_pair(KTX_ORIENTATION_KEY, b"rd\0").unwrap();
        assert_eq!(list.find_str(KTX_ORIENTATION_KEY), Some("rd"));
        assert_eq!(list.find_str("missing"), None);
    }

    #[test]
    fn test_delete_and_sort() {
        let mut list = HashList::new();
        list.add_kv_pair("c", b"").unwrap();
        list.add_kv_pair("a", b"").unwrap();
        list.add_kv_pair("b", b"").unwrap();
        assert_eq!(list.delete_kv_pair("c"), Some(Vec::new()));
        list.add_kv_pair("c", b"").unwrap();
        list.sort();

        let keys: Vec<_> = list.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_wire_layout() {
        let mut list = HashList::new();
        list.add_kv_pair("ab", b"xyz").unwrap();
        let bytes = list.serialize(false);

        // 4 length bytes + "ab\0xyz" (6) + 2 padding
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..4], &6u32.to_le_bytes());
        assert_eq!(&bytes[4..10], b"ab\0xyz");
        assert_eq!(&bytes[10..], &[0, 0]);

        let parsed = HashList::deserialize(&bytes, false).unwrap();
        assert_eq!(parsed, list);
    }

    #[test]
    fn test_big_endian_lengths() {
        let mut list = HashList::new();
        list.add_kv_pair("key", b"value").unwrap();
        let bytes = list.serialize(true);
        assert_eq!(&bytes[..4], &9u32.to_be_bytes());
        assert_eq!(HashList::deserialize(&bytes, true).unwrap(), list);
    }

    #[test]
    fn test_deserialize_overrun() {
        let mut bytes = 100u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"key\0");
        assert!(matches!(
            HashList::deserialize(&bytes, false),
            Err(KtxError::FileDataError(_))
        ));
    }

    #[test]
    fn test_deserialize_missing_nul() {
        let mut bytes = 4u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"keys");
        assert!(HashList::deserialize(&bytes, false).is_err());
    }
}
