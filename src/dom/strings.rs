//! String interning pool.
//!
//! Element names, prefixes, namespace URIs, attribute values and text
//! content are stored once in a shared buffer and referenced by `u32`
//! ids. Interned ids make name comparisons cheap during lookup and
//! XPath evaluation, and keep the node arena small.
//!
//! Uses hash-based lookup to avoid storing duplicate string data.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// String id. Id 0 is reserved for the empty string / "no string".
pub const NO_STRING: u32 = 0;

/// Append-only string interning pool.
///
/// Memory layout:
/// - `entries`: (offset, len) into `data` for each interned id
/// - `data`: concatenated string bytes
/// - `hash_index`: content hash -> ids with that hash (handles the rare
///   collision by comparing bytes)
#[derive(Debug, Default, Clone)]
pub struct StringPool {
    entries: Vec<(u32, u32)>,
    data: String,
    hash_index: HashMap<u64, Vec<u32>>,
}

impl StringPool {
    /// Create a new pool with id 0 bound to the empty string.
    pub fn new() -> Self {
        let mut pool = StringPool {
            entries: Vec::with_capacity(64),
            data: String::with_capacity(1024),
            hash_index: HashMap::new(),
        };
        pool.entries.push((0, 0));
        pool
    }

    #[inline]
    fn compute_hash(s: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Intern a string, returning its id. Interning the same content
    /// twice returns the same id.
    pub fn intern(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return NO_STRING;
        }

        let hash = Self::compute_hash(s);
        if let Some(ids) = self.hash_index.get(&hash) {
            for &id in ids {
                if self.get(id) == s {
                    return id;
                }
            }
        }

        let offset = self.data.len() as u32;
        self.data.push_str(s);
        let id = self.entries.len() as u32;
        self.entries.push((offset, s.len() as u32));
        self.hash_index.entry(hash).or_default().push(id);
        id
    }

    /// Resolve an id back to its string. Unknown ids resolve to the
    /// empty string; ids only come from `intern` on the same pool.
    pub fn get(&self, id: u32) -> &str {
        match self.entries.get(id as usize) {
            Some(&(offset, len)) => &self.data[offset as usize..(offset + len) as usize],
            None => "",
        }
    }

    /// Number of unique strings stored (including the reserved empty
    /// string).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing beyond the reserved empty string is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }
}
