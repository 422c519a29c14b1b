//! Per-transaction write buffer.

use std::collections::BTreeMap;

/// A single buffered write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Put a key-value pair.
    Put {
        /// The table name.
        table: String,
        /// The key.
        key: Vec<u8>,
        /// The value.
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// The table name.
        table: String,
        /// The key.
        key: Vec<u8>,
    },
}

impl WriteOp {
    fn targets(&self, table: &str, key: &[u8]) -> bool {
        match self {
            Self::Put { table: t, key: k, .. } | Self::Delete { table: t, key: k } => {
                t == table && k == key
            }
        }
    }
}

/// Ordered writes of one physical transaction.
///
/// Writes are only appended; a savepoint is simply the buffer length at the
/// time it was taken, and rolling back to it truncates the buffer.
#[derive(Debug, Default, Clone)]
pub struct WriteBuffer {
    ops: Vec<WriteOp>,
}

impl WriteBuffer {
    /// Create a new empty write buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a put operation.
    pub fn put(&mut self, table: impl Into<String>, key: impl Into<Vec<u8>>, value: Vec<u8>) {
        self.ops.push(WriteOp::Put { table: table.into(), key: key.into(), value });
    }

    /// Record a delete operation.
    pub fn delete(&mut self, table: impl Into<String>, key: impl Into<Vec<u8>>) {
        self.ops.push(WriteOp::Delete { table: table.into(), key: key.into() });
    }

    /// Look up the latest buffered write for a key.
    ///
    /// Returns `None` if the key was not written, `Some(None)` if it was
    /// deleted, and `Some(Some(value))` if it was put.
    #[must_use]
    pub fn get(&self, table: &str, key: &[u8]) -> Option<Option<&[u8]>> {
        self.ops.iter().rev().find(|op| op.targets(table, key)).map(|op| match op {
            WriteOp::Put { value, .. } => Some(value.as_slice()),
            WriteOp::Delete { .. } => None,
        })
    }

    /// Number of buffered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether no operations are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Discard every operation recorded at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.ops.truncate(len);
    }

    /// Apply the buffered operations, in order, to committed tables.
    pub fn apply_to(self, tables: &mut BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>) {
        for op in self.ops {
            match op {
                WriteOp::Put { table, key, value } => {
                    tables.entry(table).or_default().insert(key, value);
                }
                WriteOp::Delete { table, key } => {
                    if let Some(rows) = tables.get_mut(&table) {
                        rows.remove(&key);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_write_wins() {
        let mut buffer = WriteBuffer::new();
        buffer.put("t", b"k".to_vec(), b"1".to_vec());
        buffer.put("t", b"k".to_vec(), b"2".to_vec());
        assert_eq!(buffer.get("t", b"k"), Some(Some(&b"2"[..])));

        buffer.delete("t", b"k".to_vec());
        assert_eq!(buffer.get("t", b"k"), Some(None));
        assert_eq!(buffer.get("other", b"k"), None);
    }

    #[test]
    fn truncate_restores_earlier_view() {
        let mut buffer = WriteBuffer::new();
        buffer.put("t", b"k".to_vec(), b"1".to_vec());
        let mark = buffer.len();
        buffer.put("t", b"k".to_vec(), b"2".to_vec());
        buffer.put("t", b"j".to_vec(), b"3".to_vec());

        buffer.truncate(mark);
        assert_eq!(buffer.get("t", b"k"), Some(Some(&b"1"[..])));
        assert_eq!(buffer.get("t", b"j"), None);
    }

    #[test]
    fn apply_replays_in_order() {
        let mut tables = BTreeMap::new();
        let mut buffer = WriteBuffer::new();
        buffer.put("t", b"a".to_vec(), b"1".to_vec());
        buffer.put("t", b"b".to_vec(), b"2".to_vec());
        buffer.delete("t", b"a".to_vec());
        buffer.apply_to(&mut tables);

        let rows = tables.get("t").expect("table created");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.get(&b"b".to_vec()), Some(&b"2".to_vec()));
    }
}
