//! Sequence identifier interning and the FASTA index table.
//!
//! Every contig and reference sequence is interned to a dense `u32` handle
//! on load; all downstream stages index flat vectors by handle instead of
//! hashing names.

use crate::error::{PurgaError, Result};
use indexmap::IndexMap;
use std::io::BufRead;

/// Dense handle for an assembly contig (a query sequence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContigHandle(pub(crate) u32);

impl ContigHandle {
    /// Index into contig-dense vectors.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense handle for a reference sequence (an alignment target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(pub(crate) u32);

impl TargetHandle {
    /// Index into target-dense vectors.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The contig universe: every query id in the assembly, with its length.
///
/// Built from a `samtools faidx`-style index (first two columns). The
/// insertion order of the index file is preserved and defines handle
/// numbering.
#[derive(Debug, Clone, Default)]
pub struct ContigIndex {
    entries: IndexMap<String, u32>,
}

impl ContigIndex {
    /// Builds an index from `(name, length)` pairs.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut index = ContigIndex::default();
        for (name, len) in entries {
            index.insert(name.into(), len, 0)?;
        }
        Ok(index)
    }

    /// Reads a FASTA index: tab-separated rows whose first two columns are
    /// the sequence name and length. Remaining columns are ignored.
    ///
    /// # Errors
    /// Any malformed or duplicate row is fatal; the index defines the
    /// contig universe and cannot tolerate gaps.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut index = ContigIndex::default();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let line_number = idx + 1;
            let mut fields = line.split('\t');
            let name = fields.next().unwrap_or_default();
            let len_field = fields.next().ok_or_else(|| PurgaError::InputShape {
                kind: "FASTA index",
                line: line_number,
                message: "expected at least 2 tab-separated columns".to_string(),
            })?;
            let len: u32 = len_field.parse().map_err(|_| PurgaError::InputShape {
                kind: "FASTA index",
                line: line_number,
                message: format!("invalid sequence length: {len_field:?}"),
            })?;
            index.insert(name.to_string(), len, line_number)?;
        }
        Ok(index)
    }

    fn insert(&mut self, name: String, len: u32, line_number: usize) -> Result<()> {
        if self.entries.insert(name.clone(), len).is_some() {
            return Err(PurgaError::InputShape {
                kind: "FASTA index",
                line: line_number,
                message: format!("duplicate sequence id {name:?}"),
            });
        }
        Ok(())
    }

    /// Looks up the handle for a contig id.
    pub fn handle(&self, name: &str) -> Option<ContigHandle> {
        self.entries.get_index_of(name).map(|i| ContigHandle(i as u32))
    }

    /// The contig id for a handle.
    pub fn name(&self, handle: ContigHandle) -> &str {
        self.entries
            .get_index(handle.index())
            .map(|(name, _)| name.as_str())
            .unwrap_or("")
    }

    /// The contig length for a handle.
    pub fn length(&self, handle: ContigHandle) -> u32 {
        self.entries
            .get_index(handle.index())
            .map(|(_, len)| *len)
            .unwrap_or(0)
    }

    /// Number of contigs in the universe.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no contigs are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates handles in index order.
    pub fn handles(&self) -> impl Iterator<Item = ContigHandle> {
        (0..self.entries.len() as u32).map(ContigHandle)
    }
}

/// Interner for reference sequence names encountered in alignments.
#[derive(Debug, Clone, Default)]
pub struct TargetIndex {
    entries: IndexMap<String, u32>,
}

impl TargetIndex {
    /// Interns a target name, recording its length on first sight.
    pub fn intern(&mut self, name: &str, len: u32) -> TargetHandle {
        if let Some(i) = self.entries.get_index_of(name) {
            return TargetHandle(i as u32);
        }
        let (i, _) = self.entries.insert_full(name.to_string(), len);
        TargetHandle(i as u32)
    }

    /// The target name for a handle.
    pub fn name(&self, handle: TargetHandle) -> &str {
        self.entries
            .get_index(handle.index())
            .map(|(name, _)| name.as_str())
            .unwrap_or("")
    }

    /// The target length for a handle.
    pub fn length(&self, handle: TargetHandle) -> u32 {
        self.entries
            .get_index(handle.index())
            .map(|(_, len)| *len)
            .unwrap_or(0)
    }

    /// Number of distinct targets seen.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no targets have been interned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fai_first_two_columns() {
        let fai = "ctgA\t1500\t6\t80\t81\nctgB\t900\t1592\t80\t81\n";
        let index = ContigIndex::from_reader(fai.as_bytes()).unwrap();
        assert_eq!(index.len(), 2);
        let a = index.handle("ctgA").unwrap();
        assert_eq!(index.length(a), 1500);
        assert_eq!(index.name(a), "ctgA");
        assert!(index.handle("ctgC").is_none());
    }

    #[test]
    fn duplicate_id_is_fatal() {
        let fai = "ctgA\t1500\nctgA\t900\n";
        assert!(ContigIndex::from_reader(fai.as_bytes()).is_err());
    }

    #[test]
    fn target_interning_is_stable() {
        let mut targets = TargetIndex::default();
        let chr1 = targets.intern("chr1", 1000);
        let chr2 = targets.intern("chr2", 2000);
        assert_eq!(targets.intern("chr1", 1000), chr1);
        assert_ne!(chr1, chr2);
        assert_eq!(targets.name(chr2), "chr2");
    }
}
