//! Merge Iterator
//!
//! K-way merge of sorted entry sources into one ordered stream of live
//! key-value pairs.
//!
//! Sources are given newest first. When several sources hold the same key,
//! the newest one wins and the rest are skipped. Tombstones hide the key.

use crate::error::Result;

/// A sorted stream of (key, value-or-tombstone)
pub type EntrySource = Box<dyn Iterator<Item = Result<(Vec<u8>, Option<Vec<u8>>)>> + Send>;

type Head = Option<(Vec<u8>, Option<Vec<u8>>)>;

pub struct MergeIterator {
    sources: Vec<EntrySource>,
    /// Current front entry of each source (None once exhausted)
    heads: Vec<Head>,
    primed: bool,
    failed: bool,
}

impl MergeIterator {
    /// `sources` ordered newest → oldest
    pub fn new(sources: Vec<EntrySource>) -> Self {
        let heads = sources.iter().map(|_| None).collect();
        Self {
            sources,
            heads,
            primed: false,
            failed: false,
        }
    }

    fn advance(&mut self, i: usize) -> Result<()> {
        self.heads[i] = self.sources[i].next().transpose()?;
        Ok(())
    }

    fn prime(&mut self) -> Result<()> {
        for i in 0..self.sources.len() {
            self.advance(i)?;
        }
        self.primed = true;
        Ok(())
    }

    /// Next entry, tombstones included
    fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Option<Vec<u8>>)>> {
        if !self.primed {
            self.prime()?;
        }

        // Smallest key; ties go to the lowest index (newest source)
        let mut winner: Option<usize> = None;
        for (i, head) in self.heads.iter().enumerate() {
            if let Some((key, _)) = head {
                let better = match winner.and_then(|w| self.heads[w].as_ref()) {
                    Some((best, _)) => key < best,
                    None => true,
                };
                if better {
                    winner = Some(i);
                }
            }
        }

        let Some(w) = winner else {
            return Ok(None);
        };
        let entry = self.heads[w].take();
        self.advance(w)?;

        if let Some((key, _)) = &entry {
            for i in 0..self.heads.len() {
                let shadowed = matches!(&self.heads[i], Some((k, _)) if k == key);
                if shadowed {
                    self.advance(i)?;
                }
            }
        }

        Ok(entry)
    }
}

impl Iterator for MergeIterator {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.next_entry() {
                Ok(Some((key, Some(value)))) => return Some(Ok((key, value))),
                Ok(Some((_, None))) => continue,
                Ok(None) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
