//! Fixed-size free/in-use bitset.

/// One bit per slot; a set bit means the slot is free.
#[derive(Debug, Clone)]
pub(crate) struct SlotBitSet {
    words: Vec<u64>,
    len: usize,
    free: usize,
}

impl SlotBitSet {
    /// All `len` slots start free.
    pub fn all_free(len: usize) -> Self {
        let mut words = vec![u64::MAX; len.div_ceil(64)];
        let tail = len % 64;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last = (1u64 << tail) - 1;
            }
        }
        Self {
            words,
            len,
            free: len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn free_count(&self) -> usize {
        self.free
    }

    pub fn is_free(&self, index: usize) -> bool {
        index < self.len && self.words[index / 64] & (1 << (index % 64)) != 0
    }

    /// Claim the lowest free slot.
    pub fn take_first_free(&mut self) -> Option<usize> {
        if self.free == 0 {
            return None;
        }
        let (word_idx, word) = self
            .words
            .iter_mut()
            .enumerate()
            .find(|(_, w)| **w != 0)?;
        let bit = word.trailing_zeros() as usize;
        *word &= !(1 << bit);
        self.free -= 1;
        Some(word_idx * 64 + bit)
    }

    /// Mark `index` free. Returns `false` if it was already free or out of range.
    pub fn set_free(&mut self, index: usize) -> bool {
        if index >= self.len || self.is_free(index) {
            return false;
        }
        self.words[index / 64] |= 1 << (index % 64);
        self.free += 1;
        true
    }
}
