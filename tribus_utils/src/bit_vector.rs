//! Bit vector for storing bits compactly.

/// A growable bit vector that stores bits packed into 64-bit words.
///
/// Bits beyond [`len`](Self::len) are always unset, so bitwise operations
/// between vectors of different length never observe stale data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
}

/// Iterator over the indices of the set bits in a [`BitVector`], in
/// increasing order.
#[derive(Clone, Debug)]
pub struct SetBits<'a> {
    words: &'a [u64],
    word_idx: usize,
    current_word: u64,
}

impl BitVector {
    /// Creates a new empty bit vector.
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            len: 0,
        }
    }

    /// Creates a new empty bit vector with the specified bit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity.div_ceil(64)),
            len: 0,
        }
    }

    /// Creates a new bit vector with the specified length and all bits unset.
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Returns whether the bit vector contains no bits.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of bits in the bit vector.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the bit at the specified index is set.
    ///
    /// # Panics
    /// If `bit_idx` is greater than or equal to the bit vector length.
    pub fn bit_is_set(&self, bit_idx: usize) -> bool {
        self.bounds_check(bit_idx);
        let word = &self.words[get_word_idx(bit_idx)];
        let mask = get_bit_mask(bit_idx);
        (*word & mask) != 0
    }

    /// Sets the bit at the specified index to 1.
    ///
    /// # Returns
    /// `true` if the bit was already set, `false` if it was unset.
    ///
    /// # Panics
    /// If `bit_idx` is greater than or equal to the bit vector length.
    pub fn set_bit(&mut self, bit_idx: usize) -> bool {
        self.bounds_check(bit_idx);
        let word = &mut self.words[get_word_idx(bit_idx)];
        let mask = get_bit_mask(bit_idx);
        let was_set = (*word & mask) != 0;
        *word |= mask;
        was_set
    }

    /// Sets the bit at the specified index to 0.
    ///
    /// # Returns
    /// `true` if the bit was set, `false` if it was already unset.
    ///
    /// # Panics
    /// If `bit_idx` is greater than or equal to the bit vector length.
    pub fn unset_bit(&mut self, bit_idx: usize) -> bool {
        self.bounds_check(bit_idx);
        let word = &mut self.words[get_word_idx(bit_idx)];
        let mask = get_bit_mask(bit_idx);
        let was_set = (*word & mask) != 0;
        *word &= !mask;
        was_set
    }

    /// Extends the vector to the specified length if it is currently shorter.
    /// Existing bits are preserved and the added bits are unset.
    pub fn grow_to(&mut self, len: usize) {
        if len > self.len {
            self.words.resize(len.div_ceil(64), 0);
            self.len = len;
        }
    }

    /// Resizes the vector to the specified length, with all bits unset.
    pub fn resize_and_unset_all(&mut self, len: usize) {
        self.words.clear();
        self.words.resize(len.div_ceil(64), 0);
        self.len = len;
    }

    /// Unsets every bit while keeping the length and the allocated storage.
    pub fn unset_all(&mut self) {
        self.words.fill(0);
    }

    /// Whether any bit is set.
    pub fn any(&self) -> bool {
        self.words.iter().any(|&word| word != 0)
    }

    /// Returns the number of set bits.
    pub fn count_set_bits(&self) -> usize {
        self.words
            .iter()
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    /// Unsets every bit in this vector that is set in `other`, leaving only
    /// the bits exclusive to this vector.
    pub fn difference_with(&mut self, other: &Self) {
        for (word, other_word) in self.words.iter_mut().zip(&other.words) {
            *word &= !*other_word;
        }
    }

    /// Sets every bit in this vector that is set in `other`. The vector is
    /// grown to the length of `other` if it is shorter.
    pub fn union_with(&mut self, other: &Self) {
        self.grow_to(other.len);
        for (word, other_word) in self.words.iter_mut().zip(&other.words) {
            *word |= *other_word;
        }
    }

    /// Returns an iterator over the indices of the set bits, in increasing
    /// order.
    pub fn set_bits(&self) -> SetBits<'_> {
        SetBits {
            words: &self.words,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }

    fn bounds_check(&self, bit_idx: usize) {
        if bit_idx >= self.len {
            panic!(
                "Bit index {bit_idx} out of bounds for bit vector of length {}",
                self.len
            );
        }
    }
}

impl Iterator for SetBits<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit_in_word = self.current_word.trailing_zeros() as usize;
                // Clear the lowest set bit
                self.current_word &= self.current_word - 1;
                return Some(self.word_idx * 64 + bit_in_word);
            }
            self.word_idx += 1;
            self.current_word = *self.words.get(self.word_idx)?;
        }
    }
}

fn get_word_idx(bit_idx: usize) -> usize {
    bit_idx / 64
}

fn get_bit_mask(bit_idx: usize) -> u64 {
    1 << (bit_idx & 0b111111)
}
