//! Containers and general utilities.

mod bit_vector;

pub use bit_vector::{BitVector, SetBits};

pub use nohash_hasher;

use std::collections::{HashMap, HashSet};

/// A [`HashMap`] for keys that are already well-distributed integers, such as
/// node IDs, which are used directly as their own hash.
pub type NoHashMap<K, V> = HashMap<K, V, nohash_hasher::BuildNoHashHasher<K>>;

/// A [`HashSet`] counterpart to [`NoHashMap`].
pub type NoHashSet<K> = HashSet<K, nohash_hasher::BuildNoHashHasher<K>>;
