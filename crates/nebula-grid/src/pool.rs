//! Bucketed arena allocator for plain-old-data items.
//!
//! Storage grows one bucket at a time and never shrinks. Each bucket tracks how
//! many of its slots are live in a `u16` counter, which lets [`Pool::next_empty`]
//! skip full buckets without scanning them. A slot is considered free when all
//! of its bytes are zero, so callers must zero a slot after [`Pool::erase`].
//!
//! Slot 0 is reserved for the root of the structure built on top of the pool:
//! the very first insert into an empty pool lands there, and it is never handed
//! out again by the free-slot search.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use bytemuck::Pod;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PoolError;

/// Default number of slots per bucket.
pub const DEFAULT_BUCKET_SIZE: usize = 1024;

/// Arena of `T` limited to `MAX` slots, allocated in buckets of `BUCKET` slots.
#[derive(Clone, PartialEq, Eq)]
pub struct Pool<T, const MAX: usize, const BUCKET: usize = DEFAULT_BUCKET_SIZE> {
    items: Vec<T>,
    counters: Vec<u16>,
}

impl<T: Pod, const MAX: usize, const BUCKET: usize> Pool<T, MAX, BUCKET> {
    const VALID_PARAMS: () = assert!(
        BUCKET > 0 && BUCKET <= u16::MAX as usize && BUCKET <= MAX,
        "bucket size must fit a u16 counter and the maximum size"
    );

    /// Maximum number of slots. Only whole buckets are allocated, so the usable
    /// capacity is `MAX` rounded down to a multiple of `BUCKET`.
    pub const MAX_SIZE: usize = MAX;
    /// Slots per bucket.
    pub const BUCKET_SIZE: usize = BUCKET;

    /// Creates an empty pool with no buckets.
    pub fn new() -> Self {
        let () = Self::VALID_PARAMS;
        Self {
            items: Vec::new(),
            counters: Vec::new(),
        }
    }

    /// Creates a pool holding a single bucket whose slot 0 contains `root`.
    pub fn with_root(root: T) -> Self {
        let () = Self::VALID_PARAMS;
        let mut items = vec![T::zeroed(); BUCKET];
        items[0] = root;
        let live = u16::from(!is_zero(&root));
        Self {
            items,
            counters: vec![live],
        }
    }

    /// Claims a free slot, growing by one bucket when every bucket is full.
    ///
    /// The returned slot still holds zeroes; the caller must write a non-zero
    /// value before the next insert, otherwise the same slot is found again.
    ///
    /// # Errors
    ///
    /// [`PoolError::CapacityExceeded`] when the pool already holds `MAX` slots,
    /// [`PoolError::MalformedCounters`] when a bucket counter would overflow.
    pub fn insert(&mut self) -> Result<(usize, &mut T), PoolError> {
        let index = match self.next_empty()? {
            Some(index) => index,
            None => {
                if self.counters.len() >= MAX / BUCKET {
                    return Err(PoolError::CapacityExceeded { max: MAX });
                }
                let index = self.items.len();
                self.items.resize(index + BUCKET, T::zeroed());
                self.counters.push(0);
                index
            }
        };

        let counter = &mut self.counters[index / BUCKET];
        if *counter as usize >= BUCKET {
            return Err(PoolError::MalformedCounters(
                "bucket counter overflow during insert",
            ));
        }
        *counter += 1;

        Ok((index, &mut self.items[index]))
    }

    /// Releases a slot. The slot's memory is left untouched.
    ///
    /// Erasing an already empty slot is a no-op.
    pub fn erase(&mut self, index: usize) -> Result<(), PoolError> {
        let len = self.items.len();
        let item = self
            .items
            .get(index)
            .ok_or(PoolError::OutOfBounds { index, len })?;
        if is_zero(item) {
            return Ok(());
        }

        let counter = &mut self.counters[index / BUCKET];
        if *counter == 0 {
            return Err(PoolError::MalformedCounters(
                "bucket counter underflow during erase",
            ));
        }
        *counter -= 1;
        Ok(())
    }

    /// Bounds-checked shared access.
    pub fn at(&self, index: usize) -> Result<&T, PoolError> {
        let len = self.items.len();
        self.items
            .get(index)
            .ok_or(PoolError::OutOfBounds { index, len })
    }

    /// Bounds-checked mutable access.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T, PoolError> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or(PoolError::OutOfBounds { index, len })
    }

    /// Finds the first free slot (other than slot 0) in a bucket with room.
    ///
    /// Returns `Ok(None)` when no allocated bucket has a free slot.
    pub fn next_empty(&self) -> Result<Option<usize>, PoolError> {
        for (bucket, &counter) in self.counters.iter().enumerate() {
            let start = bucket * BUCKET;
            let end = start + BUCKET;
            if end > self.items.len() {
                return Err(PoolError::MalformedCounters(
                    "more counters than allocated buckets",
                ));
            }
            if counter as usize >= BUCKET {
                continue;
            }
            if let Some(offset) = self.items[start..end]
                .iter()
                .enumerate()
                .position(|(i, item)| start + i != 0 && is_zero(item))
            {
                return Ok(Some(start + offset));
            }
        }
        Ok(None)
    }

    /// Recovers the slot index of a reference obtained from this pool.
    pub fn index_of(&self, item: &T) -> Result<usize, PoolError> {
        let size = std::mem::size_of::<T>();
        if size == 0 {
            return Err(PoolError::ForeignItem);
        }
        let base = self.items.as_ptr() as usize;
        let addr = item as *const T as usize;
        let offset = addr.checked_sub(base).ok_or(PoolError::ForeignItem)?;
        if offset % size != 0 || offset / size >= self.items.len() {
            return Err(PoolError::ForeignItem);
        }
        Ok(offset / size)
    }

    /// Number of live items.
    pub fn size(&self) -> usize {
        self.counters.iter().map(|&c| c as usize).sum()
    }

    /// Number of allocated slots (always a multiple of `BUCKET`).
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Raw slot storage, including free slots.
    pub fn data(&self) -> &[T] {
        &self.items
    }

    /// Per-bucket live counters.
    pub fn counters(&self) -> &[u16] {
        &self.counters
    }

    /// Rebuilds a pool from raw parts, validating every capacity invariant.
    pub fn from_parts(items: Vec<T>, counters: Vec<u16>) -> Result<Self, PoolError> {
        let () = Self::VALID_PARAMS;
        if items.len() > MAX {
            return Err(PoolError::CapacityExceeded { max: MAX });
        }
        if counters.len() * BUCKET != items.len() {
            return Err(PoolError::MalformedCounters(
                "counter count does not match bucket count",
            ));
        }
        for (bucket, &counter) in counters.iter().enumerate() {
            let live = items[bucket * BUCKET..(bucket + 1) * BUCKET]
                .iter()
                .filter(|item| !is_zero(*item))
                .count();
            if counter as usize > BUCKET || counter as usize != live {
                return Err(PoolError::MalformedCounters(
                    "counter does not match occupied slots",
                ));
            }
        }
        Ok(Self { items, counters })
    }
}

impl<T: Pod, const MAX: usize, const BUCKET: usize> Default for Pool<T, MAX, BUCKET> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const MAX: usize, const BUCKET: usize> fmt::Debug for Pool<T, MAX, BUCKET> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.items.len())
            .field("buckets", &self.counters.len())
            .field("live", &self.counters.iter().map(|&c| c as usize).sum::<usize>())
            .finish()
    }
}

impl<T, const MAX: usize, const BUCKET: usize> Index<usize> for Pool<T, MAX, BUCKET> {
    type Output = T;

    /// # Panics
    ///
    /// Panics if `index` is outside the allocated storage.
    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T, const MAX: usize, const BUCKET: usize> IndexMut<usize> for Pool<T, MAX, BUCKET> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }
}

fn is_zero<T: Pod>(item: &T) -> bool {
    bytemuck::bytes_of(item).iter().all(|&b| b == 0)
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Byte blob serialized through `serialize_bytes`.
struct RawBlob<'a>(&'a [u8]);

impl Serialize for RawBlob<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

/// Owned byte blob accepting both native byte strings and integer sequences.
struct OwnedBlob(Vec<u8>);

impl<'de> Deserialize<'de> for OwnedBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BlobVisitor;

        impl<'de> Visitor<'de> for BlobVisitor {
            type Value = OwnedBlob;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a byte blob")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<OwnedBlob, E> {
                Ok(OwnedBlob(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<OwnedBlob, E> {
                Ok(OwnedBlob(v))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<OwnedBlob, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(byte) = seq.next_element::<u8>()? {
                    out.push(byte);
                }
                Ok(OwnedBlob(out))
            }
        }

        deserializer.deserialize_byte_buf(BlobVisitor)
    }
}

fn decode_blob<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, PoolError> {
    let elem = std::mem::size_of::<T>();
    if elem == 0 || bytes.len() % elem != 0 {
        return Err(PoolError::MalformedData {
            len: bytes.len(),
            elem,
        });
    }
    Ok(bytes
        .chunks_exact(elem)
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect())
}

impl<T: Pod, const MAX: usize, const BUCKET: usize> Serialize for Pool<T, MAX, BUCKET> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&RawBlob(bytemuck::cast_slice(&self.items)))?;
        tuple.serialize_element(&RawBlob(bytemuck::cast_slice(&self.counters)))?;
        tuple.end()
    }
}

impl<'de, T: Pod, const MAX: usize, const BUCKET: usize> Deserialize<'de>
    for Pool<T, MAX, BUCKET>
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PoolVisitor<T, const MAX: usize, const BUCKET: usize>(PhantomData<T>);

        impl<'de, T: Pod, const MAX: usize, const BUCKET: usize> Visitor<'de>
            for PoolVisitor<T, MAX, BUCKET>
        {
            type Value = Pool<T, MAX, BUCKET>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a pair of byte blobs (items, counters)")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let items: OwnedBlob = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let counters: OwnedBlob = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;

                let items = decode_blob::<T>(&items.0).map_err(de::Error::custom)?;
                let counters = decode_blob::<u16>(&counters.0).map_err(de::Error::custom)?;
                Pool::from_parts(items, counters).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_tuple(2, PoolVisitor::<T, MAX, BUCKET>(PhantomData))
    }
}
