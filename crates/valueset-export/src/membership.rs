//! Probabilistic membership filters for resolved value sets.
//!
//! A [`MembershipFilter`] answers "might `(system, code)` be in this value
//! set?" without the set itself. It never reports a member as absent; it may
//! report a non-member as present with a probability bounded by
//! [`MembershipFilterConfig::false_positive_rate`].
//!
//! The filter is a scalable Bloom filter: a chain of slices, each a roaring
//! bitmap sized for a fixed number of elements. When the newest slice is full
//! a larger one is appended with a tighter error rate, so the overall bound
//! holds however many codes are inserted.
//!
//! # Example
//!
//! ```ignore
//! use valueset_export::build_membership_filter;
//!
//! let filter = build_membership_filter(&codes);
//! assert!(filter.might_contain_code("http://loinc.org", "8867-4"));
//! ```

use std::io::{Cursor, Read};

use roaring::RoaringBitmap;
use sha2::{Digest, Sha256};
use tracing::debug;
use valueset_model::{Code, CodeSet};

use crate::error::{ExportError, ExportResult};

const MIN_SLICE_BITS: u32 = 64;

/// Sizing parameters for a [`MembershipFilter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MembershipFilterConfig {
    /// Element capacity of the first slice.
    pub initial_capacity: u64,
    /// Overall false-positive bound across all slices.
    pub false_positive_rate: f64,
    /// Capacity multiplier for each new slice.
    pub growth_factor: u64,
    /// Error-rate multiplier for each new slice, in `(0, 1)`.
    pub tightening_ratio: f64,
}

impl Default for MembershipFilterConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 256,
            false_positive_rate: 0.001,
            growth_factor: 2,
            tightening_ratio: 0.85,
        }
    }
}

impl MembershipFilterConfig {
    /// Sets the overall false-positive bound.
    pub fn with_false_positive_rate(mut self, rate: f64) -> Self {
        self.false_positive_rate = rate;
        self
    }

    /// Sets the element capacity of the first slice.
    pub fn with_initial_capacity(mut self, capacity: u64) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> ExportResult<()> {
        if self.initial_capacity == 0 {
            return Err(ExportError::InvalidConfig(
                "initial_capacity must be positive".to_string(),
            ));
        }
        if !(self.false_positive_rate > 0.0 && self.false_positive_rate < 1.0) {
            return Err(ExportError::InvalidConfig(format!(
                "false_positive_rate must be in (0, 1), got {}",
                self.false_positive_rate
            )));
        }
        if self.growth_factor < 1 {
            return Err(ExportError::InvalidConfig(
                "growth_factor must be at least 1".to_string(),
            ));
        }
        if !(self.tightening_ratio > 0.0 && self.tightening_ratio < 1.0) {
            return Err(ExportError::InvalidConfig(format!(
                "tightening_ratio must be in (0, 1), got {}",
                self.tightening_ratio
            )));
        }
        Ok(())
    }

    /// Capacity and error rate of slice `index`.
    ///
    /// Error rates form a geometric series summing to at most
    /// `false_positive_rate`.
    fn slice_parameters(&self, index: u32) -> (u64, f64) {
        let capacity = (0..index).fold(self.initial_capacity, |cap, _| {
            cap.saturating_mul(self.growth_factor)
        });
        let first_rate = self.false_positive_rate * (1.0 - self.tightening_ratio);
        let rate = first_rate * self.tightening_ratio.powi(index as i32);
        (capacity, rate)
    }
}

/// Two independent 64-bit hashes of a key, taken from its SHA-256 digest.
fn key_hashes(key: &str) -> (u64, u64) {
    let digest = Sha256::digest(key.as_bytes());
    let mut first = [0u8; 8];
    let mut second = [0u8; 8];
    first.copy_from_slice(&digest[0..8]);
    second.copy_from_slice(&digest[8..16]);
    // An odd step never collapses every probe onto the first bit
    (u64::from_le_bytes(first), u64::from_le_bytes(second) | 1)
}

/// One fixed-capacity Bloom filter in the chain.
#[derive(Clone)]
struct Slice {
    bits: RoaringBitmap,
    num_bits: u32,
    num_hashes: u32,
    capacity: u64,
    count: u64,
}

impl Slice {
    fn new(capacity: u64, rate: f64) -> Self {
        let ln2 = std::f64::consts::LN_2;
        let bits = (-(capacity as f64) * rate.ln() / (ln2 * ln2)).ceil();
        let num_bits = bits.clamp(MIN_SLICE_BITS as f64, u32::MAX as f64) as u32;
        let num_hashes = (-rate.log2()).ceil().max(1.0) as u32;
        Self {
            bits: RoaringBitmap::new(),
            num_bits,
            num_hashes,
            capacity,
            count: 0,
        }
    }

    fn bit_index(&self, (h1, h2): (u64, u64), i: u32) -> u32 {
        (h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits as u64) as u32
    }

    fn contains(&self, hashes: (u64, u64)) -> bool {
        (0..self.num_hashes).all(|i| self.bits.contains(self.bit_index(hashes, i)))
    }

    fn insert(&mut self, hashes: (u64, u64)) {
        for i in 0..self.num_hashes {
            let index = self.bit_index(hashes, i);
            self.bits.insert(index);
        }
        self.count += 1;
    }

    fn is_full(&self) -> bool {
        self.count >= self.capacity
    }
}

/// Scalable Bloom filter over `"<system>|<code>"` keys.
#[derive(Clone)]
pub struct MembershipFilter {
    config: MembershipFilterConfig,
    slices: Vec<Slice>,
    len: u64,
}

impl MembershipFilter {
    /// Creates an empty filter with the default configuration.
    pub fn new() -> Self {
        Self::from_valid_config(MembershipFilterConfig::default())
    }

    /// Creates an empty filter with a custom configuration.
    pub fn with_config(config: MembershipFilterConfig) -> ExportResult<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: MembershipFilterConfig) -> Self {
        Self {
            config,
            slices: Vec::new(),
            len: 0,
        }
    }

    /// Builds a filter holding every code in `set`.
    pub fn from_code_set(set: &CodeSet, config: MembershipFilterConfig) -> ExportResult<Self> {
        let mut filter = Self::with_config(config)?;
        for code in set {
            filter.insert(code);
        }
        debug!(
            codes = set.len(),
            slices = filter.slice_count(),
            bytes = filter.memory_size(),
            "built membership filter"
        );
        Ok(filter)
    }

    /// Returns the configuration the filter was built with.
    pub fn config(&self) -> &MembershipFilterConfig {
        &self.config
    }

    /// Adds a code. Returns `false` if the filter already reported it present.
    pub fn insert(&mut self, code: &Code) -> bool {
        self.insert_key(&code.membership_key())
    }

    /// Adds a raw `"<system>|<code>"` key.
    pub fn insert_key(&mut self, key: &str) -> bool {
        let hashes = key_hashes(key);
        if self.slices.iter().any(|slice| slice.contains(hashes)) {
            return false;
        }
        if self.slices.last().map_or(true, Slice::is_full) {
            let (capacity, rate) = self.config.slice_parameters(self.slices.len() as u32);
            self.slices.push(Slice::new(capacity, rate));
        }
        if let Some(slice) = self.slices.last_mut() {
            slice.insert(hashes);
        }
        self.len += 1;
        true
    }

    /// Returns `true` if `code` may be a member; `false` means it is not.
    pub fn might_contain(&self, code: &Code) -> bool {
        self.might_contain_key(&code.membership_key())
    }

    /// Membership check without building a [`Code`].
    pub fn might_contain_code(&self, system: &str, code: &str) -> bool {
        self.might_contain_key(&format!("{system}|{code}"))
    }

    /// Membership check for a raw `"<system>|<code>"` key.
    pub fn might_contain_key(&self, key: &str) -> bool {
        let hashes = key_hashes(key);
        self.slices.iter().any(|slice| slice.contains(hashes))
    }

    /// Number of distinct keys inserted.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slices in the chain.
    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    /// Approximate memory usage in bytes.
    pub fn memory_size(&self) -> usize {
        self.slices
            .iter()
            .map(|slice| slice.bits.serialized_size())
            .sum::<usize>()
            + std::mem::size_of::<Self>()
    }

    /// Serializes the filter.
    ///
    /// ```text
    /// [8 bytes]  Initial capacity (u64 LE)
    /// [8 bytes]  False-positive rate (f64 LE)
    /// [8 bytes]  Growth factor (u64 LE)
    /// [8 bytes]  Tightening ratio (f64 LE)
    /// [8 bytes]  Element count (u64 LE)
    /// [4 bytes]  Slice count (u32 LE)
    /// per slice:
    ///   [4 bytes]  Bit count (u32 LE)
    ///   [4 bytes]  Hash count (u32 LE)
    ///   [8 bytes]  Capacity (u64 LE)
    ///   [8 bytes]  Element count (u64 LE)
    ///   [4 bytes]  Bitmap length (u32 LE)
    ///   [var]      Serialized roaring bitmap
    /// ```
    pub fn serialize(&self) -> ExportResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(44 + self.memory_size());
        buf.extend_from_slice(&self.config.initial_capacity.to_le_bytes());
        buf.extend_from_slice(&self.config.false_positive_rate.to_le_bytes());
        buf.extend_from_slice(&self.config.growth_factor.to_le_bytes());
        buf.extend_from_slice(&self.config.tightening_ratio.to_le_bytes());
        buf.extend_from_slice(&self.len.to_le_bytes());
        buf.extend_from_slice(&(self.slices.len() as u32).to_le_bytes());

        for slice in &self.slices {
            buf.extend_from_slice(&slice.num_bits.to_le_bytes());
            buf.extend_from_slice(&slice.num_hashes.to_le_bytes());
            buf.extend_from_slice(&slice.capacity.to_le_bytes());
            buf.extend_from_slice(&slice.count.to_le_bytes());

            let mut bitmap = Vec::with_capacity(slice.bits.serialized_size());
            slice
                .bits
                .serialize_into(&mut bitmap)
                .map_err(|e| ExportError::SerializationError(e.to_string()))?;
            buf.extend_from_slice(&(bitmap.len() as u32).to_le_bytes());
            buf.extend_from_slice(&bitmap);
        }
        Ok(buf)
    }

    /// Deserializes a filter written by [`MembershipFilter::serialize`].
    pub fn deserialize(bytes: &[u8]) -> ExportResult<Self> {
        let mut reader = ByteReader::new(bytes);

        let config = MembershipFilterConfig {
            initial_capacity: reader.u64()?,
            false_positive_rate: reader.f64()?,
            growth_factor: reader.u64()?,
            tightening_ratio: reader.f64()?,
        };
        config
            .validate()
            .map_err(|e| ExportError::DeserializationError(e.to_string()))?;
        let len = reader.u64()?;
        let slice_count = reader.u32()?;

        let mut slices = Vec::new();
        for _ in 0..slice_count {
            let num_bits = reader.u32()?;
            let num_hashes = reader.u32()?;
            let capacity = reader.u64()?;
            let count = reader.u64()?;
            if num_bits == 0 || num_hashes == 0 {
                return Err(ExportError::DeserializationError(
                    "slice with zero bits or hashes".to_string(),
                ));
            }
            let bitmap_len = reader.u32()? as usize;
            let bitmap = reader.bytes(bitmap_len)?;
            let bits = RoaringBitmap::deserialize_from(bitmap).map_err(|e| {
                ExportError::DeserializationError(format!("Failed to deserialize slice: {e}"))
            })?;
            slices.push(Slice {
                bits,
                num_bits,
                num_hashes,
                capacity,
                count,
            });
        }

        if !reader.is_exhausted() {
            return Err(ExportError::DeserializationError(
                "trailing bytes after last slice".to_string(),
            ));
        }
        let counted: u64 = slices.iter().map(|slice| slice.count).sum();
        if counted != len {
            return Err(ExportError::DeserializationError(format!(
                "element count mismatch: header says {len}, slices hold {counted}"
            )));
        }

        Ok(Self {
            config,
            slices,
            len,
        })
    }
}

impl Default for MembershipFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MembershipFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipFilter")
            .field("len", &self.len)
            .field("slices", &self.slices.len())
            .field("false_positive_rate", &self.config.false_positive_rate)
            .finish()
    }
}

/// Builds a membership filter over every code in `set` with default sizing.
pub fn build_membership_filter(set: &CodeSet) -> MembershipFilter {
    let mut filter = MembershipFilter::new();
    for code in set {
        filter.insert(code);
    }
    filter
}

/// Little-endian reader that reports truncation as a deserialization error.
struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    fn array<const N: usize>(&mut self) -> ExportResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|e| ExportError::DeserializationError(format!("truncated filter: {e}")))?;
        Ok(buf)
    }

    fn u32(&mut self) -> ExportResult<u32> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> ExportResult<u64> {
        self.array().map(u64::from_le_bytes)
    }

    fn f64(&mut self) -> ExportResult<f64> {
        self.array().map(f64::from_le_bytes)
    }

    fn bytes(&mut self, len: usize) -> ExportResult<&'a [u8]> {
        let bytes: &'a [u8] = *self.cursor.get_ref();
        let start = self.cursor.position() as usize;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| ExportError::DeserializationError("truncated bitmap".to_string()))?;
        self.cursor.set_position(end as u64);
        Ok(&bytes[start..end])
    }

    fn is_exhausted(&self) -> bool {
        self.cursor.position() as usize == self.cursor.get_ref().len()
    }
}
