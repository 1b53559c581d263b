//! Key routing
//!
//! Every key is reduced to a byte stream, hashed with 32-bit FNV-1a, and the
//! low bits of the hash pick the shard (`hash & (shard_count - 1)`).
//!
//! ## Byte representations
//! Which bytes a key contributes is decided statically by its [`RouteKey`]
//! impl, reported as a [`Strategy`]:
//! - **Bytes**: `[u8]`, `Vec<u8>`, `[u8; N]`, hashed as-is
//! - **ByteView**: [`ByteView`] over anything `AsRef<[u8]>`
//! - **Text**: `str`, `String`, `char`, hashed as UTF-8
//! - **StringView**: [`Textual`] over anything `Display`
//! - **Numeric**: integers and `bool` (and slices of them), little-endian
//! - **Structural**: [`Structural`] over anything `Serialize`, encoded with
//!   bincode; the only fallible path
//!
//! Two keys land on the same shard only if they produce the same bytes, so a
//! cache must be used with one key representation throughout.

use std::fmt::{self, Display};
use std::io;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hasher
///
/// Implements [`io::Write`] and [`fmt::Write`] so encoders can stream into
/// it without an intermediate buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fnv1a {
    state: u32,
}

impl Fnv1a {
    /// Create a hasher at the offset basis
    pub const fn new() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
        }
    }

    /// Feed bytes into the hash
    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u32::from(byte);
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    /// Current hash value
    #[inline]
    pub fn finish32(&self) -> u32 {
        self.state
    }
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}

impl io::Write for Fnv1a {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for Fnv1a {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.update(s.as_bytes());
        Ok(())
    }
}

/// How a key type is turned into bytes for routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Raw byte sequence
    Bytes,
    /// Caller-provided byte view ([`ByteView`])
    ByteView,
    /// UTF-8 text
    Text,
    /// Caller-provided string form ([`Textual`])
    StringView,
    /// Little-endian fixed-width integers and booleans
    Numeric,
    /// Serialized structure ([`Structural`])
    Structural,
}

/// A key that can be routed to a shard
///
/// Implement this for custom key types to pick their byte representation, or
/// wrap them in [`ByteView`], [`Textual`] or [`Structural`].
///
/// ```
/// use shardlru::router::{route_hash, Fnv1a, RouteKey, Strategy};
///
/// #[derive(Hash, PartialEq, Eq, Clone)]
/// struct UserId(u64);
///
/// impl RouteKey for UserId {
///     const STRATEGY: Strategy = Strategy::Numeric;
///
///     fn write_route_bytes(&self, hasher: &mut Fnv1a) -> shardlru::Result<()> {
///         self.0.write_route_bytes(hasher)
///     }
/// }
///
/// assert_eq!(route_hash(&UserId(7)).unwrap(), route_hash(&7u64).unwrap());
/// ```
pub trait RouteKey {
    /// Byte representation used by this type
    const STRATEGY: Strategy;

    /// Feed this key's routing bytes into `hasher`
    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()>;
}

/// Hash a key's routing bytes
pub fn route_hash<Q: RouteKey + ?Sized>(key: &Q) -> Result<u32> {
    let mut hasher = Fnv1a::new();
    key.write_route_bytes(&mut hasher)?;
    Ok(hasher.finish32())
}

/// Map a key to a shard in `[0, shard_count)`
///
/// # Arguments
/// * `key` - Key to route
/// * `shard_count` - Number of shards, a power of two
///
/// # Returns
/// * `Result<usize>` - Shard index, or `Error::Encoding` if the key could
///   not be encoded
pub fn shard_index<Q: RouteKey + ?Sized>(key: &Q, shard_count: usize) -> Result<usize> {
    debug_assert!(shard_count.is_power_of_two(), "shard count must be a power of two");
    let hash = route_hash(key)? as usize;
    Ok(hash & (shard_count - 1))
}

mod sealed {
    pub trait Sealed {}
}

/// Fixed-width values with a little-endian encoding
///
/// Sealed; implemented for every integer type and `bool`. Slices, vectors
/// and arrays of these are keys too.
pub trait Primitive: sealed::Sealed + Copy {
    /// Strategy reported by sequences of this type
    const SEQUENCE: Strategy = Strategy::Numeric;

    /// Feed this value's little-endian bytes into `hasher`
    fn write_le(&self, hasher: &mut Fnv1a);

    /// Feed a run of values into `hasher`
    fn write_le_slice(items: &[Self], hasher: &mut Fnv1a) {
        for item in items {
            item.write_le(hasher);
        }
    }
}

macro_rules! numeric_keys {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Primitive for $ty {
                #[inline]
                fn write_le(&self, hasher: &mut Fnv1a) {
                    hasher.update(&self.to_le_bytes());
                }
            }

            impl RouteKey for $ty {
                const STRATEGY: Strategy = Strategy::Numeric;

                #[inline]
                fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
                    self.write_le(hasher);
                    Ok(())
                }
            }
        )*
    };
}

numeric_keys!(u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl sealed::Sealed for u8 {}

impl Primitive for u8 {
    // A run of u8 is a byte string.
    const SEQUENCE: Strategy = Strategy::Bytes;

    #[inline]
    fn write_le(&self, hasher: &mut Fnv1a) {
        hasher.update(&[*self]);
    }

    #[inline]
    fn write_le_slice(items: &[Self], hasher: &mut Fnv1a) {
        hasher.update(items);
    }
}

impl RouteKey for u8 {
    const STRATEGY: Strategy = Strategy::Numeric;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        self.write_le(hasher);
        Ok(())
    }
}

impl sealed::Sealed for bool {}

impl Primitive for bool {
    #[inline]
    fn write_le(&self, hasher: &mut Fnv1a) {
        hasher.update(&[u8::from(*self)]);
    }
}

impl RouteKey for bool {
    const STRATEGY: Strategy = Strategy::Numeric;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        self.write_le(hasher);
        Ok(())
    }
}

impl<T: Primitive> RouteKey for [T] {
    const STRATEGY: Strategy = T::SEQUENCE;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        T::write_le_slice(self, hasher);
        Ok(())
    }
}

impl<T: Primitive> RouteKey for Vec<T> {
    const STRATEGY: Strategy = T::SEQUENCE;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        self.as_slice().write_route_bytes(hasher)
    }
}

impl<T: Primitive, const N: usize> RouteKey for [T; N] {
    const STRATEGY: Strategy = T::SEQUENCE;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        self.as_slice().write_route_bytes(hasher)
    }
}

impl RouteKey for str {
    const STRATEGY: Strategy = Strategy::Text;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        hasher.update(self.as_bytes());
        Ok(())
    }
}

impl RouteKey for String {
    const STRATEGY: Strategy = Strategy::Text;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        self.as_str().write_route_bytes(hasher)
    }
}

impl RouteKey for char {
    const STRATEGY: Strategy = Strategy::Text;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        let mut buf = [0u8; 4];
        hasher.update(self.encode_utf8(&mut buf).as_bytes());
        Ok(())
    }
}

impl<T: RouteKey + ?Sized> RouteKey for &T {
    const STRATEGY: Strategy = T::STRATEGY;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        (**self).write_route_bytes(hasher)
    }
}

impl<T: RouteKey + ?Sized> RouteKey for Box<T> {
    const STRATEGY: Strategy = T::STRATEGY;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        (**self).write_route_bytes(hasher)
    }
}

impl<T: RouteKey + ?Sized> RouteKey for Arc<T> {
    const STRATEGY: Strategy = T::STRATEGY;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        (**self).write_route_bytes(hasher)
    }
}

/// Routes a key by the bytes it exposes through `AsRef<[u8]>`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteView<T>(pub T);

impl<T: AsRef<[u8]>> RouteKey for ByteView<T> {
    const STRATEGY: Strategy = Strategy::ByteView;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        hasher.update(self.0.as_ref());
        Ok(())
    }
}

/// Routes a key by the UTF-8 bytes of its `Display` output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Textual<T>(pub T);

impl<T: Display> RouteKey for Textual<T> {
    const STRATEGY: Strategy = Strategy::StringView;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        use std::fmt::Write as _;

        write!(hasher, "{}", self.0).map_err(|_| Error::Encoding {
            key_type: std::any::type_name::<T>(),
            reason: "Display implementation returned an error".to_string(),
        })
    }
}

/// Routes a key by its bincode serialization
///
/// Slow path for keys with no cheaper byte form. Fails with
/// `Error::Encoding` when the value cannot be serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Structural<T>(pub T);

impl<T: Serialize> RouteKey for Structural<T> {
    const STRATEGY: Strategy = Strategy::Structural;

    fn write_route_bytes(&self, hasher: &mut Fnv1a) -> Result<()> {
        bincode::serialize_into(&mut *hasher, &self.0).map_err(|err| {
            let key_type = std::any::type_name::<T>();
            debug!(key_type, error = %err, "key encoding failed");
            Error::encoding(key_type, err)
        })
    }
}
