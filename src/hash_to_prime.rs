//! Deterministic mapping of byte data to element primes.
//!
//! The element is digested, the digest is interpreted big-endian and reduced
//! to [`PRIME_BITS`] bits, and the least prime at or above the reduced value
//! is located by stepping odd candidates. The offset between the reduced
//! digest and the prime travels with the witness as its nonce, so the search
//! runs once per element: verifiers recompute the prime from digest + nonce.

use std::marker::PhantomData;
use std::sync::Arc;

use digest::Digest;
use rug::integer::{IsPrime, Order};
use rug::Integer;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::{Error, MILLER_RABIN_ROUNDS, PRIME_BITS};

/// A digest capability: bytes in, fixed-width digest out.
///
/// Resolved from an identifier by [`named_hasher`], or supplied by the caller
/// as any `Fn(&[u8]) -> Vec<u8>` closure. The output must carry at least
/// [`PRIME_BITS`] bits.
pub trait ElementHasher: Send + Sync {
    /// Stable identifier, present only for hashers resolved by name.
    fn name(&self) -> Option<&'static str> {
        None
    }

    fn digest(&self, data: &[u8]) -> Vec<u8>;
}

impl<F> ElementHasher for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    fn digest(&self, data: &[u8]) -> Vec<u8> {
        self(data)
    }
}

impl std::fmt::Debug for dyn ElementHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementHasher").field("name", &self.name()).finish()
    }
}

struct Sha2Hasher<D> {
    name: &'static str,
    _digest: PhantomData<fn() -> D>,
}

impl<D: Digest> ElementHasher for Sha2Hasher<D> {
    fn name(&self) -> Option<&'static str> {
        Some(self.name)
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        D::digest(data).to_vec()
    }
}

fn sha2<D: Digest + 'static>(name: &'static str) -> Arc<dyn ElementHasher> {
    Arc::new(Sha2Hasher::<D> {
        name,
        _digest: PhantomData,
    })
}

/// Resolve a digest identifier to a hasher.
///
/// The SHA-2 family is accepted; identifiers are case-insensitive and the
/// hyphen is optional ("sha-256" and "SHA256" name the same hasher).
///
/// ```
/// use rsacc::ElementHasher;
///
/// let hasher = rsacc::named_hasher("SHA-256")?;
/// assert_eq!(hasher.name(), Some("sha-256"));
/// assert_eq!(hasher.digest(b"abc").len(), 32);
/// # Ok::<(), rsacc::Error>(())
/// ```
pub fn named_hasher(name: &str) -> Result<Arc<dyn ElementHasher>, Error> {
    match name.to_ascii_lowercase().replace('-', "").as_str() {
        "sha224" => Ok(sha2::<Sha224>("sha-224")),
        "sha256" => Ok(sha2::<Sha256>("sha-256")),
        "sha384" => Ok(sha2::<Sha384>("sha-384")),
        "sha512" => Ok(sha2::<Sha512>("sha-512")),
        _ => Err(Error::BadArgument("unrecognised digest identifier")),
    }
}

/// Map an element to its prime representative.
///
/// Returns `(y, nonce)` where `y` is prime, `y < 2^PRIME_BITS`, and
/// `nonce = y - (digest mod 2^PRIME_BITS)`. The search starts at the reduced
/// digest itself when it is odd and one above it when it is even, then steps
/// by two; the rule is load-bearing for witness stability and must not
/// change.
pub fn hash_to_prime(hasher: &dyn ElementHasher, data: &[u8]) -> Result<(Integer, Integer), Error> {
    let reduced = reduced_digest(hasher, data)?;
    let mut y = reduced.clone();
    if y.is_even() {
        y += 1u32;
    }
    while y.is_probably_prime(MILLER_RABIN_ROUNDS) == IsPrime::No {
        y += 2u32;
    }
    if y.significant_bits() > PRIME_BITS {
        // ~2^121 primes below the bound; reaching it means the digest is broken.
        return Err(Error::InternalInvariant("prime search escaped the element prime bound"));
    }
    let nonce = Integer::from(&y - &reduced);
    Ok((y, nonce))
}

/// Recompute an element's prime from the nonce carried by its witness.
///
/// This is the verification path: a single digest, no prime search.
pub fn witness_prime(
    hasher: &dyn ElementHasher,
    element: &[u8],
    nonce: &Integer,
) -> Result<Integer, Error> {
    Ok(reduced_digest(hasher, element)? + nonce)
}

fn reduced_digest(hasher: &dyn ElementHasher, data: &[u8]) -> Result<Integer, Error> {
    let digest = hasher.digest(data);
    if digest.len() * 8 < PRIME_BITS as usize {
        return Err(Error::BadArgument("digest narrower than the element prime bound"));
    }
    let mut value = Integer::from_digits(&digest, Order::Msf);
    value.keep_bits_mut(PRIME_BITS);
    Ok(value)
}
