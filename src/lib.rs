//! Dynamic accumulator over the RSA group.
//!
//! An accumulation is a single group element that commits to a multiset of
//! byte-string elements. The holder of the modulus factorisation can add and
//! delete elements in constant time; anyone holding the public modulus can
//! verify a membership [`Witness`] and, given the published accumulation
//! trajectory, refresh witnesses through batched [`Update`]s without
//! contacting the holder or seeing other members' data.
//!
//! Elements are mapped to primes deterministically: the element is digested,
//! the digest is reduced to [`PRIME_BITS`] bits, and the next prime is found
//! by stepping from the reduced digest. The offset walked during that search
//! is the witness's nonce, so verifiers recover the prime with a single
//! digest and no search.
//!
//! ```
//! use rsacc::{named_hasher, Accumulator, RsaPrimes, Update};
//! use rug::Integer;
//!
//! let primes = RsaPrimes::from_parts(Integer::from(61), Integer::from(53))?;
//! let mut acc = Accumulator::with_private_key(named_hasher("sha-256")?, primes)?;
//!
//! let w1 = acc.add("spam")?;
//! let w2 = acc.add("eggs")?;
//! // Adding "eggs" staled w1; refresh it through an update.
//! assert!(!acc.verify(&w1));
//! assert!(acc.verify(&w2));
//!
//! let mut update = Update::new(&acc);
//! update.absorb_add(&w2)?;
//! let w1 = update.apply(&w1)?;
//! assert!(acc.verify(&w1));
//! # Ok::<(), rsacc::Error>(())
//! ```

pub mod accumulator;
pub mod error;
pub mod hash_to_prime;
pub mod keygen;
mod serde_int;
pub mod update;

pub use accumulator::{Accumulator, Snapshot, Witness};
pub use error::Error;
pub use hash_to_prime::{named_hasher, ElementHasher};
pub use keygen::RsaPrimes;
pub use update::Update;

/// Fixed initial value of the accumulation.
pub const BASE: u32 = 65537;

/// Default bit-length of a generated RSA modulus.
pub const MODULUS_BITS: u32 = 3072;

/// Bit-length bound for element primes.
pub const PRIME_BITS: u32 = 128;

pub(crate) const MILLER_RABIN_ROUNDS: u32 = 24;
