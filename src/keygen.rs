//! RSA keypair generation.
//!
//! A modulus is assembled from two independently sampled primes of half the
//! target bit-length each; the pair is resampled until the product lands on
//! the target length exactly. The single-prime search walks a mod-30 wheel so
//! that only candidates coprime to 2, 3, and 5 reach the primality test.

use rand_core::{CryptoRng, RngCore};
use rug::integer::{IsPrime, Order};
use rug::Integer;

use crate::{Error, MILLER_RABIN_ROUNDS, MODULUS_BITS};

// Gaps between successive residues coprime to 30, starting from 1.
const WHEEL_GAPS: [u32; 8] = [6, 4, 2, 4, 2, 4, 6, 2];

const PAIR_ATTEMPTS: usize = 128;

const MIN_MODULUS_BITS: u32 = 16;

/// The factorisation of an RSA modulus, canonically ordered `p >= q`.
///
/// Owning a pair is what makes an [`Accumulator`](crate::Accumulator)
/// trusted: the private exponent derived from it is what allows deletions
/// and direct proofs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsaPrimes {
    p: Integer,
    q: Integer,
}

impl RsaPrimes {
    /// Generate a pair whose product is exactly [`MODULUS_BITS`] bits long.
    pub fn generate<R>(rng: &mut R) -> Result<Self, Error>
    where
        R: RngCore + CryptoRng,
    {
        Self::with_modulus_bits(MODULUS_BITS, rng)
    }

    /// Generate a pair whose product is exactly `bits` bits long.
    ///
    /// ```
    /// use rand::rngs::OsRng;
    /// use rsacc::RsaPrimes;
    ///
    /// let primes = RsaPrimes::with_modulus_bits(256, &mut OsRng)?;
    /// assert_eq!(primes.modulus().significant_bits(), 256);
    /// assert!(primes.p() >= primes.q());
    /// # Ok::<(), rsacc::Error>(())
    /// ```
    pub fn with_modulus_bits<R>(bits: u32, rng: &mut R) -> Result<Self, Error>
    where
        R: RngCore + CryptoRng,
    {
        if bits < MIN_MODULUS_BITS {
            return Err(Error::BadArgument("modulus bit-length too small"));
        }
        for _ in 0..PAIR_ATTEMPTS {
            let p = random_prime((bits + 1) / 2, rng);
            let q = random_prime(bits / 2, rng);
            if Integer::from(&p * &q).significant_bits() == bits {
                return Ok(Self::ordered(p, q));
            }
        }
        Err(Error::InternalInvariant("modulus bit-length never matched the target"))
    }

    /// Build a pair from externally supplied factors.
    pub fn from_parts(p: Integer, q: Integer) -> Result<Self, Error> {
        if p == q {
            return Err(Error::BadArgument("prime factors must be distinct"));
        }
        for factor in [&p, &q] {
            if !factor.is_odd() || factor.is_probably_prime(MILLER_RABIN_ROUNDS) == IsPrime::No {
                return Err(Error::BadArgument("factor is not an odd prime"));
            }
        }
        Ok(Self::ordered(p, q))
    }

    fn ordered(mut p: Integer, mut q: Integer) -> Self {
        if p < q {
            std::mem::swap(&mut p, &mut q);
        }
        Self { p, q }
    }

    pub fn p(&self) -> &Integer {
        &self.p
    }

    pub fn q(&self) -> &Integer {
        &self.q
    }

    /// The public modulus `p * q`.
    pub fn modulus(&self) -> Integer {
        Integer::from(&self.p * &self.q)
    }

    /// The private exponent modulus `(p - 1) * (q - 1)`.
    pub(crate) fn private_exponent(&self) -> Integer {
        Integer::from(&self.p - 1u32) * Integer::from(&self.q - 1u32)
    }
}

/// Find a random prime of exactly `bits` bits.
fn random_prime<R>(bits: u32, rng: &mut R) -> Integer
where
    R: RngCore + CryptoRng,
{
    'sample: loop {
        let mut candidate = sample_bits(bits, rng);
        // Smallest value at or above the sample congruent to 31 mod 30.
        candidate += (31 - candidate.mod_u(30)) % 30;
        let mut gap = 0;
        loop {
            if candidate.significant_bits() > bits {
                continue 'sample;
            }
            // One round to reject cheaply, the full count only on survivors.
            if candidate.is_probably_prime(1) != IsPrime::No
                && candidate.is_probably_prime(MILLER_RABIN_ROUNDS) != IsPrime::No
            {
                return candidate;
            }
            candidate += WHEEL_GAPS[gap];
            gap = (gap + 1) % WHEEL_GAPS.len();
        }
    }
}

/// Uniform sample of `bits` bits with the top bit forced.
fn sample_bits<R>(bits: u32, rng: &mut R) -> Integer
where
    R: RngCore + CryptoRng,
{
    let mut buf = vec![0u8; ((bits + 7) / 8) as usize];
    rng.fill_bytes(&mut buf);
    let mut value = Integer::from_digits(&buf, Order::Msf);
    value.keep_bits_mut(bits);
    value.set_bit(bits - 1, true);
    value
}
