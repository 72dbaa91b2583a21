//! The accumulator proper: a digest capability, a modulus, an optional
//! private exponent, and the current accumulation.

use std::fmt;
use std::sync::Arc;

use rug::Integer;
use serde::{Deserialize, Serialize};

use crate::hash_to_prime::{self, named_hasher, ElementHasher};
use crate::keygen::RsaPrimes;
use crate::{Error, BASE, PRIME_BITS};

/// A dynamic accumulator over the RSA group.
///
/// Constructed with a private key ([`RsaPrimes`]) it is *trusted*: it can
/// add, delete, prove, and verify. Constructed with a public modulus only it
/// can verify witnesses against an accumulation obtained out of band (see
/// [`set_value`](Accumulator::set_value)); add, delete, and prove fail with
/// [`Error::SecretRequired`].
#[derive(Clone)]
pub struct Accumulator {
    hasher: Arc<dyn ElementHasher>,
    n: Integer,
    d: Option<Integer>,
    z: Integer,
    primes: Option<RsaPrimes>,
}

impl Accumulator {
    /// Construct a trusted accumulator from the modulus factorisation.
    ///
    /// ```
    /// use rsacc::{named_hasher, Accumulator, RsaPrimes};
    /// use rug::Integer;
    ///
    /// let primes = RsaPrimes::from_parts(Integer::from(61), Integer::from(53))?;
    /// let mut acc = Accumulator::with_private_key(named_hasher("sha-256")?, primes)?;
    /// let witness = acc.add("abc")?;
    /// assert!(acc.verify(&witness));
    /// # Ok::<(), rsacc::Error>(())
    /// ```
    pub fn with_private_key(hasher: Arc<dyn ElementHasher>, primes: RsaPrimes) -> Result<Self, Error> {
        check_hasher(hasher.as_ref())?;
        let n = primes.modulus();
        let d = primes.private_exponent();
        Ok(Self {
            hasher,
            n,
            d: Some(d),
            z: Integer::from(BASE),
            primes: Some(primes),
        })
    }

    /// Construct a verify-only accumulator from a public modulus.
    ///
    /// ```
    /// use rsacc::{named_hasher, Accumulator, Error, RsaPrimes};
    /// use rug::Integer;
    ///
    /// let primes = RsaPrimes::from_parts(Integer::from(61), Integer::from(53))?;
    /// let mut holder = Accumulator::with_private_key(named_hasher("sha-256")?, primes)?;
    /// let witness = holder.add("abc")?;
    ///
    /// let mut public =
    ///     Accumulator::with_public_key(named_hasher("sha-256")?, holder.public_key().clone())?;
    /// public.set_value(holder.value().clone())?;
    /// assert!(public.verify(&witness));
    /// assert_eq!(public.add("def"), Err(Error::SecretRequired));
    /// # Ok::<(), rsacc::Error>(())
    /// ```
    pub fn with_public_key(hasher: Arc<dyn ElementHasher>, n: Integer) -> Result<Self, Error> {
        check_hasher(hasher.as_ref())?;
        if n <= 1u32 || n.is_even() {
            return Err(Error::BadArgument("modulus must be an odd composite"));
        }
        Ok(Self {
            hasher,
            n,
            d: None,
            z: Integer::from(BASE),
            primes: None,
        })
    }

    /// Add an element and return its membership witness.
    ///
    /// The witness value is the accumulation just before the element was
    /// absorbed; updating the accumulation is the final step, so a failed
    /// add leaves the state untouched.
    pub fn add(&mut self, element: impl Into<Vec<u8>>) -> Result<Witness, Error> {
        if self.d.is_none() {
            return Err(Error::SecretRequired);
        }
        let element = element.into();
        let (prime, nonce) = hash_to_prime::hash_to_prime(self.hasher.as_ref(), &element)?;
        let witness = Witness {
            element,
            nonce,
            value: self.z.clone(),
        };
        self.z
            .pow_mod_mut(&prime, &self.n)
            .expect("element prime is non-negative");
        Ok(witness)
    }

    /// Delete the element proven by `witness` and return the new
    /// accumulation.
    ///
    /// ```
    /// use rsacc::{named_hasher, Accumulator, Error, RsaPrimes};
    /// use rug::Integer;
    ///
    /// let primes = RsaPrimes::from_parts(Integer::from(61), Integer::from(53))?;
    /// let mut acc = Accumulator::with_private_key(named_hasher("sha-256")?, primes)?;
    /// let witness = acc.add("abc")?;
    /// acc.del(&witness)?;
    /// assert!(!acc.verify(&witness));
    /// assert_eq!(acc.del(&witness), Err(Error::WitnessInvalid));
    /// # Ok::<(), rsacc::Error>(())
    /// ```
    pub fn del(&mut self, witness: &Witness) -> Result<Integer, Error> {
        if !self.verify(witness) {
            return Err(Error::WitnessInvalid);
        }
        let d = self.d.as_ref().ok_or(Error::SecretRequired)?;
        let prime = hash_to_prime::witness_prime(self.hasher.as_ref(), &witness.element, &witness.nonce)?;
        let inverse = prime
            .invert(d)
            .map_err(|_| Error::InternalInvariant("element prime divides the private exponent"))?;
        self.z
            .pow_mod_mut(&inverse, &self.n)
            .expect("inverted exponent is non-negative");
        Ok(self.z.clone())
    }

    /// Produce a witness for an element already in the accumulation.
    ///
    /// ```
    /// use rsacc::{named_hasher, Accumulator, RsaPrimes};
    /// use rug::Integer;
    ///
    /// let primes = RsaPrimes::from_parts(Integer::from(61), Integer::from(53))?;
    /// let mut acc = Accumulator::with_private_key(named_hasher("sha-256")?, primes)?;
    /// acc.add("abc")?;
    /// acc.add("def")?;
    /// let witness = acc.prove("abc")?;
    /// assert!(acc.verify(&witness));
    /// # Ok::<(), rsacc::Error>(())
    /// ```
    pub fn prove(&self, element: impl Into<Vec<u8>>) -> Result<Witness, Error> {
        let d = self.d.as_ref().ok_or(Error::SecretRequired)?;
        let element = element.into();
        let (prime, nonce) = hash_to_prime::hash_to_prime(self.hasher.as_ref(), &element)?;
        let inverse = prime
            .invert(d)
            .map_err(|_| Error::InternalInvariant("element prime divides the private exponent"))?;
        let value = self
            .z
            .clone()
            .pow_mod(&inverse, &self.n)
            .expect("inverted exponent is non-negative");
        Ok(Witness {
            element,
            nonce,
            value,
        })
    }

    /// Check a witness against the current accumulation.
    #[must_use]
    pub fn verify(&self, witness: &Witness) -> bool {
        let prime = match hash_to_prime::witness_prime(
            self.hasher.as_ref(),
            &witness.element,
            &witness.nonce,
        ) {
            Ok(prime) => prime,
            Err(_) => return false,
        };
        let lifted = witness
            .value
            .clone()
            .pow_mod(&prime, &self.n)
            .expect("element prime is non-negative");
        lifted == self.z
    }

    /// The public modulus.
    pub fn public_key(&self) -> &Integer {
        &self.n
    }

    /// The current accumulation.
    pub fn value(&self) -> &Integer {
        &self.z
    }

    /// Overwrite the accumulation with a value published by the holder.
    ///
    /// This is how a verify-only accumulator tracks the holder's state
    /// trajectory.
    pub fn set_value(&mut self, z: Integer) -> Result<(), Error> {
        if z < 1u32 || z >= self.n {
            return Err(Error::BadArgument("accumulation out of range"));
        }
        self.z = z;
        Ok(())
    }

    /// Whether this accumulator holds the private exponent.
    pub fn is_trusted(&self) -> bool {
        self.d.is_some()
    }

    /// Serialisable reconstruction record. Only accumulators whose hasher
    /// was resolved from an identifier can be snapshotted.
    pub fn snapshot(&self) -> Result<Snapshot, Error> {
        let digest = self
            .hasher
            .name()
            .ok_or(Error::BadArgument("digest has no stable identifier"))?;
        Ok(Snapshot {
            digest: digest.to_owned(),
            modulus: self.n.clone(),
            primes: self.primes.as_ref().map(|primes| SnapshotPrimes {
                p: primes.p().clone(),
                q: primes.q().clone(),
            }),
            accumulation: self.z.clone(),
        })
    }

    /// Rebuild an accumulator from a snapshot, revalidating its contents.
    pub fn restore(snapshot: &Snapshot) -> Result<Self, Error> {
        let hasher = named_hasher(&snapshot.digest)?;
        let mut accumulator = match &snapshot.primes {
            Some(parts) => {
                let primes = RsaPrimes::from_parts(parts.p.clone(), parts.q.clone())?;
                if primes.modulus() != snapshot.modulus {
                    return Err(Error::BadArgument("modulus does not match the prime factors"));
                }
                Self::with_private_key(hasher, primes)?
            }
            None => Self::with_public_key(hasher, snapshot.modulus.clone())?,
        };
        accumulator.set_value(snapshot.accumulation.clone())?;
        Ok(accumulator)
    }

    pub(crate) fn hasher(&self) -> &Arc<dyn ElementHasher> {
        &self.hasher
    }
}

impl fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accumulator")
            .field("digest", &self.hasher.name())
            .field("modulus_bits", &self.n.significant_bits())
            .field("trusted", &self.d.is_some())
            .field("accumulation", &self.z)
            .finish()
    }
}

fn check_hasher(hasher: &dyn ElementHasher) -> Result<(), Error> {
    if hasher.digest(&[]).len() * 8 < PRIME_BITS as usize {
        return Err(Error::BadArgument("digest narrower than the element prime bound"));
    }
    Ok(())
}

/// A membership witness: the element, the nonce recovering its prime, and
/// the witness value `w` with `w^prime = accumulation (mod n)`.
///
/// Witnesses are self-contained values; refreshing one through an
/// [`Update`](crate::Update) yields a new witness and leaves the original
/// untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    element: Vec<u8>,
    #[serde(with = "crate::serde_int")]
    nonce: Integer,
    #[serde(with = "crate::serde_int")]
    value: Integer,
}

impl Witness {
    pub fn new(element: impl Into<Vec<u8>>, nonce: Integer, value: Integer) -> Self {
        Self {
            element: element.into(),
            nonce,
            value,
        }
    }

    pub fn element(&self) -> &[u8] {
        &self.element
    }

    pub fn nonce(&self) -> &Integer {
        &self.nonce
    }

    pub fn value(&self) -> &Integer {
        &self.value
    }

    /// Replace the witness value, e.g. with an accumulation saved from
    /// before a batch this witness's element was added in.
    pub fn set_value(&mut self, value: Integer) {
        self.value = value;
    }
}

/// Everything needed to reconstruct an [`Accumulator`]: digest identifier,
/// modulus, the factorisation when the holder is snapshotting, and the
/// accumulation. Integers serialise as unsigned big-endian bytes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub digest: String,
    #[serde(with = "crate::serde_int")]
    pub modulus: Integer,
    pub primes: Option<SnapshotPrimes>,
    #[serde(with = "crate::serde_int")]
    pub accumulation: Integer,
}

/// The factor pair carried by a holder's [`Snapshot`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotPrimes {
    #[serde(with = "crate::serde_int")]
    pub p: Integer,
    #[serde(with = "crate::serde_int")]
    pub q: Integer,
}
