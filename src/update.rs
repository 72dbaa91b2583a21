//! Batched witness updates.
//!
//! An [`Update`] is opened against an accumulator snapshot and absorbs the
//! primes of a batch of additions and deletions as two running products. Any
//! witness that survived the batch is refreshed with a single extended GCD
//! and two exponentiations, independently of the batch size, and without the
//! private exponent: holders publish updates, members refresh on their own.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rug::Integer;
use serde::{Deserialize, Serialize};

use crate::accumulator::{Accumulator, Witness};
use crate::hash_to_prime::{self, ElementHasher};
use crate::Error;

/// Aggregated additions and deletions, applied to witnesses in O(1).
///
/// ```
/// use rsacc::{named_hasher, Accumulator, RsaPrimes, Update};
/// use rug::Integer;
///
/// let primes = RsaPrimes::from_parts(Integer::from(61), Integer::from(53))?;
/// let mut acc = Accumulator::with_private_key(named_hasher("sha-256")?, primes)?;
///
/// acc.add("old")?;
/// let kept = acc.add("kept")?;
///
/// // A batch the holder applies: delete "old", add "new".
/// let deleted = acc.prove("old")?;
/// acc.del(&deleted)?;
/// let added = acc.add("new")?;
///
/// // Publish the batch; "kept" refreshes without the private key.
/// let mut update = Update::new(&acc);
/// update.absorb_del(&deleted)?;
/// update.absorb_add(&added)?;
/// assert!(!acc.verify(&kept));
/// let kept = update.apply(&kept)?;
/// assert!(acc.verify(&kept));
/// # Ok::<(), rsacc::Error>(())
/// ```
#[derive(Clone)]
pub struct Update {
    hasher: Arc<dyn ElementHasher>,
    n: Integer,
    z: Integer,
    pi_a: Integer,
    pi_d: Integer,
}

impl Update {
    /// Open an update against the accumulator's current state.
    ///
    /// The snapshot must be taken once the batch it will absorb has been
    /// applied to the accumulator.
    pub fn new(accumulator: &Accumulator) -> Self {
        Self {
            hasher: accumulator.hasher().clone(),
            n: accumulator.public_key().clone(),
            z: accumulator.value().clone(),
            pi_a: Integer::from(1),
            pi_d: Integer::from(1),
        }
    }

    /// Absorb an addition.
    pub fn absorb_add(&mut self, witness: &Witness) -> Result<(), Error> {
        let prime = self.prime(witness)?;
        self.pi_a *= prime;
        Ok(())
    }

    /// Absorb a deletion.
    pub fn absorb_del(&mut self, witness: &Witness) -> Result<(), Error> {
        let prime = self.prime(witness)?;
        self.pi_d *= prime;
        Ok(())
    }

    /// Remove a previously absorbed addition.
    pub fn undo_add(&mut self, witness: &Witness) -> Result<(), Error> {
        let prime = self.prime(witness)?;
        if !self.pi_a.is_divisible(&prime) {
            return Err(Error::InvalidDivision);
        }
        self.pi_a.div_exact_mut(&prime);
        Ok(())
    }

    /// Remove a previously absorbed deletion.
    pub fn undo_del(&mut self, witness: &Witness) -> Result<(), Error> {
        let prime = self.prime(witness)?;
        if !self.pi_d.is_divisible(&prime) {
            return Err(Error::InvalidDivision);
        }
        self.pi_d.div_exact_mut(&prime);
        Ok(())
    }

    /// Refresh a witness through the absorbed batch.
    ///
    /// Read-only: applying the same update to many witnesses, or the same
    /// witness repeatedly, is fine. The input witness must have been valid
    /// just before the batch, and its own element must not be among the
    /// absorbed deletions; either misuse yields a witness that fails
    /// verification (see [`apply_verified`](Update::apply_verified)).
    pub fn apply(&self, witness: &Witness) -> Result<Witness, Error> {
        let prime = self.prime(witness)?;
        let (_, a, b) = Integer::extended_gcd(self.pi_d.clone(), prime, Integer::new());
        let exponent = a * &self.pi_a;
        // Bezout cofactors may be negative; pow_mod then inverts the base.
        let lifted = witness
            .value()
            .clone()
            .pow_mod(&exponent, &self.n)
            .map_err(|_| Error::InternalInvariant("witness value is not invertible"))?;
        let correction = self
            .z
            .clone()
            .pow_mod(&b, &self.n)
            .map_err(|_| Error::InternalInvariant("accumulation is not invertible"))?;
        let value = lifted * correction % &self.n;
        Ok(Witness::new(
            witness.element().to_vec(),
            witness.nonce().clone(),
            value,
        ))
    }

    /// Refresh a witness and check it against the snapshot.
    ///
    /// Catches a witness computed against a different accumulation than the
    /// one this update was opened from.
    pub fn apply_verified(&self, witness: &Witness) -> Result<Witness, Error> {
        let refreshed = self.apply(witness)?;
        let prime = self.prime(&refreshed)?;
        let lifted = refreshed
            .value()
            .clone()
            .pow_mod(&prime, &self.n)
            .expect("element prime is non-negative");
        if lifted != self.z {
            return Err(Error::UpdateMismatch);
        }
        Ok(refreshed)
    }

    /// Refresh whole witness batches in place.
    ///
    /// `additions` holds witnesses for elements absorbed into this update as
    /// additions, each carrying the accumulation from before the batch as
    /// its value; every one is refreshed with its own prime first undone.
    /// `retained` holds witnesses for elements the batch did not touch.
    pub fn refresh_all(
        &self,
        additions: &mut [Witness],
        retained: &mut [Witness],
    ) -> Result<(), Error> {
        retained.par_iter_mut().try_for_each(|witness| {
            *witness = self.apply(witness)?;
            Ok(())
        })?;
        additions.par_iter_mut().try_for_each(|witness| {
            let mut narrowed = self.clone();
            narrowed.undo_add(witness)?;
            *witness = narrowed.apply(witness)?;
            Ok(())
        })
    }

    /// The accumulation this update was opened against.
    pub fn accumulation(&self) -> &Integer {
        &self.z
    }

    /// Serialisable form of this update's aggregate state.
    pub fn to_record(&self) -> UpdateRecord {
        UpdateRecord {
            modulus: self.n.clone(),
            accumulation: self.z.clone(),
            additions_product: self.pi_a.clone(),
            deletions_product: self.pi_d.clone(),
        }
    }

    /// Rebuild an update from a record, pairing it with a digest capability.
    pub fn from_record(hasher: Arc<dyn ElementHasher>, record: UpdateRecord) -> Result<Self, Error> {
        if record.modulus <= 1u32 || record.modulus.is_even() {
            return Err(Error::BadArgument("modulus must be an odd composite"));
        }
        if record.additions_product < 1u32 || record.deletions_product < 1u32 {
            return Err(Error::BadArgument("aggregate products must be positive"));
        }
        Ok(Self {
            hasher,
            n: record.modulus,
            z: record.accumulation,
            pi_a: record.additions_product,
            pi_d: record.deletions_product,
        })
    }

    fn prime(&self, witness: &Witness) -> Result<Integer, Error> {
        hash_to_prime::witness_prime(self.hasher.as_ref(), witness.element(), witness.nonce())
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update")
            .field("modulus_bits", &self.n.significant_bits())
            .field("accumulation", &self.z)
            .field("additions_product", &self.pi_a)
            .field("deletions_product", &self.pi_d)
            .finish()
    }
}

/// The wire shape of an [`Update`]: modulus, snapshot accumulation, and the
/// two aggregate prime products, all as unsigned big-endian bytes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateRecord {
    #[serde(with = "crate::serde_int")]
    pub modulus: Integer,
    #[serde(with = "crate::serde_int")]
    pub accumulation: Integer,
    #[serde(with = "crate::serde_int")]
    pub additions_product: Integer,
    #[serde(with = "crate::serde_int")]
    pub deletions_product: Integer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_to_prime::named_hasher;
    use crate::keygen::RsaPrimes;
    use once_cell::sync::Lazy;

    static PRIMES: Lazy<RsaPrimes> = Lazy::new(|| {
        RsaPrimes::from_parts(
            Integer::parse("328251084838005976127170421218841636543")
                .unwrap()
                .into(),
            Integer::parse("190766607836256563787680866036037599313")
                .unwrap()
                .into(),
        )
        .unwrap()
    });

    fn holder() -> Accumulator {
        Accumulator::with_private_key(named_hasher("sha-256").unwrap(), PRIMES.clone()).unwrap()
    }

    #[test]
    fn refresh_after_single_addition() {
        let mut acc = holder();
        let w1 = acc.add("1").unwrap();
        let w2 = acc.add("2").unwrap();

        let mut update = Update::new(&acc);
        update.absorb_add(&w2).unwrap();
        let refreshed = update.apply(&w1).unwrap();
        assert!(!acc.verify(&w1));
        assert!(acc.verify(&refreshed));

        // The degenerate batch is just exponentiation by the added prime.
        let prime = hash_to_prime::witness_prime(
            named_hasher("sha-256").unwrap().as_ref(),
            w2.element(),
            w2.nonce(),
        )
        .unwrap();
        let direct = w1.value().clone().pow_mod(&prime, acc.public_key()).unwrap();
        assert_eq!(refreshed.value(), &direct);
    }

    #[test]
    fn refresh_after_mixed_batch() {
        let mut acc = holder();
        acc.add("doomed").unwrap();
        let kept = acc.add("kept").unwrap();

        // Batch: delete "doomed", add "fresh".
        let deleted_now = acc.prove("doomed").unwrap();
        acc.del(&deleted_now).unwrap();
        let added = acc.add("fresh").unwrap();

        let mut update = Update::new(&acc);
        update.absorb_del(&deleted_now).unwrap();
        update.absorb_add(&added).unwrap();

        let refreshed = update.apply(&kept).unwrap();
        assert!(!acc.verify(&kept));
        assert!(acc.verify(&refreshed));
    }

    #[test]
    fn apply_verified_detects_stale_snapshot() {
        let mut acc = holder();
        let w1 = acc.add("1").unwrap();
        let stale = Update::new(&acc);

        let w2 = acc.add("2").unwrap();
        let mut update = Update::new(&acc);
        update.absorb_add(&w2).unwrap();

        assert!(update.apply_verified(&w1).is_ok());
        // w2 was issued after the stale snapshot was taken.
        assert_eq!(stale.apply_verified(&w2).unwrap_err(), Error::UpdateMismatch);
    }

    #[test]
    fn undo_reverses_absorb() {
        let mut acc = holder();
        let w1 = acc.add("1").unwrap();
        let w2 = acc.add("2").unwrap();

        let mut update = Update::new(&acc);
        update.absorb_add(&w2).unwrap();
        update.undo_add(&w2).unwrap();
        // Nothing absorbed: applying is the identity.
        assert_eq!(update.apply(&w1).unwrap(), w1);

        assert_eq!(update.undo_add(&w2).unwrap_err(), Error::InvalidDivision);
        assert_eq!(update.undo_del(&w2).unwrap_err(), Error::InvalidDivision);
    }

    #[test]
    fn refresh_all_handles_both_kinds() {
        let mut acc = holder();
        let mut retained = vec![acc.add("a").unwrap(), acc.add("b").unwrap()];
        let before_batch = acc.value().clone();

        let doomed = acc.prove("a").unwrap();
        acc.del(&doomed).unwrap();
        retained.remove(0);

        let mut additions = vec![acc.add("c").unwrap(), acc.add("d").unwrap()];
        // Addition witnesses refresh from the pre-batch accumulation.
        for witness in &mut additions {
            witness.set_value(before_batch.clone());
        }

        let mut update = Update::new(&acc);
        update.absorb_del(&doomed).unwrap();
        for witness in &additions {
            update.absorb_add(witness).unwrap();
        }

        update.refresh_all(&mut additions, &mut retained).unwrap();
        for witness in retained.iter().chain(additions.iter()) {
            assert!(acc.verify(witness));
        }
    }

    #[test]
    fn from_record_validates() {
        let acc = holder();
        let hasher = named_hasher("sha-256").unwrap();

        let mut record = Update::new(&acc).to_record();
        record.modulus = Integer::from(10);
        assert_eq!(
            Update::from_record(hasher.clone(), record).unwrap_err(),
            Error::BadArgument("modulus must be an odd composite")
        );

        let mut record = Update::new(&acc).to_record();
        record.deletions_product = Integer::from(0);
        assert_eq!(
            Update::from_record(hasher, record).unwrap_err(),
            Error::BadArgument("aggregate products must be positive")
        );
    }

    #[test]
    fn record_round_trips() {
        let mut acc = holder();
        let w1 = acc.add("1").unwrap();
        let w2 = acc.add("2").unwrap();
        let mut update = Update::new(&acc);
        update.absorb_add(&w2).unwrap();

        let encoded = serde_json::to_string(&update.to_record()).unwrap();
        let decoded: UpdateRecord = serde_json::from_str(&encoded).unwrap();
        let rebuilt = Update::from_record(named_hasher("sha-256").unwrap(), decoded).unwrap();
        assert!(acc.verify(&rebuilt.apply(&w1).unwrap()));
    }
}
