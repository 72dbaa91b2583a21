//! End-to-end walkthroughs of the accumulator lifecycle against a fixed
//! 3072-bit modulus: issue, stale-out, refresh, delete, re-add, and
//! public-verifier import.

use once_cell::sync::Lazy;
use rug::Integer;

use rsacc::{named_hasher, Accumulator, Error, RsaPrimes, Update, Witness};

static PRIMES: Lazy<RsaPrimes> = Lazy::new(|| {
    let p: Integer = Integer::parse(
        "221644190467547948063315796089816841772999433548096645584981762543437322\
             171937281901866097126492079383436414557738157103432209278467580869478504\
             831337997235153074249768797452223668843824229580022051051250735866833819\
             885706806707469188324473726618087022884716069129162194784468606260407838\
             103978250004044495290436215616756514993704592239682956926454289932587133\
             844321297935723516952832009410449057150995150264946242732711020252043006\
             8151490665519874095755361508863",
    )
    .unwrap()
    .into();
    let q: Integer = Integer::parse(
        "193116791037272589936539426098069316206328906001381507523163830054729409\
             490287691087031082060624191881415424640240135102354252646003213271847235\
             856112351427344343011223082896168871102607948440159689687680342277989107\
             381555017268288810293905221605119452328034599612854692945915056160781728\
             021755450317999117910065671146670641712894885738476637341276961889785870\
             213308096584563754549816119670255352792525964403119022085458934551070419\
             4906472034279640472145783343479",
    )
    .unwrap()
    .into();
    RsaPrimes::from_parts(p, q).unwrap()
});

fn holder() -> Accumulator {
    Accumulator::with_private_key(named_hasher("sha-256").unwrap(), PRIMES.clone()).unwrap()
}

#[test]
fn modulus_has_the_default_length() {
    assert_eq!(PRIMES.modulus().significant_bits(), rsacc::MODULUS_BITS);
}

#[test]
fn add_verify() {
    let mut acc = holder();
    let w1 = acc.add("1").unwrap();
    assert!(acc.verify(&w1));
}

#[test]
fn second_add_stales_the_first_witness() {
    let mut acc = holder();
    let w1 = acc.add("1").unwrap();
    let w2 = acc.add("2").unwrap();
    assert!(!acc.verify(&w1));
    assert!(acc.verify(&w2));
}

#[test]
fn refresh_through_update() {
    let mut acc = holder();
    let w1 = acc.add("1").unwrap();
    let w2 = acc.add("2").unwrap();

    let mut update = Update::new(&acc);
    update.absorb_add(&w2).unwrap();
    let w1 = update.apply(&w1).unwrap();
    assert!(acc.verify(&w1));
}

#[test]
fn delete_invalidates_and_survivors_refresh() {
    let mut acc = holder();
    let w1 = acc.add("1").unwrap();
    let w2 = acc.add("2").unwrap();

    let mut update = Update::new(&acc);
    update.absorb_add(&w2).unwrap();
    let w1 = update.apply(&w1).unwrap();

    acc.del(&w1).unwrap();
    assert!(!acc.verify(&w1));

    let mut update = Update::new(&acc);
    update.absorb_del(&w1).unwrap();
    let w2 = update.apply(&w2).unwrap();
    assert!(acc.verify(&w2));
}

#[test]
fn readding_requires_a_fresh_witness() {
    let mut acc = holder();
    let w1 = acc.add("1").unwrap();
    let w2 = acc.add("2").unwrap();

    // Refresh w1 past w2's addition, then delete it.
    let mut update = Update::new(&acc);
    update.absorb_add(&w2).unwrap();
    let w1 = update.apply(&w1).unwrap();
    acc.del(&w1).unwrap();

    let mut deletion = Update::new(&acc);
    deletion.absorb_del(&w1).unwrap();

    // Re-add the element: only the newly issued witness verifies.
    let w1_new = acc.add("1").unwrap();
    assert!(acc.verify(&w1_new));

    let mut readdition = Update::new(&acc);
    readdition.absorb_add(&w1_new).unwrap();
    let stale = deletion.apply(&w1).unwrap();
    let stale = readdition.apply(&stale).unwrap();
    assert!(!acc.verify(&stale));
}

#[test]
fn public_verifier_parity() {
    let mut acc = holder();
    acc.add("1").unwrap();
    let w2 = acc.add("2").unwrap();

    let mut public =
        Accumulator::with_public_key(named_hasher("sha-256").unwrap(), acc.public_key().clone())
            .unwrap();
    public.set_value(acc.value().clone()).unwrap();

    // Witnesses travel: serialise on the holder side, import on the
    // verifier side.
    let imported: Witness =
        serde_json::from_str(&serde_json::to_string(&w2).unwrap()).unwrap();
    assert!(public.verify(&imported));
    assert_eq!(public.del(&imported).unwrap_err(), Error::SecretRequired);
}

#[test]
fn update_refresh_across_a_long_batch() {
    let mut acc = holder();
    let kept = acc.add("kept").unwrap();

    let mut added = Vec::new();
    for label in ["a", "b", "c", "d"] {
        added.push(acc.add(label).unwrap());
    }
    let mut update = Update::new(&acc);
    for witness in &added {
        update.absorb_add(witness).unwrap();
    }
    let kept_now = update.apply_verified(&kept).unwrap();
    assert!(acc.verify(&kept_now));

    // Applying the same batch twice walks the witness past the snapshot.
    assert_eq!(
        update.apply_verified(&kept_now).unwrap_err(),
        Error::UpdateMismatch
    );
}
