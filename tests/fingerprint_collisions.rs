// tests/fingerprint_collisions.rs
use std::collections::HashSet;

use rand::distr::Alphanumeric;
use rand::Rng;

use tnp_monitor::fingerprint::Fingerprint;

#[test]
fn distinct_payloads_do_not_collide_over_large_sample() {
    let mut rng = rand::rng();
    let mut digests: HashSet<Fingerprint> = HashSet::new();

    for i in 0..10_000 {
        let noise: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        // The index guarantees payloads are pairwise distinct even if the
        // random suffix repeats.
        let payload = format!("item-{i}-{noise}");
        assert!(
            digests.insert(Fingerprint::of_payload(&payload)),
            "collision at sample {i}"
        );
    }

    assert_eq!(digests.len(), 10_000);
}

#[test]
fn same_payload_same_digest() {
    let a = Fingerprint::of_payload("Title: Campus Drive\nLink: /n/1");
    let b = Fingerprint::of_payload("Title: Campus Drive\nLink: /n/1");
    assert_eq!(a, b);
}
