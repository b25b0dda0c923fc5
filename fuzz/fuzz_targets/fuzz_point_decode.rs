#![no_main]

use libfuzzer_sys::fuzz_target;
use tessera_core::{CurvePoint, EdwardsPoint, Secp256k1Point};

fn check<P: CurvePoint>(data: &[u8]) {
    // Arbitrary bytes must never panic
    if let Ok(point) = P::decode(data) {
        // Only canonical encodings are accepted
        assert_eq!(point.encode(), data);

        // Decoded points obey the group law
        assert_eq!(point.add(&point), point.double());
        assert!(point.add(&point.negate()).is_identity());
    }
}

fuzz_target!(|data: &[u8]| {
    check::<EdwardsPoint>(data);
    check::<Secp256k1Point>(data);

    // Also try the exact lengths so short inputs reach the curve checks
    if data.len() >= 33 {
        check::<EdwardsPoint>(&data[..32]);
        check::<Secp256k1Point>(&data[..33]);
    }
});
