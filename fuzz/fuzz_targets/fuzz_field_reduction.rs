#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tessera_core::field::{Curve25519Base, Ed25519Order, Secp256k1Base, Secp256k1Order};
use tessera_core::{Fp, Modulus};

#[derive(Debug, Arbitrary)]
struct Input {
    a: [u8; 32],
    b: [u8; 32],
    wide: [[u8; 32]; 2],
}

fn check<M: Modulus>(input: &Input) {
    let mut wide = [0u8; 64];
    wide[..32].copy_from_slice(&input.wide[0]);
    wide[32..].copy_from_slice(&input.wide[1]);
    let w = Fp::<M>::from_bytes_wide(&wide);
    // Reduced values always re-parse as canonical
    assert_eq!(Fp::<M>::from_le_bytes(&w.to_le_bytes()).ok(), Some(w));

    let (Ok(a), Ok(b)) = (Fp::<M>::from_le_bytes(&input.a), Fp::<M>::from_le_bytes(&input.b))
    else {
        return;
    };

    assert_eq!(a * b, b * a);
    assert_eq!((a + b) - b, a);
    assert_eq!(a * (b + w), a * b + a * w);
    assert_eq!(a.square(), a * a);
    if let Ok(inv) = a.invert() {
        assert_eq!(a * inv, Fp::<M>::ONE);
    } else {
        assert!(a.is_zero());
    }
}

fuzz_target!(|input: Input| {
    check::<Curve25519Base>(&input);
    check::<Secp256k1Base>(&input);
    check::<Ed25519Order>(&input);
    check::<Secp256k1Order>(&input);
});
