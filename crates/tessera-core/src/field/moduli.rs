//! The four moduli Tessera instantiates.
//!
//! Base fields carry curve coordinates; group orders carry scalars. Each is a
//! zero-sized marker, so elements of different moduli are distinct types.

use super::{Modulus, SpecialForm};
use crate::uint::U256;

/// Curve25519 base field, `p = 2^255 - 19`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Curve25519Base;

impl Modulus for Curve25519Base {
    const NAME: &'static str = "curve25519-base";
    const MODULUS: U256 = U256::from_limbs([
        0xffffffffffffffed,
        0xffffffffffffffff,
        0xffffffffffffffff,
        0x7fffffffffffffff,
    ]);
    const BITS: u32 = 255;
    const FOLD: U256 = U256::from_u64(19);
    const FORM: SpecialForm = SpecialForm::Minus;
}

/// Ed25519 prime-order subgroup, `L = 2^252 + 27742317777372353535851937790883648493`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ed25519Order;

impl Modulus for Ed25519Order {
    const NAME: &'static str = "ed25519-order";
    const MODULUS: U256 = U256::from_limbs([
        0x5812631a5cf5d3ed,
        0x14def9dea2f79cd6,
        0x0000000000000000,
        0x1000000000000000,
    ]);
    const BITS: u32 = 252;
    const FOLD: U256 = U256::from_limbs([0x5812631a5cf5d3ed, 0x14def9dea2f79cd6, 0, 0]);
    const FORM: SpecialForm = SpecialForm::Plus;
}

/// secp256k1 base field, `p = 2^256 - 2^32 - 977`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Secp256k1Base;

impl Modulus for Secp256k1Base {
    const NAME: &'static str = "secp256k1-base";
    const MODULUS: U256 = U256::from_limbs([
        0xfffffffefffffc2f,
        0xffffffffffffffff,
        0xffffffffffffffff,
        0xffffffffffffffff,
    ]);
    const BITS: u32 = 256;
    const FOLD: U256 = U256::from_u64(0x1000003d1);
    const FORM: SpecialForm = SpecialForm::Minus;
}

/// secp256k1 group order `n`; `2^256 - n` is a 129-bit constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Secp256k1Order;

impl Modulus for Secp256k1Order {
    const NAME: &'static str = "secp256k1-order";
    const MODULUS: U256 = U256::from_limbs([
        0xbfd25e8cd0364141,
        0xbaaedce6af48a03b,
        0xfffffffffffffffe,
        0xffffffffffffffff,
    ]);
    const BITS: u32 = 256;
    const FOLD: U256 = U256::from_limbs([0x402da1732fc9bebf, 0x4551231950b75fc4, 1, 0]);
    const FORM: SpecialForm = SpecialForm::Minus;
}

/// Curve25519 base field element.
pub type Fe25519 = super::Fp<Curve25519Base>;
/// secp256k1 base field element.
pub type FeSecp256k1 = super::Fp<Secp256k1Base>;
/// Ed25519 scalar.
pub type Scalar25519 = super::Fp<Ed25519Order>;
/// secp256k1 scalar.
pub type ScalarSecp256k1 = super::Fp<Secp256k1Order>;

#[cfg(test)]
mod tests {
    use super::*;

    fn check_form<M: Modulus>() {
        let two_k = if M::BITS == 256 {
            None
        } else {
            let mut limbs = [0u64; 4];
            limbs[(M::BITS / 64) as usize] = 1u64 << (M::BITS % 64);
            Some(U256::from_limbs(limbs))
        };
        match (M::FORM, two_k) {
            (SpecialForm::Minus, Some(pow)) => {
                assert_eq!(M::MODULUS.wrapping_add(&M::FOLD), pow, "{}", M::NAME)
            }
            (SpecialForm::Minus, None) => {
                // 2^256 - c wraps to zero when c is added back
                assert!(M::MODULUS.wrapping_add(&M::FOLD).is_zero(), "{}", M::NAME)
            }
            (SpecialForm::Plus, Some(pow)) => {
                assert_eq!(M::MODULUS.wrapping_sub(&M::FOLD), pow, "{}", M::NAME)
            }
            (SpecialForm::Plus, None) => unreachable!("no plus-form modulus at 2^256"),
        }
    }

    #[test]
    fn test_modulus_forms_consistent() {
        check_form::<Curve25519Base>();
        check_form::<Ed25519Order>();
        check_form::<Secp256k1Base>();
        check_form::<Secp256k1Order>();
    }
}
