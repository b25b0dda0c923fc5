//! secp256k1 in homogeneous projective coordinates.
//!
//! Curve: `y^2 = x^3 + 7` over `2^256 - 2^32 - 977`. Point `(X, Y, Z)`
//! represents affine `(X/Z, Y/Z)`; the identity is `(0, 1, 0)`.
//!
//! Addition and doubling use the complete formulas of Renes, Costello and
//! Batina (ePrint 2015/1060, algorithms 7 and 9 with `a = 0`), which are
//! valid for every pair of inputs including the identity and `P + P`.

use super::{CurvePoint, Group};
use crate::error::{CoreError, Result};
use crate::field::{FeSecp256k1, Secp256k1Order};
use crate::uint::U256;

/// `3 * b` with `b = 7`.
const B3: FeSecp256k1 = FeSecp256k1::from_reduced(U256::from_u64(21));

const B: FeSecp256k1 = FeSecp256k1::from_reduced(U256::from_u64(7));

/// `(p + 1) / 4`; `p ≡ 3 mod 4`, so `a^((p+1)/4)` is a square root.
const SQRT_EXP: U256 = U256::from_limbs([
    0xffffffffbfffff0c,
    0xffffffffffffffff,
    0xffffffffffffffff,
    0x3fffffffffffffff,
]);

const GEN_X: FeSecp256k1 = FeSecp256k1::from_reduced(U256::from_limbs([
    0x59f2815b16f81798,
    0x029bfcdb2dce28d9,
    0x55a06295ce870b07,
    0x79be667ef9dcbbac,
]));

const GEN_Y: FeSecp256k1 = FeSecp256k1::from_reduced(U256::from_limbs([
    0x9c47d08ffb10d4b8,
    0xfd17b448a6855419,
    0x5da4fbfc0e1108a8,
    0x483ada7726a3c465,
]));

const TAG_EVEN: u8 = 0x02;
const TAG_ODD: u8 = 0x03;

/// secp256k1 cipher suite marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Secp256k1;

impl Group for Secp256k1 {
    type Order = Secp256k1Order;
    type Point = Secp256k1Point;
    const NAME: &'static str = "secp256k1";
}

/// Point in homogeneous projective coordinates.
#[derive(Clone, Copy)]
pub struct Secp256k1Point {
    x: FeSecp256k1,
    y: FeSecp256k1,
    z: FeSecp256k1,
}

impl Secp256k1Point {
    pub const IDENTITY: Self = Self {
        x: FeSecp256k1::ZERO,
        y: FeSecp256k1::ONE,
        z: FeSecp256k1::ZERO,
    };

    pub const GENERATOR: Self = Self {
        x: GEN_X,
        y: GEN_Y,
        z: FeSecp256k1::ONE,
    };

    /// Affine coordinates, or `None` for the identity.
    pub fn to_affine(&self) -> Option<(FeSecp256k1, FeSecp256k1)> {
        let z_inv = self.z.invert().ok()?;
        Some((self.x * z_inv, self.y * z_inv))
    }

    /// Affine `x` as 32 big-endian bytes (BIP-340 x-only form), or `None`
    /// for the identity.
    pub fn x_only(&self) -> Option<[u8; 32]> {
        self.to_affine().map(|(x, _)| x.to_be_bytes())
    }

    /// Whether the affine `y` is even. The identity counts as even.
    pub fn has_even_y(&self) -> bool {
        self.to_affine().map(|(_, y)| !y.is_odd()).unwrap_or(true)
    }

    /// The point with x-coordinate `x` and even `y`.
    pub fn lift_x(x: &[u8; 32]) -> Result<Self> {
        let mut bytes = [0u8; 33];
        bytes[0] = TAG_EVEN;
        bytes[1..].copy_from_slice(x);
        Self::decode(&bytes)
    }

    fn from_affine(x: FeSecp256k1, y: FeSecp256k1) -> Self {
        Self {
            x,
            y,
            z: FeSecp256k1::ONE,
        }
    }
}

impl CurvePoint for Secp256k1Point {
    type Order = Secp256k1Order;
    const ENCODED_LEN: usize = 33;

    fn identity() -> Self {
        Self::IDENTITY
    }

    fn generator() -> Self {
        Self::GENERATOR
    }

    fn add(&self, rhs: &Self) -> Self {
        let (x1, y1, z1) = (self.x, self.y, self.z);
        let (x2, y2, z2) = (rhs.x, rhs.y, rhs.z);

        let mut t0 = x1 * x2;
        let mut t1 = y1 * y2;
        let mut t2 = z1 * z2;
        let mut t3 = (x1 + y1) * (x2 + y2);
        let mut t4 = t0 + t1;
        t3 -= t4;
        t4 = (y1 + z1) * (y2 + z2);
        let mut x3 = t1 + t2;
        t4 -= x3;
        x3 = (x1 + z1) * (x2 + z2);
        let mut y3 = t0 + t2;
        y3 = x3 - y3;
        x3 = t0 + t0;
        t0 += x3;
        t2 *= B3;
        let mut z3 = t1 + t2;
        t1 -= t2;
        y3 *= B3;
        x3 = t4 * y3;
        t2 = t3 * t1;
        x3 = t2 - x3;
        y3 *= t0;
        t1 *= z3;
        y3 = t1 + y3;
        t0 *= t3;
        z3 *= t4;
        z3 += t0;

        Self {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    fn double(&self) -> Self {
        let (x, y, z) = (self.x, self.y, self.z);

        let mut t0 = y.square();
        let mut z3 = t0.double().double().double();
        let mut t1 = y * z;
        let mut t2 = z.square();
        t2 *= B3;
        let mut x3 = t2 * z3;
        let mut y3 = t0 + t2;
        z3 *= t1;
        t1 = t2.double();
        t2 += t1;
        t0 -= t2;
        y3 *= t0;
        y3 += x3;
        t1 = x * y;
        x3 = (t0 * t1).double();

        Self {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    fn negate(&self) -> Self {
        Self {
            x: self.x,
            y: -self.y,
            z: self.z,
        }
    }

    fn conditional_select(a: &Self, b: &Self, choice: u64) -> Self {
        Self {
            x: FeSecp256k1::conditional_select(&a.x, &b.x, choice),
            y: FeSecp256k1::conditional_select(&a.y, &b.y, choice),
            z: FeSecp256k1::conditional_select(&a.z, &b.z, choice),
        }
    }

    /// SEC1 compressed form. The identity has no affine form and is
    /// written as 33 zero bytes so every encoding has the same length.
    fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::ENCODED_LEN];
        if let Some((x, y)) = self.to_affine() {
            out[0] = if y.is_odd() { TAG_ODD } else { TAG_EVEN };
            out[1..].copy_from_slice(&x.to_be_bytes());
        }
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(CoreError::malformed(
                "secp256k1 point",
                format!("expected {} bytes, got {}", Self::ENCODED_LEN, bytes.len()),
            ));
        }
        if bytes.iter().all(|b| *b == 0) {
            return Ok(Self::IDENTITY);
        }

        let want_odd = match bytes[0] {
            TAG_EVEN => false,
            TAG_ODD => true,
            tag => {
                return Err(CoreError::malformed(
                    "secp256k1 point",
                    format!("unknown SEC1 tag {tag:#04x}"),
                ))
            }
        };

        let mut x_bytes = [0u8; 32];
        x_bytes.copy_from_slice(&bytes[1..]);
        let x = FeSecp256k1::from_be_bytes(&x_bytes)?;

        let rhs = x.square() * x + B;
        let mut y = rhs.pow(&SQRT_EXP);
        if y.square() != rhs {
            return Err(CoreError::malformed("secp256k1 point", "x is not on the curve"));
        }
        if y.is_odd() != want_odd {
            y = -y;
        }
        // Cofactor 1: every curve point is in the prime-order group.
        Ok(Self::from_affine(x, y))
    }
}

impl PartialEq for Secp256k1Point {
    fn eq(&self, other: &Self) -> bool {
        self.x * other.z == other.x * self.z && self.y * other.z == other.y * self.z
    }
}

impl Eq for Secp256k1Point {}

impl std::fmt::Debug for Secp256k1Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secp256k1Point({})", hex::encode(self.encode()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_on_curve() {
        let (x, y) = Secp256k1Point::GENERATOR.to_affine().unwrap();
        assert_eq!(y.square(), x.square() * x + B);
    }

    #[test]
    fn test_generator_encoding() {
        assert_eq!(
            hex::encode(Secp256k1Point::GENERATOR.encode()),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn test_identity_round_trip() {
        let bytes = Secp256k1Point::IDENTITY.encode();
        assert_eq!(bytes, vec![0u8; 33]);
        assert!(Secp256k1Point::decode(&bytes).unwrap().is_identity());
        assert!(Secp256k1Point::IDENTITY.to_affine().is_none());
    }

    #[test]
    fn test_identity_is_neutral_for_double() {
        assert!(Secp256k1Point::IDENTITY.double().is_identity());
        let g = Secp256k1Point::GENERATOR;
        assert!(g.add(&g.negate()).is_identity());
    }

    #[test]
    fn test_decode_rejects_bad_tag() {
        let mut bytes = Secp256k1Point::GENERATOR.encode();
        bytes[0] = 0x04;
        assert!(Secp256k1Point::decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_off_curve_x() {
        // x = 5: 5^3 + 7 = 132 is a non-residue mod p
        let mut bytes = vec![TAG_EVEN];
        bytes.extend_from_slice(&FeSecp256k1::from_u64(5).to_be_bytes());
        assert!(Secp256k1Point::decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_negated_generator() {
        let neg = Secp256k1Point::GENERATOR.negate();
        let bytes = neg.encode();
        assert_eq!(bytes[0], TAG_ODD);
        assert_eq!(Secp256k1Point::decode(&bytes).unwrap(), neg);
    }

    #[test]
    fn test_x_only_and_parity() {
        let g = Secp256k1Point::GENERATOR;
        let neg = g.negate();
        assert!(g.has_even_y());
        assert!(!neg.has_even_y());
        assert_eq!(g.x_only(), neg.x_only());
        assert_eq!(g.x_only().unwrap().as_slice(), &g.encode()[1..]);
        assert!(Secp256k1Point::IDENTITY.x_only().is_none());

        // lift_x always picks the even root
        let x = neg.x_only().unwrap();
        assert_eq!(Secp256k1Point::lift_x(&x).unwrap(), g);
        assert!(Secp256k1Point::lift_x(&FeSecp256k1::from_u64(5).to_be_bytes()).is_err());
    }
}
