//! Ed25519 group in extended twisted Edwards coordinates.
//!
//! Curve: `-x^2 + y^2 = 1 + d·x^2·y^2` over `2^255 - 19`.
//! A point `(X, Y, Z, T)` represents affine `(X/Z, Y/Z)` with `T = XY/Z`.
//! Addition and doubling follow RFC 8032 §5.1.4; the addition formula is
//! complete, so it also handles the identity and `P + P`.

use super::{mul_vartime_u256, CurvePoint, Group};
use crate::error::{CoreError, Result};
use crate::field::{Ed25519Order, Fe25519, Modulus};
use crate::uint::U256;

/// `d = -121665/121666`
const D: Fe25519 = Fe25519::from_reduced(U256::from_limbs([
    0x75eb4dca135978a3,
    0x00700a4d4141d8ab,
    0x8cc740797779e898,
    0x52036cee2b6ffe73,
]));

/// `2d`
const D2: Fe25519 = Fe25519::from_reduced(U256::from_limbs([
    0xebd69b9426b2f159,
    0x00e0149a8283b156,
    0x198e80f2eef3d130,
    0x2406d9dc56dffce7,
]));

/// `sqrt(-1) = 2^((p-1)/4)`
const SQRT_M1: Fe25519 = Fe25519::from_reduced(U256::from_limbs([
    0xc4ee1b274a0ea0b0,
    0x2f431806ad2fe478,
    0x2b4d00993dfbd7a7,
    0x2b8324804fc1df0b,
]));

/// `(p - 5) / 8`, the exponent of the combined square-root/inverse.
const P_MINUS_5_DIV_8: U256 = U256::from_limbs([
    0xfffffffffffffffd,
    0xffffffffffffffff,
    0xffffffffffffffff,
    0x0fffffffffffffff,
]);

const BASE_X: Fe25519 = Fe25519::from_reduced(U256::from_limbs([
    0xc9562d608f25d51a,
    0x692cc7609525a7b2,
    0xc0a4e231fdd6dc5c,
    0x216936d3cd6e53fe,
]));

const BASE_Y: Fe25519 = Fe25519::from_reduced(U256::from_limbs([
    0x6666666666666658,
    0x6666666666666666,
    0x6666666666666666,
    0x6666666666666666,
]));

const BASE_T: Fe25519 = Fe25519::from_reduced(U256::from_limbs([
    0x6dde8ab3a5b7dda3,
    0x20f09f80775152f5,
    0x66ea4e8e64abe37d,
    0x67875f0fd78b7665,
]));

/// Ed25519 cipher suite marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ed25519;

impl Group for Ed25519 {
    type Order = Ed25519Order;
    type Point = EdwardsPoint;
    const NAME: &'static str = "ed25519";
}

/// Point in extended coordinates.
#[derive(Clone, Copy)]
pub struct EdwardsPoint {
    x: Fe25519,
    y: Fe25519,
    z: Fe25519,
    t: Fe25519,
}

impl EdwardsPoint {
    pub const IDENTITY: Self = Self {
        x: Fe25519::ZERO,
        y: Fe25519::ONE,
        z: Fe25519::ONE,
        t: Fe25519::ZERO,
    };

    pub const BASEPOINT: Self = Self {
        x: BASE_X,
        y: BASE_Y,
        z: Fe25519::ONE,
        t: BASE_T,
    };

    /// Affine coordinates `(x, y)`.
    pub fn to_affine(&self) -> (Fe25519, Fe25519) {
        // Z is never zero for points produced by the formulas below.
        let z_inv = self.z.invert().unwrap_or(Fe25519::ZERO);
        (self.x * z_inv, self.y * z_inv)
    }

    /// True when the point lies in the prime-order subgroup.
    pub fn is_torsion_free(&self) -> bool {
        mul_vartime_u256(self, &Ed25519Order::MODULUS).is_identity()
    }

    /// Recover `x` from `y` and the sign bit (RFC 8032 §5.1.3).
    fn recover_x(y: &Fe25519, sign: u8) -> Result<Fe25519> {
        let y2 = y.square();
        let u = y2 - Fe25519::ONE;
        let v = D * y2 + Fe25519::ONE;

        let v3 = v.square() * v;
        let v7 = v3.square() * v;
        let mut x = u * v3 * (u * v7).pow(&P_MINUS_5_DIV_8);

        let vx2 = v * x.square();
        if vx2 == u {
            // x is already a root
        } else if vx2 == -u {
            x *= SQRT_M1;
        } else {
            return Err(CoreError::malformed("ed25519 point", "no square root for x^2"));
        }

        if x.is_zero() && sign == 1 {
            return Err(CoreError::malformed("ed25519 point", "negative zero x"));
        }
        if x.is_odd() as u8 != sign {
            x = -x;
        }
        Ok(x)
    }
}

impl CurvePoint for EdwardsPoint {
    type Order = Ed25519Order;
    const ENCODED_LEN: usize = 32;

    fn identity() -> Self {
        Self::IDENTITY
    }

    fn generator() -> Self {
        Self::BASEPOINT
    }

    fn add(&self, rhs: &Self) -> Self {
        let a = (self.y - self.x) * (rhs.y - rhs.x);
        let b = (self.y + self.x) * (rhs.y + rhs.x);
        let c = self.t * D2 * rhs.t;
        let d = self.z.double() * rhs.z;
        let e = b - a;
        let f = d - c;
        let g = d + c;
        let h = b + a;
        Self {
            x: e * f,
            y: g * h,
            z: f * g,
            t: e * h,
        }
    }

    fn double(&self) -> Self {
        let a = self.x.square();
        let b = self.y.square();
        let c = self.z.square().double();
        let h = a + b;
        let e = h - (self.x + self.y).square();
        let g = a - b;
        let f = c + g;
        Self {
            x: e * f,
            y: g * h,
            z: f * g,
            t: e * h,
        }
    }

    fn negate(&self) -> Self {
        Self {
            x: -self.x,
            y: self.y,
            z: self.z,
            t: -self.t,
        }
    }

    fn conditional_select(a: &Self, b: &Self, choice: u64) -> Self {
        Self {
            x: Fe25519::conditional_select(&a.x, &b.x, choice),
            y: Fe25519::conditional_select(&a.y, &b.y, choice),
            z: Fe25519::conditional_select(&a.z, &b.z, choice),
            t: Fe25519::conditional_select(&a.t, &b.t, choice),
        }
    }

    fn encode(&self) -> Vec<u8> {
        let (x, y) = self.to_affine();
        let mut bytes = y.to_le_bytes();
        bytes[31] |= (x.is_odd() as u8) << 7;
        bytes.to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::malformed("ed25519 point", format!("expected 32 bytes, got {}", bytes.len()))
        })?;

        let sign = bytes[31] >> 7;
        let mut y_bytes = bytes;
        y_bytes[31] &= 0x7f;
        let y = Fe25519::from_le_bytes(&y_bytes)?;
        let x = Self::recover_x(&y, sign)?;

        let point = Self {
            x,
            y,
            z: Fe25519::ONE,
            t: x * y,
        };
        if !point.is_torsion_free() {
            return Err(CoreError::malformed("ed25519 point", "not in the prime-order subgroup"));
        }
        Ok(point)
    }
}

impl PartialEq for EdwardsPoint {
    fn eq(&self, other: &Self) -> bool {
        self.x * other.z == other.x * self.z && self.y * other.z == other.y * self.z
    }
}

impl Eq for EdwardsPoint {}

impl std::fmt::Debug for EdwardsPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EdwardsPoint({})", hex::encode(self.encode()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basepoint_encoding() {
        // RFC 8032 base point
        assert_eq!(
            hex::encode(EdwardsPoint::BASEPOINT.encode()),
            "5866666666666666666666666666666666666666666666666666666666666666"
        );
    }

    #[test]
    fn test_basepoint_on_curve() {
        let (x, y) = EdwardsPoint::BASEPOINT.to_affine();
        let x2 = x.square();
        let y2 = y.square();
        assert_eq!(-x2 + y2, Fe25519::ONE + D * x2 * y2);
        assert_eq!(BASE_X * BASE_Y, BASE_T);
    }

    #[test]
    fn test_identity_encoding() {
        let bytes = EdwardsPoint::IDENTITY.encode();
        assert_eq!(bytes[0], 1);
        assert!(bytes[1..].iter().all(|b| *b == 0));
        assert!(EdwardsPoint::decode(&bytes).unwrap().is_identity());
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        assert!(EdwardsPoint::decode(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_decode_rejects_non_canonical_y() {
        // y = p encodes as 0xed ff .. 7f
        let mut bytes = [0xffu8; 32];
        bytes[0] = 0xed;
        bytes[31] = 0x7f;
        assert!(EdwardsPoint::decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_small_order_point() {
        // (0, -1) has order 2
        let minus_one = -Fe25519::ONE;
        let bytes = minus_one.to_le_bytes();
        assert!(EdwardsPoint::decode(&bytes).is_err());
    }

    #[test]
    fn test_basepoint_torsion_free() {
        assert!(EdwardsPoint::BASEPOINT.is_torsion_free());
    }
}
