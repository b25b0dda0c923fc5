//! Fixed-width unsigned integers backing field and scalar arithmetic.
//!
//! Both types store little-endian 64-bit limbs. Carry and borrow chains are
//! written out explicitly so the reduction code in [`crate::field`] can be
//! read limb by limb.

use std::cmp::Ordering;
use std::fmt;

/// Add with carry: returns `(a + b + carry) mod 2^64` and the outgoing carry.
#[inline(always)]
pub(crate) const fn adc(a: u64, b: u64, carry: u64) -> (u64, u64) {
    let t = (a as u128) + (b as u128) + (carry as u128);
    (t as u64, (t >> 64) as u64)
}

/// Subtract with borrow: returns `(a - b - borrow) mod 2^64` and the
/// outgoing borrow (0 or 1).
#[inline(always)]
pub(crate) const fn sbb(a: u64, b: u64, borrow: u64) -> (u64, u64) {
    let t = (a as u128).wrapping_sub((b as u128) + (borrow as u128));
    (t as u64, (t >> 127) as u64)
}

/// Multiply-accumulate: returns the low and high words of
/// `acc + a * b + carry`, which never overflows 128 bits.
#[inline(always)]
pub(crate) const fn mac(acc: u64, a: u64, b: u64, carry: u64) -> (u64, u64) {
    let t = (acc as u128) + (a as u128) * (b as u128) + (carry as u128);
    (t as u64, (t >> 64) as u64)
}

/// 256-bit unsigned integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct U256(pub(crate) [u64; 4]);

impl U256 {
    pub const ZERO: Self = Self([0; 4]);
    pub const ONE: Self = Self([1, 0, 0, 0]);

    /// Build from little-endian limbs.
    pub const fn from_limbs(limbs: [u64; 4]) -> Self {
        Self(limbs)
    }

    pub const fn from_u64(v: u64) -> Self {
        Self([v, 0, 0, 0])
    }

    /// Little-endian limbs.
    pub const fn limbs(&self) -> [u64; 4] {
        self.0
    }

    pub fn from_le_bytes(bytes: &[u8; 32]) -> Self {
        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
            *limb = u64::from_le_bytes(word);
        }
        Self(limbs)
    }

    pub fn to_le_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, limb) in self.0.iter().enumerate() {
            out[i * 8..(i + 1) * 8].copy_from_slice(&limb.to_le_bytes());
        }
        out
    }

    pub fn from_be_bytes(bytes: &[u8; 32]) -> Self {
        let mut le = *bytes;
        le.reverse();
        Self::from_le_bytes(&le)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = self.to_le_bytes();
        out.reverse();
        out
    }

    /// Bit `i` (0 = least significant) as 0 or 1.
    #[inline(always)]
    pub const fn bit(&self, i: usize) -> u64 {
        (self.0[i / 64] >> (i % 64)) & 1
    }

    /// Number of significant bits.
    pub fn bits(&self) -> u32 {
        for i in (0..4).rev() {
            if self.0[i] != 0 {
                return (i as u32) * 64 + (64 - self.0[i].leading_zeros());
            }
        }
        0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().fold(0u64, |acc, limb| acc | limb) == 0
    }

    /// `self + rhs`, returning the sum modulo 2^256 and the carry bit.
    pub fn adc(&self, rhs: &Self) -> (Self, u64) {
        let mut out = [0u64; 4];
        let mut carry = 0;
        for i in 0..4 {
            let (w, c) = adc(self.0[i], rhs.0[i], carry);
            out[i] = w;
            carry = c;
        }
        (Self(out), carry)
    }

    /// `self - rhs`, returning the difference modulo 2^256 and the borrow bit.
    pub fn sbb(&self, rhs: &Self) -> (Self, u64) {
        let mut out = [0u64; 4];
        let mut borrow = 0;
        for i in 0..4 {
            let (w, b) = sbb(self.0[i], rhs.0[i], borrow);
            out[i] = w;
            borrow = b;
        }
        (Self(out), borrow)
    }

    pub fn wrapping_add(&self, rhs: &Self) -> Self {
        self.adc(rhs).0
    }

    pub fn wrapping_sub(&self, rhs: &Self) -> Self {
        self.sbb(rhs).0
    }

    /// Full 512-bit product (schoolbook).
    pub fn mul_wide(&self, rhs: &Self) -> U512 {
        let mut out = [0u64; 8];
        for i in 0..4 {
            let mut carry = 0;
            for j in 0..4 {
                let (lo, hi) = mac(out[i + j], self.0[i], rhs.0[j], carry);
                out[i + j] = lo;
                carry = hi;
            }
            out[i + 4] = carry;
        }
        U512(out)
    }

    /// Returns `b` when `choice == 1` and `a` when `choice == 0`, without
    /// branching on `choice`.
    #[inline(always)]
    pub fn conditional_select(a: &Self, b: &Self, choice: u64) -> Self {
        let mask = 0u64.wrapping_sub(choice & 1);
        let mut out = a.0;
        for (o, r) in out.iter_mut().zip(b.0.iter()) {
            *o ^= (*o ^ r) & mask;
        }
        Self(out)
    }

    /// Parse a big-endian hex string of at most 64 digits.
    pub fn from_be_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let padded = format!("{:0>64}", s.trim_start_matches("0x"));
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(padded, &mut bytes)?;
        Ok(Self::from_be_bytes(&bytes))
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..4).rev() {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_be_bytes()))
    }
}

impl From<u64> for U256 {
    fn from(v: u64) -> Self {
        Self::from_u64(v)
    }
}

impl zeroize::Zeroize for U256 {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// 512-bit unsigned integer holding double-width products.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct U512(pub(crate) [u64; 8]);

impl U512 {
    pub const ZERO: Self = Self([0; 8]);

    pub fn from_le_bytes(bytes: &[u8; 64]) -> Self {
        let mut limbs = [0u64; 8];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
            *limb = u64::from_le_bytes(word);
        }
        Self(limbs)
    }

    pub fn from_u256(v: &U256) -> Self {
        let mut limbs = [0u64; 8];
        limbs[..4].copy_from_slice(&v.0);
        Self(limbs)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().fold(0u64, |acc, limb| acc | limb) == 0
    }

    /// Logical right shift by `shift < 512` bits.
    pub fn shr(&self, shift: u32) -> Self {
        let limb = (shift / 64) as usize;
        let bits = shift % 64;
        let mut out = [0u64; 8];
        for (i, o) in out.iter_mut().enumerate() {
            let src = i + limb;
            if src < 8 {
                *o = self.0[src] >> bits;
                if bits > 0 && src + 1 < 8 {
                    *o |= self.0[src + 1] << (64 - bits);
                }
            }
        }
        Self(out)
    }

    /// The low `k` bits of `self`.
    pub fn low_bits(&self, k: u32) -> Self {
        let limb = (k / 64) as usize;
        let bits = k % 64;
        let mut out = self.0;
        for (i, o) in out.iter_mut().enumerate() {
            if i > limb || (i == limb && bits == 0) {
                *o = 0;
            } else if i == limb {
                *o &= (1u64 << bits) - 1;
            }
        }
        Self(out)
    }

    /// Split into `(low k bits, self >> k)`.
    pub fn split_at_bit(&self, k: u32) -> (Self, Self) {
        (self.low_bits(k), self.shr(k))
    }

    /// True when `self < 2^k`.
    pub fn fits_in_bits(&self, k: u32) -> bool {
        self.shr(k).is_zero()
    }

    /// `self + rhs` modulo 2^512. Callers keep operands small enough that
    /// the carry out is always zero.
    pub fn wrapping_add(&self, rhs: &Self) -> Self {
        let mut out = [0u64; 8];
        let mut carry = 0;
        for i in 0..8 {
            let (w, c) = adc(self.0[i], rhs.0[i], carry);
            out[i] = w;
            carry = c;
        }
        debug_assert_eq!(carry, 0, "U512 addition overflowed");
        Self(out)
    }

    /// `self * rhs` truncated to 512 bits. The fold steps only call this with
    /// operands whose true product fits.
    pub fn mul_u256(&self, rhs: &U256) -> Self {
        let mut out = [0u64; 8];
        for i in 0..8 {
            if self.0[i] == 0 {
                continue;
            }
            let mut carry = 0;
            for j in 0..4 {
                if i + j >= 8 {
                    break;
                }
                let (lo, hi) = mac(out[i + j], self.0[i], rhs.0[j], carry);
                out[i + j] = lo;
                carry = hi;
            }
            if i + 4 < 8 {
                out[i + 4] = carry;
            }
        }
        Self(out)
    }

    /// The low 256 bits.
    pub fn low_u256(&self) -> U256 {
        U256([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl fmt::Debug for U512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for limb in self.0.iter().rev() {
            write!(f, "{:016x}", limb)?;
        }
        Ok(())
    }
}
