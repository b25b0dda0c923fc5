//! # Tessera Core
//!
//! Arithmetic underneath the Tessera distributed key generation engine.
//!
//! - [`field`]: integers modulo special-form primes (`2^k ± c`), reduced by
//!   folding the high half of a product back onto the low half
//! - [`curve`]: Ed25519 (extended Edwards) and secp256k1 (projective
//!   Weierstrass) behind the [`Group`] trait
//! - [`polynomial`]: secret-sharing polynomials, Feldman commitments and
//!   Lagrange interpolation
//! - [`rng`]: scalar sampling and per-party generators
//!
//! Nothing here knows about parties or rounds; the protocol lives in
//! `tessera-dkg`.

pub mod curve;
pub mod error;
pub mod field;
pub mod polynomial;
pub mod rng;
pub mod uint;

pub use curve::{CurvePoint, Ed25519, EdwardsPoint, Group, ScalarOf, Secp256k1, Secp256k1Point};
pub use error::{CoreError, Result};
pub use field::{Fp, Modulus};
pub use polynomial::{evaluate_commitments, interpolate_at_zero, lagrange_coefficient, Polynomial};
pub use rng::{party_rng, RandomSource};
pub use uint::U256;
