//! Secret-sharing polynomials and Lagrange interpolation.

use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::curve::CurvePoint;
use crate::error::{CoreError, Result};
use crate::field::{Fp, Modulus};

/// Polynomial `f(x) = a_0 + a_1 x + … + a_{t} x^{t}` over `Fp<M>`.
///
/// `a_0` is the dealer's secret contribution. Coefficients are wiped on drop.
#[derive(Clone)]
pub struct Polynomial<M: Modulus> {
    coefficients: Vec<Fp<M>>,
}

impl<M: Modulus> Polynomial<M> {
    /// Sample a polynomial of degree `threshold` with uniform coefficients.
    ///
    /// A secret reconstructs from `threshold + 1` evaluations.
    pub fn random<R: RngCore + CryptoRng + ?Sized>(threshold: usize, rng: &mut R) -> Self {
        let coefficients = (0..=threshold).map(|_| Fp::random(&mut *rng)).collect();
        Self { coefficients }
    }

    pub fn from_coefficients(coefficients: Vec<Fp<M>>) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(CoreError::malformed("polynomial", "no coefficients"));
        }
        Ok(Self { coefficients })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[Fp<M>] {
        &self.coefficients
    }

    /// The constant term `f(0)`.
    pub fn secret(&self) -> Fp<M> {
        self.coefficients[0]
    }

    /// `f(x)` by Horner's rule: start from `a_t`, then `t` steps of
    /// `acc = acc·x + a_k`.
    pub fn evaluate(&self, x: &Fp<M>) -> Fp<M> {
        match self.coefficients.split_last() {
            Some((leading, rest)) => rest
                .iter()
                .rev()
                .fold(*leading, |acc, coeff| acc * *x + *coeff),
            None => Fp::ZERO,
        }
    }

    /// Evaluate at the participant index `id`.
    pub fn evaluate_at(&self, id: u16) -> Fp<M> {
        self.evaluate(&Fp::from_u64(id as u64))
    }

    /// Feldman commitments `C_k = [a_k]·G`.
    pub fn commitments<P: CurvePoint<Order = M>>(&self) -> Vec<P> {
        let g = P::generator();
        self.coefficients.iter().map(|a| g.mul(a)).collect()
    }
}

impl<M: Modulus> Drop for Polynomial<M> {
    fn drop(&mut self) {
        self.coefficients.zeroize();
    }
}

impl<M: Modulus> std::fmt::Debug for Polynomial<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Polynomial")
            .field("degree", &self.degree())
            .field("coefficients", &"[REDACTED]")
            .finish()
    }
}

/// Evaluate the committed polynomial in the exponent: `Σ [x^k]·C_k`.
///
/// Uses Horner's rule on points. The inputs are public, so the
/// variable-time multiply is used.
pub fn evaluate_commitments<P: CurvePoint>(commitments: &[P], x: &Fp<P::Order>) -> P {
    match commitments.split_last() {
        Some((leading, rest)) => rest
            .iter()
            .rev()
            .fold(*leading, |acc, c| acc.mul_vartime(x).add(c)),
        None => P::identity(),
    }
}

fn check_interpolation_set(ids: &[u16]) -> Result<()> {
    if ids.is_empty() {
        return Err(CoreError::InvalidInterpolationSet("empty set".into()));
    }
    for (pos, id) in ids.iter().enumerate() {
        if *id == 0 {
            return Err(CoreError::InvalidInterpolationSet(
                "participant index 0 is reserved for the secret".into(),
            ));
        }
        if ids[..pos].contains(id) {
            return Err(CoreError::InvalidInterpolationSet(format!(
                "duplicate participant index {id}"
            )));
        }
    }
    Ok(())
}

/// Lagrange coefficient of `id` for interpolation at zero over `set`:
/// `λ_id = Π_{j ≠ id} j / (j - id)`.
pub fn lagrange_coefficient<M: Modulus>(id: u16, set: &[u16]) -> Result<Fp<M>> {
    check_interpolation_set(set)?;
    if !set.contains(&id) {
        return Err(CoreError::InvalidInterpolationSet(format!(
            "index {id} is not in the set"
        )));
    }

    let xi = Fp::<M>::from_u64(id as u64);
    let mut num = Fp::<M>::ONE;
    let mut den = Fp::<M>::ONE;
    for j in set.iter().filter(|j| **j != id) {
        let xj = Fp::<M>::from_u64(*j as u64);
        num *= xj;
        den *= xj - xi;
    }
    Ok(num * den.invert()?)
}

/// Recover `f(0)` from `(index, f(index))` pairs.
pub fn interpolate_at_zero<M: Modulus>(shares: &[(u16, Fp<M>)]) -> Result<Fp<M>> {
    let ids: Vec<u16> = shares.iter().map(|(id, _)| *id).collect();
    check_interpolation_set(&ids)?;

    let mut acc = Fp::ZERO;
    for (id, value) in shares {
        acc += lagrange_coefficient::<M>(*id, &ids)? * *value;
    }
    Ok(acc)
}
