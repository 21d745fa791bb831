//! Bounded coherence components.
//!
//! Pure reducers from raw recursion signals to scalars in [0,1]. The four
//! components combined by [`crate::CoherenceEngine`] are:
//!
//! - signal alignment `S(p) = 1 - ||x̂(p) - m̂(p)|| / s_max`
//! - feedback responsiveness `F(p) = α·F_int + (1-α)·F_ext`
//! - bounded integrity `B(p) = B_int · (1 - τ(p,t))`
//! - elastic tolerance `λ(p) = (λ_total - λ_used) / λ_total`
//!
//! Near-zero norms and capacities map to `0.0` instead of NaN/Inf so a single
//! degenerate input cannot poison the multiplicative composite.

use crate::error::{CoherenceError, Result};

/// Norm / capacity below which an input is treated as undefined.
pub const NEAR_ZERO: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Clamp to [0,1]; NaN maps to 0.
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

pub(crate) fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn check_same_len(what: &'static str, a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(CoherenceError::LengthMismatch {
            what,
            expected: a.len(),
            got: b.len(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Signal alignment between a phase vector and the coherence-motion vector.
///
/// Both vectors are normalized to unit length before measuring their
/// Euclidean divergence. Returns `0.0` if either norm is below
/// [`NEAR_ZERO`]; fails if the vectors have different lengths.
pub fn signal_alignment(phase_vector: &[f64], coherence_motion: &[f64], s_max: f64) -> Result<f64> {
    check_same_len("coherence_motion", phase_vector, coherence_motion)?;

    let phase_norm = l2_norm(phase_vector);
    let motion_norm = l2_norm(coherence_motion);
    if phase_norm < NEAR_ZERO || motion_norm < NEAR_ZERO {
        return Ok(0.0);
    }

    let divergence = phase_vector
        .iter()
        .zip(coherence_motion)
        .map(|(p, m)| {
            let d = p / phase_norm - m / motion_norm;
            d * d
        })
        .sum::<f64>()
        .sqrt();

    Ok(clamp01(1.0 - divergence / s_max))
}

/// Convex blend of internal and external feedback, weighted by `alpha`.
pub fn feedback_responsiveness(internal: f64, external: f64, alpha: f64) -> f64 {
    clamp01(alpha * internal + (1.0 - alpha) * external)
}

/// Internal integrity attenuated by a [0,1] phase alignment
/// (see [`phase_alignment`]).
pub fn bounded_integrity(internal_integrity: f64, phase_alignment: f64) -> f64 {
    clamp01(internal_integrity * (1.0 - phase_alignment))
}

/// Fractional remaining tension-processing capacity.
///
/// An undefined capacity (below [`NEAR_ZERO`]) means no tolerance.
pub fn elastic_tolerance(total_capacity: f64, used_capacity: f64) -> f64 {
    if total_capacity < NEAR_ZERO {
        return 0.0;
    }
    clamp01((total_capacity - used_capacity) / total_capacity)
}

/// Cosine similarity of two phase vectors remapped from [-1,1] to [0,1].
pub fn phase_alignment(vector_p: &[f64], vector_t: &[f64]) -> Result<f64> {
    check_same_len("vector_t", vector_p, vector_t)?;

    let p_norm = l2_norm(vector_p);
    let t_norm = l2_norm(vector_t);
    if p_norm < NEAR_ZERO || t_norm < NEAR_ZERO {
        return Ok(0.0);
    }

    let cos = vector_p
        .iter()
        .zip(vector_t)
        .map(|(p, t)| (p / p_norm) * (t / t_norm))
        .sum::<f64>();

    // Rounding can push |cos| a hair past 1.
    Ok(clamp01((cos + 1.0) / 2.0))
}

/// Safety bound on a value projected into the next recursion layer: `√v`,
/// or `0.0` for negative input.
pub fn love_equation(v: f64) -> f64 {
    if v < 0.0 { 0.0 } else { v.sqrt() }
}

/// Change in overall coherence between consecutive recursive cycles.
pub fn coherence_motion(current_coherence: f64, previous_coherence: f64) -> f64 {
    current_coherence - previous_coherence
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_signal_alignment_identical_direction() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        assert!((signal_alignment(&a, &b, 1.0).unwrap() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_signal_alignment_zero_vector() {
        assert_eq!(signal_alignment(&[0.0, 0.0], &[1.0, 0.0], 1.0).unwrap(), 0.0);
        assert_eq!(signal_alignment(&[1.0, 0.0], &[1e-9, 0.0], 1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_signal_alignment_scaled_by_s_max() {
        // Orthogonal unit vectors are sqrt(2) apart.
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert_eq!(signal_alignment(&a, &b, 1.0).unwrap(), 0.0);
        let s = signal_alignment(&a, &b, 2.0).unwrap();
        assert!((s - (1.0 - 2f64.sqrt() / 2.0)).abs() < EPS);
    }

    #[test]
    fn test_signal_alignment_length_mismatch() {
        let err = signal_alignment(&[1.0, 0.0], &[1.0], 1.0).unwrap_err();
        assert!(matches!(
            err,
            CoherenceError::LengthMismatch {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_feedback_responsiveness() {
        assert!((feedback_responsiveness(1.0, 0.0, 0.6) - 0.6).abs() < EPS);
        assert!((feedback_responsiveness(0.5, 0.5, 0.6) - 0.5).abs() < EPS);
        assert_eq!(feedback_responsiveness(5.0, 5.0, 0.6), 1.0);
        assert_eq!(feedback_responsiveness(-5.0, -1.0, 0.6), 0.0);
    }

    #[test]
    fn test_bounded_integrity() {
        assert!((bounded_integrity(0.8, 0.25) - 0.6).abs() < EPS);
        assert_eq!(bounded_integrity(1.0, 1.0), 0.0);
        assert_eq!(bounded_integrity(2.0, -1.0), 1.0);
    }

    #[test]
    fn test_elastic_tolerance_edges() {
        assert_eq!(elastic_tolerance(1.0, 0.0), 1.0);
        assert_eq!(elastic_tolerance(1.0, 1.0), 0.0);
        assert_eq!(elastic_tolerance(0.0, 0.3), 0.0);
        assert_eq!(elastic_tolerance(0.0, -10.0), 0.0);
        assert_eq!(elastic_tolerance(-4.0, 1.0), 0.0);
        assert_eq!(elastic_tolerance(1.0, 2.0), 0.0);
        assert!((elastic_tolerance(2.0, 0.5) - 0.75).abs() < EPS);
    }

    #[test]
    fn test_phase_alignment_self_and_opposite() {
        let v = [0.3, -1.2, 4.0];
        let neg: Vec<f64> = v.iter().map(|x| -x).collect();
        assert!((phase_alignment(&v, &v).unwrap() - 1.0).abs() < EPS);
        assert!(phase_alignment(&v, &neg).unwrap().abs() < EPS);
    }

    #[test]
    fn test_phase_alignment_orthogonal_and_zero() {
        assert!((phase_alignment(&[1.0, 0.0], &[0.0, 1.0]).unwrap() - 0.5).abs() < EPS);
        assert_eq!(phase_alignment(&[0.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_love_equation() {
        assert_eq!(love_equation(4.0), 2.0);
        assert_eq!(love_equation(0.0), 0.0);
        assert_eq!(love_equation(-1.0), 0.0);
    }

    #[test]
    fn test_coherence_motion() {
        assert!((coherence_motion(0.4, 0.7) + 0.3).abs() < EPS);
    }

    #[test]
    fn components_bounded_under_adversarial_inputs() {
        let values = [-1e9, -1.0, -1e-7, 0.0, 1e-7, 0.5, 1.0, 3.0, 1e9];
        for &a in &values {
            for &b in &values {
                for f in [
                    feedback_responsiveness(a, b, 0.6),
                    bounded_integrity(a, b),
                    elastic_tolerance(a, b),
                ] {
                    assert!((0.0..=1.0).contains(&f), "out of range: {f} for ({a}, {b})");
                }
                let s = signal_alignment(&[a, b], &[b, a], 0.5).unwrap();
                assert!((0.0..=1.0).contains(&s));
                let p = phase_alignment(&[a, 1.0], &[b, -1.0]).unwrap();
                assert!((0.0..=1.0).contains(&p));
            }
        }
    }
}
