use nalgebra::Vector3;

const ZERO_THRESHOLD: f64 = 1e-6;

fn zero_small_components(v: &mut Vector3<f64>) {
    for x in v.iter_mut() {
        if x.abs() < ZERO_THRESHOLD {
            *x = 0.0;
        }
    }
}

/// Builds triclinic box vectors from edge lengths and angles (α, β, γ in
/// degrees), with `a` along x and `b` in the xy-plane, then reduces them.
pub fn compute_box_vectors(lengths: [f64; 3], angles_degrees: [f64; 3]) -> [Vector3<f64>; 3] {
    let [a_len, b_len, c_len] = lengths;
    let [alpha, beta, gamma] = angles_degrees.map(f64::to_radians);

    let mut a = Vector3::new(a_len, 0.0, 0.0);
    let mut b = Vector3::new(b_len * gamma.cos(), b_len * gamma.sin(), 0.0);
    let cx = c_len * beta.cos();
    let cy = c_len * (alpha.cos() - beta.cos() * gamma.cos()) / gamma.sin();
    let cz = (c_len * c_len - cx * cx - cy * cy).sqrt();
    let mut c = Vector3::new(cx, cy, cz);

    zero_small_components(&mut a);
    zero_small_components(&mut b);
    zero_small_components(&mut c);
    reduce_box_vectors([a, b, c])
}

/// Brings box vectors into reduced form: `|b_x| <= a_x / 2`, `|c_x| <= a_x / 2`
/// and `|c_y| <= b_y / 2`. Rounding is half-to-even.
pub fn reduce_box_vectors(vectors: [Vector3<f64>; 3]) -> [Vector3<f64>; 3] {
    let [a, mut b, mut c] = vectors;
    if b.y != 0.0 {
        c -= b * (c.y / b.y).round_ties_even();
    }
    if a.x != 0.0 {
        c -= a * (c.x / a.x).round_ties_even();
        b -= a * (b.x / a.x).round_ties_even();
    }
    [a, b, c]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-6;

    fn assert_vec_close(actual: &Vector3<f64>, expected: [f64; 3]) {
        for (x, e) in actual.iter().zip(expected) {
            assert!((x - e).abs() < TOLERANCE, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn rectangular_box_is_diagonal() {
        let [a, b, c] = compute_box_vectors([3.0, 4.0, 5.0], [90.0; 3]);
        assert_eq!(a, Vector3::new(3.0, 0.0, 0.0));
        assert_eq!(b, Vector3::new(0.0, 4.0, 0.0));
        assert_eq!(c, Vector3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn truncated_octahedron_matches_reference_vectors() {
        let [a, b, c] = compute_box_vectors([4.48903851; 3], [109.4712190; 3]);
        assert_vec_close(&a, [4.48903851, 0.0, 0.0]);
        assert_vec_close(&b, [-1.4963460492639706, 4.232306137924705, 0.0]);
        assert_vec_close(
            &c,
            [-1.4963460492639706, -2.116152812842565, 3.6652847799064165],
        );
    }

    #[test]
    fn reduction_shifts_skewed_vectors_back_into_range() {
        let a = Vector3::new(2.0, 0.0, 0.0);
        let b = Vector3::new(3.0, 2.0, 0.0);
        let c = Vector3::new(0.0, 3.0, 2.0);
        let [ra, rb, rc] = reduce_box_vectors([a, b, c]);
        assert_eq!(ra, a);
        // b_x / a_x = 1.5 rounds to 2 (even).
        assert_vec_close(&rb, [-1.0, 2.0, 0.0]);
        // c_y / b_y = 1.5 rounds to 2, then c_x / a_x = -3 shifts by 3a.
        assert_vec_close(&rc, [0.0, -1.0, 2.0]);
    }

    #[test]
    fn exact_half_ratios_round_to_even() {
        let a = Vector3::new(2.0, 0.0, 0.0);
        let b = Vector3::new(1.0, 2.0, 0.0);
        let c = Vector3::new(0.0, 0.0, 2.0);
        let [_, rb, _] = reduce_box_vectors([a, b, c]);
        // 0.5 rounds to 0, so b is left unchanged.
        assert_vec_close(&rb, [1.0, 2.0, 0.0]);
    }
}
