use crate::linalg::{mat33_det, mat33_mul, mat33_mul_vec3, mat33_transpose, svd33, Svd33};

/// Minimum number of correspondences of the linear solver.
pub const MIN_CORRESPONDENCES: usize = 8;

/// Smallest singular value, relative to the largest, below which a matrix is taken as rank 2.
const RANK2_TOLERANCE: f64 = 1e-6;

/// Errors raised by the essential matrix solver and its decomposition.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EssentialError {
    /// Not enough correspondences, or the two point sets differ in length.
    #[error("Need at least {required} correspondences and equal lengths, got {left} and {right}")]
    InvalidInput {
        /// Minimum number of correspondences.
        required: usize,
        /// Number of points in the first set.
        left: usize,
        /// Number of points in the second set.
        right: usize,
    },
    /// The correspondences do not determine a model.
    #[error("Degenerate configuration: {0}")]
    Degenerate(&'static str),
    /// The matrix cannot be decomposed into a proper rotation and a translation.
    #[error("Invalid essential matrix decomposition: {0}")]
    InvalidDecomposition(String),
}

/// Estimate an essential matrix with the normalized 8-point algorithm.
///
/// The returned matrix `E` satisfies `x2^T * E * x1 = 0` for every correspondence, with both
/// point sets in normalized image coordinates, and has the singular values `(s, s, 0)`.
///
/// # Arguments
///
/// * `x1` - Points in the first view, at least 8.
/// * `x2` - Corresponding points in the second view.
pub fn essential_8point(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
) -> Result<[[f64; 3]; 3], EssentialError> {
    if x1.len() != x2.len() || x1.len() < MIN_CORRESPONDENCES {
        return Err(EssentialError::InvalidInput {
            required: MIN_CORRESPONDENCES,
            left: x1.len(),
            right: x2.len(),
        });
    }
    if !x1.iter().chain(x2.iter()).flatten().all(|v| v.is_finite()) {
        return Err(EssentialError::Degenerate("non-finite coordinates"));
    }

    let (x1n, t1) = normalize_points_2d(x1).ok_or(EssentialError::Degenerate("coincident points"))?;
    let (x2n, t2) = normalize_points_2d(x2).ok_or(EssentialError::Degenerate("coincident points"))?;

    // one row per correspondence of x2^T * E * x1 = 0
    let n = x1n.len();
    let mut a = faer::Mat::<f64>::zeros(n, 9);
    for (i, (p1, p2)) in x1n.iter().zip(x2n.iter()).enumerate() {
        let (x, y) = (p1[0], p1[1]);
        let (xp, yp) = (p2[0], p2[1]);
        a.write(i, 0, xp * x);
        a.write(i, 1, xp * y);
        a.write(i, 2, xp);
        a.write(i, 3, yp * x);
        a.write(i, 4, yp * y);
        a.write(i, 5, yp);
        a.write(i, 6, x);
        a.write(i, 7, y);
        a.write(i, 8, 1.0);
    }

    // right singular vector of the smallest singular value
    let svd = a.svd();
    let evec = svd.v().col(8);
    let e_norm = [
        [evec.read(0), evec.read(1), evec.read(2)],
        [evec.read(3), evec.read(4), evec.read(5)],
        [evec.read(6), evec.read(7), evec.read(8)],
    ];

    // E = T2^T * E_norm * T1
    let e = mat33_mul(&mat33_mul(&mat33_transpose(&t2), &e_norm), &t1);
    if !e.iter().flatten().all(|v| v.is_finite()) {
        return Err(EssentialError::Degenerate("non-finite solution"));
    }

    let e = enforce_essential_constraints(&e);
    let magnitude = e.iter().flatten().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if magnitude <= f64::EPSILON {
        return Err(EssentialError::Degenerate("vanishing solution"));
    }

    Ok(e)
}

/// Project a matrix onto the essential manifold.
///
/// The two largest singular values are replaced by their mean and the smallest by zero.
///
/// PRECONDITION: all entries of `e` are finite.
pub fn enforce_essential_constraints(e: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let Svd33 { u, s, v } = svd33(e);
    let mean = 0.5 * (s[0] + s[1]);

    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = mean * (u[i][0] * v[j][0] + u[i][1] * v[j][1]);
        }
    }
    out
}

/// First-order geometric distance of a correspondence to the epipolar constraint.
///
/// `|x2^T E x1| / sqrt((E x1)_0^2 + (E x1)_1^2 + (E^T x2)_0^2 + (E^T x2)_1^2)`, invariant to
/// the scale of `E`. Returns infinity when the denominator vanishes.
pub fn sampson_distance(e: &[[f64; 3]; 3], x1: &[f64; 2], x2: &[f64; 2]) -> f64 {
    let x1h = [x1[0], x1[1], 1.0];
    let x2h = [x2[0], x2[1], 1.0];

    let ex1 = mat33_mul_vec3(e, &x1h);
    let etx2 = mat33_mul_vec3(&mat33_transpose(e), &x2h);
    let num = x2h[0] * ex1[0] + x2h[1] * ex1[1] + x2h[2] * ex1[2];
    let den = (ex1[0] * ex1[0] + ex1[1] * ex1[1] + etx2[0] * etx2[0] + etx2[1] * etx2[1]).sqrt();

    if den > 0.0 {
        num.abs() / den
    } else {
        f64::INFINITY
    }
}

/// Decompose an essential matrix into a rotation and a unit translation direction.
///
/// With `E = U * S * V^T` and `W = [[0, -1, 0], [1, 0, 0], [0, 0, 1]]`:
/// the rotation is `U * W * V^T`, or `U * W^T * V^T` if the former has a negative trace, and
/// the translation is the third column of `U`. `V^T` is negated when its determinant is
/// negative. For a rank 2 matrix the sign of the null column of `U` is free and is chosen so
/// that `det(U) > 0`.
///
/// Only one of the four geometric solutions is returned and the sign of the translation is not
/// resolved. No cheirality check is made.
///
/// # Errors
///
/// [`EssentialError::InvalidDecomposition`] if the matrix is not finite, vanishes, or `det(U)`
/// is not positive.
pub fn decompose_essential(
    e: &[[f64; 3]; 3],
) -> Result<([[f64; 3]; 3], [f64; 3]), EssentialError> {
    if !e.iter().flatten().all(|v| v.is_finite()) {
        return Err(EssentialError::InvalidDecomposition(
            "matrix has non-finite entries".to_string(),
        ));
    }

    let Svd33 { mut u, s, v } = svd33(e);
    if s[0] <= f64::EPSILON {
        return Err(EssentialError::InvalidDecomposition(
            "matrix is zero".to_string(),
        ));
    }

    if mat33_det(&u) < 0.0 && s[2] <= RANK2_TOLERANCE * s[0] {
        u.iter_mut().for_each(|row| row[2] = -row[2]);
    }
    let det_u = mat33_det(&u);
    if det_u <= 0.0 {
        return Err(EssentialError::InvalidDecomposition(format!(
            "left singular vectors have determinant {det_u}"
        )));
    }

    let mut vt = mat33_transpose(&v);
    if mat33_det(&vt) < 0.0 {
        vt.iter_mut().flatten().for_each(|x| *x = -*x);
    }

    let w = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
    let mut r = mat33_mul(&mat33_mul(&u, &w), &vt);
    if r[0][0] + r[1][1] + r[2][2] < 0.0 {
        r = mat33_mul(&mat33_mul(&u, &mat33_transpose(&w)), &vt);
    }

    Ok((r, [u[0][2], u[1][2], u[2][2]]))
}

/// Hartley conditioning: zero mean and mean distance sqrt(2) from the origin.
///
/// Returns the conditioned points and the similarity transform applied, or `None` when all the
/// points coincide.
fn normalize_points_2d(x: &[[f64; 2]]) -> Option<(Vec<[f64; 2]>, [[f64; 3]; 3])> {
    let n = x.len() as f64;
    let (mut mx, mut my) = (0.0, 0.0);
    for p in x {
        mx += p[0];
        my += p[1];
    }
    mx /= n;
    my /= n;

    let mean_dist = x
        .iter()
        .map(|p| ((p[0] - mx).powi(2) + (p[1] - my).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist <= f64::EPSILON {
        return None;
    }
    let scale = std::f64::consts::SQRT_2 / mean_dist;

    let xn = x
        .iter()
        .map(|p| [(p[0] - mx) * scale, (p[1] - my) * scale])
        .collect();
    let t = [
        [scale, 0.0, -scale * mx],
        [0.0, scale, -scale * my],
        [0.0, 0.0, 1.0],
    ];
    Some((xn, t))
}
