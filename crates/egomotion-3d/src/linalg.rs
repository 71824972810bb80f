//! Small dense 3x3 matrix helpers on row-major `[[f64; 3]; 3]` arrays.

/// Singular value decomposition of a 3x3 matrix, `m = u * diag(s) * v^T`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Svd33 {
    /// Left singular vectors, one per column.
    pub u: [[f64; 3]; 3],
    /// Singular values in non-increasing order.
    pub s: [f64; 3],
    /// Right singular vectors, one per column.
    pub v: [[f64; 3]; 3],
}

/// The 3x3 identity matrix.
pub const IDENTITY33: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

pub(crate) fn array33_to_faer_mat33(m: &[[f64; 3]; 3]) -> faer::Mat<f64> {
    faer::Mat::from_fn(3, 3, |i, j| m[i][j])
}

pub(crate) fn faer_mat33_to_array33(m: faer::MatRef<'_, f64>) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = m.read(i, j);
        }
    }
    out
}

/// Matrix product `a * b`.
pub fn mat33_mul(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    out
}

/// Matrix vector product `m * x`.
pub fn mat33_mul_vec3(m: &[[f64; 3]; 3], x: &[f64; 3]) -> [f64; 3] {
    [
        m[0][0] * x[0] + m[0][1] * x[1] + m[0][2] * x[2],
        m[1][0] * x[0] + m[1][1] * x[1] + m[1][2] * x[2],
        m[2][0] * x[0] + m[2][1] * x[1] + m[2][2] * x[2],
    ]
}

/// Transpose of a 3x3 matrix.
pub fn mat33_transpose(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// Determinant of a 3x3 matrix.
pub fn mat33_det(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Inverse of a 3x3 matrix via the adjugate.
///
/// Returns `None` when the matrix is not finite or its determinant is not distinguishable
/// from zero relative to the magnitude of its entries.
pub fn mat33_inverse(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    if !m.iter().flatten().all(|v| v.is_finite()) {
        return None;
    }

    let scale = m.iter().flatten().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let det = mat33_det(m);
    if scale == 0.0 || det.abs() <= 1e-12 * scale * scale * scale {
        return None;
    }

    let inv_det = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

/// Skew-symmetric matrix `[t]x` such that `[t]x * v = t x v`.
pub fn skew(t: &[f64; 3]) -> [[f64; 3]; 3] {
    [[0.0, -t[2], t[1]], [t[2], 0.0, -t[0]], [-t[1], t[0], 0.0]]
}

/// Singular value decomposition of a 3x3 matrix.
///
/// PRECONDITION: all entries of `m` are finite.
pub fn svd33(m: &[[f64; 3]; 3]) -> Svd33 {
    let svd = array33_to_faer_mat33(m).svd();
    let s = svd.s_diagonal();
    Svd33 {
        u: faer_mat33_to_array33(svd.u()),
        s: [s.read(0), s.read(1), s.read(2)],
        v: faer_mat33_to_array33(svd.v()),
    }
}

/// Rotation matrix from an axis and an angle in radians (Rodrigues formula).
///
/// The axis does not need to be normalized; a zero axis yields the identity.
pub fn rotation_from_axis_angle(axis: &[f64; 3], angle: f64) -> [[f64; 3]; 3] {
    let norm = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
    if norm == 0.0 {
        return IDENTITY33;
    }
    let k = [axis[0] / norm, axis[1] / norm, axis[2] / norm];
    let kx = skew(&k);
    let kx2 = mat33_mul(&kx, &kx);
    let (sin_a, cos_a) = angle.sin_cos();

    let mut r = IDENTITY33;
    for i in 0..3 {
        for j in 0..3 {
            r[i][j] += sin_a * kx[i][j] + (1.0 - cos_a) * kx2[i][j];
        }
    }
    r
}

/// Angle in radians of the rotation described by `r`.
pub fn rotation_angle(r: &[[f64; 3]; 3]) -> f64 {
    let trace = r[0][0] + r[1][1] + r[2][2];
    ((trace - 1.0) * 0.5).clamp(-1.0, 1.0).acos()
}
