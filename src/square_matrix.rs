use std::ops::{Index, IndexMut, Mul};

use crate::float::Float;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SquareMatrix<const N: usize> {
    pub m: [[Float; N]; N],
}

impl<const N: usize> SquareMatrix<N> {
    pub fn new(m: [[Float; N]; N]) -> Self {
        Self { m }
    }

    pub fn zero() -> Self {
        Self { m: [[0.0; N]; N] }
    }

    /// Builds the matrix from `N * N` values in row-major order.
    /// Returns `None` if the slice has the wrong length.
    pub fn from_row_major(values: &[Float]) -> Option<Self> {
        if values.len() != N * N {
            return None;
        }
        let mut m = Self::zero();
        for (i, row) in m.m.iter_mut().enumerate() {
            row.copy_from_slice(&values[i * N..(i + 1) * N]);
        }
        Some(m)
    }

    pub fn is_identity(&self) -> bool {
        for i in 0..N {
            for j in 0..N {
                let expected = if i == j { 1.0 } else { 0.0 };
                if self.m[i][j] != expected {
                    return false;
                }
            }
        }
        true
    }

    pub fn transpose(&self) -> Self {
        let mut r = Self::zero();
        for i in 0..N {
            for j in 0..N {
                r.m[i][j] = self.m[j][i];
            }
        }
        r
    }

    /// General inverse via Gauss-Jordan elimination with full pivoting.
    /// Returns `None` for singular matrices.
    pub fn inverse(&self) -> Option<Self> {
        let mut indxc = [0usize; N];
        let mut indxr = [0usize; N];
        let mut ipiv = [0usize; N];
        let mut minv = self.m;

        for i in 0..N {
            let mut irow = 0;
            let mut icol = 0;
            let mut big: Float = 0.0;
            // Choose pivot
            for j in 0..N {
                if ipiv[j] != 1 {
                    for k in 0..N {
                        if ipiv[k] == 0 {
                            if minv[j][k].abs() >= big {
                                big = minv[j][k].abs();
                                irow = j;
                                icol = k;
                            }
                        } else if ipiv[k] > 1 {
                            return None;
                        }
                    }
                }
            }
            ipiv[icol] += 1;
            if irow != icol {
                minv.swap(irow, icol);
            }
            indxr[i] = irow;
            indxc[i] = icol;
            if minv[icol][icol] == 0.0 {
                return None;
            }

            let pivinv = 1.0 / minv[icol][icol];
            minv[icol][icol] = 1.0;
            for j in 0..N {
                minv[icol][j] *= pivinv;
            }

            for j in 0..N {
                if j != icol {
                    let save = minv[j][icol];
                    minv[j][icol] = 0.0;
                    for k in 0..N {
                        minv[j][k] -= minv[icol][k] * save;
                    }
                }
            }
        }

        // Swap columns to reflect permutation
        for j in (0..N).rev() {
            if indxr[j] != indxc[j] {
                for row in minv.iter_mut() {
                    row.swap(indxr[j], indxc[j]);
                }
            }
        }
        Some(Self { m: minv })
    }
}

impl<const N: usize> Default for SquareMatrix<N> {
    /// The identity matrix.
    fn default() -> Self {
        let mut m: [[Float; N]; N] = [[0.0; N]; N];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self::new(m)
    }
}

impl<const N: usize> Index<usize> for SquareMatrix<N> {
    type Output = [Float; N];

    fn index(&self, index: usize) -> &Self::Output {
        &self.m[index]
    }
}

impl<const N: usize> IndexMut<usize> for SquareMatrix<N> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.m[index]
    }
}

impl<const N: usize> Mul for SquareMatrix<N> {
    type Output = SquareMatrix<N>;

    fn mul(self, rhs: Self) -> Self::Output {
        let mut r = Self::zero();
        for i in 0..N {
            for j in 0..N {
                let mut sum = 0.0;
                for k in 0..N {
                    sum += self.m[i][k] * rhs.m[k][j];
                }
                r.m[i][j] = sum;
            }
        }
        r
    }
}

impl<const N: usize> Mul<&SquareMatrix<N>> for &SquareMatrix<N> {
    type Output = SquareMatrix<N>;

    fn mul(self, rhs: &SquareMatrix<N>) -> Self::Output {
        *self * *rhs
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::SquareMatrix;
    use crate::Float;

    #[test]
    fn default_is_identity() {
        assert!(SquareMatrix::<4>::default().is_identity());
        assert!(!SquareMatrix::<4>::zero().is_identity());
    }

    #[test]
    fn row_major_construction() {
        let values: Vec<Float> = (0..16).map(|v| v as Float).collect();
        let m = SquareMatrix::<4>::from_row_major(&values).unwrap();
        assert_eq!(m[1][2], 6.0);
        assert_eq!(m.transpose()[2][1], 6.0);
        assert!(SquareMatrix::<4>::from_row_major(&values[..15]).is_none());
    }

    #[test]
    fn inverse_round_trips_to_identity() {
        let m = SquareMatrix::<4>::new([
            [2.0, 0.0, 0.0, 3.0],
            [0.0, 0.0, 4.0, 1.0],
            [0.0, 1.0, 0.0, -2.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let product = m * m.inverse().unwrap();
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_approx_eq!(Float, expected, product[i][j], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn singular_has_no_inverse() {
        let m = SquareMatrix::<3>::new([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]);
        assert!(m.inverse().is_none());
    }
}
