//! Space-filling quality measures over design matrices.
//!
//! All measures are pure functions over `(n, d)` matrices where each row is a
//! design point. The pairwise measures are O(n^2) by nature; the loops are
//! written out so the cost is explicit to the caller.

use linfa::Float;
use ndarray::{s, Array2, ArrayBase, ArrayView1, Data, Ix2};
use ndarray_stats::DeviationExt;

/// Euclidean distance between two points.
pub fn euclidean<F: Float>(a: ArrayView1<F>, b: ArrayView1<F>) -> F {
    F::from(a.l2_dist(&b).unwrap()).unwrap()
}

/// Minimum pairwise distance among all unordered pairs of distinct rows,
/// using the supplied distance function.
///
/// This is the maximin criterion: a larger value indicates a better-spread
/// design. Returns NaN when the matrix has fewer than 2 rows, as no pair
/// exists; callers must not interpret that as a zero spacing.
pub fn matrix_minimum_distance_with<F, D>(
    points: &ArrayBase<impl Data<Elem = F>, Ix2>,
    dist: D,
) -> F
where
    F: Float,
    D: Fn(ArrayView1<F>, ArrayView1<F>) -> F,
{
    let nrows = points.nrows();
    let mut minimum = F::nan();
    for row in 0..nrows {
        for other_row in (row + 1)..nrows {
            let dd = dist(
                points.slice(s![row, ..]),
                points.slice(s![other_row, ..]),
            );
            // Float::min ignores the NaN initial value
            minimum = minimum.min(dd);
        }
    }
    minimum
}

/// Minimum pairwise Euclidean distance, see [`matrix_minimum_distance_with`].
pub fn matrix_minimum_distance<F: Float>(points: &ArrayBase<impl Data<Elem = F>, Ix2>) -> F {
    matrix_minimum_distance_with(points, euclidean)
}

/// Maximum projection (MaxPro) measure of a design.
///
/// For every unordered pair of distinct rows, the product over dimensions of
/// the squared coordinate differences is inverted; those contributions are
/// averaged over all pairs, and the d-th root of the average is taken. Lower
/// is better: the measure penalizes points that nearly coincide when
/// projected onto any single axis.
///
/// Returns NaN for fewer than 2 rows. Two rows sharing an exact coordinate
/// value in some dimension produce an infinite contribution, which dominates
/// the average; this is deliberate and not clamped.
pub fn max_pro_measure<F: Float>(points: &ArrayBase<impl Data<Elem = F>, Ix2>) -> F {
    let nrows = points.nrows();
    let ncols = points.ncols();
    if nrows < 2 {
        return F::nan();
    }
    let mut acc = F::zero();
    let mut npairs = 0;
    for row in 0..nrows {
        for other_row in (row + 1)..nrows {
            let mut prod = F::one();
            for dim in 0..ncols {
                let diff = points[[row, dim]] - points[[other_row, dim]];
                prod = prod * diff * diff;
            }
            acc = acc + prod.recip();
            npairs += 1;
        }
    }
    F::powf(acc / F::cast(npairs), F::one() / F::cast(ncols))
}

/// Computes the distances between each pair of rows taken from two matrices.
///
/// **Panics** if the operands do not have the same number of columns.
pub fn cdist<F: Float>(
    xa: &ArrayBase<impl Data<Elem = F>, Ix2>,
    xb: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    let ma = xa.nrows();
    let mb = xb.nrows();
    if xa.ncols() != xb.ncols() {
        panic!(
            "cdist: operands should have same nb of columns. Found {} and {}",
            xa.ncols(),
            xb.ncols()
        );
    }
    let mut res = Array2::zeros((ma, mb));
    for i in 0..ma {
        for j in 0..mb {
            res[[i, j]] = euclidean(xa.slice(s![i, ..]), xb.slice(s![j, ..]));
        }
    }
    res
}
