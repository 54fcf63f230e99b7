//! SciPy optimization functions port.
//!
//! Ported from scipy.optimize.linear_sum_assignment, which implements the
//! shortest augmenting path variant of the Jonker-Volgenant algorithm
//! (Crouse, "On implementing 2D rectangular assignment algorithms", 2016).
//! License: BSD 3-Clause (SciPy Developers)
#![allow(clippy::needless_range_loop)]

use nalgebra::DMatrix;

use crate::{Error, Result};

/// Represents a match between a row index and column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub row_idx: usize,
    pub col_idx: usize,
}

/// Result of linear sum assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    /// Matched (row, col) pairs, sorted by row index
    pub assignments: Vec<Assignment>,
    /// Indices of rows that were not matched
    pub unmatched_rows: Vec<usize>,
    /// Indices of columns that were not matched
    pub unmatched_cols: Vec<usize>,
}

impl AssignmentResult {
    /// Every row and column unmatched.
    pub fn unmatched(num_rows: usize, num_cols: usize) -> Self {
        Self {
            assignments: Vec::new(),
            unmatched_rows: (0..num_rows).collect(),
            unmatched_cols: (0..num_cols).collect(),
        }
    }

    /// Build a result from matched pairs, deriving the unmatched lists.
    pub(crate) fn from_pairs(assignments: Vec<Assignment>, num_rows: usize, num_cols: usize) -> Self {
        let mut matched_rows = vec![false; num_rows];
        let mut matched_cols = vec![false; num_cols];
        for a in &assignments {
            matched_rows[a.row_idx] = true;
            matched_cols[a.col_idx] = true;
        }

        Self {
            assignments,
            unmatched_rows: (0..num_rows).filter(|&i| !matched_rows[i]).collect(),
            unmatched_cols: (0..num_cols).filter(|&j| !matched_cols[j]).collect(),
        }
    }

    /// Sum of `cost` over the matched pairs.
    pub fn total_cost(&self, cost: &DMatrix<f64>) -> f64 {
        self.assignments
            .iter()
            .map(|a| cost[(a.row_idx, a.col_idx)])
            .sum()
    }
}

/// Solve the linear sum assignment problem.
///
/// Finds a one-to-one matching of rows to columns that minimizes (or, with
/// `maximize`, maximizes) the total cost. Rectangular matrices are supported:
/// `min(rows, cols)` pairs are always returned.
///
/// # Errors
/// - `Error::InvalidInput` if the matrix contains NaN or negative infinity
///   (positive infinity is allowed and means "forbidden")
/// - `Error::Infeasible` if no complete matching with finite cost exists
pub fn linear_sum_assignment(cost_matrix: &DMatrix<f64>, maximize: bool) -> Result<AssignmentResult> {
    let (num_rows, num_cols) = cost_matrix.shape();

    if cost_matrix.iter().any(|&x| x.is_nan() || x == f64::NEG_INFINITY) {
        return Err(Error::InvalidInput(
            "cost matrix contains NaN or -inf".to_string(),
        ));
    }

    if num_rows == 0 || num_cols == 0 {
        return Ok(AssignmentResult::unmatched(num_rows, num_cols));
    }

    // The solver needs rows <= cols
    let transposed = num_rows > num_cols;
    let mut cost = if transposed {
        cost_matrix.transpose()
    } else {
        cost_matrix.clone()
    };

    if maximize {
        cost.neg_mut();
    }

    let col4row = shortest_augmenting_path(&cost)?;

    let mut assignments: Vec<Assignment> = col4row
        .iter()
        .enumerate()
        .map(|(i, &j)| {
            if transposed {
                Assignment { row_idx: j, col_idx: i }
            } else {
                Assignment { row_idx: i, col_idx: j }
            }
        })
        .collect();

    if transposed {
        assignments.sort_by_key(|a| a.row_idx);
    }

    Ok(AssignmentResult::from_pairs(assignments, num_rows, num_cols))
}

/// Core solver for `nr <= nc`. Returns the column assigned to each row.
fn shortest_augmenting_path(cost: &DMatrix<f64>) -> Result<Vec<usize>> {
    let (nr, nc) = cost.shape();

    let mut u = vec![0.0; nr];
    let mut v = vec![0.0; nc];
    let mut shortest_path_costs = vec![f64::INFINITY; nc];
    let mut path: Vec<usize> = vec![usize::MAX; nc];
    let mut col4row: Vec<Option<usize>> = vec![None; nr];
    let mut row4col: Vec<Option<usize>> = vec![None; nc];
    let mut sr = vec![false; nr];
    let mut sc = vec![false; nc];
    let mut remaining = vec![0usize; nc];

    for cur_row in 0..nr {
        let (sink, min_val) = augmenting_path(
            cost,
            &u,
            &v,
            &mut path,
            &row4col,
            &mut shortest_path_costs,
            cur_row,
            &mut sr,
            &mut sc,
            &mut remaining,
        )?;

        // Update dual variables
        u[cur_row] += min_val;
        for i in 0..nr {
            if sr[i] && i != cur_row {
                if let Some(j) = col4row[i] {
                    u[i] += min_val - shortest_path_costs[j];
                }
            }
        }
        for j in 0..nc {
            if sc[j] {
                v[j] -= min_val - shortest_path_costs[j];
            }
        }

        // Augment the matching along the recorded path
        let mut j = sink;
        loop {
            let i = path[j];
            row4col[j] = Some(i);
            let previous = col4row[i].replace(j);
            if i == cur_row {
                break;
            }
            match previous {
                Some(p) => j = p,
                None => break,
            }
        }
    }

    col4row
        .into_iter()
        .map(|c| c.ok_or(Error::Infeasible))
        .collect()
}

/// Dijkstra-like search for the cheapest augmenting path from `start_row`.
///
/// Returns the sink column (first unassigned column reached) and the reduced
/// path cost to it.
#[allow(clippy::too_many_arguments)]
fn augmenting_path(
    cost: &DMatrix<f64>,
    u: &[f64],
    v: &[f64],
    path: &mut [usize],
    row4col: &[Option<usize>],
    shortest_path_costs: &mut [f64],
    start_row: usize,
    sr: &mut [bool],
    sc: &mut [bool],
    remaining: &mut [usize],
) -> Result<(usize, f64)> {
    let nc = cost.ncols();
    let mut min_val = 0.0;

    // Columns still to scan, filled in reverse so that the lowest index is
    // visited last when costs tie (same traversal order as scipy).
    let mut num_remaining = nc;
    for it in 0..nc {
        remaining[it] = nc - it - 1;
    }

    sr.iter_mut().for_each(|x| *x = false);
    sc.iter_mut().for_each(|x| *x = false);
    shortest_path_costs.iter_mut().for_each(|x| *x = f64::INFINITY);

    let mut i = start_row;
    loop {
        let mut index = None;
        let mut lowest = f64::INFINITY;
        sr[i] = true;

        for it in 0..num_remaining {
            let j = remaining[it];

            let r = min_val + cost[(i, j)] - u[i] - v[j];
            if r < shortest_path_costs[j] {
                path[j] = i;
                shortest_path_costs[j] = r;
            }

            // Prefer an unassigned column on ties, it ends the search
            if shortest_path_costs[j] < lowest
                || (shortest_path_costs[j] == lowest && row4col[j].is_none())
            {
                lowest = shortest_path_costs[j];
                index = Some(it);
            }
        }

        min_val = lowest;
        let index = match index {
            Some(idx) if min_val.is_finite() => idx,
            _ => return Err(Error::Infeasible),
        };

        let j = remaining[index];
        sc[j] = true;
        num_remaining -= 1;
        remaining[index] = remaining[num_remaining];

        match row4col[j] {
            None => return Ok((j, min_val)),
            Some(next_row) => i = next_row,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn pairs(result: &AssignmentResult) -> Vec<(usize, usize)> {
        result
            .assignments
            .iter()
            .map(|a| (a.row_idx, a.col_idx))
            .collect()
    }

    /// Exhaustive optimum over all row permutations (rows <= cols).
    fn brute_force_min(cost: &DMatrix<f64>) -> f64 {
        fn recurse(cost: &DMatrix<f64>, row: usize, used: &mut Vec<bool>, acc: f64, best: &mut f64) {
            if row == cost.nrows() {
                *best = best.min(acc);
                return;
            }
            for j in 0..cost.ncols() {
                if !used[j] {
                    used[j] = true;
                    recurse(cost, row + 1, used, acc + cost[(row, j)], best);
                    used[j] = false;
                }
            }
        }
        let mut best = f64::INFINITY;
        recurse(cost, 0, &mut vec![false; cost.ncols()], 0.0, &mut best);
        best
    }

    #[test]
    fn test_linear_sum_assignment_basic_square() {
        let cost = DMatrix::from_row_slice(3, 3, &[
            4.0, 1.0, 3.0,
            2.0, 0.0, 5.0,
            3.0, 2.0, 2.0,
        ]);
        let result = linear_sum_assignment(&cost, false).unwrap();

        assert_eq!(pairs(&result), vec![(0, 1), (1, 0), (2, 2)]);
        assert!(result.unmatched_rows.is_empty());
        assert!(result.unmatched_cols.is_empty());
        // Optimal: (0,1)=1 + (1,0)=2 + (2,2)=2 = 5
        assert_relative_eq!(result.total_cost(&cost), 5.0, epsilon = 1e-10);
    }

    #[test]
    fn test_linear_sum_assignment_maximize() {
        let cost = DMatrix::from_row_slice(3, 3, &[
            4.0, 1.0, 3.0,
            2.0, 0.0, 5.0,
            3.0, 2.0, 2.0,
        ]);
        let result = linear_sum_assignment(&cost, true).unwrap();

        assert_eq!(result.assignments.len(), 3);
        // (0,0)=4 + (1,2)=5 + (2,1)=2 = 11
        assert_relative_eq!(result.total_cost(&cost), 11.0, epsilon = 1e-10);
    }

    #[test]
    fn test_linear_sum_assignment_rectangular_more_rows() {
        let cost = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let result = linear_sum_assignment(&cost, false).unwrap();

        // Can only match 2 rows to 2 columns
        assert_eq!(result.assignments.len(), 2);
        assert_eq!(result.unmatched_rows.len(), 1);
        assert!(result.unmatched_cols.is_empty());
        assert_relative_eq!(result.total_cost(&cost), 5.0, epsilon = 1e-10);

        // Pairs come back ordered by original row
        let rows: Vec<usize> = result.assignments.iter().map(|a| a.row_idx).collect();
        let mut sorted = rows.clone();
        sorted.sort_unstable();
        assert_eq!(rows, sorted);
    }

    #[test]
    fn test_linear_sum_assignment_rectangular_more_cols() {
        let cost = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let result = linear_sum_assignment(&cost, false).unwrap();

        assert_eq!(result.assignments.len(), 2);
        assert!(result.unmatched_rows.is_empty());
        assert_eq!(result.unmatched_cols.len(), 1);
        assert_relative_eq!(result.total_cost(&cost), 6.0, epsilon = 1e-10);
    }

    #[test]
    fn test_transpose_independent() {
        let cost = DMatrix::from_row_slice(2, 4, &[
            7.0, 3.0, 9.0, 1.0,
            2.0, 8.0, 4.0, 6.0,
        ]);
        let wide = linear_sum_assignment(&cost, false).unwrap();
        let tall = linear_sum_assignment(&cost.transpose(), false).unwrap();

        let mut swapped: Vec<(usize, usize)> = tall
            .assignments
            .iter()
            .map(|a| (a.col_idx, a.row_idx))
            .collect();
        swapped.sort_unstable();
        assert_eq!(pairs(&wide), swapped);
    }

    #[test]
    fn test_linear_sum_assignment_empty_matrix() {
        let cost: DMatrix<f64> = DMatrix::zeros(0, 0);
        let result = linear_sum_assignment(&cost, false).unwrap();

        assert!(result.assignments.is_empty());
        assert!(result.unmatched_rows.is_empty());
        assert!(result.unmatched_cols.is_empty());
    }

    #[test]
    fn test_linear_sum_assignment_empty_columns() {
        let cost: DMatrix<f64> = DMatrix::zeros(2, 0);
        let result = linear_sum_assignment(&cost, false).unwrap();

        assert!(result.assignments.is_empty());
        assert_eq!(result.unmatched_rows, vec![0, 1]);
        assert!(result.unmatched_cols.is_empty());
    }

    #[test]
    fn test_linear_sum_assignment_single_element() {
        let cost = DMatrix::from_row_slice(1, 1, &[3.0]);
        let result = linear_sum_assignment(&cost, false).unwrap();
        assert_eq!(pairs(&result), vec![(0, 0)]);
    }

    #[test]
    fn test_rejects_nan_and_negative_infinity() {
        let nan = DMatrix::from_row_slice(2, 2, &[1.0, f64::NAN, 0.0, 1.0]);
        assert!(matches!(
            linear_sum_assignment(&nan, false),
            Err(Error::InvalidInput(_))
        ));

        let neg_inf = DMatrix::from_row_slice(1, 2, &[f64::NEG_INFINITY, 0.0]);
        assert!(matches!(
            linear_sum_assignment(&neg_inf, false),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_positive_infinity_forbids_pair() {
        let cost = DMatrix::from_row_slice(2, 2, &[
            f64::INFINITY, 1.0,
            1.0, 100.0,
        ]);
        let result = linear_sum_assignment(&cost, false).unwrap();
        assert_eq!(pairs(&result), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_infeasible() {
        let cost = DMatrix::from_row_slice(2, 2, &[
            f64::INFINITY, 1.0,
            f64::INFINITY, 2.0,
        ]);
        assert_eq!(linear_sum_assignment(&cost, false), Err(Error::Infeasible));
    }

    #[test]
    fn test_zero_costs() {
        let cost: DMatrix<f64> = DMatrix::zeros(3, 3);
        let result = linear_sum_assignment(&cost, false).unwrap();
        assert_eq!(result.assignments.len(), 3);
        assert_relative_eq!(result.total_cost(&cost), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_random_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let rows = rng.gen_range(1..=5);
            let cols = rng.gen_range(rows..=6);
            let cost = DMatrix::from_fn(rows, cols, |_, _| rng.gen_range(0.0..10.0));

            let result = linear_sum_assignment(&cost, false).unwrap();
            assert_eq!(result.assignments.len(), rows);

            let mut seen_rows = vec![false; rows];
            let mut seen_cols = vec![false; cols];
            for a in &result.assignments {
                assert!(!seen_rows[a.row_idx]);
                assert!(!seen_cols[a.col_idx]);
                seen_rows[a.row_idx] = true;
                seen_cols[a.col_idx] = true;
            }

            assert_relative_eq!(result.total_cost(&cost), brute_force_min(&cost), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_random_maximize_is_negated_minimize() {
        let mut rng = StdRng::seed_from_u64(1234);
        for _ in 0..30 {
            let n = rng.gen_range(1..=6);
            let cost = DMatrix::from_fn(n, n, |_, _| rng.gen_range(-5.0..5.0));

            let max_total = linear_sum_assignment(&cost, true).unwrap().total_cost(&cost);
            let negated = -cost.clone();
            let min_negated = linear_sum_assignment(&negated, false)
                .unwrap()
                .total_cost(&negated);

            assert_relative_eq!(max_total, -min_negated, epsilon = 1e-9);
        }
    }
}
