//! Binary space partition design-point selection.
//!
//! The candidate pool is recursively bisected at the median along shuffled
//! dimensions until the partition count reaches the target design size, then
//! one feasible row is sampled from each partition. The partitioning
//! approximates a balanced k-d-tree-like decomposition, guaranteeing spatial
//! spread across all dimensions at
//! O(design_points * log(pool_size) * dimensions) cost, far below a
//! metaheuristic search over subsets.

use crate::collection::Collection;
use crate::errors::{DesignError, Result};
use crate::feasibility::{Feasibility, FeasibilityInput};
use log::{debug, info};
use ndarray::Array2;
use ndarray_rand::rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::path::Path;

/// Default bound on feasibility-sampling retries per partition.
pub const DEFAULT_MAX_RETRIES: usize = 1000;

/// Binary space partition designer over a candidate pool.
///
/// Progresses through three states: partitions are built with
/// [`BinarySpacePartition::create_bs_partitions`], a design is drawn with
/// [`BinarySpacePartition::sample_partitions_to_design`], and the design can
/// then be persisted. Calling the steps out of order is an
/// [`DesignError::InvalidState`] error.
pub struct BinarySpacePartition<'a, R: Rng + SeedableRng + Clone> {
    collection: &'a Collection,
    design_points: usize,
    max_retries: usize,
    sample_seed: u64,
    /// Random generator driving the dimension shuffles
    rng: R,
    partitions: Vec<Vec<usize>>,
    design: Option<Vec<usize>>,
}

/// BSP with the default random generator
impl<'a> BinarySpacePartition<'a, Xoshiro256Plus> {
    /// Constructor given a candidate pool and a target design size.
    pub fn new(
        collection: &'a Collection,
        design_points: usize,
    ) -> BinarySpacePartition<'a, Xoshiro256Plus> {
        BinarySpacePartition {
            collection,
            design_points,
            max_retries: DEFAULT_MAX_RETRIES,
            sample_seed: 0,
            rng: Xoshiro256Plus::from_entropy(),
            partitions: Vec::new(),
            design: None,
        }
    }
}

impl<'a, R: Rng + SeedableRng + Clone> BinarySpacePartition<'a, R> {
    /// Sets the random generator used for dimension shuffles.
    pub fn with_rng<R2: Rng + SeedableRng + Clone>(
        self,
        rng: R2,
    ) -> BinarySpacePartition<'a, R2> {
        BinarySpacePartition {
            collection: self.collection,
            design_points: self.design_points,
            max_retries: self.max_retries,
            sample_seed: self.sample_seed,
            rng,
            partitions: self.partitions,
            design: self.design,
        }
    }

    /// Sets the base seed of the per-partition sampling draws.
    ///
    /// Each draw is seeded with `seed + partition_index + retry`, so a
    /// design run is reproducible independently of how many draws earlier
    /// partitions consumed.
    pub fn sample_seed(mut self, seed: u64) -> Self {
        self.sample_seed = seed;
        self
    }

    /// Sets the bound on feasibility-sampling retries per partition.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Recursively bisects the pool into exactly `design_points` partitions.
    ///
    /// The dimension order is reshuffled each sweep; within a dimension the
    /// partition list is scanned left to right in steps of two, so the upper
    /// half just inserted is not immediately split again. A partition is
    /// split at the median of the current dimension, the lower half keeping
    /// the floor of the size (deterministic given the sort). Partitions of
    /// size one are terminal and skipped. The process stops the moment the
    /// partition count reaches the target, mid-sweep.
    pub fn create_bs_partitions(&mut self) -> Result<()> {
        let pool_size = self.collection.nrows();
        if self.design_points == 0 {
            return Err(DesignError::InvalidValue(
                "design_points must be at least 1".to_string(),
            ));
        }
        if self.design_points > pool_size {
            return Err(DesignError::InfeasibleTargetSize {
                requested: self.design_points,
                reached: if pool_size == 0 { 0 } else { 1 },
                pool_size,
            });
        }

        self.design = None;
        self.partitions = vec![(0..pool_size).collect()];
        let ncols = self.collection.variables().len();
        let data = self.collection.data();

        let mut make_partition = self.partitions.len() < self.design_points;
        while make_partition {
            let mut dimensions: Vec<usize> = (0..ncols).collect();
            dimensions.shuffle(&mut self.rng);

            let mut progressed = false;
            for &dim in &dimensions {
                let mut part_ind = 0;
                while self.partitions.len() < self.design_points
                    && part_ind < self.partitions.len()
                {
                    if self.partitions[part_ind].len() < 2 {
                        // terminal partition, cannot be split further
                        part_ind += 1;
                        continue;
                    }
                    let mut indices = std::mem::take(&mut self.partitions[part_ind]);
                    indices.sort_by(|a, b| data[[*a, dim]].total_cmp(&data[[*b, dim]]));
                    let upper_half = indices.split_off(indices.len() / 2);
                    self.partitions[part_ind] = indices;
                    self.partitions.insert(part_ind + 1, upper_half);
                    progressed = true;
                    part_ind += 2;
                }
                if self.partitions.len() >= self.design_points {
                    break;
                }
            }

            make_partition = self.partitions.len() < self.design_points;
            if make_partition && !progressed {
                // no partition could be split in a full sweep
                return Err(DesignError::InfeasibleTargetSize {
                    requested: self.design_points,
                    reached: self.partitions.len(),
                    pool_size,
                });
            }
        }
        debug!(
            "created {} partitions from {} candidate rows",
            self.partitions.len(),
            pool_size
        );
        Ok(())
    }

    /// Draws one feasible row from each partition, in partition order.
    ///
    /// Each draw runs a fresh generator seeded from the partition index and
    /// retry count (see [`BinarySpacePartition::sample_seed`]). A partition
    /// exhausting the retry budget without a feasible row is a
    /// [`DesignError::NoFeasibleRow`] error rather than an unbounded loop.
    pub fn sample_partitions_to_design(
        &mut self,
        feasibility: Option<&dyn Feasibility>,
    ) -> Result<&[usize]> {
        if self.partitions.is_empty() {
            return Err(DesignError::InvalidState(
                "create_bs_partitions must be called before sampling".to_string(),
            ));
        }

        let mut design = Vec::with_capacity(self.partitions.len());
        for (part_ind, partition) in self.partitions.iter().enumerate() {
            let mut accepted = None;
            for retry in 0..self.max_retries {
                let mut rng =
                    R::seed_from_u64(self.sample_seed.wrapping_add((part_ind + retry) as u64));
                let row = partition[rng.gen_range(0..partition.len())];
                let feasible = match feasibility {
                    Some(constraint) => {
                        let input = FeasibilityInput::from_collection_row(self.collection, row)?;
                        constraint.is_feasible(&input)
                    }
                    None => true,
                };
                if feasible {
                    accepted = Some(row);
                    break;
                }
            }
            match accepted {
                Some(row) => design.push(row),
                None => {
                    return Err(DesignError::NoFeasibleRow {
                        partition: part_ind,
                        retries: self.max_retries,
                    })
                }
            }
        }
        info!("sampled a design of {} points", design.len());
        self.design = Some(design);
        Ok(self.design.as_deref().unwrap())
    }

    /// The partitions, as row-index sets into the pool.
    pub fn partitions(&self) -> &[Vec<usize>] {
        &self.partitions
    }

    /// The sampled design rows, if a design has been drawn.
    pub fn design(&self) -> Option<&[usize]> {
        self.design.as_deref()
    }

    /// The sampled design as a dense matrix of physical values.
    pub fn design_matrix(&self) -> Result<Array2<f64>> {
        let design = self.design.as_ref().ok_or_else(|| {
            DesignError::InvalidState("no design sampled yet".to_string())
        })?;
        Ok(self.collection.select_rows(design))
    }

    /// Writes the sampled design as a CSV with the original column layout.
    pub fn write_design(&self, path: &Path) -> Result<()> {
        let design = self.design.as_ref().ok_or_else(|| {
            DesignError::InvalidState("no design sampled yet".to_string())
        })?;
        self.collection.write_design_csv(path, design)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::DesignVariable;
    use ndarray::Array;
    use std::collections::HashSet;

    fn pool(nrows: usize) -> Collection {
        // two columns walking in opposite directions keeps median splits
        // non-trivial in both dimensions
        let data = Array::from_shape_fn((nrows, 2), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                (nrows - i) as f64 * 0.1
            }
        });
        Collection::from_array(
            vec![DesignVariable::QInv, DesignVariable::Lwp],
            data,
        )
        .unwrap()
    }

    fn seeded(
        collection: &Collection,
        design_points: usize,
    ) -> BinarySpacePartition<'_, Xoshiro256Plus> {
        BinarySpacePartition::new(collection, design_points)
            .with_rng(Xoshiro256Plus::seed_from_u64(321))
            .sample_seed(321)
    }

    fn assert_partitions_cover_pool(partitions: &[Vec<usize>], pool_size: usize) {
        let mut seen = HashSet::new();
        for partition in partitions {
            assert!(!partition.is_empty(), "empty partition");
            for &row in partition {
                assert!(seen.insert(row), "row {row} appears in two partitions");
            }
        }
        assert_eq!(seen.len(), pool_size, "partitions do not cover the pool");
    }

    #[test]
    fn test_twenty_rows_four_partitions_of_five() {
        let collection = pool(20);
        let mut bsp = seeded(&collection, 4);
        bsp.create_bs_partitions().unwrap();

        let sizes: Vec<usize> = bsp.partitions().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 5, 5, 5]);
        assert_partitions_cover_pool(bsp.partitions(), 20);
    }

    #[test]
    fn test_partition_count_and_coverage() {
        for (nrows, design_points) in [(20, 7), (33, 13), (16, 16), (10, 1)] {
            let collection = pool(nrows);
            let mut bsp = seeded(&collection, design_points);
            bsp.create_bs_partitions().unwrap();
            assert_eq!(bsp.partitions().len(), design_points);
            assert_partitions_cover_pool(bsp.partitions(), nrows);
        }
    }

    #[test]
    fn test_target_larger_than_pool_fails_fast() {
        let collection = pool(5);
        let mut bsp = seeded(&collection, 6);
        let result = bsp.create_bs_partitions();
        assert!(matches!(
            result,
            Err(DesignError::InfeasibleTargetSize {
                requested: 6,
                pool_size: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_sample_without_partitions_is_invalid_state() {
        let collection = pool(10);
        let mut bsp = seeded(&collection, 4);
        assert!(matches!(
            bsp.sample_partitions_to_design(None),
            Err(DesignError::InvalidState(_))
        ));
    }

    #[test]
    fn test_sample_one_row_per_partition() {
        let collection = pool(20);
        let mut bsp = seeded(&collection, 4);
        bsp.create_bs_partitions().unwrap();
        let design: Vec<usize> = bsp.sample_partitions_to_design(None).unwrap().to_vec();

        assert_eq!(design.len(), 4);
        let distinct: HashSet<usize> = design.iter().copied().collect();
        assert_eq!(distinct.len(), 4, "duplicate rows in design");
        for (row, partition) in design.iter().zip(bsp.partitions()) {
            assert!(partition.contains(row), "row not drawn from its partition");
        }
    }

    #[test]
    fn test_always_true_predicate_yields_full_design() {
        let collection = Collection::from_array(
            vec![
                DesignVariable::QInv,
                DesignVariable::Lwp,
                DesignVariable::TpotPbl,
                DesignVariable::Pbl,
            ],
            Array::from_shape_fn((20, 4), |(i, j)| (i * 7 + j * 3) as f64),
        )
        .unwrap();
        let mut bsp = seeded(&collection, 6);
        bsp.create_bs_partitions().unwrap();
        let always = |_: &FeasibilityInput| true;
        let design = bsp.sample_partitions_to_design(Some(&always)).unwrap();
        assert_eq!(design.len(), 6);
        let distinct: HashSet<usize> = design.iter().copied().collect();
        assert_eq!(distinct.len(), 6);
    }

    #[test]
    fn test_infeasible_partition_exhausts_retries() {
        let collection = Collection::from_array(
            vec![
                DesignVariable::QInv,
                DesignVariable::Lwp,
                DesignVariable::TpotPbl,
                DesignVariable::Pbl,
            ],
            Array::from_shape_fn((8, 4), |(i, j)| (i * 4 + j) as f64),
        )
        .unwrap();
        let mut bsp = seeded(&collection, 4).max_retries(10);
        bsp.create_bs_partitions().unwrap();

        let never = |_: &FeasibilityInput| false;
        let result = bsp.sample_partitions_to_design(Some(&never));
        assert!(matches!(
            result,
            Err(DesignError::NoFeasibleRow {
                partition: 0,
                retries: 10,
            })
        ));
    }

    #[test]
    fn test_feasible_rows_only_in_design() {
        let collection = Collection::from_array(
            vec![
                DesignVariable::QInv,
                DesignVariable::Lwp,
                DesignVariable::TpotPbl,
                DesignVariable::Pbl,
            ],
            Array::from_shape_fn((16, 4), |(i, j)| {
                if j == 0 {
                    i as f64 // q_inv: 0..15
                } else {
                    (i + j) as f64
                }
            }),
        )
        .unwrap();
        let mut bsp = seeded(&collection, 4);
        bsp.create_bs_partitions().unwrap();

        // reject the upper half of the q_inv range
        let constraint = |input: &FeasibilityInput| input.q_inv < 8.;
        let design = bsp
            .sample_partitions_to_design(Some(&constraint))
            .map(<[usize]>::to_vec);
        match design {
            Ok(rows) => {
                for row in rows {
                    assert!(collection.value(row, DesignVariable::QInv).unwrap() < 8.);
                }
            }
            // a partition made only of rejected rows must report, not hang
            Err(DesignError::NoFeasibleRow { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reproducible_given_seeds() {
        let collection = pool(30);

        let mut first = seeded(&collection, 8);
        first.create_bs_partitions().unwrap();
        let design_a: Vec<usize> = first.sample_partitions_to_design(None).unwrap().to_vec();

        let mut second = seeded(&collection, 8);
        second.create_bs_partitions().unwrap();
        let design_b: Vec<usize> = second.sample_partitions_to_design(None).unwrap().to_vec();

        assert_eq!(first.partitions(), second.partitions());
        assert_eq!(design_a, design_b);
    }

    #[test]
    fn test_design_matrix_shape() {
        let collection = pool(20);
        let mut bsp = seeded(&collection, 5);
        bsp.create_bs_partitions().unwrap();
        bsp.sample_partitions_to_design(None).unwrap();
        let matrix = bsp.design_matrix().unwrap();
        assert_eq!(matrix.dim(), (5, 2));
    }
}
