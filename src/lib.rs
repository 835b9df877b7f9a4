/*!
This library generates and evaluates space-filling experimental designs for
the ECLAIR LES emulator study: subsets of a large candidate dataset chosen as
simulation inputs, under a physical feasibility constraint.

The core pieces are:
* [Binary space partition](crate::bsp::BinarySpacePartition) design-point
  selection: recursive median bisection of the candidate pool along shuffled
  dimensions, then constrained sampling of one row per partition,
* [Look-up tables](crate::lut::LookUpTable) mapping bidirectionally between
  physical values and empirical-quantile ranks in the unit hypercube,
* [Space-filling quality metrics](crate::metrics): maximin distance and the
  MaxPro measure,
* [Fill distance](crate::fill_distance) of a design against a
  feasibility-filtered Sobol reference of the unit hypercube.

Example:
```
use eclair_design::{BinarySpacePartition, Collection, DesignVariable};
use eclair_design::metrics::matrix_minimum_distance;
use ndarray::Array;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

// A synthetic 20-row candidate pool over two design variables.
let pool = Collection::from_array(
    vec![DesignVariable::QInv, DesignVariable::Lwp],
    Array::from_shape_fn((20, 2), |(i, j)| (i * 3 + j) as f64),
).unwrap();

// Partition it into 4 groups and draw one row from each.
let mut bsp = BinarySpacePartition::new(&pool, 4)
    .with_rng(Xoshiro256Plus::seed_from_u64(321));
bsp.create_bs_partitions().unwrap();
bsp.sample_partitions_to_design(None).unwrap();

let spread = matrix_minimum_distance(&bsp.design_matrix().unwrap());
assert!(spread > 0.);
```

Randomness is always owned by the component and explicitly seeded, so a
given (variable set, design size, seed) job reproduces bit for bit.
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod bsp;
pub mod collection;
pub mod errors;
pub mod feasibility;
pub mod fill_distance;
pub mod lut;
pub mod meteo;
pub mod metrics;
pub mod variables;

pub use bsp::BinarySpacePartition;
pub use collection::Collection;
pub use errors::{DesignError, Result};
pub use feasibility::{AdiabaticCloudConstraint, Feasibility, FeasibilityInput};
pub use fill_distance::{fill_distance, sobol_hypercube, SobolReference};
pub use lut::{Estimator, IndexSearch, LookUpTable, VariableTable};
pub use variables::{DesignVariable, SimulationSet};
