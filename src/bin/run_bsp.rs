//! Best-of-repetitions BSP design generation.
//!
//! Runs the binary space partition designer for one simulation set and one
//! design size, keeps the repetition scoring best on the chosen criterion
//! (evaluated in unit hypercube coordinates), and writes the winning design
//! plus a summary statistics row.

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use eclair_design::collection::{write_stats_csv, DesignStats};
use eclair_design::metrics::{matrix_minimum_distance, max_pro_measure};
use eclair_design::{
    AdiabaticCloudConstraint, BinarySpacePartition, Collection, DesignVariable, Estimator,
    IndexSearch, LookUpTable, SimulationSet,
};
use log::info;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Criterion {
    /// Maximize the minimum pairwise distance
    Maximin,
    /// Minimize the maximum projection measure
    Maxpro,
}

impl Criterion {
    fn folder(&self) -> &'static str {
        match self {
            Criterion::Maximin => "maximin",
            Criterion::Maxpro => "maxpro",
        }
    }
}

#[derive(Parser)]
#[command(name = "run_bsp", about = "Generate a BSP design for a simulation set")]
struct Args {
    /// Simulation set: SBnight, SBday, SALSAnight or SALSAday
    #[arg(long)]
    set: String,

    /// Quality criterion used to pick the best repetition
    #[arg(long, value_enum, default_value_t = Criterion::Maximin)]
    criterion: Criterion,

    /// Target number of design points
    #[arg(long)]
    design_points: usize,

    /// Number of independent repetitions to draw
    #[arg(long, default_value_t = 1)]
    repetitions: usize,

    /// Candidate pool CSV (leading index column, one column per variable)
    #[arg(long)]
    source: PathBuf,

    /// Root directory for designs and statistics
    #[arg(long, default_value = "data/02_raw_output")]
    output_dir: PathBuf,

    /// Base random seed; repetition k uses seed + k
    #[arg(long, default_value_t = 321)]
    seed: u64,

    /// Feasibility-sampling retry budget per partition
    #[arg(long, default_value_t = 1000)]
    max_retries: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let set: SimulationSet = args.set.parse()?;
    let variables = set.variables();

    LookUpTable::create_look_up_tables(&args.source, &variables)?;
    let lut = LookUpTable::load(&args.source, &variables)?;

    let mut collection = Collection::read_csv(&args.source, &variables)?;
    if variables.contains(&DesignVariable::CosMu) {
        collection = collection.filter_above_epsilon(DesignVariable::CosMu)?;
    }

    let constraint = AdiabaticCloudConstraint::default();
    let started = Instant::now();

    let mut best_value = match args.criterion {
        Criterion::Maximin => f64::NEG_INFINITY,
        Criterion::Maxpro => f64::INFINITY,
    };
    let mut best_rows: Option<Vec<usize>> = None;

    for rep in 0..args.repetitions {
        let rep_seed = args.seed.wrapping_add(rep as u64);
        let mut bsp = BinarySpacePartition::new(&collection, args.design_points)
            .with_rng(Xoshiro256Plus::seed_from_u64(rep_seed))
            .sample_seed(rep_seed)
            .max_retries(args.max_retries);
        bsp.create_bs_partitions()?;
        bsp.sample_partitions_to_design(Some(&constraint))?;

        let hypercube = lut.downscale_matrix(
            &bsp.design_matrix()?,
            &variables,
            IndexSearch::default(),
            Estimator::default(),
        )?;
        let value = match args.criterion {
            Criterion::Maximin => matrix_minimum_distance(&hypercube),
            Criterion::Maxpro => max_pro_measure(&hypercube),
        };
        info!("repetition {rep}: {:?} = {value:.6}", args.criterion);

        let improved = match args.criterion {
            Criterion::Maximin => value > best_value,
            Criterion::Maxpro => value < best_value,
        };
        if improved {
            best_value = value;
            best_rows = Some(
                bsp.design()
                    .ok_or_else(|| anyhow!("design missing after sampling"))?
                    .to_vec(),
            );
        }
    }
    let duration_s = started.elapsed().as_secs_f64();

    let best_rows = best_rows.context("no repetition produced a design")?;
    let stats_dir = args
        .output_dir
        .join(format!("design_stats_{}", args.criterion.folder()))
        .join(set.as_str());

    let design_path = stats_dir
        .join("bsp")
        .join(format!("bsp_{}.csv", args.design_points));
    collection.write_design_csv(&design_path, &best_rows)?;

    write_stats_csv(
        &stats_dir.join("bsp_stats.csv"),
        &[DesignStats {
            design_points: args.design_points,
            criterion_value: best_value,
            duration_s,
        }],
    )?;

    info!(
        "best {:?} over {} repetitions: {best_value:.6} ({duration_s:.1} s)",
        args.criterion, args.repetitions
    );
    Ok(())
}
