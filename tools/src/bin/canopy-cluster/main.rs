use anyhow::Context as _;
use anyhow::Result;
use canopy::CanopyKMeans;
use canopy::Clustering;
use canopy::Measure;
use canopy::Partition as _;
use canopy::PointND;
use canopy_tools::PointSet;
use std::io::Write as _;

const USAGE: &str = "Usage: canopy-cluster --t1 T1 --t2 T2 [options] [in-points [out-labels]]";

const HELP_AFTER: &str = include_str!("help_after.txt");

fn print_clustering<const D: usize>(
    clustering: &Clustering<D>,
    verbose: bool,
    history: bool,
) -> Result<()> {
    let mut stderr = std::io::stderr().lock();

    if verbose {
        writeln!(stderr, "canopies:")?;
        for canopy in &clustering.canopies {
            writeln!(stderr, "  {canopy}")?;
        }
    }

    if history {
        for (iteration, generation) in clustering.refinement.generations.iter().enumerate() {
            writeln!(stderr, "generation {iteration}:")?;
            for cluster in generation {
                writeln!(stderr, "  {cluster}")?;
            }
        }
    } else if verbose {
        writeln!(stderr, "clusters:")?;
        for cluster in clustering.clusters() {
            writeln!(stderr, "  {cluster}")?;
        }
    }

    if verbose {
        writeln!(
            stderr,
            "{} after {} iteration(s)",
            if clustering.refinement.converged {
                "converged"
            } else {
                "did not converge"
            },
            clustering.refinement.iteration_count(),
        )?;
    }

    Ok(())
}

fn cluster<const D: usize>(
    points: PointSet,
    mut algorithm: CanopyKMeans<Measure>,
    matches: getopts::Matches,
) -> Result<()> {
    let points: Vec<PointND<D>> = points.to_points();
    let mut labels = vec![0; points.len()];

    let clustering = algorithm
        .partition(&mut labels, &points[..])
        .context("clustering failed")?;

    print_clustering(&clustering, matches.opt_present("v"), matches.opt_present("H"))?;

    let output = canopy_tools::writer(matches.free.get(1))?;
    canopy_tools::write_labels(output, &labels).context("failed to write labels")?;

    Ok(())
}

fn main() -> Result<()> {
    let mut options = getopts::Options::new();
    options.optopt("", "t1", "outer canopy threshold (required)", "DISTANCE");
    options.optopt("", "t2", "inner canopy threshold (required)", "DISTANCE");
    options.optopt(
        "m",
        "measure",
        "distance measure, see MEASURES (default: manhattan)",
        "NAME",
    );
    options.optopt(
        "n",
        "max-iter",
        "maximum number of refinement iterations (default: 10)",
        "COUNT",
    );
    options.optopt(
        "e",
        "epsilon",
        "convergence threshold on center displacement (default: 0.001)",
        "DISTANCE",
    );
    options.optopt(
        "f",
        "fraction",
        "share of the points a canopy must exceed to seed a cluster (default: 0.05)",
        "FRACTION",
    );
    options.optflag("v", "verbose", "print canopies and clusters to stderr");
    options.optflag("H", "history", "print every cluster generation to stderr");
    options.optopt("t", "trace", "emit a chrome trace", "FILE");

    let matches = canopy_tools::parse_args(options, USAGE, HELP_AFTER, 2)?;

    let _guard = canopy_tools::init_tracing(matches.opt_str("t"));

    let defaults = CanopyKMeans::<Measure>::default();
    let algorithm = CanopyKMeans {
        t1: matches
            .opt_get("t1")
            .context("invalid value for option 't1'")?
            .context("missing required option 't1'")?,
        t2: matches
            .opt_get("t2")
            .context("invalid value for option 't2'")?
            .context("missing required option 't2'")?,
        measure: matches
            .opt_get_default("m", defaults.measure)
            .context("invalid value for option 'measure'")?,
        max_iter: matches
            .opt_get_default("n", defaults.max_iter)
            .context("invalid value for option 'max-iter'")?,
        epsilon: matches
            .opt_get_default("e", defaults.epsilon)
            .context("invalid value for option 'epsilon'")?,
        population_fraction: matches
            .opt_get_default("f", defaults.population_fraction)
            .context("invalid value for option 'fraction'")?,
    };
    algorithm.check().context("invalid settings")?;

    let input = canopy_tools::reader(matches.free.first())?;
    let points = canopy_tools::read_points(input)?;
    tracing::info!(
        count = points.len(),
        dimension = points.dimension(),
        "read points"
    );

    match points.dimension() {
        0 => anyhow::bail!("no points in input"),
        1 => cluster::<1>(points, algorithm, matches),
        2 => cluster::<2>(points, algorithm, matches),
        3 => cluster::<3>(points, algorithm, matches),
        n => anyhow::bail!("expected 1D, 2D or 3D points, got {n}D points"),
    }
}
