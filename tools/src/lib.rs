use anyhow::Context as _;
use anyhow::Result;
use canopy::PointND;
use itertools::Itertools as _;
use std::env;
use std::fs;
use std::io;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::Registry;
use tracing_tree::HierarchicalLayer;

/// Parse the command-line arguments, handling `--help`.
///
/// Prints the usage and exits if `-h` is given.  Fails if more than
/// `max_free_args` positional arguments are given.
pub fn parse_args(
    mut options: getopts::Options,
    usage: &str,
    help_after: &str,
    max_free_args: usize,
) -> Result<getopts::Matches> {
    options.optflag("h", "help", "print this help menu");

    let matches = options.parse(env::args().skip(1))?;

    if matches.opt_present("h") {
        eprintln!("{}", options.usage(usage));
        eprint!("{help_after}");
        std::process::exit(0);
    }

    if matches.free.len() > max_free_args {
        anyhow::bail!(
            "too many arguments, expected at most {max_free_args}, got {}",
            matches.free.len(),
        );
    }

    Ok(matches)
}

/// Install the tracing subscriber.
///
/// Log filtering is read from the `LOG` environment variable.  If
/// `trace_file` is given, a chrome trace is also written to it, and the
/// returned guard must be kept alive until the program ends.
pub fn init_tracing(trace_file: Option<String>) -> Option<tracing_chrome::FlushGuard> {
    let registry = Registry::default().with(EnvFilter::from_env("LOG")).with(
        HierarchicalLayer::new(4)
            .with_thread_ids(true)
            .with_targets(true)
            .with_bracketed_fields(true),
    );
    match trace_file {
        Some(filename) => {
            let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file(filename)
                .build();
            registry.with(chrome_layer).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Open the given file for reading, or stdin if `path` is `None` or `-`.
pub fn reader(path: Option<&String>) -> Result<Box<dyn io::BufRead>> {
    Ok(match path.map(String::as_str) {
        None | Some("-") => Box::new(io::stdin().lock()),
        Some(path) => {
            let file = fs::File::open(path).with_context(|| format!("failed to open {path:?}"))?;
            Box::new(io::BufReader::new(file))
        }
    })
}

/// Open the given file for writing, or stdout if `path` is `None` or `-`.
pub fn writer(path: Option<&String>) -> Result<Box<dyn io::Write>> {
    Ok(match path.map(String::as_str) {
        None | Some("-") => Box::new(io::BufWriter::new(io::stdout().lock())),
        Some(path) => {
            let file =
                fs::File::create(path).with_context(|| format!("failed to create {path:?}"))?;
            Box::new(io::BufWriter::new(file))
        }
    })
}

/// A set of points read from a text file, of a dimension known at runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct PointSet {
    dimension: usize,
    coordinates: Vec<f64>,
}

impl PointSet {
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            return 0;
        }
        self.coordinates.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `D` is not the dimension of the set.
    pub fn to_points<const D: usize>(&self) -> Vec<PointND<D>> {
        assert_eq!(D, self.dimension, "wrong point dimension");
        self.coordinates
            .chunks_exact(D)
            .map(PointND::<D>::from_column_slice)
            .collect()
    }
}

/// Read points from a text file.
///
/// Each line holds the coordinates of one point, separated by whitespace or
/// commas.  Everything after a `#` is ignored, and so are blank lines.  All
/// points must have the same number of coordinates.
pub fn read_points<R>(r: R) -> Result<PointSet>
where
    R: io::BufRead,
{
    let mut dimension = 0;
    let mut coordinates = Vec::new();

    for (line_idx, line) in r.lines().enumerate() {
        let line_number = line_idx + 1;
        let line = line.with_context(|| format!("failed to read line {line_number}"))?;
        let line = match line.split_once('#') {
            Some((content, _comment)) => content,
            None => &line,
        };

        let len_before = coordinates.len();
        for word in line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|word| !word.is_empty())
        {
            let coordinate: f64 = word.parse().with_context(|| {
                format!("line {line_number}: {word:?} is not a valid number")
            })?;
            if !coordinate.is_finite() {
                anyhow::bail!("line {line_number}: {word:?} is not finite");
            }
            coordinates.push(coordinate);
        }

        let point_dimension = coordinates.len() - len_before;
        if point_dimension == 0 {
            continue;
        }
        if dimension == 0 {
            dimension = point_dimension;
        } else if dimension != point_dimension {
            anyhow::bail!(
                "line {line_number}: expected {dimension} coordinates, found {point_dimension}"
            );
        }
    }

    Ok(PointSet {
        dimension,
        coordinates,
    })
}

/// Write one label per line.
pub fn write_labels<W>(mut w: W, labels: &[usize]) -> io::Result<()>
where
    W: io::Write,
{
    for label in labels {
        writeln!(w, "{label}")?;
    }
    w.flush()
}

/// Format a point as whitespace-separated coordinates, as read by
/// [`read_points`].
pub fn format_point<const D: usize>(point: &PointND<D>) -> String {
    point.iter().join(" ")
}
