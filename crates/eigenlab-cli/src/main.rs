//! # EigenLab CLI
//!
//! Command-line front end for the eigenvalue engine. Matrices are read from JSON
//! files holding an array of rows, e.g. `[[2, 1], [1, 2]]`.

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use eigenlab_core::{
    matrix_from_rows, DeflationCriterion, EigenConfig, EigenPair, Eigenvalue, Matrix,
    ShiftStrategy, Vector,
};
use eigenlab_power::{inverse_power_iteration, power_iteration};
use eigenlab_qr::{
    eigen_decomposition, qr_eigenvalues_with, recover_eigenspace, recover_eigenvector,
    reduced_singular_value_decomposition, singular_value_decomposition,
    symmetric_eigen_decomposition, EigenDecomposition, SingularValueDecomposition, NULL_PIVOT_TOL,
};
use log::{debug, info};
use serde::Serialize;
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "eigenlab")]
#[command(author = "Yatrogenesis")]
#[command(version = "0.1.0")]
#[command(about = "Iterative eigenvalue engine: power, inverse power and QR methods", long_about = None)]
struct Cli {
    /// JSON file with solver parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Convergence tolerance (overrides the config file)
    #[arg(long, global = true)]
    tol: Option<f64>,

    /// Iteration budget (overrides the config file)
    #[arg(long = "max-iter", global = true)]
    max_iter: Option<usize>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dominant eigenpair by power iteration
    Power {
        /// Matrix file (JSON rows)
        matrix: PathBuf,
        /// Starting vector, comma separated
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        start: Option<Vec<f64>>,
    },

    /// Eigenpair closest to a shift by inverse power iteration
    Inverse {
        /// Matrix file (JSON rows)
        matrix: PathBuf,
        /// Target shift σ
        #[arg(short, long, default_value_t = 0.0, allow_hyphen_values = true)]
        shift: f64,
        /// Starting vector, comma separated
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        start: Option<Vec<f64>>,
    },

    /// Full spectrum by the QR algorithm
    Qr {
        /// Matrix file (JSON rows)
        matrix: PathBuf,
        /// Shift strategy
        #[arg(long, value_enum)]
        shift: Option<ShiftArg>,
        /// Deflation test
        #[arg(long, value_enum)]
        deflation: Option<DeflationArg>,
    },

    /// Eigenvector for a known eigenvalue
    Vector {
        /// Matrix file (JSON rows)
        matrix: PathBuf,
        /// Eigenvalue λ
        #[arg(short, long, allow_hyphen_values = true)]
        lambda: f64,
        /// Return an orthonormal basis of the whole eigenspace
        #[arg(long)]
        all: bool,
    },

    /// Eigen-decomposition A = P D P⁻¹
    Decompose {
        /// Matrix file (JSON rows)
        matrix: PathBuf,
        /// Require a symmetric matrix and return an orthonormal P
        #[arg(long)]
        symmetric: bool,
    },

    /// Singular value decomposition A = U Σ Vᵀ
    Svd {
        /// Matrix file (JSON rows)
        matrix: PathBuf,
        /// Keep only min(rows, cols) singular vectors
        #[arg(long)]
        reduced: bool,
    },

    /// List available methods
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ShiftArg {
    Wilkinson,
    Rayleigh,
    Unshifted,
}

impl From<ShiftArg> for ShiftStrategy {
    fn from(arg: ShiftArg) -> Self {
        match arg {
            ShiftArg::Wilkinson => ShiftStrategy::Wilkinson,
            ShiftArg::Rayleigh => ShiftStrategy::Rayleigh,
            ShiftArg::Unshifted => ShiftStrategy::Unshifted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DeflationArg {
    Absolute,
    Relative,
}

impl From<DeflationArg> for DeflationCriterion {
    fn from(arg: DeflationArg) -> Self {
        match arg {
            DeflationArg::Absolute => DeflationCriterion::Absolute,
            DeflationArg::Relative => DeflationCriterion::Relative,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = load_config(cli.config.as_deref(), cli.tol, cli.max_iter)?;
    debug!("solver configuration: {config:?}");

    match cli.command {
        Commands::Power { matrix, start } => {
            let a = load_matrix(&matrix)?;
            let x0 = start.map(Vector::from);
            let it = config.iteration;
            let pair = power_iteration(&a, it.tol, it.max_iterations, x0.as_ref())
                .with_context(|| format!("power iteration on {}", matrix.display()))?;
            report_pair(&pair, "Dominant eigenpair", cli.json)?;
        }

        Commands::Inverse {
            matrix,
            shift,
            start,
        } => {
            let a = load_matrix(&matrix)?;
            let x0 = start.map(Vector::from);
            let it = config.iteration;
            let pair = inverse_power_iteration(&a, shift, it.tol, it.max_iterations, x0.as_ref())
                .with_context(|| {
                    format!("inverse power iteration on {} (σ = {shift})", matrix.display())
                })?;
            report_pair(&pair, &format!("Eigenpair closest to {shift}"), cli.json)?;
        }

        Commands::Qr {
            matrix,
            shift,
            deflation,
        } => {
            let a = load_matrix(&matrix)?;
            let mut params = config.qr;
            if let Some(shift) = shift {
                params.shift = shift.into();
            }
            if let Some(deflation) = deflation {
                params.deflation = deflation.into();
            }
            let report = qr_eigenvalues_with(&a, &params)
                .with_context(|| format!("QR algorithm on {}", matrix.display()))?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!("{}", "Eigenvalues:".green().bold());
                for e in &report.eigenvalues {
                    println!("  {}", format_eigenvalue(e).cyan());
                }
                println!(
                    "  {} passes, {} QR steps ({:?} shift, {:?} deflation)",
                    report.passes, report.qr_steps, params.shift, params.deflation
                );
            }
        }

        Commands::Vector {
            matrix,
            lambda,
            all,
        } => {
            let a = load_matrix(&matrix)?;
            let vectors = eigenvectors_for(&a, lambda, all, &matrix)?;
            if cli.json {
                print_json(&vectors)?;
            } else {
                println!("{} {}", "Eigenvectors for λ =".green().bold(), lambda);
                for v in &vectors {
                    println!("  {}", format_vector(v).cyan());
                }
            }
        }

        Commands::Decompose { matrix, symmetric } => {
            let a = load_matrix(&matrix)?;
            let qr = config.qr;
            let result = if symmetric {
                symmetric_eigen_decomposition(&a, qr.tol, qr.max_iterations)
            } else {
                eigen_decomposition(&a, qr.tol, qr.max_iterations)
            };
            let decomposition = result
                .with_context(|| format!("eigen-decomposition of {}", matrix.display()))?;
            if cli.json {
                print_json(&decomposition)?;
            } else {
                report_decomposition(&decomposition);
            }
        }

        Commands::Svd { matrix, reduced } => {
            let a = load_matrix(&matrix)?;
            let qr = config.qr;
            let result = if reduced {
                reduced_singular_value_decomposition(&a, qr.tol, qr.max_iterations)
            } else {
                singular_value_decomposition(&a, qr.tol, qr.max_iterations)
            };
            let svd = result.with_context(|| format!("SVD of {}", matrix.display()))?;
            if cli.json {
                print_json(&svd)?;
            } else {
                report_svd(&svd);
            }
        }

        Commands::List => {
            println!("{}", "Available methods:".green().bold());
            println!();
            println!("  {} - dominant eigenpair (power iteration)", "power".cyan());
            println!("  {} - eigenpair closest to a shift", "inverse".cyan());
            println!("  {} - full spectrum (shifted QR with deflation)", "qr".cyan());
            println!("  {} - eigenvector recovery for a known λ", "vector".cyan());
            println!("  {} - A = P D P⁻¹", "decompose".cyan());
            println!("  {} - A = U Σ Vᵀ (full or reduced)", "svd".cyan());
        }
    }

    Ok(())
}

// ============================================================================
// SETUP
// ============================================================================

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    CombinedLogger::init(vec![TermLogger::new(
        level_for(verbose),
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .context("installing terminal logger")
}

/// Config file (or defaults) with command-line overrides applied to both solver families
fn load_config(
    path: Option<&Path>,
    tol: Option<f64>,
    max_iter: Option<usize>,
) -> anyhow::Result<EigenConfig> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            parse_config(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EigenConfig::default(),
    };
    apply_overrides(&mut config, tol, max_iter);
    config.iteration.validate()?;
    config.qr.validate()?;
    Ok(config)
}

fn parse_config(text: &str) -> anyhow::Result<EigenConfig> {
    Ok(serde_json::from_str(text)?)
}

fn apply_overrides(config: &mut EigenConfig, tol: Option<f64>, max_iter: Option<usize>) {
    if let Some(tol) = tol {
        config.iteration.tol = tol;
        config.qr.tol = tol;
    }
    if let Some(max_iter) = max_iter {
        config.iteration.max_iterations = max_iter;
        config.qr.max_iterations = max_iter;
    }
}

fn load_matrix(path: &Path) -> anyhow::Result<Matrix> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading matrix {}", path.display()))?;
    let a = parse_matrix(&text).with_context(|| format!("parsing matrix {}", path.display()))?;
    info!("loaded {}x{} matrix from {}", a.nrows(), a.ncols(), path.display());
    Ok(a)
}

fn parse_matrix(text: &str) -> anyhow::Result<Matrix> {
    let rows: Vec<Vec<f64>> = serde_json::from_str(text)?;
    if rows.iter().flatten().any(|x| !x.is_finite()) {
        bail!("matrix entries must be finite");
    }
    Ok(matrix_from_rows(&rows)?)
}

fn eigenvectors_for(
    a: &Matrix,
    lambda: f64,
    all: bool,
    path: &Path,
) -> anyhow::Result<Vec<Vector>> {
    let result = if all {
        recover_eigenspace(a, lambda, NULL_PIVOT_TOL)
    } else {
        recover_eigenvector(a, lambda).map(|v| vec![v])
    };
    result.with_context(|| format!("eigenvector recovery on {}", path.display()))
}

// ============================================================================
// OUTPUT
// ============================================================================

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_eigenvalue(e: &Eigenvalue) -> String {
    match e {
        Eigenvalue::Real(re) => format!("{re:.10}"),
        Eigenvalue::Complex { re, im } if *im < 0.0 => format!("{re:.10} - {:.10}i", -im),
        Eigenvalue::Complex { re, im } => format!("{re:.10} + {im:.10}i"),
    }
}

fn format_vector(v: &Vector) -> String {
    let entries: Vec<String> = v.iter().map(|x| format!("{x:.8}")).collect();
    format!("[{}]", entries.join(", "))
}

fn report_pair(pair: &EigenPair, title: &str, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(pair);
    }
    println!("{}", format!("{title}:").green().bold());
    println!("  λ = {}", format!("{:.10}", pair.value).cyan());
    println!("  v = {}", format_vector(&pair.vector).cyan());
    println!("  converged in {} iterations", pair.iterations);
    Ok(())
}

fn report_decomposition(d: &EigenDecomposition) {
    println!("{}", "Eigenvalues (D):".green().bold());
    for value in &d.eigenvalues {
        println!("  {}", format!("{value:.10}").cyan());
    }
    println!("{}", "Eigenvectors (P, by row):".green().bold());
    for row in d.vectors.rows() {
        println!("  {}", format_vector(&row.to_owned()));
    }
    println!("{}", "P⁻¹ (by row):".green().bold());
    for row in d.inverse.rows() {
        println!("  {}", format_vector(&row.to_owned()));
    }
}

fn report_svd(svd: &SingularValueDecomposition) {
    println!("{}", "Singular values:".green().bold());
    for value in &svd.singular_values {
        println!("  {}", format!("{value:.10}").cyan());
    }
    println!("  rank {}", svd.rank());
    println!("{}", "U (by row):".green().bold());
    for row in svd.u.rows() {
        println!("  {}", format_vector(&row.to_owned()));
    }
    println!("{}", "Vᵀ (by row):".green().bold());
    for row in svd.vt.rows() {
        println!("  {}", format_vector(&row.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_matrix() {
        let a = parse_matrix("[[2, 1], [1, 2]]").unwrap();
        assert_eq!(a.dim(), (2, 2));
        assert_eq!(a[[0, 1]], 1.0);

        assert!(parse_matrix("[[1, 2], [3]]").is_err());
        assert!(parse_matrix("[]").is_err());
        assert!(parse_matrix("{\"rows\": 2}").is_err());
    }

    #[test]
    fn test_config_overrides() {
        let mut config = parse_config(r#"{"qr": {"shift": "rayleigh", "tol": 1e-12}}"#).unwrap();
        assert_eq!(config.qr.shift, ShiftStrategy::Rayleigh);
        assert_eq!(config.qr.tol, 1e-12);
        assert_eq!(config.iteration.max_iterations, 1000);

        apply_overrides(&mut config, None, Some(50));
        assert_eq!(config.qr.tol, 1e-12);
        assert_eq!(config.qr.max_iterations, 50);
        assert_eq!(config.iteration.max_iterations, 50);
    }

    #[test]
    fn test_eigenvector_errors_name_the_file() {
        let path = Path::new("wide.json");
        let err = eigenvectors_for(&Matrix::zeros((2, 3)), 1.0, false, path).unwrap_err();
        assert_eq!(err.to_string(), "eigenvector recovery on wide.json");
        assert!(err.root_cause().to_string().contains("square"));

        let a = parse_matrix("[[2, 0], [0, 3]]").unwrap();
        let vectors = eigenvectors_for(&a, 3.0, true, path).unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0][1].abs(), 1.0);
    }

    #[test]
    fn test_level_for() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "eigenlab", "inverse", "a.json", "--shift", "-1.5", "--start", "1,0,-1", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Inverse { shift, start, .. } => {
                assert_eq!(shift, -1.5);
                assert_eq!(start, Some(vec![1.0, 0.0, -1.0]));
            }
            _ => panic!("expected inverse subcommand"),
        }

        let cli = Cli::try_parse_from(["eigenlab", "qr", "a.json", "--shift", "unshifted", "--json"])
            .unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Qr {
                shift: Some(ShiftArg::Unshifted),
                ..
            }
        ));

        let cli = Cli::try_parse_from(["eigenlab", "svd", "a.json", "--reduced"]).unwrap();
        match cli.command {
            Commands::Svd { matrix, reduced } => {
                assert_eq!(matrix, PathBuf::from("a.json"));
                assert!(reduced);
            }
            _ => panic!("expected svd subcommand"),
        }
    }

    #[test]
    fn test_format_eigenvalue() {
        assert_eq!(format_eigenvalue(&Eigenvalue::Real(2.0)), "2.0000000000");
        assert_eq!(
            format_eigenvalue(&Eigenvalue::Complex { re: 0.0, im: -1.0 }),
            "0.0000000000 - 1.0000000000i"
        );
    }
}
