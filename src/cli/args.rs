//! Command-line argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Scorebin - WoE binning and scorecard construction for binary targets
#[derive(Parser, Debug)]
#[command(name = "scorebin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit binning tables on a training dataset
    Fit {
        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Target column name (binary 0/1 unless a mapping is given)
        #[arg(short, long)]
        target: String,

        /// Value in target column that represents EVENT (maps to 1).
        /// Required with --non-event-value when target is not binary 0/1.
        #[arg(long)]
        event_value: Option<String>,

        /// Value in target column that represents NON-EVENT (maps to 0).
        /// Required with --event-value when target is not binary 0/1.
        #[arg(long)]
        non_event_value: Option<String>,

        /// Output path for the fitted tables in flat CSV form.
        /// Defaults to the input directory with a '_bins.csv' suffix.
        #[arg(long)]
        bins_out: Option<PathBuf>,

        /// Optional JSON export with run metadata alongside the flat form
        #[arg(long)]
        json_out: Option<PathBuf>,

        /// Variables to bin (comma-separated). Default: every column except
        /// the target.
        #[arg(long, value_delimiter = ',')]
        variables: Vec<String>,

        /// Minimum number of regular bins per variable
        #[arg(long, default_value = "2")]
        min_bins: usize,

        /// Maximum number of regular bins per variable
        #[arg(long, default_value = "8")]
        max_bins: usize,

        /// Number of quantile pre-bins before merging
        #[arg(long, default_value = "50")]
        prebins: usize,

        /// Minimum bin size as a fraction of total regular rows (0-1)
        #[arg(long, default_value = "0.05", value_parser = validate_fraction)]
        min_bin_frac: f64,

        /// Chi-square threshold below which adjacent bins keep merging
        #[arg(long, default_value = "3.841")]
        merge_threshold: f64,

        /// Disable monotonic WoE enforcement for numeric variables
        #[arg(long, default_value = "false")]
        no_monotonic: bool,

        /// Variables exempt from monotonicity (comma-separated)
        #[arg(long, value_delimiter = ',')]
        monotonic_skip: Vec<String>,

        /// Maximum distinct categories per categorical variable
        #[arg(long, default_value = "50")]
        max_categories: usize,

        /// JSON file with per-variable special value groups,
        /// e.g. {"age": [[-999], ["N/A"]]}
        #[arg(long)]
        special_values: Option<PathBuf>,

        /// JSON file with per-variable explicit breaks,
        /// e.g. {"age": [30, 45], "grade": [["a","b"], ["c"]]}
        #[arg(long)]
        breaks: Option<PathBuf>,

        /// Abort the whole fit when any variable cannot be binned,
        /// instead of emitting a degenerate single-bin table
        #[arg(long, default_value = "false")]
        strict: bool,
    },

    /// WoE-encode a dataset using fitted binning tables
    Apply {
        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Fitted binning tables in flat CSV form (from `fit`)
        #[arg(long)]
        bins: PathBuf,

        /// Output file path (CSV or Parquet, determined by extension)
        #[arg(short, long)]
        output: PathBuf,

        /// Also emit `<var>_bin` label columns next to the WoE columns
        #[arg(long, default_value = "false")]
        bin_labels: bool,

        /// Policy for unseen categories and unfitted missing values:
        /// "error" or "neutral"
        #[arg(long, default_value = "error")]
        unknown: String,
    },

    /// Build a points-based scorecard from fitted tables and a model
    Scorecard {
        /// Fitted binning tables in flat CSV form (from `fit`)
        #[arg(long)]
        bins: PathBuf,

        /// Logistic model JSON: {"intercept": f64, "coefficients": {"<var>_woe": f64}}
        #[arg(long)]
        model: PathBuf,

        /// Output path for the scorecard in flat CSV form
        #[arg(short, long)]
        output: PathBuf,

        /// Total score at the reference odds
        #[arg(long, default_value = "600")]
        target_score: f64,

        /// Good:bad odds at the target score
        #[arg(long, default_value = "50")]
        target_odds: f64,

        /// Points to double the odds
        #[arg(long, default_value = "20")]
        pdo: f64,

        /// Spread the base points evenly across variables instead of
        /// reporting them separately
        #[arg(long, default_value = "false")]
        spread_base: bool,
    },

    /// Score a dataset against a built scorecard
    Score {
        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Scorecard in flat CSV form (from `scorecard`)
        #[arg(long)]
        card: PathBuf,

        /// Output file path (CSV or Parquet, determined by extension)
        #[arg(short, long)]
        output: PathBuf,

        /// Also emit per-variable `<var>_points` columns
        #[arg(long, default_value = "false")]
        detail: bool,

        /// Policy for unseen categories and unfitted missing values:
        /// "error" or "neutral"
        #[arg(long, default_value = "error")]
        unknown: String,
    },
}

/// Derive the default bins output path: input directory, '_bins.csv' suffix
pub fn default_bins_path(input: &std::path::Path) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| std::path::Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    parent.join(format!("{}_bins.csv", stem))
}

/// Validator for fraction parameters
fn validate_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "fraction must be between 0.0 and 1.0, got {}",
            value
        ))
    } else {
        Ok(value)
    }
}
