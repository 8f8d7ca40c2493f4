//! Scorebin: WoE binning and scorecard CLI
//!
//! Fits weight-of-evidence binning tables on a binary-target dataset,
//! encodes datasets through fitted tables, and builds and applies
//! points-based scorecards.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use scorebin::cli::{default_bins_path, Cli, Commands};
use scorebin::pipeline::{
    apply_woe, fit_bins, load_dataset, save_dataset, tables_from_dataframe, tables_to_dataframe,
    ApplyConfig, BinningConfig, BinningTable, BreakSpec, SpecialValue, TargetMapping,
    UnknownHandling,
};
use scorebin::report::{export_fit, ExportParams, FitSummary};
use scorebin::scorecard::{
    apply_scorecard, build_scorecard, card_from_dataframe, card_to_dataframe, Calibration,
    FittedModel, ScoreConfig, Scorecard,
};
use scorebin::utils::progress::{create_spinner, finish_with_success};
use scorebin::utils::styling::{
    print_banner, print_completion, print_config, print_step_header, print_success,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fit {
            input,
            target,
            event_value,
            non_event_value,
            bins_out,
            json_out,
            variables,
            min_bins,
            max_bins,
            prebins,
            min_bin_frac,
            merge_threshold,
            no_monotonic,
            monotonic_skip,
            max_categories,
            special_values,
            breaks,
            strict,
        } => {
            let bins_out = bins_out.unwrap_or_else(|| default_bins_path(&input));
            let mapping = target_mapping(event_value, non_event_value)?;

            let config = BinningConfig {
                min_bins,
                max_bins,
                prebins,
                min_bin_frac,
                merge_threshold,
                monotonic: !no_monotonic,
                monotonic_skip,
                special_values: load_special_values(special_values.as_deref())?,
                breaks: load_breaks(breaks.as_deref())?,
                max_categories,
                strict,
                variables: if variables.is_empty() {
                    None
                } else {
                    Some(variables)
                },
            };

            run_fit(
                &input,
                &target,
                mapping.as_ref(),
                &config,
                &bins_out,
                json_out.as_deref(),
            )
        }
        Commands::Apply {
            input,
            bins,
            output,
            bin_labels,
            unknown,
        } => {
            let config = ApplyConfig {
                unknown: parse_unknown(&unknown)?,
                bin_labels,
            };
            run_apply(&input, &bins, &output, &config)
        }
        Commands::Scorecard {
            bins,
            model,
            output,
            target_score,
            target_odds,
            pdo,
            spread_base,
        } => {
            let calibration = Calibration {
                target_score,
                target_odds,
                pdo,
            };
            run_scorecard(&bins, &model, &output, &calibration, spread_base)
        }
        Commands::Score {
            input,
            card,
            output,
            detail,
            unknown,
        } => {
            let config = ScoreConfig {
                unknown: parse_unknown(&unknown)?,
                detail,
            };
            run_score(&input, &card, &output, &config)
        }
    }
}

fn run_fit(
    input: &Path,
    target: &str,
    mapping: Option<&TargetMapping>,
    config: &BinningConfig,
    bins_out: &Path,
    json_out: Option<&Path>,
) -> Result<()> {
    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(input, target, bins_out, config.max_bins, config.min_bin_frac);

    print_step_header(1, "Load Dataset");
    let spinner = create_spinner("Loading dataset...");
    let df = load_dataset(input)?;
    finish_with_success(
        &spinner,
        &format!("Loaded {} rows, {} columns", df.height(), df.width()),
    );

    print_step_header(2, "Fit Binning Tables");
    let tables = fit_bins(&df, target, mapping, config)?;
    print_success("Binning complete");

    let summary = FitSummary::from_tables(&tables, df.height());
    summary.display(&tables);

    print_step_header(3, "Save Results");
    let mut flat = tables_to_dataframe(&tables)?;
    save_dataset(&mut flat, bins_out)?;
    print_success(&format!("Tables written to {}", bins_out.display()));

    if let Some(json_path) = json_out {
        let params = ExportParams {
            input_file: &input.display().to_string(),
            target_column: target,
            max_bins: config.max_bins,
            min_bin_frac: config.min_bin_frac,
            monotonic: config.monotonic,
        };
        export_fit(&tables, json_path, &params)?;
        print_success(&format!("JSON export written to {}", json_path.display()));
    }

    print_completion("Binning fit complete!");
    Ok(())
}

fn run_apply(input: &Path, bins: &Path, output: &Path, config: &ApplyConfig) -> Result<()> {
    let tables = load_tables(bins)?;
    let df = load_dataset(input)?;

    let spinner = create_spinner("Encoding WoE columns...");
    let mut encoded = apply_woe(&df, &tables, config)?;
    finish_with_success(
        &spinner,
        &format!("Encoded {} variables over {} rows", tables.len(), df.height()),
    );

    save_dataset(&mut encoded, output)?;
    println!(
        "    {} Saved to {}",
        style("✓").green().bold(),
        output.display()
    );
    Ok(())
}

fn run_scorecard(
    bins: &Path,
    model: &Path,
    output: &Path,
    calibration: &Calibration,
    spread_base: bool,
) -> Result<()> {
    let tables = load_tables(bins)?;
    let model = FittedModel::from_json_file(model)?;

    let card = build_scorecard(&tables, &model, calibration, spread_base)?;
    let (lo, hi) = card.score_range();
    println!(
        "    Scorecard over {} variables, score range [{}, {}]",
        style(card.variables.len()).green().bold(),
        style(lo).yellow(),
        style(hi).yellow()
    );

    let mut flat = card_to_dataframe(&card)?;
    save_dataset(&mut flat, output)?;
    println!(
        "    {} Scorecard written to {}",
        style("✓").green().bold(),
        output.display()
    );
    Ok(())
}

fn run_score(input: &Path, card_path: &Path, output: &Path, config: &ScoreConfig) -> Result<()> {
    let card = load_card(card_path)?;
    let df = load_dataset(input)?;

    let spinner = create_spinner("Scoring rows...");
    let mut scored = apply_scorecard(&df, &card, config)?;
    finish_with_success(&spinner, &format!("Scored {} rows", df.height()));

    save_dataset(&mut scored, output)?;
    println!(
        "    {} Saved to {}",
        style("✓").green().bold(),
        output.display()
    );
    Ok(())
}

fn load_tables(path: &Path) -> Result<BTreeMap<String, BinningTable>> {
    let flat = load_dataset(path)
        .with_context(|| format!("Failed to load binning tables from {}", path.display()))?;
    tables_from_dataframe(&flat)
        .with_context(|| format!("Invalid binning tables in {}", path.display()))
}

fn load_card(path: &Path) -> Result<Scorecard> {
    let flat = load_dataset(path)
        .with_context(|| format!("Failed to load scorecard from {}", path.display()))?;
    card_from_dataframe(&flat)
        .with_context(|| format!("Invalid scorecard in {}", path.display()))
}

fn target_mapping(
    event_value: Option<String>,
    non_event_value: Option<String>,
) -> Result<Option<TargetMapping>> {
    match (event_value, non_event_value) {
        (Some(event), Some(non_event)) => Ok(Some(TargetMapping::new(event, non_event))),
        (None, None) => Ok(None),
        _ => anyhow::bail!("--event-value and --non-event-value must be given together"),
    }
}

fn parse_unknown(s: &str) -> Result<UnknownHandling> {
    s.parse().map_err(|e: String| anyhow::anyhow!(e))
}

fn load_special_values(
    path: Option<&Path>,
) -> Result<BTreeMap<String, Vec<Vec<SpecialValue>>>> {
    match path {
        None => Ok(BTreeMap::new()),
        Some(path) => {
            let contents = std::fs::read_to_string(path).with_context(|| {
                format!("Failed to read special values file: {}", path.display())
            })?;
            serde_json::from_str(&contents).with_context(|| {
                format!("Failed to parse special values file: {}", path.display())
            })
        }
    }
}

fn load_breaks(path: Option<&Path>) -> Result<BTreeMap<String, BreakSpec>> {
    match path {
        None => Ok(BTreeMap::new()),
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read breaks file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse breaks file: {}", path.display()))
        }
    }
}
