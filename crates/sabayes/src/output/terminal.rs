//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use sabayes_core::model::INTERCEPT;
use sabayes_core::{ConvergenceStatus, MoransI, ParameterSummary, TraceSummary};

use crate::artifacts::ArtifactSet;

/// Failing parameters listed by name before the list is truncated.
const MAX_FAILING_LISTED: usize = 8;

/// Width of the variance share bars.
const BAR_WIDTH: usize = 30;

/// Format a run for human-readable terminal output.
///
/// `summary` is passed separately so that a reloaded run can be reported
/// with its recomputed summary.
pub fn format_report(artifacts: &ArtifactSet, summary: &TraceSummary) -> String {
    let meta = &artifacts.metadata;
    let mut out = String::new();
    let sep = "\u{2500}".repeat(62);

    out.push_str(&format!(
        "\n  {} {} ~ {}\n",
        "sabayes".bold(),
        meta.outcome.bold(),
        if meta.predictors.is_empty() {
            "1".to_string()
        } else {
            meta.predictors.join(" + ")
        }
    ));
    out.push_str(&sep);
    out.push_str("\n\n");

    // Data
    out.push_str("  Data\n\n");
    out.push_str(&format!("    Areas:        {}", meta.n_areas));
    if meta.dropped_areas > 0 {
        out.push_str(&format!(" ({} dropped by merge)", meta.dropped_areas));
    }
    out.push('\n');
    let levels: Vec<String> = meta
        .levels
        .iter()
        .map(|l| format!("{} ({})", l.name, l.units))
        .collect();
    if !levels.is_empty() {
        out.push_str(&format!("    Levels:       {}\n", levels.join(" \u{2192} ")));
    }
    let imputed: Vec<String> = meta
        .imputed
        .iter()
        .filter(|c| c.cells > 0)
        .map(|c| format!("{} {}", c.column, c.cells))
        .collect();
    if !imputed.is_empty() {
        out.push_str(&format!("    Imputed:      {}\n", imputed.join(", ")));
    }
    if meta.coerced_cells > 0 {
        out.push_str(&format!(
            "    Non-numeric:  {} cells read as missing\n",
            meta.coerced_cells
        ));
    }

    // Spatial structure
    let w = &meta.weights;
    out.push_str("\n  Spatial weights\n\n");
    out.push_str(&format!(
        "    Neighbours:   k = {}{} ({:?} coordinates{})\n",
        w.k_effective,
        if w.k_effective < w.k_requested {
            format!(" of {} requested", w.k_requested)
        } else {
            String::new()
        },
        w.coordinates,
        if w.symmetrized { ", symmetrized" } else { "" }
    ));
    out.push_str(&format!("    Nonzeros:     {}\n", w.nnz));
    if w.isolated > 0 {
        out.push_str(&format!(
            "    Isolated:     {}\n",
            w.isolated.to_string().yellow()
        ));
    }

    // Convergence
    let report = &summary.convergence;
    out.push_str("\n  Convergence\n\n");
    let status = match report.status {
        ConvergenceStatus::Converged => "Converged".green().bold(),
        ConvergenceStatus::Divergent => "Divergent sweeps".yellow().bold(),
        ConvergenceStatus::NotConverged => "Not converged".red().bold(),
    };
    out.push_str(&format!("    Status:       {}\n", status));
    out.push_str(&format!(
        "    Max R\u{0302}:       {:.4} (target < {})\n",
        report.max_r_hat, report.targets.r_hat
    ));
    out.push_str(&format!(
        "    Min ESS:      {:.0} (target > {})\n",
        report.min_ess, report.targets.ess
    ));
    out.push_str(&format!(
        "    Draws:        {} chains \u{00D7} {}\n",
        meta.sampler.chains, meta.sampler.draws
    ));

    if !report.status.is_converged() {
        out.push_str(&format!("\n  {} Warnings\n", "\u{26A0}".yellow()));
        if !report.failing.is_empty() {
            let listed: Vec<&str> = report
                .failing
                .iter()
                .take(MAX_FAILING_LISTED)
                .map(String::as_str)
                .collect();
            let more = report.failing.len().saturating_sub(MAX_FAILING_LISTED);
            out.push_str(&format!(
                "    \u{2022} {} {}{}\n",
                "Targets missed:".bold(),
                listed.join(", "),
                if more > 0 {
                    format!(" and {more} more")
                } else {
                    String::new()
                }
            ));
            out.push_str(&format!(
                "      \u{2192} {}\n",
                "Increase tune/draws or check the model specification".dimmed()
            ));
        }
        if report.divergences > 0 {
            out.push_str(&format!(
                "    \u{2022} {} {} sweeps rolled back\n",
                "Divergences:".bold(),
                report.divergences
            ));
        }
    }

    // Coefficients
    let coefficients: Vec<&ParameterSummary> = summary
        .parameters
        .iter()
        .filter(|p| p.name.starts_with("beta["))
        .collect();
    if !coefficients.is_empty() {
        out.push_str("\n  Coefficients (standardized)\n\n");
        out.push_str(&table_header());
        for p in coefficients {
            out.push_str(&table_row(p, &report.targets));
        }
    }

    // Hyperparameters
    let hyper: Vec<&ParameterSummary> = summary
        .parameters
        .iter()
        .filter(|p| {
            p.name.starts_with("sigma") || p.name == "rho" || p.name == "var_spatial"
        })
        .collect();
    if !hyper.is_empty() {
        out.push_str("\n  Variance parameters\n\n");
        out.push_str(&table_header());
        for p in hyper {
            out.push_str(&table_row(p, &report.targets));
        }
    }

    // Variance decomposition
    if !meta.variance.components.is_empty() {
        out.push_str("\n  Variance decomposition\n\n");
        for c in &meta.variance.components {
            let filled = ((c.percent / 100.0) * BAR_WIDTH as f64).round() as usize;
            let filled = filled.min(BAR_WIDTH);
            out.push_str(&format!(
                "    {:<12} {:>5.1}%  {}{}\n",
                c.name,
                c.percent,
                "\u{2588}".repeat(filled).cyan(),
                "\u{2591}".repeat(BAR_WIDTH - filled).dimmed()
            ));
        }
    }

    // Spatial autocorrelation
    if meta.moran_outcome.is_some() || meta.moran_residual.is_some() {
        out.push_str("\n  Moran's I\n\n");
        if let Some(m) = &meta.moran_outcome {
            out.push_str(&format_moran("Outcome", m));
        }
        if let Some(m) = &meta.moran_residual {
            out.push_str(&format_moran("Residuals", m));
        }
    }

    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&format!(
        "  {} predictions, {:.1}s\n",
        artifacts.predictions.len(),
        meta.elapsed_secs
    ));
    out
}

/// Format every parameter of `summary` as a table.
pub fn format_parameters(summary: &TraceSummary) -> String {
    let mut out = table_header();
    for p in &summary.parameters {
        out.push_str(&table_row(p, &summary.convergence.targets));
    }
    out
}

fn table_header() -> String {
    format!(
        "    {:<28} {:>9} {:>8} {:>9} {:>9} {:>7} {:>7}\n",
        "parameter", "mean", "sd", "2.5%", "97.5%", "R\u{0302}", "ESS"
    )
}

fn table_row(p: &ParameterSummary, targets: &sabayes_core::ConvergenceTargets) -> String {
    let name = p
        .name
        .strip_prefix("beta[")
        .and_then(|s| s.strip_suffix(']'))
        .map(|s| if s == INTERCEPT { "(intercept)" } else { s })
        .unwrap_or(&p.name);
    let line = format!(
        "    {:<28} {:>9.3} {:>8.3} {:>9.3} {:>9.3} {:>7.3} {:>7.0}",
        name, p.mean, p.sd, p.q025, p.q975, p.r_hat, p.ess
    );
    if targets.is_met_by(p) {
        format!("{line}\n")
    } else {
        format!("{}\n", line.red())
    }
}

fn format_moran(label: &str, m: &MoransI) -> String {
    let z = format!("{:.2}", m.z_score);
    let z = if m.z_score.abs() > 1.96 {
        z.bold().to_string()
    } else {
        z
    };
    format!(
        "    {:<12} I = {:>7.4}  (E = {:.4}, z = {})\n",
        label, m.statistic, m.expected, z
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::sample_artifacts;

    #[test]
    fn test_report_sections() {
        let artifacts = sample_artifacts();
        let text = format_report(&artifacts, &artifacts.summary);
        assert!(text.contains("median_rent"));
        assert!(text.contains("income"));
        assert!(text.contains("Areas:        4 (1 dropped by merge)"));
        assert!(text.contains("Coefficients (standardized)"));
        assert!(text.contains("(intercept)"));
        assert!(text.contains("Variance decomposition"));
        assert!(text.contains("Moran's I"));
        assert!(text.contains("4 predictions"));
    }

    #[test]
    fn test_divergences_are_warned() {
        let artifacts = sample_artifacts();
        assert!(!artifacts.summary.convergence.status.is_converged());
        let text = format_report(&artifacts, &artifacts.summary);
        assert!(text.contains("Warnings"));
        assert!(text.contains("Divergences:"));
    }

    #[test]
    fn test_parameter_table_lists_everything() {
        let artifacts = sample_artifacts();
        let text = format_parameters(&artifacts.summary);
        // Header plus one line per parameter.
        assert_eq!(text.lines().count(), 1 + artifacts.summary.parameters.len());
        assert!(text.contains("sigma_SA2"));
    }
}
