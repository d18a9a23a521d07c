use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::combined::{CombinedRecord, DATE_FORMAT};
use crate::impute::ImputationStrategy;
use crate::pipeline::PipelineReport;

/// Writes the enhanced table and the report tables into one workbook. Returns the sheet count.
pub fn export_workbook(
    path: &Path,
    rows: &[CombinedRecord],
    report: &PipelineReport,
) -> Result<usize> {
    let sheets = [
        ("Matches", match_rows(rows)),
        ("Missingness", missingness_rows(report)),
        ("Imputation", imputation_rows(report)),
        ("TTests", ttest_rows(report)),
        ("Correlations", correlation_rows(report)),
        ("Summary", summary_rows(report)),
    ];

    let mut workbook = Workbook::new();
    for (name, sheet_rows) in &sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name)?;
        write_rows(sheet, sheet_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(sheets.len())
}

fn match_rows(rows: &[CombinedRecord]) -> Vec<Vec<String>> {
    let mut out = vec![vec![
        "Date".to_string(),
        "Avg Goals".to_string(),
        "Avg Attempts".to_string(),
        "Avg On Target".to_string(),
        "Temp".to_string(),
        "Humidity".to_string(),
        "Temp Group".to_string(),
        "Humidity Group".to_string(),
        "Outlier".to_string(),
        "Climate Impact".to_string(),
    ]];
    for r in rows {
        out.push(vec![
            r.date
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
            opt_to_string(r.avg_goals),
            opt_to_string(r.avg_attempts),
            opt_to_string(r.avg_on_target),
            opt_to_string(r.temp),
            opt_to_string(r.humidity),
            r.temp_group.map(|g| g.label()).unwrap_or_default().to_string(),
            r.humidity_group
                .map(|g| g.label())
                .unwrap_or_default()
                .to_string(),
            if r.is_outlier {
                "yes".to_string()
            } else {
                "no".to_string()
            },
            opt_to_string(r.climate_impact_score),
        ]);
    }
    out
}

fn missingness_rows(report: &PipelineReport) -> Vec<Vec<String>> {
    let mut out = vec![vec![
        "Column".to_string(),
        "Missing Before".to_string(),
        "Missing After".to_string(),
    ]];
    for before in &report.missing_before {
        let after = report
            .missing_after
            .iter()
            .find(|a| a.column == before.column)
            .map(|a| a.missing_count);
        out.push(vec![
            before.column.clone(),
            before.missing_count.to_string(),
            opt_to_string(after),
        ]);
    }
    out
}

fn imputation_rows(report: &PipelineReport) -> Vec<Vec<String>> {
    let mut header = vec!["Column".to_string(), "Original".to_string()];
    header.extend(ImputationStrategy::ALL.iter().map(|s| s.label().to_string()));
    let mut out = vec![header];
    for m in &report.imputation {
        out.push(vec![
            m.column.to_string(),
            opt_to_string(m.original),
            opt_to_string(m.mean),
            opt_to_string(m.forward_fill),
            opt_to_string(m.linear),
        ]);
    }
    out
}

fn ttest_rows(report: &PipelineReport) -> Vec<Vec<String>> {
    let mut out = vec![vec![
        "Metric".to_string(),
        "Comparison".to_string(),
        "t".to_string(),
        "p".to_string(),
        "n (a)".to_string(),
        "n (b)".to_string(),
        "Note".to_string(),
    ]];
    for t in &report.ttests {
        out.push(vec![
            t.metric.to_string(),
            t.comparison.to_string(),
            opt_to_string(t.result.map(|r| r.statistic)),
            opt_to_string(t.result.map(|r| r.p_value)),
            opt_to_string(t.result.map(|r| r.n_a)),
            opt_to_string(t.result.map(|r| r.n_b)),
            t.error.clone().unwrap_or_default(),
        ]);
    }
    out
}

fn correlation_rows(report: &PipelineReport) -> Vec<Vec<String>> {
    let mut out = vec![vec![
        "Metric".to_string(),
        "Factor".to_string(),
        "r".to_string(),
        "p".to_string(),
        "n".to_string(),
        "Note".to_string(),
    ]];
    for c in &report.correlations {
        out.push(vec![
            c.metric.to_string(),
            c.factor.to_string(),
            opt_to_string(c.result.map(|r| r.r)),
            opt_to_string(c.result.map(|r| r.p_value)),
            opt_to_string(c.result.map(|r| r.n)),
            c.error.clone().unwrap_or_default(),
        ]);
    }
    out
}

fn summary_rows(report: &PipelineReport) -> Vec<Vec<String>> {
    let mut out = vec![
        ["Column", "Count", "Mean", "Std", "Min", "25%", "50%", "75%", "Max"]
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
    ];
    for s in &report.summary {
        let Some(d) = &s.describe else {
            out.push(vec![s.column.to_string()]);
            continue;
        };
        out.push(vec![
            s.column.to_string(),
            d.count.to_string(),
            d.mean.to_string(),
            d.std.to_string(),
            d.min.to_string(),
            d.q25.to_string(),
            d.q50.to_string(),
            d.q75.to_string(),
            d.max.to_string(),
        ]);
    }
    out
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
