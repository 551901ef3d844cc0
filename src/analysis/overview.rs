//! Overview figures and time series for the funnel panels.

use crate::models::{ReportData, ReportRow};
use serde::Serialize;

/// One headline figure of the overview panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datapoint {
    pub metric_id: &'static str,
    pub label: &'static str,
    pub value: f64,
    pub formatted: String,
    /// Percent change against the compare period, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
}

/// How a value is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Grouped integer, e.g. `12,345`.
    Count,
    /// A percentage value (`41.5` shows as `41.5%`).
    Percent,
}

impl ValueFormat {
    pub fn apply(self, value: f64) -> String {
        match self {
            ValueFormat::Count => format_count(value),
            ValueFormat::Percent => format_percent(value),
        }
    }
}

/// One point of a stats chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: String,
    pub value: f64,
}

/// Split date-ordered rows into the current period (last `days` rows)
/// and the compare period (the `days` rows before it).
pub fn split_periods(rows: &[ReportRow], days: usize) -> (&[ReportRow], &[ReportRow]) {
    let current_start = rows.len().saturating_sub(days);
    let previous_start = current_start.saturating_sub(days);
    (&rows[current_start..], &rows[previous_start..current_start])
}

pub fn sum_column(rows: &[ReportRow], column: usize) -> f64 {
    rows.iter().filter_map(|r| r.value(column)).sum()
}

/// Percent change from `previous` to `current`; `None` when there is no base.
pub fn change_percent(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

/// Impressions and clicks totals of a Search Console report.
pub fn search_console_datapoints(data: &ReportData, days: usize, compare: bool) -> Vec<Datapoint> {
    let (current, previous) = if compare {
        split_periods(&data.rows, days)
    } else {
        (&data.rows[..], &data.rows[..0])
    };

    [("impressions", "Impressions"), ("clicks", "Clicks")]
        .into_iter()
        .filter_map(|(id, label)| {
            let column = data.column(id)?;
            let value = sum_column(current, column);
            let change = if previous.is_empty() {
                None
            } else {
                change_percent(sum_column(previous, column), value)
            };
            Some(Datapoint {
                metric_id: id,
                label,
                value,
                formatted: format_count(value),
                change,
            })
        })
        .collect()
}

/// Headline figure from report totals (current vs. compare period).
pub fn totals_datapoint(
    data: &ReportData,
    column: usize,
    metric_id: &'static str,
    label: &'static str,
    format: ValueFormat,
) -> Option<Datapoint> {
    let value = *data.totals.first()?.get(column)?;
    let change = data
        .totals
        .get(1)
        .and_then(|previous| previous.get(column))
        .and_then(|previous| change_percent(*previous, value));

    Some(Datapoint {
        metric_id,
        label,
        value,
        formatted: format.apply(value),
        change,
    })
}

/// Time series of `column` keyed by the first dimension.
///
/// With `last_days` only the trailing rows are kept (for reports that span
/// both periods).
pub fn series(data: &ReportData, column: usize, last_days: Option<usize>) -> Vec<SeriesPoint> {
    let rows = match last_days {
        Some(days) => split_periods(&data.rows, days).0,
        None => &data.rows[..],
    };

    rows.iter()
        .filter_map(|row| {
            Some(SeriesPoint {
                date: row.dimensions.first()?.clone(),
                value: row.value(column)?,
            })
        })
        .collect()
}

/// Group an integer count with thousands separators.
pub fn format_count(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Format a percentage with at most two fraction digits, no sign.
pub fn format_percent(value: f64) -> String {
    let text = format!("{:.2}", value.abs());
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{}%", text)
}

/// Format a change as a signed percentage.
pub fn format_change(change: f64) -> String {
    let sign = if change >= 0.0 { "+" } else { "-" };
    format!("{}{}", sign, format_percent(change))
}
