use std::fmt::{self, Write};

use tipjar_core::Money;
use tipjar_ocr::TipReport;

/// Plain-text payout sheet.
pub fn render_report(source: &str, report: &TipReport) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Schedule: {source}")?;

    if let Some(error) = &report.error {
        writeln!(out, "{error}")?;
        return Ok(out);
    }

    let s = &report.summary;
    writeln!(out, "Tip pool:          {}", Money::from_f64(report.total_tips))?;
    writeln!(out, "Total hours:       {:.2}", s.total_hours)?;
    writeln!(out, "Hourly rate:       {}", Money::from_f64(s.hourly_rate))?;
    writeln!(out, "Total distributed: {}", Money::from_f64(s.total_distributed))?;
    writeln!(
        out,
        "OCR confidence:    {:.0}%{}",
        report.average_confidence * 100.0,
        if report.dropped > 0 {
            format!(" ({} unreadable line(s) skipped)", report.dropped)
        } else {
            String::new()
        }
    )?;

    if report.payouts.is_empty() {
        writeln!(out, "\nNo partner hours found. Enter them manually.")?;
        return Ok(out);
    }

    let width = report.payouts.iter().map(|p| p.name.chars().count()).max().unwrap_or(0).max(7);
    writeln!(out)?;
    writeln!(out, "{:<width$}  {:>7}  {:>11}  {:<18}  {:>4}", "Partner", "Hours", "Payout", "Bills", "Conf")?;
    for p in &report.payouts {
        writeln!(
            out,
            "{:<width$}  {:>7.2}  {:>11}  {:<18}  {:>3.0}%",
            p.name,
            p.hours,
            Money::from_f64(p.payout).to_string(),
            p.bills.to_string(),
            p.confidence * 100.0
        )?;
    }
    Ok(out)
}
