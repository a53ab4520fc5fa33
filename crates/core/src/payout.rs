use serde::{Deserialize, Serialize};

use crate::bills::{calculate_bills, BillBreakdown};
use crate::row::ExtractedRow;

/// Aggregate figures for one tip pool.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TipSummary {
    pub total_hours: f64,
    pub hourly_rate: f64,
    pub total_distributed: f64,
}

/// What a single partner takes home.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartnerPayout {
    pub name: String,
    pub hours: f64,
    pub payout: f64,
    pub bills: BillBreakdown,
    pub confidence: f64,
}

pub fn calculate_summary(rows: &[ExtractedRow], total_tips: f64) -> TipSummary {
    let total_hours: f64 = rows.iter().map(|r| r.hours).sum();
    let hourly_rate = if total_hours > 0.0 {
        total_tips / total_hours
    } else {
        0.0
    };
    let total_distributed = rows.iter().map(|r| r.hours * hourly_rate).sum();

    TipSummary {
        total_hours,
        hourly_rate,
        total_distributed,
    }
}

/// Divide `total_tips` across `rows` in proportion to hours worked.
///
/// Returns nothing when no hours were recorded. Sorted by payout, largest first;
/// equal payouts keep their input order.
pub fn calculate_partner_payouts(rows: &[ExtractedRow], total_tips: f64) -> Vec<PartnerPayout> {
    let summary = calculate_summary(rows, total_tips);
    if summary.total_hours == 0.0 {
        return Vec::new();
    }

    let mut payouts: Vec<PartnerPayout> = rows
        .iter()
        .map(|row| {
            let payout = row.hours * summary.hourly_rate;
            PartnerPayout {
                name: row.name.clone(),
                hours: row.hours,
                payout,
                bills: calculate_bills(payout),
                confidence: row.confidence,
            }
        })
        .collect();

    payouts.sort_by(|a, b| b.payout.total_cmp(&a.payout));
    payouts
}
