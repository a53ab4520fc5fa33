pub mod bills;
pub mod money;
pub mod payout;
pub mod row;
pub mod sanitize;

pub use bills::{calculate_bills, BillBreakdown, BILL_DENOMINATIONS};
pub use money::Money;
pub use payout::{calculate_partner_payouts, calculate_summary, PartnerPayout, TipSummary};
pub use row::{clamp_confidence, ExtractedRow, SanitizedRows};
pub use sanitize::sanitize_rows;
