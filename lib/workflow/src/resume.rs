//! Schedule resumption: computing when a paused execution continues.
//!
//! A pause-capable action's config carries a resume plan: a reference date,
//! an optional offset, and a past-date policy. The engine computes the
//! target timestamp from the plan and decides whether the execution should
//! continue immediately.
//!
//! `immediately_run` answers "is the target already elapsed" and is true
//! for every past target regardless of policy, since the engine cannot
//! wait for the past. The policy's grace window is reported separately as
//! `within_grace` so consumers can distinguish "fire now" from "fire now,
//! but later than the configured tolerance".

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of the offset relative to the reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OffsetType {
    /// Use the reference date as-is.
    #[default]
    NoOffset,
    /// Subtract the offset from the reference date.
    Before,
    /// Add the offset to the reference date.
    After,
}

/// Unit of the offset amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OffsetUnit {
    #[default]
    Minutes,
    Hours,
    Days,
    Weeks,
    /// Calendar months (day-of-month preserved where possible).
    Months,
}

/// How to treat a computed target that is already in the past.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PastDatePolicy {
    /// Any past target continues without complaint.
    #[default]
    #[serde(rename = "always-continue")]
    AlwaysContinue,
    /// Tolerate targets up to 15 minutes past.
    #[serde(rename = "continue-if-15-minutes")]
    ContinueIf15Minutes,
    /// Tolerate targets up to 1 hour past.
    #[serde(rename = "continue-if-1-hour")]
    ContinueIf1Hour,
    /// Tolerate targets up to 1 day past.
    #[serde(rename = "continue-if-1-day")]
    ContinueIf1Day,
    /// Tolerate targets up to 1 week past.
    #[serde(rename = "continue-if-1-week")]
    ContinueIf1Week,
    /// Tolerate targets up to 30 days past.
    #[serde(rename = "continue-if-1-month")]
    ContinueIf1Month,
}

impl PastDatePolicy {
    /// Returns the policy's grace window, or `None` for unbounded
    /// tolerance.
    #[must_use]
    pub fn window(&self) -> Option<Duration> {
        match self {
            Self::AlwaysContinue => None,
            Self::ContinueIf15Minutes => Some(Duration::minutes(15)),
            Self::ContinueIf1Hour => Some(Duration::hours(1)),
            Self::ContinueIf1Day => Some(Duration::days(1)),
            Self::ContinueIf1Week => Some(Duration::weeks(1)),
            Self::ContinueIf1Month => Some(Duration::days(30)),
        }
    }
}

/// A resume plan, deserialized from a pause-capable node's config value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResumePlan {
    /// The date the offset applies to.
    pub reference_date: DateTime<Utc>,
    /// Offset direction.
    #[serde(default)]
    pub offset_type: OffsetType,
    /// Offset magnitude; must be non-negative.
    #[serde(default)]
    pub offset_amount: i64,
    /// Offset unit.
    #[serde(default)]
    pub offset_unit: OffsetUnit,
    /// Tolerance for already-past targets.
    #[serde(default)]
    pub past_date_policy: PastDatePolicy,
}

/// The outcome of computing a resume plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeDecision {
    /// The computed continue-at timestamp.
    pub scheduled_at: DateTime<Utc>,
    /// True when the target is already elapsed and the execution should
    /// continue now rather than wait.
    pub immediately_run: bool,
    /// True when the target is in the future, or past by no more than the
    /// policy's grace window.
    pub within_grace: bool,
}

/// Errors from resume-plan computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeError {
    /// Offset amount was negative.
    NegativeOffset { amount: i64 },
    /// The offset pushed the date out of the representable range.
    OutOfRange { reason: String },
}

impl fmt::Display for ResumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeOffset { amount } => {
                write!(f, "offset amount must be non-negative, got {amount}")
            }
            Self::OutOfRange { reason } => {
                write!(f, "computed resume date out of range: {reason}")
            }
        }
    }
}

impl std::error::Error for ResumeError {}

/// Computes the resume target and the continue-now decision for a plan.
///
/// # Errors
///
/// Returns an error when the offset amount is negative or the arithmetic
/// leaves the representable date range.
pub fn compute(plan: &ResumePlan, now: DateTime<Utc>) -> Result<ResumeDecision, ResumeError> {
    if plan.offset_amount < 0 {
        return Err(ResumeError::NegativeOffset {
            amount: plan.offset_amount,
        });
    }

    let scheduled_at = apply_offset(plan)?;

    let immediately_run = scheduled_at <= now;
    let within_grace = if immediately_run {
        match plan.past_date_policy.window() {
            None => true,
            Some(window) => now - scheduled_at <= window,
        }
    } else {
        true
    };

    Ok(ResumeDecision {
        scheduled_at,
        immediately_run,
        within_grace,
    })
}

fn apply_offset(plan: &ResumePlan) -> Result<DateTime<Utc>, ResumeError> {
    let reference = plan.reference_date;
    let amount = plan.offset_amount;

    if plan.offset_type == OffsetType::NoOffset || amount == 0 {
        return Ok(reference);
    }

    let shifted = match plan.offset_unit {
        OffsetUnit::Minutes => shift_fixed(reference, plan.offset_type, Duration::minutes(amount)),
        OffsetUnit::Hours => shift_fixed(reference, plan.offset_type, Duration::hours(amount)),
        OffsetUnit::Days => shift_fixed(reference, plan.offset_type, Duration::days(amount)),
        OffsetUnit::Weeks => shift_fixed(reference, plan.offset_type, Duration::weeks(amount)),
        OffsetUnit::Months => {
            let months = u32::try_from(amount).map_err(|_| ResumeError::OutOfRange {
                reason: format!("{amount} months"),
            })?;
            match plan.offset_type {
                OffsetType::Before => reference.checked_sub_months(Months::new(months)),
                OffsetType::After => reference.checked_add_months(Months::new(months)),
                OffsetType::NoOffset => Some(reference),
            }
        }
    };

    shifted.ok_or_else(|| ResumeError::OutOfRange {
        reason: format!("{:?} {} {:?}", plan.offset_type, amount, plan.offset_unit),
    })
}

fn shift_fixed(
    reference: DateTime<Utc>,
    offset_type: OffsetType,
    duration: Duration,
) -> Option<DateTime<Utc>> {
    match offset_type {
        OffsetType::Before => reference.checked_sub_signed(duration),
        OffsetType::After => reference.checked_add_signed(duration),
        OffsetType::NoOffset => Some(reference),
    }
}
