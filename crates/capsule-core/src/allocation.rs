//! Monthly allocation of sold engineer-days.
//!
//! Walks every "won" opportunity, derives a project interval from its
//! kickoff date and effort fields, and attributes to the target month the
//! share of the effort whose calendar span overlaps it.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AllocationError;
use crate::fields::FieldMap;
use crate::month::TargetMonth;
use crate::source::{OpportunityDetail, OpportunitySource};

/// Page size used when draining the won-opportunities listing.
pub const PAGE_SIZE: u32 = 100;

/// Names of the custom fields the calculator reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldNames {
    /// Project kickoff date field.
    pub kickoff: String,
    /// Sold effort in engineer-days.
    pub effort: String,
    /// Number of engineers staffed on the project.
    pub headcount: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            kickoff: "KO Date".to_string(),
            effort: "Engineer Days".to_string(),
            headcount: "Engineers".to_string(),
        }
    }
}

/// One opportunity's contribution to the target month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownEntry {
    /// Capsule opportunity id.
    pub id: i64,
    /// Opportunity name.
    pub name: String,
    /// Project kickoff date.
    pub kickoff: NaiveDate,
    /// Sold effort in engineer-days.
    pub effort_days: f64,
    /// Engineers staffed.
    pub headcount: f64,
    /// Derived calendar duration of the project, in days.
    pub duration_days: f64,
    /// Engineer-days attributed to the target month.
    pub days_in_month: f64,
}

/// Aggregate result of one allocation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    /// First day of the target month.
    pub month_start: NaiveDate,
    /// Last day of the target month, inclusive.
    pub month_end: NaiveDate,
    /// Total engineer-days attributed to the month, rounded to 2 decimals.
    pub total_days: f64,
    /// Number of opportunities that contributed.
    pub opportunity_count: usize,
    /// Per-opportunity contributions, in source order.
    pub breakdown: Vec<BreakdownEntry>,
}

/// Calculates sold engineer-days per calendar month.
///
/// Effort is sold in 5-day work-weeks but projects run over 7-day calendar
/// weeks, so the elapsed duration of a project is `effort / headcount * 7/5`
/// days. The share of an opportunity's effort attributed to the month is
/// proportional to how much of that calendar span falls inside it.
#[derive(Debug, Clone, Default)]
pub struct AllocationCalculator {
    fields: FieldNames,
}

impl AllocationCalculator {
    /// Calculator using the default Capsule field names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculator reading differently-named custom fields.
    pub fn with_field_names(fields: FieldNames) -> Self {
        Self { fields }
    }

    /// Allocate sold days to the month containing `reference_date`.
    ///
    /// The date must be ISO-8601 (`YYYY-MM-DD`); an unparseable date fails
    /// before any CRM call is made. A collaborator failure on any page or
    /// detail fetch aborts the whole run; no partial total is returned.
    pub async fn calculate<S>(
        &self,
        reference_date: &str,
        source: &S,
    ) -> Result<AllocationResult, AllocationError>
    where
        S: OpportunitySource + ?Sized,
    {
        let reference: NaiveDate = reference_date
            .parse()
            .map_err(|_| AllocationError::InvalidDate(reference_date.to_string()))?;
        self.calculate_for(reference, source).await
    }

    /// Allocate sold days to the month containing an already-parsed date.
    pub async fn calculate_for<S>(
        &self,
        reference: NaiveDate,
        source: &S,
    ) -> Result<AllocationResult, AllocationError>
    where
        S: OpportunitySource + ?Sized,
    {
        let month = TargetMonth::containing(reference);

        let mut total = 0.0_f64;
        let mut breakdown = Vec::new();
        let mut page = 1_u32;

        loop {
            let summaries = source.fetch_won_page(page, PAGE_SIZE).await?;
            let page_len = summaries.len();
            tracing::debug!(page, count = page_len, "fetched won opportunities page");

            for summary in summaries {
                let detail = source.fetch_detail(summary.id).await?;
                if let Some(entry) = self.allocate_one(&detail, &month) {
                    total += entry.days_in_month;
                    breakdown.push(entry);
                }
            }

            if page_len < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }

        Ok(AllocationResult {
            month_start: month.start(),
            month_end: month.end(),
            total_days: (total * 100.0).round() / 100.0,
            opportunity_count: breakdown.len(),
            breakdown,
        })
    }

    /// One opportunity's contribution to the month, or `None` when the
    /// record lacks usable fields or its project does not touch the month.
    fn allocate_one(
        &self,
        detail: &OpportunityDetail,
        month: &TargetMonth,
    ) -> Option<BreakdownEntry> {
        let fields = FieldMap::new(&detail.fields);

        let kickoff = fields.date(&self.fields.kickoff)?;
        let effort = fields.number(&self.fields.effort)?;
        let headcount = fields.number(&self.fields.headcount)?;
        if headcount == 0.0 {
            // Would divide by zero; treat like a missing field.
            return None;
        }

        // Effort is per-engineer work-weeks of 5 days, elapsed over 7-day
        // calendar weeks.
        let duration_days = effort / headcount * 7.0 / 5.0;

        // A duration too large for date arithmetic (malformed upstream data,
        // e.g. an "inf" or 1e18 effort) is as unusable as a missing field.
        let project_end = Duration::try_days(duration_days.floor() as i64)
            .and_then(|span| kickoff.checked_add_signed(span))?;

        let overlap_start = kickoff.max(month.start());
        let overlap_end = project_end.min(month.end_exclusive());
        if overlap_start >= overlap_end {
            return None;
        }

        let total_project_days = (project_end - kickoff).num_days();
        if total_project_days <= 0 {
            return None;
        }

        let overlap_days = (overlap_end - overlap_start).num_days();
        let days_in_month = effort * overlap_days as f64 / total_project_days as f64;

        Some(BreakdownEntry {
            id: detail.id,
            name: detail.name.clone(),
            kickoff,
            effort_days: effort,
            headcount,
            duration_days,
            days_in_month,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::fields::{CustomField, FieldDefinition};
    use crate::source::OpportunitySummary;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn field(name: &str, value: Value) -> CustomField {
        CustomField {
            definition: FieldDefinition {
                name: name.to_string(),
            },
            value,
        }
    }

    fn opportunity(id: i64, fields: Vec<CustomField>) -> OpportunityDetail {
        OpportunityDetail {
            id,
            name: format!("Opportunity {id}"),
            fields,
        }
    }

    fn sold(id: i64, kickoff: &str, effort: f64, engineers: f64) -> OpportunityDetail {
        opportunity(
            id,
            vec![
                field("KO Date", json!(kickoff)),
                field("Engineer Days", json!(effort)),
                field("Engineers", json!(engineers)),
            ],
        )
    }

    /// In-memory source yielding pre-baked details, split into pages of
    /// `PAGE_SIZE`. Optionally fails on a chosen page fetch.
    struct FakeSource {
        details: Vec<OpportunityDetail>,
        fail_on_page: Option<u32>,
        page_fetches: AtomicU32,
    }

    impl FakeSource {
        fn new(details: Vec<OpportunityDetail>) -> Self {
            Self {
                details,
                fail_on_page: None,
                page_fetches: AtomicU32::new(0),
            }
        }

        fn failing_on_page(details: Vec<OpportunityDetail>, page: u32) -> Self {
            Self {
                fail_on_page: Some(page),
                ..Self::new(details)
            }
        }

        fn fetch_count(&self) -> u32 {
            self.page_fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OpportunitySource for FakeSource {
        async fn fetch_won_page(
            &self,
            page: u32,
            per_page: u32,
        ) -> Result<Vec<OpportunitySummary>, SourceError> {
            self.page_fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_page == Some(page) {
                return Err(SourceError::new("HTTP 502: bad gateway"));
            }
            let start = ((page - 1) * per_page) as usize;
            Ok(self
                .details
                .iter()
                .skip(start)
                .take(per_page as usize)
                .map(|d| OpportunitySummary {
                    id: d.id,
                    name: d.name.clone(),
                })
                .collect())
        }

        async fn fetch_detail(&self, id: i64) -> Result<OpportunityDetail, SourceError> {
            self.details
                .iter()
                .find(|d| d.id == id)
                .cloned()
                .ok_or_else(|| SourceError::new(format!("opportunity {id} not found")))
        }
    }

    #[tokio::test]
    async fn test_invalid_reference_date_makes_no_calls() {
        let source = FakeSource::new(vec![sold(1, "2025-03-01", 10.0, 2.0)]);
        let calc = AllocationCalculator::new();

        let err = calc.calculate("March 2025", &source).await.unwrap_err();
        assert!(matches!(err, AllocationError::InvalidDate(_)));
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_project_fully_inside_month_attributes_all_effort() {
        // duration = (10 / 2) * 7/5 = 7 days from March 1st
        let source = FakeSource::new(vec![sold(1, "2025-03-01", 10.0, 2.0)]);
        let calc = AllocationCalculator::new();

        let result = calc.calculate("2025-03-15", &source).await.unwrap();
        assert_eq!(result.opportunity_count, 1);
        assert_eq!(result.total_days, 10.0);

        let entry = &result.breakdown[0];
        assert_eq!(entry.kickoff, date(2025, 3, 1));
        assert_eq!(entry.duration_days, 7.0);
        assert_eq!(entry.days_in_month, 10.0);
    }

    #[tokio::test]
    async fn test_kickoff_after_month_end_is_excluded() {
        let source = FakeSource::new(vec![sold(1, "2025-04-01", 10.0, 2.0)]);
        let calc = AllocationCalculator::new();

        let result = calc.calculate("2025-03-15", &source).await.unwrap();
        assert_eq!(result.opportunity_count, 0);
        assert_eq!(result.total_days, 0.0);
        assert!(result.breakdown.is_empty());
    }

    #[tokio::test]
    async fn test_project_straddling_month_start_is_prorated() {
        // KO 10 days before March: duration = 20 * 7/5 = 28 days,
        // project runs Feb 19 .. Mar 19, 18 of 28 days in March.
        let source = FakeSource::new(vec![sold(1, "2025-02-19", 20.0, 1.0)]);
        let calc = AllocationCalculator::new();

        let result = calc.calculate("2025-03-01", &source).await.unwrap();
        assert_eq!(result.opportunity_count, 1);

        let entry = &result.breakdown[0];
        assert_eq!(entry.duration_days, 28.0);
        let expected = 20.0 * 18.0 / 28.0;
        assert_eq!(entry.days_in_month, expected);
        assert_eq!(result.total_days, (expected * 100.0).round() / 100.0);

        // Same input, same output: rerun bit-identical.
        let rerun = calc.calculate("2025-03-01", &source).await.unwrap();
        assert_eq!(rerun.breakdown[0].days_in_month, entry.days_in_month);
        assert_eq!(rerun.total_days, result.total_days);
    }

    #[tokio::test]
    async fn test_december_allocation_crosses_year_boundary() {
        // Project Dec 20 .. Jan 3 (duration 14): 12 of 14 days in December.
        let source = FakeSource::new(vec![sold(1, "2025-12-20", 10.0, 1.0)]);
        let calc = AllocationCalculator::new();

        let result = calc.calculate("2025-12-05", &source).await.unwrap();
        assert_eq!(result.month_start, date(2025, 12, 1));
        assert_eq!(result.month_end, date(2025, 12, 31));
        assert_eq!(result.breakdown[0].days_in_month, 10.0 * 12.0 / 14.0);
    }

    #[tokio::test]
    async fn test_unusable_records_are_skipped_silently() {
        let source = FakeSource::new(vec![
            // No kickoff date field at all
            opportunity(
                1,
                vec![
                    field("Engineer Days", json!(10)),
                    field("Engineers", json!(2)),
                ],
            ),
            // Non-numeric effort
            opportunity(
                2,
                vec![
                    field("KO Date", json!("2025-03-01")),
                    field("Engineer Days", json!("lots")),
                    field("Engineers", json!(2)),
                ],
            ),
            // Zero headcount would divide by zero
            sold(3, "2025-03-01", 10.0, 0.0),
            // The one good record
            sold(4, "2025-03-01", 10.0, 2.0),
        ]);
        let calc = AllocationCalculator::new();

        let result = calc.calculate("2025-03-15", &source).await.unwrap();
        assert_eq!(result.opportunity_count, 1);
        assert_eq!(result.breakdown[0].id, 4);
        assert_eq!(result.total_days, 10.0);
    }

    #[tokio::test]
    async fn test_non_positive_effort_never_contributes() {
        // Negative effort gives a project end before kickoff; the overlap
        // and total-days guards reject it.
        let source = FakeSource::new(vec![
            sold(1, "2025-03-01", -10.0, 2.0),
            sold(2, "2025-03-01", 0.0, 2.0),
        ]);
        let calc = AllocationCalculator::new();

        let result = calc.calculate("2025-03-15", &source).await.unwrap();
        assert_eq!(result.opportunity_count, 0);
        assert_eq!(result.total_days, 0.0);
    }

    #[tokio::test]
    async fn test_overflowing_duration_is_skipped() {
        // Durations beyond what a date can hold must skip the record, not
        // crash the run.
        let source = FakeSource::new(vec![
            sold(1, "2025-03-01", 1e18, 1.0),
            opportunity(
                2,
                vec![
                    field("KO Date", json!("2025-03-01")),
                    field("Engineer Days", json!("inf")),
                    field("Engineers", json!(1)),
                ],
            ),
            opportunity(
                3,
                vec![
                    field("KO Date", json!("2025-03-01")),
                    field("Engineer Days", json!("nan")),
                    field("Engineers", json!(1)),
                ],
            ),
            sold(4, "2025-03-01", 10.0, 2.0),
        ]);
        let calc = AllocationCalculator::new();

        let result = calc.calculate("2025-03-15", &source).await.unwrap();
        assert_eq!(result.opportunity_count, 1);
        assert_eq!(result.breakdown[0].id, 4);
        assert_eq!(result.total_days, 10.0);
    }

    #[tokio::test]
    async fn test_breakdown_preserves_source_order() {
        let source = FakeSource::new(vec![
            sold(30, "2025-03-10", 5.0, 1.0),
            sold(10, "2025-03-01", 5.0, 1.0),
            sold(20, "2025-03-20", 5.0, 1.0),
        ]);
        let calc = AllocationCalculator::new();

        let result = calc.calculate("2025-03-15", &source).await.unwrap();
        let ids: Vec<i64> = result.breakdown.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_pagination_drains_until_short_page() {
        // 237 records -> pages of 100, 100, 37 -> exactly 3 fetches.
        let details: Vec<_> = (1..=237)
            .map(|id| sold(id, "2025-03-01", 5.0, 1.0))
            .collect();
        let source = FakeSource::new(details);
        let calc = AllocationCalculator::new();

        let result = calc.calculate("2025-03-15", &source).await.unwrap();
        assert_eq!(source.fetch_count(), 3);
        assert_eq!(result.opportunity_count, 237);
    }

    #[tokio::test]
    async fn test_short_first_page_terminates_after_one_fetch() {
        let source = FakeSource::new(vec![sold(1, "2025-03-01", 5.0, 1.0)]);
        let calc = AllocationCalculator::new();

        calc.calculate("2025-03-15", &source).await.unwrap();
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_first_page_yields_zero_result() {
        let source = FakeSource::new(vec![]);
        let calc = AllocationCalculator::new();

        let result = calc.calculate("2025-03-15", &source).await.unwrap();
        assert_eq!(result.opportunity_count, 0);
        assert_eq!(result.total_days, 0.0);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_on_second_page_discards_first_page_work() {
        let details: Vec<_> = (1..=150)
            .map(|id| sold(id, "2025-03-01", 5.0, 1.0))
            .collect();
        let source = FakeSource::failing_on_page(details, 2);
        let calc = AllocationCalculator::new();

        let err = calc.calculate("2025-03-15", &source).await.unwrap_err();
        match err {
            AllocationError::Source(source_err) => {
                assert!(source_err.message().contains("502"));
            }
            other => panic!("expected source error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_custom_field_names() {
        let detail = opportunity(
            1,
            vec![
                field("Start", json!("2025-03-01")),
                field("Days Sold", json!(10)),
                field("Team Size", json!(2)),
            ],
        );
        let source = FakeSource::new(vec![detail]);
        let calc = AllocationCalculator::with_field_names(FieldNames {
            kickoff: "Start".to_string(),
            effort: "Days Sold".to_string(),
            headcount: "Team Size".to_string(),
        });

        let result = calc.calculate("2025-03-15", &source).await.unwrap();
        assert_eq!(result.total_days, 10.0);
    }
}
