//! The CRM collaborator seam consumed by the allocation calculator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::fields::CustomField;

/// One row of a won-opportunities listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunitySummary {
    /// Capsule opportunity id.
    pub id: i64,
    /// Opportunity name.
    #[serde(default)]
    pub name: String,
}

/// Full detail of one opportunity, including its custom fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityDetail {
    /// Capsule opportunity id.
    pub id: i64,
    /// Opportunity name.
    #[serde(default)]
    pub name: String,
    /// Custom fields attached to the opportunity.
    #[serde(default)]
    pub fields: Vec<CustomField>,
}

/// Read-only access to won opportunities in the CRM.
///
/// Pages are 1-indexed; a page shorter than `per_page` (or empty) is the
/// end-of-stream signal. Implementations must not reorder records within a
/// page, since the calculator's breakdown preserves source order.
#[async_trait]
pub trait OpportunitySource: Send + Sync {
    /// Fetch one page of opportunities whose pipeline milestone is "won".
    async fn fetch_won_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<OpportunitySummary>, SourceError>;

    /// Fetch the full field set for one opportunity.
    async fn fetch_detail(&self, id: i64) -> Result<OpportunityDetail, SourceError>;
}
