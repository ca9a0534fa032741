//! Live-API implementation of the calculator's opportunity seam.

use async_trait::async_trait;

use capsule_core::{OpportunityDetail, OpportunitySource, OpportunitySummary, SourceError};

use crate::client::CapsuleClient;

#[async_trait]
impl OpportunitySource for CapsuleClient {
    async fn fetch_won_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<OpportunitySummary>, SourceError> {
        self.won_opportunities_page(page, per_page)
            .await
            .map_err(SourceError::from_err)
    }

    async fn fetch_detail(&self, id: i64) -> Result<OpportunityDetail, SourceError> {
        self.opportunity_detail(id)
            .await
            .map_err(SourceError::from_err)
    }
}
