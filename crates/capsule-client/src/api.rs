//! Typed Capsule API endpoints.
//!
//! Listing and mutation endpoints return Capsule's JSON unchanged, wrapped
//! in its envelope (`{"parties": [...]}`, `{"opportunities": [...]}` and so
//! on); the MCP layer passes it straight through to the assistant. Only the
//! opportunity page and detail calls used by the allocation calculator are
//! deserialized into domain types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use capsule_core::{OpportunityDetail, OpportunitySummary};

use crate::client::CapsuleClient;
use crate::error::Result;

/// A person contact to create in Capsule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPerson {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Organisation the person belongs to.
    #[serde(default)]
    pub organisation: Option<String>,
    /// Tags to attach.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Capsule's envelope around an opportunity listing.
#[derive(Debug, Deserialize)]
struct OpportunitiesEnvelope {
    #[serde(default)]
    opportunities: Vec<OpportunitySummary>,
}

/// Capsule's envelope around a single opportunity.
#[derive(Debug, Deserialize)]
struct OpportunityEnvelope {
    opportunity: OpportunityDetail,
}

impl CapsuleClient {
    // ------------------------------------------------------------------
    // Parties (contacts)
    // ------------------------------------------------------------------

    /// Paginated list of contacts.
    ///
    /// `since` restricts the listing to parties changed on or after the
    /// given ISO-8601 timestamp.
    pub async fn list_parties(
        &self,
        page: u32,
        per_page: u32,
        archived: bool,
        since: Option<&str>,
    ) -> Result<Value> {
        let mut query = vec![
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
            ("archived", archived.to_string()),
        ];
        if let Some(since) = since {
            query.push(("since", since.to_string()));
        }
        self.get("parties", &query).await
    }

    /// Fuzzy search contacts by name, email, or organisation.
    pub async fn search_parties(&self, keyword: &str, page: u32, per_page: u32) -> Result<Value> {
        let query = [
            ("q", keyword.to_string()),
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
        ];
        self.get("parties/search", &query).await
    }

    /// One contact by id.
    pub async fn get_party(&self, party_id: i64) -> Result<Value> {
        self.get(&format!("parties/{party_id}"), &[]).await
    }

    /// Create a person contact.
    pub async fn create_person(&self, person: &NewPerson) -> Result<Value> {
        let tags: Vec<Value> = person
            .tags
            .iter()
            .flatten()
            .map(|tag| json!({ "name": tag }))
            .collect();
        let payload = json!({
            "party": {
                "type": "person",
                "firstName": person.first_name,
                "lastName": person.last_name,
                "email": person.email,
                "organisation": person.organisation,
                "tags": tags,
            }
        });
        self.post("parties", &payload).await
    }

    // ------------------------------------------------------------------
    // Entries (notes, emails, activity)
    // ------------------------------------------------------------------

    /// Attach a note to an existing party.
    pub async fn add_note(&self, party_id: i64, content: &str) -> Result<Value> {
        let payload = json!({
            "entry": { "type": "note", "content": content }
        });
        self.post(&format!("parties/{party_id}/entries"), &payload)
            .await
    }

    /// Paginated history entries for a party.
    pub async fn list_entries(&self, party_id: i64, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get(&format!("parties/{party_id}/entries"), &query)
            .await
    }

    /// One history entry by id.
    pub async fn get_entry(&self, entry_id: i64) -> Result<Value> {
        self.get(&format!("entries/{entry_id}"), &[]).await
    }

    // ------------------------------------------------------------------
    // Opportunities
    // ------------------------------------------------------------------

    /// Paginated list of all opportunities.
    pub async fn list_opportunities(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get("opportunities", &query).await
    }

    /// Open opportunities ordered by expected close date.
    pub async fn list_open_opportunities(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
            ("status", "open".to_string()),
            ("sort", "expectedCloseDate".to_string()),
        ];
        self.get("opportunities", &query).await
    }

    /// One page of won opportunities, typed for the allocation calculator.
    pub async fn won_opportunities_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<OpportunitySummary>> {
        let query = [
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
            ("milestone", "won".to_string()),
        ];
        let envelope: OpportunitiesEnvelope = self.get("opportunities", &query).await?;
        Ok(envelope.opportunities)
    }

    /// One opportunity by id, with custom fields embedded.
    pub async fn get_opportunity(&self, opportunity_id: i64) -> Result<Value> {
        let query = [("embed", "fields".to_string())];
        self.get(&format!("opportunities/{opportunity_id}"), &query)
            .await
    }

    /// Full opportunity detail including custom fields.
    pub async fn opportunity_detail(&self, opportunity_id: i64) -> Result<OpportunityDetail> {
        let query = [("embed", "fields".to_string())];
        let envelope: OpportunityEnvelope = self
            .get(&format!("opportunities/{opportunity_id}"), &query)
            .await?;
        Ok(envelope.opportunity)
    }

    // ------------------------------------------------------------------
    // Cases, tasks, and projects
    // ------------------------------------------------------------------

    /// Paginated list of cases (Capsule calls these "kases").
    pub async fn list_kases(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get("kases", &query).await
    }

    /// Fuzzy search cases by keyword.
    pub async fn search_kases(&self, keyword: &str, page: u32, per_page: u32) -> Result<Value> {
        let query = [
            ("q", keyword.to_string()),
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
        ];
        self.get("kases/search", &query).await
    }

    /// One case by id.
    pub async fn get_kase(&self, case_id: i64) -> Result<Value> {
        self.get(&format!("kases/{case_id}"), &[]).await
    }

    /// Paginated list of tasks.
    pub async fn list_tasks(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get("tasks", &query).await
    }

    /// One task by id.
    pub async fn get_task(&self, task_id: i64) -> Result<Value> {
        self.get(&format!("tasks/{task_id}"), &[]).await
    }

    /// Paginated list of projects.
    pub async fn list_projects(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get("projects", &query).await
    }

    /// One project by id.
    pub async fn get_project(&self, project_id: i64) -> Result<Value> {
        self.get(&format!("projects/{project_id}"), &[]).await
    }

    // ------------------------------------------------------------------
    // Tags and users
    // ------------------------------------------------------------------

    /// Paginated tags defined for an entity type (`parties`,
    /// `opportunities`, or `kases`).
    pub async fn list_tags(&self, entity: &str, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get(&format!("{entity}/tags"), &query).await
    }

    /// One tag by id, scoped to an entity type.
    pub async fn get_tag(&self, entity: &str, tag_id: i64) -> Result<Value> {
        self.get(&format!("{entity}/tags/{tag_id}"), &[]).await
    }

    /// Users on the Capsule account.
    pub async fn list_users(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get("users", &query).await
    }

    /// One user by id.
    pub async fn get_user(&self, user_id: i64) -> Result<Value> {
        self.get(&format!("users/{user_id}"), &[]).await
    }

    // ------------------------------------------------------------------
    // Account configuration
    // ------------------------------------------------------------------

    /// Sales pipelines configured on the account.
    pub async fn list_pipelines(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get("pipelines", &query).await
    }

    /// Project stages configured on the account.
    pub async fn list_stages(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get("stages", &query).await
    }

    /// Opportunity milestones configured on the account.
    pub async fn list_milestones(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get("milestones", &query).await
    }

    /// Custom field definitions for an entity type.
    pub async fn list_custom_fields(
        &self,
        entity: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get(&format!("{entity}/fields/definitions"), &query)
            .await
    }

    /// Products configured on the account.
    pub async fn list_products(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get("products", &query).await
    }

    /// Case categories configured on the account.
    pub async fn list_categories(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get("categories", &query).await
    }

    /// Currencies enabled on the account.
    pub async fn list_currencies(&self, page: u32, per_page: u32) -> Result<Value> {
        let query = [("page", page.to_string()), ("perPage", per_page.to_string())];
        self.get("currencies", &query).await
    }
}
