//! MCP server implementation for Capsule CRM.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::schemars::JsonSchema;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;

use capsule_client::{CapsuleClient, ClientError, NewPerson};
use capsule_core::{AllocationCalculator, AllocationError};

use crate::{SERVER_NAME, SERVER_VERSION};

/// MCP server exposing Capsule CRM tools.
#[derive(Clone)]
pub struct CapsuleMcpServer {
    /// Shared Capsule API client.
    client: Arc<CapsuleClient>,
    /// Sold-days allocation calculator.
    calculator: Arc<AllocationCalculator>,
    /// Tool router for MCP tools.
    tool_router: ToolRouter<Self>,
}

impl CapsuleMcpServer {
    /// Create a server backed by the given API client.
    pub fn new(client: Arc<CapsuleClient>) -> Self {
        Self {
            client,
            calculator: Arc::new(AllocationCalculator::new()),
            tool_router: Self::tool_router(),
        }
    }

    /// Create a success result with JSON content.
    fn json_result<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    /// Map a client failure onto an MCP error.
    fn client_error(err: ClientError) -> McpError {
        McpError::internal_error(err.to_string(), None)
    }
}

// ============================================================================
// Tool Parameter Types
// ============================================================================

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    50
}

/// Plain pagination parameters.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PageParams {
    /// Page number, starting at 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Results per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Parameters for listing contacts.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListContactsParams {
    /// Page number, starting at 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Results per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Include archived contacts.
    #[serde(default)]
    pub archived: bool,
    /// Only contacts changed on or after this ISO-8601 timestamp.
    #[serde(default)]
    pub since: Option<String>,
}

/// Parameters for searching contacts.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchContactsParams {
    /// Search keyword; matches names, emails, and organisations.
    pub keyword: String,
    /// Page number, starting at 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Results per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Parameters for fetching one contact.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetContactParams {
    /// Capsule party id.
    pub contact_id: i64,
}

/// Parameters for creating a person contact.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreatePersonParams {
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
    /// Tags to attach to the new contact.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Parameters for attaching a note.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddNoteParams {
    /// Capsule party id the note is attached to.
    pub party_id: i64,
    /// Note body.
    pub note: String,
}

/// Parameters for listing a party's history entries.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListEntriesParams {
    /// Capsule party id.
    pub party_id: i64,
    /// Page number, starting at 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Results per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Parameters for listing recently changed contacts.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListRecentContactsParams {
    /// Page number, starting at 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Results per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Only contacts changed on or after this ISO-8601 timestamp.
    #[serde(default)]
    pub since: Option<String>,
}

/// Parameters for fetching one opportunity.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetOpportunityParams {
    /// Capsule opportunity id.
    pub opportunity_id: i64,
}

/// Parameters for searching cases.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchCasesParams {
    /// Search keyword.
    pub keyword: String,
    /// Page number, starting at 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Results per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Parameters for fetching one case.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetCaseParams {
    /// Capsule case id.
    pub case_id: i64,
}

/// Parameters for fetching one task.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetTaskParams {
    /// Capsule task id.
    pub task_id: i64,
}

/// Parameters for fetching one history entry.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetEntryParams {
    /// Capsule entry id.
    pub entry_id: i64,
}

/// Parameters for fetching one project.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetProjectParams {
    /// Capsule project id.
    pub project_id: i64,
}

fn default_entity() -> String {
    "parties".to_string()
}

/// Parameters for listing tags.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTagsParams {
    /// Entity type the tags belong to: parties, opportunities, or kases.
    #[serde(default = "default_entity")]
    pub entity: String,
    /// Page number, starting at 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Results per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Parameters for fetching one tag.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetTagParams {
    /// Entity type the tag belongs to: parties, opportunities, or kases.
    #[serde(default = "default_entity")]
    pub entity: String,
    /// Capsule tag id.
    pub tag_id: i64,
}

/// Parameters for listing custom field definitions.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListCustomFieldsParams {
    /// Entity type the fields are defined on: parties, opportunities, or kases.
    #[serde(default = "default_entity")]
    pub entity: String,
    /// Page number, starting at 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Results per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Parameters for fetching one user.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetUserParams {
    /// Capsule user id.
    pub user_id: i64,
}

/// Parameters for the sold-days allocation tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CalculateSoldProjectDaysParams {
    /// Any date inside the target month, ISO-8601 (YYYY-MM-DD).
    pub reference_date: String,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl CapsuleMcpServer {
    /// List contacts, paginated.
    #[tool(description = "Return a paginated list of contacts.")]
    pub async fn list_contacts(
        &self,
        Parameters(params): Parameters<ListContactsParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_parties(
                params.page,
                params.per_page,
                params.archived,
                params.since.as_deref(),
            )
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Search contacts.
    #[tool(description = "Fuzzy search contacts by name, email, or organisation.")]
    pub async fn search_contacts(
        &self,
        Parameters(params): Parameters<SearchContactsParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .search_parties(&params.keyword, params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Fetch a single contact.
    #[tool(description = "Return one contact by its Capsule id.")]
    pub async fn get_contact(
        &self,
        Parameters(params): Parameters<GetContactParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .get_party(params.contact_id)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Create a person contact.
    #[tool(description = "Create a person contact in Capsule.")]
    pub async fn create_person(
        &self,
        Parameters(params): Parameters<CreatePersonParams>,
    ) -> Result<CallToolResult, McpError> {
        let person = NewPerson {
            first_name: params.first_name,
            last_name: params.last_name,
            email: params.email,
            organisation: params.organisation,
            tags: params.tags,
        };
        let body = self
            .client
            .create_person(&person)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Attach a note to a party.
    #[tool(description = "Attach a note to an existing contact.")]
    pub async fn add_note(
        &self,
        Parameters(params): Parameters<AddNoteParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .add_note(params.party_id, &params.note)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List a party's history entries.
    #[tool(description = "Return the history entries (notes, emails, activity) for a contact.")]
    pub async fn list_entries(
        &self,
        Parameters(params): Parameters<ListEntriesParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_entries(params.party_id, params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List all opportunities.
    #[tool(description = "Return a paginated list of opportunities.")]
    pub async fn list_opportunities(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_opportunities(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List open opportunities.
    #[tool(description = "Return open opportunities ordered by expected close date.")]
    pub async fn list_open_opportunities(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_open_opportunities(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List cases.
    #[tool(description = "Return a paginated list of cases.")]
    pub async fn list_cases(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_kases(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List tasks.
    #[tool(description = "Return a paginated list of tasks.")]
    pub async fn list_tasks(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_tasks(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List recently changed contacts.
    #[tool(
        description = "Return contacts changed recently, optionally restricted to those \
                       changed on or after an ISO-8601 timestamp."
    )]
    pub async fn list_recent_contacts(
        &self,
        Parameters(params): Parameters<ListRecentContactsParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_parties(params.page, params.per_page, false, params.since.as_deref())
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Fetch a single opportunity.
    #[tool(description = "Return one opportunity by its Capsule id, with custom fields embedded.")]
    pub async fn get_opportunity(
        &self,
        Parameters(params): Parameters<GetOpportunityParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .get_opportunity(params.opportunity_id)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Search cases.
    #[tool(description = "Fuzzy search cases by keyword.")]
    pub async fn search_cases(
        &self,
        Parameters(params): Parameters<SearchCasesParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .search_kases(&params.keyword, params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Fetch a single case.
    #[tool(description = "Return one case by its Capsule id.")]
    pub async fn get_case(
        &self,
        Parameters(params): Parameters<GetCaseParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .get_kase(params.case_id)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Fetch a single task.
    #[tool(description = "Return one task by its Capsule id.")]
    pub async fn get_task(
        &self,
        Parameters(params): Parameters<GetTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .get_task(params.task_id)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Fetch a single history entry.
    #[tool(description = "Return one history entry by its Capsule id.")]
    pub async fn get_entry(
        &self,
        Parameters(params): Parameters<GetEntryParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .get_entry(params.entry_id)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List projects.
    #[tool(description = "Return a paginated list of projects.")]
    pub async fn list_projects(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_projects(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Fetch a single project.
    #[tool(description = "Return one project by its Capsule id.")]
    pub async fn get_project(
        &self,
        Parameters(params): Parameters<GetProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .get_project(params.project_id)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List tags.
    #[tool(
        description = "Return the tags defined for an entity type (parties, opportunities, \
                       or kases)."
    )]
    pub async fn list_tags(
        &self,
        Parameters(params): Parameters<ListTagsParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_tags(&params.entity, params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Fetch a single tag.
    #[tool(description = "Return one tag by id, scoped to an entity type.")]
    pub async fn get_tag(
        &self,
        Parameters(params): Parameters<GetTagParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .get_tag(&params.entity, params.tag_id)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List account users.
    #[tool(description = "Return the users on the Capsule account.")]
    pub async fn list_users(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_users(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Fetch a single user.
    #[tool(description = "Return one user by its Capsule id.")]
    pub async fn get_user(
        &self,
        Parameters(params): Parameters<GetUserParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .get_user(params.user_id)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List sales pipelines.
    #[tool(description = "Return the sales pipelines configured on the account.")]
    pub async fn list_pipelines(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_pipelines(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List project stages.
    #[tool(description = "Return the project stages configured on the account.")]
    pub async fn list_stages(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_stages(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List opportunity milestones.
    #[tool(description = "Return the opportunity milestones configured on the account.")]
    pub async fn list_milestones(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_milestones(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List custom field definitions.
    #[tool(
        description = "Return the custom field definitions for an entity type (parties, \
                       opportunities, or kases)."
    )]
    pub async fn list_custom_fields(
        &self,
        Parameters(params): Parameters<ListCustomFieldsParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_custom_fields(&params.entity, params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List products.
    #[tool(description = "Return the products configured on the account.")]
    pub async fn list_products(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_products(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List case categories.
    #[tool(description = "Return the case categories configured on the account.")]
    pub async fn list_categories(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_categories(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// List currencies.
    #[tool(description = "Return the currencies enabled on the account.")]
    pub async fn list_currencies(
        &self,
        Parameters(params): Parameters<PageParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = self
            .client
            .list_currencies(params.page, params.per_page)
            .await
            .map_err(Self::client_error)?;
        Self::json_result(&body)
    }

    /// Allocate sold engineer-days to a calendar month.
    #[tool(
        description = "Calculate the engineer-days of sold (won) project work falling in the \
                       calendar month containing reference_date (YYYY-MM-DD). Returns the total \
                       and a per-opportunity breakdown."
    )]
    pub async fn calculate_sold_project_days(
        &self,
        Parameters(params): Parameters<CalculateSoldProjectDaysParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .calculator
            .calculate(&params.reference_date, self.client.as_ref())
            .await
            .map_err(|e| match e {
                AllocationError::InvalidDate(_) => McpError::invalid_params(e.to_string(), None),
                AllocationError::Source(_) => McpError::internal_error(e.to_string(), None),
            })?;
        Self::json_result(&result)
    }
}

#[tool_handler]
impl ServerHandler for CapsuleMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
                title: Some("Capsule CRM".to_string()),
                icons: None,
                website_url: Some(
                    "https://github.com/fuzzylabs/capsule-crm-mcp-server".to_string(),
                ),
            },
            instructions: Some(
                "Capsule CRM MCP Server - exposes contact search and creation, notes, tasks, \
                 cases, and opportunities as tools, so assistants can read and update the \
                 pipeline. Use calculate_sold_project_days to allocate sold engineer-days to \
                 a calendar month."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_defaults() {
        let params: PageParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 50);
    }

    #[test]
    fn test_list_contacts_params_defaults() {
        let params: ListContactsParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 50);
        assert!(!params.archived);
        assert!(params.since.is_none());
    }

    #[test]
    fn test_entity_scoped_params_default_to_parties() {
        let params: ListTagsParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.entity, "parties");

        let params: ListCustomFieldsParams =
            serde_json::from_str(r#"{"entity": "opportunities"}"#).unwrap();
        assert_eq!(params.entity, "opportunities");
    }

    #[test]
    fn test_tool_router_exposes_full_surface() {
        let router = CapsuleMcpServer::tool_router();
        let names: std::collections::HashSet<String> = router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();

        let expected = [
            "list_contacts",
            "search_contacts",
            "list_recent_contacts",
            "get_contact",
            "create_person",
            "add_note",
            "list_opportunities",
            "list_open_opportunities",
            "get_opportunity",
            "list_cases",
            "search_cases",
            "get_case",
            "list_tasks",
            "get_task",
            "list_entries",
            "get_entry",
            "list_projects",
            "get_project",
            "list_tags",
            "get_tag",
            "list_users",
            "get_user",
            "list_pipelines",
            "list_stages",
            "list_milestones",
            "list_custom_fields",
            "list_products",
            "list_categories",
            "list_currencies",
            "calculate_sold_project_days",
        ];
        for name in expected {
            assert!(names.contains(name), "missing tool: {name}");
        }
    }

    #[test]
    fn test_server_info_advertises_tools() {
        let client = Arc::new(
            CapsuleClient::new(capsule_client::CapsuleConfig::new("test-token")).unwrap(),
        );
        let server = CapsuleMcpServer::new(client);

        let info = server.get_info();
        assert_eq!(info.server_info.name, SERVER_NAME);
        assert!(info.capabilities.tools.is_some());
    }
}
