//! MemberPool MCP Server implementation
//!
//! Admin tools over the MemberPool API. Every tool needs the API's admin key.

use crate::client::MemberPoolClient;
use anyhow::Result;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{
    handler::server::tool::ToolRouter,
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use schemars::JsonSchema;
use serde::Deserialize;

/// MemberPool MCP Server
///
/// Provides tools for administering the member pool and its shared ledger.
#[derive(Clone)]
pub struct MemberPoolServer {
    client: MemberPoolClient,
    tool_router: ToolRouter<Self>,
}

impl MemberPoolServer {
    pub fn from_env() -> Result<Self> {
        let client = MemberPoolClient::from_env()?;
        Ok(Self {
            client,
            tool_router: Self::tool_router(),
        })
    }

    #[cfg(test)]
    #[allow(dead_code)]
    pub fn new(client: MemberPoolClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }
}

fn to_result(result: Result<String>) -> Result<CallToolResult, McpError> {
    match result {
        Ok(content) => Ok(CallToolResult::success(vec![Content::text(content)])),
        Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
    }
}

// --- Tool Parameter Types ---

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct RosterParams {
    /// "active", "expired" or "all" (default)
    #[serde(default)]
    pub status: Option<String>,
    /// Case-insensitive match on name or email
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MemberIdParams {
    /// Member UUID
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddMemberParams {
    pub name: String,
    pub email: String,
    /// Starting wallet balance, e.g. "25.00" (non-negative, at most 2 decimals)
    pub balance: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ImportCsvParams {
    /// CSV text with a header row: name,email,balance
    pub csv: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ImportErrorsParams {
    /// Report id from a rejected import
    pub report_id: String,
}

#[tool_router]
impl MemberPoolServer {
    // === Roster ===

    #[tool(description = "List members with balance and status. Call this first.")]
    async fn roster(&self, params: Parameters<RosterParams>) -> Result<CallToolResult, McpError> {
        let RosterParams { status, search } = params.0;
        to_result(
            self.client
                .roster(status.as_deref(), search.as_deref())
                .await,
        )
    }

    #[tool(description = "Show one member by id.")]
    async fn member(&self, params: Parameters<MemberIdParams>) -> Result<CallToolResult, McpError> {
        to_result(self.client.member(&params.0.id).await)
    }

    #[tool(description = "Add a member. Fails when the pool already has 10 members or the email is taken.")]
    async fn add_member(
        &self,
        params: Parameters<AddMemberParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        to_result(self.client.add_member(&p.name, &p.email, &p.balance).await)
    }

    // === Ledger ===

    #[tool(
        description = "Expire a member. Charges 1.00 to every other active member; refused if any of them has less than 1.00."
    )]
    async fn expire(&self, params: Parameters<MemberIdParams>) -> Result<CallToolResult, McpError> {
        to_result(self.client.expire(&params.0.id).await)
    }

    #[tool(description = "Revert an expired member and refund the members charged when it expired.")]
    async fn revert(&self, params: Parameters<MemberIdParams>) -> Result<CallToolResult, McpError> {
        to_result(self.client.revert(&params.0.id).await)
    }

    // === Import ===

    #[tool(
        description = "Bulk import members from CSV text (columns name,email,balance). All rows are imported or none are."
    )]
    async fn import_csv(
        &self,
        params: Parameters<ImportCsvParams>,
    ) -> Result<CallToolResult, McpError> {
        to_result(self.client.import_csv(&params.0.csv).await)
    }

    #[tool(description = "Download the CSV error report of a rejected import.")]
    async fn import_errors(
        &self,
        params: Parameters<ImportErrorsParams>,
    ) -> Result<CallToolResult, McpError> {
        to_result(self.client.import_errors(&params.0.report_id).await)
    }
}

#[tool_handler]
impl ServerHandler for MemberPoolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "memberpool".into(),
                title: Some("MemberPool MCP Server".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                r#"MemberPool - shared wallet membership admin

RULES:
- The pool holds at most 10 members
- Expiring a member charges 1.00 to every other active member
- Expiry is refused if any other active member has less than 1.00
- Reverting refunds 1.00 to active members who joined before the expiry
- Expiring an expired member (or reverting an active one) does nothing

WORKFLOW:
1. 'roster' - See members, balances and ids
2. 'expire' / 'revert' - Toggle a member by id
3. 'import_csv' - Add several members at once
4. 'import_errors' - Fetch the report id given by a rejected import"#
                    .into(),
            ),
        }
    }
}
