use std::{path::PathBuf, sync::Arc};

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    completion::{Message, Role},
    document::DocumentSummary,
    error,
    session::Session,
};

#[derive(Clone)]
pub struct DocaskMcpServer {
    session: Arc<Session>,
    tool_router: ToolRouter<Self>,
}

impl DocaskMcpServer {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl DocaskMcpServer {
    /// Load a manual, replacing the current one.
    #[tool(
        name = "docask_load",
        description = "Load a .pdf, .txt or .md manual from disk. Replaces \
                       the previously loaded document."
    )]
    pub async fn docask_load(
        &self,
        params: Parameters<LoadParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let path = PathBuf::from(&params.0.path);
        let summary = match self.session.load_file(&path) {
            Ok(summary) => summary,
            Err(e) => return Ok(tool_failure(&e)),
        };

        let text = format_load_summary(&summary);
        let structured = serde_json::to_value(&summary)
            .map_err(|e| mcp_error("failed to serialize summary", e))?;

        Ok(tool_success(text, structured))
    }

    /// Show the context that would be sent for a question.
    #[tool(
        name = "docask_context",
        description = "Retrieve the parts of the loaded manual relevant to \
                       a question, without calling the language model."
    )]
    pub async fn docask_context(
        &self,
        params: Parameters<QuestionParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let question = params.0.question;
        let context = match self.session.context(&question) {
            Ok(context) => context,
            Err(e) => return Ok(tool_failure(&e)),
        };

        let structured = serde_json::to_value(ContextResponse {
            question,
            keywords: context.keywords.clone(),
            synonyms: context.synonym_additions().to_vec(),
            chunks: context.indices(),
            context_chars: context.text.chars().count(),
        })
        .map_err(|e| mcp_error("failed to serialize context", e))?;

        Ok(tool_success(context.text, structured))
    }

    /// Answer a question about the loaded manual.
    #[tool(
        name = "docask_ask",
        description = "Answer a question about the loaded manual in Czech. \
                       Pass earlier turns as history to continue a \
                       conversation."
    )]
    pub async fn docask_ask(
        &self,
        params: Parameters<AskParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let history: Vec<Message> = params
            .history
            .unwrap_or_default()
            .into_iter()
            .map(Message::from)
            .collect();

        match self.session.answer(&params.question, &history).await {
            Ok(answer) => {
                let structured = json!({ "answer": answer });
                Ok(tool_success(answer, structured))
            }
            Err(e) => Ok(tool_failure(&e)),
        }
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for DocaskMcpServer {
    fn get_info(&self) -> ServerInfo {
        let capabilities = ServerCapabilities::builder().enable_tools().build();
        let implementation =
            Implementation::new("docask", env!("CARGO_PKG_VERSION"))
                .with_title("docask MCP");

        ServerInfo::new(capabilities)
            .with_server_info(implementation)
            .with_instructions(
                "Call docask_load with a manual first, then docask_ask \
                 (or docask_context to inspect retrieval).",
            )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoadParams {
    /// Path to a .pdf, .txt or .md file.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QuestionParams {
    /// The question, typically in Czech.
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskParams {
    /// The question, typically in Czech.
    pub question: String,
    /// Earlier turns of the conversation, oldest first.
    pub history: Option<Vec<HistoryTurn>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryTurn {
    /// Either "user" or "assistant".
    pub role: TurnRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl From<HistoryTurn> for Message {
    fn from(turn: HistoryTurn) -> Self {
        let role = match turn.role {
            TurnRole::User => Role::User,
            TurnRole::Assistant => Role::Assistant,
        };
        Message {
            role,
            content: turn.content,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextResponse {
    question: String,
    keywords: Vec<String>,
    synonyms: Vec<String>,
    chunks: Vec<usize>,
    context_chars: usize,
}

fn format_load_summary(summary: &DocumentSummary) -> String {
    let suffix = if summary.chunks == 1 { "" } else { "s" };
    format!(
        "Loaded \"{}\": {} pages, {} chars, {} chunk{}",
        summary.name, summary.pages, summary.chars, summary.chunks, suffix
    )
}

/// Errors the caller can act on are reported as tool errors, not protocol
/// errors.
fn tool_success(text: String, structured: serde_json::Value) -> CallToolResult {
    let mut result = CallToolResult::success(vec![Content::text(text)]);
    result.structured_content = Some(structured);
    result
}

fn tool_failure(error: &error::Error) -> CallToolResult {
    let message = error.to_string();
    let mut result =
        CallToolResult::error(vec![Content::text(message.clone())]);
    result.structured_content = Some(json!({ "error": message }));
    result
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(session: Session) -> error::Result<()> {
    let server = DocaskMcpServer::new(Arc::new(session));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}
