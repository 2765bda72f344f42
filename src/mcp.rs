use std::sync::Arc;

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
    error,
    search::{DEFAULT_N_RESULTS, SearchHit, Searcher},
};

#[derive(Clone)]
pub struct SearchMcpServer {
    searcher: Arc<Searcher>,
    tool_router: ToolRouter<Self>,
}

impl SearchMcpServer {
    pub fn new(searcher: Arc<Searcher>) -> Self {
        Self {
            searcher,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl SearchMcpServer {
    /// List the folders available for search.
    #[tool(
        name = "list_directories",
        description = "List the absolute paths of all indexed directories that can be searched."
    )]
    pub async fn list_directories(
        &self,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let directories = self.searcher.list_directories();

        let text = serde_json::to_string(&directories)
            .map_err(|e| mcp_error("failed to serialize directories", e))?;

        Ok(CallToolResult {
            content: vec![Content::text(text)],
            structured_content: Some(json!({ "directories": directories })),
            is_error: Some(false),
            meta: None,
        })
    }

    /// Semantic search across indexed folders.
    #[tool(
        name = "search",
        description = "Semantic search over indexed documents. Searches every indexed directory unless `directory` is given. Returns results ranked by similarity score (0-1); failures appear as entries with an `error` field."
    )]
    pub async fn search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let n_results = params.n_results.unwrap_or(DEFAULT_N_RESULTS);

        let hits = self
            .searcher
            .search(&params.query, n_results, params.directory.as_deref())
            .await;

        let text = serde_json::to_string(&hits)
            .map_err(|e| mcp_error("failed to serialize search results", e))?;
        let structured = serde_json::to_value(SearchResponse { results: &hits })
            .map_err(|e| mcp_error("failed to serialize search results", e))?;

        Ok(CallToolResult {
            content: vec![Content::text(text)],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        })
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for SearchMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "search-mcp".to_string(),
                title: Some("Folder search MCP".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Use list_directories to see which folders are indexed, then search to find relevant documents. Pass a directory to restrict the search to one folder."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Natural-language search query.
    pub query: String,
    /// Maximum number of results (default: 5).
    pub n_results: Option<usize>,
    /// Restrict the search to one indexed directory (absolute path).
    pub directory: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchResponse<'a> {
    results: &'a [SearchHit],
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

/// Serve the tools over stdio until the client disconnects.
pub fn run_mcp(searcher: Searcher) -> error::Result<()> {
    let server = SearchMcpServer::new(Arc::new(searcher));

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
        tracing::info!("MCP server listening on stdio");
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::Embedder,
        identity::FolderIdentity,
        registry::Registry,
        search::SearchOptions,
        vector_store::{CandidateMetadata, VectorDb, VectorStore},
    };

    struct UnitEmbedder;

    impl Embedder for UnitEmbedder {
        fn embed(&self, _text: &str) -> error::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn server_with_notes() -> (tempfile::TempDir, SearchMcpServer, String) {
        let tmp = tempfile::tempdir().unwrap();
        let notes = tmp.path().join("notes");
        std::fs::create_dir_all(&notes).unwrap();
        let notes_id = FolderIdentity::resolve(&notes).unwrap();

        let db = VectorDb::open(&tmp.path().join("collections.redb")).unwrap();
        db.insert(
            &notes_id.collection_name(),
            1,
            &[1.0, 0.0],
            "Rust is fast.\nOwnership keeps memory safe.",
            &CandidateMetadata {
                file_path: Some(notes_id.as_path().join("rust.md").display().to_string()),
                file_name: Some("rust.md".to_string()),
            },
        )
        .unwrap();
        assert!(
            db.get_collection(&notes_id.collection_name())
                .unwrap()
                .is_some()
        );

        let registry = Registry::build(&[notes], &db).unwrap();
        let searcher = Searcher::new(
            Arc::new(registry),
            Arc::new(UnitEmbedder),
            SearchOptions::default(),
        );

        (tmp, SearchMcpServer::new(Arc::new(searcher)), notes_id.to_string())
    }

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn list_directories_tool_returns_paths() {
        let (_tmp, server, notes) = server_with_notes();

        let result = server.list_directories().await.unwrap();

        let listed: Vec<String> = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(listed, vec![notes.clone()]);
        let structured = result.structured_content.expect("structured");
        assert_eq!(structured, json!({ "directories": [notes] }));
    }

    #[tokio::test]
    async fn search_tool_returns_ranked_results() {
        let (_tmp, server, notes) = server_with_notes();

        let params = SearchParams {
            query: "rust".to_string(),
            n_results: None,
            directory: None,
        };
        let result = server.search(Parameters(params)).await.unwrap();

        let structured = result.structured_content.expect("structured");
        let results = structured
            .get("results")
            .and_then(|v| v.as_array())
            .expect("results array");
        assert_eq!(results.len(), 1);

        let first = &results[0];
        assert_eq!(first.get("score").and_then(|v| v.as_f64()), Some(1.0));
        assert_eq!(
            first.get("directory").and_then(|v| v.as_str()),
            Some(notes.as_str())
        );
        assert_eq!(
            first.get("file_name").and_then(|v| v.as_str()),
            Some("rust.md")
        );
        assert!(
            first
                .get("snippet")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .starts_with("Rust is fast.")
        );

        let text: serde_json::Value =
            serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(&text, structured.get("results").unwrap());
    }

    #[tokio::test]
    async fn search_tool_reports_unknown_directory_as_entry() {
        let (_tmp, server, _notes) = server_with_notes();

        let params = SearchParams {
            query: "rust".to_string(),
            n_results: Some(3),
            directory: Some("/not/indexed".to_string()),
        };
        let result = server.search(Parameters(params)).await.unwrap();

        assert_eq!(result.is_error, Some(false));
        let text: serde_json::Value =
            serde_json::from_str(&text_of(&result)).unwrap();
        let entries = text.as_array().expect("array");
        assert_eq!(entries.len(), 1);
        assert!(
            entries[0]
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .contains("/not/indexed")
        );
    }

    #[test]
    fn search_params_use_snake_case() {
        let params: SearchParams = serde_json::from_value(json!({
            "query": "q",
            "n_results": 2,
            "directory": null
        }))
        .unwrap();
        assert_eq!(params.n_results, Some(2));
        assert!(params.directory.is_none());
    }
}
