//! Tool trait and registry
//!
//! Tools are the only units the task executor can invoke. The registry
//! is a closed mapping from name to instance; invocation always returns
//! a sum type and never panics across the registry boundary.

use crate::config::AgentConfig;
use crate::retrieval::SmartRetriever;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

pub type ToolArgs = serde_json::Map<String, Value>;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),
}

/// A single invocable capability
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<(&str, &str)> {
        self.tools
            .values()
            .map(|t| (t.name(), t.description()))
            .collect()
    }

    pub async fn invoke(&self, name: &str, args: &ToolArgs) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.invoke(args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn require_str_arg(args: &ToolArgs, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| ToolError::InvalidArguments(format!("expected '{}' string argument", key)))
}

//
// ================= Report Search =================
//

/// Smart report retrieval over the segment index. The tool contract is
/// "always returns text": retrieval failures are caught here and
/// surfaced as an error string, never as an exception to the executor.
pub struct SearchFinancialReportsTool {
    retriever: Arc<SmartRetriever>,
}

impl SearchFinancialReportsTool {
    pub fn new(retriever: Arc<SmartRetriever>) -> Self {
        Self { retriever }
    }

    fn format_segments(segments: &[crate::models::Segment]) -> String {
        let mut out = String::new();
        for (i, segment) in segments.iter().enumerate() {
            let score = segment.rerank_score.unwrap_or(0.0);
            let source = if segment.hierarchy.is_empty() {
                "unknown source".to_string()
            } else {
                segment.hierarchy_path()
            };
            let _ = writeln!(
                out,
                "--- Snippet {} (relevance: {:.4}) ---\nSource: {}\nContent: {}\n",
                i + 1,
                score,
                source,
                segment.text
            );
        }
        out
    }
}

#[async_trait::async_trait]
impl Tool for SearchFinancialReportsTool {
    fn name(&self) -> &'static str {
        "search_financial_reports"
    }

    fn description(&self) -> &'static str {
        "Intent-routed report retrieval engine; returns the most relevant report snippets for a natural-language question"
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let query = require_str_arg(args, "query")?;
        info!(query = %query, "search_financial_reports invoked");

        match self.retriever.retrieve(&query).await {
            Ok(segments) if segments.is_empty() => {
                Ok("No matching content found in the report index.".to_string())
            }
            Ok(segments) => Ok(Self::format_segments(&segments)),
            Err(e) => {
                error!(error = %e, "Retrieval failed inside search tool");
                Ok(format!("Internal retrieval error: {}", e))
            }
        }
    }
}

//
// ================= Market Data =================
//

/// HTTP client for the market-data quote service
#[derive(Clone)]
pub struct MarketDataClient {
    client: Client,
    base_url: String,
}

impl MarketDataClient {
    pub fn new(base_url: String) -> Option<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .ok()?;

        Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ToolError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                ToolError::Execution(format!("Market data request failed for {}: {}", path, e))
            })?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ToolError::Execution(format!("Invalid JSON response: {}", e)))?;

        if !status.is_success() {
            return Err(ToolError::Execution(format!(
                "Market data API returned {} for {}: {}",
                status, path, body
            )));
        }

        Ok(body)
    }
}

fn format_quote(symbol: &str, quote: &Value) -> String {
    let name = quote
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(symbol);
    let price = quote.get("price").and_then(Value::as_f64);
    let currency = quote
        .get("currency")
        .and_then(Value::as_str)
        .unwrap_or("USD");

    match price {
        Some(price) => format!("{} ({}): {:.2} {}", name, symbol, price, currency),
        None => format!("No quote data available for {}", symbol),
    }
}

/// International products: US equities, ETFs, crypto, futures, indices
pub struct InternationalPriceTool {
    api: Option<MarketDataClient>,
}

impl InternationalPriceTool {
    pub fn new(api: Option<MarketDataClient>) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl Tool for InternationalPriceTool {
    fn name(&self) -> &'static str {
        "get_international_financial_product_price"
    }

    fn description(&self) -> &'static str {
        "Look up the latest price for an international symbol (US stocks, ETFs, crypto, futures, indices)"
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let api = self.api.as_ref().ok_or_else(|| {
            ToolError::Execution("MARKET_DATA_BASE_URL is not configured".to_string())
        })?;

        let symbol = require_str_arg(args, "symbol")?;
        let quote = api
            .post_json("/api/v1/quotes/international", &json!({ "symbol": symbol }))
            .await?;

        Ok(format_quote(&symbol, &quote))
    }
}

/// Domestic A-share quotes, by code or company name
pub struct DomesticPriceTool {
    api: Option<MarketDataClient>,
}

impl DomesticPriceTool {
    pub fn new(api: Option<MarketDataClient>) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl Tool for DomesticPriceTool {
    fn name(&self) -> &'static str {
        "get_internal_stock_price"
    }

    fn description(&self) -> &'static str {
        "Look up the latest A-share quote by stock code or company name"
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let api = self.api.as_ref().ok_or_else(|| {
            ToolError::Execution("MARKET_DATA_BASE_URL is not configured".to_string())
        })?;

        let symbol = require_str_arg(args, "symbol")?;
        let quote = api
            .post_json("/api/v1/quotes/domestic", &json!({ "symbol": symbol }))
            .await?;

        Ok(format_quote(&symbol, &quote))
    }
}

//
// ================= Development Tools =================
//

/// Canned price tool; keeps the loop runnable without a market-data API.
pub struct MockPriceTool {
    tool_name: &'static str,
}

impl MockPriceTool {
    pub fn international() -> Self {
        Self {
            tool_name: "get_international_financial_product_price",
        }
    }

    pub fn domestic() -> Self {
        Self {
            tool_name: "get_internal_stock_price",
        }
    }
}

#[async_trait::async_trait]
impl Tool for MockPriceTool {
    fn name(&self) -> &'static str {
        self.tool_name
    }

    fn description(&self) -> &'static str {
        "Mock price lookup returning a fixed quote"
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let symbol = require_str_arg(args, "symbol")?;
        Ok(format!("{}: 150.50 USD", symbol))
    }
}

/// Build the default registry from explicit configuration.
pub fn create_default_registry(
    config: &AgentConfig,
    retriever: Arc<SmartRetriever>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(SearchFinancialReportsTool::new(retriever)));

    let market_api = config
        .market_data_base_url
        .clone()
        .and_then(MarketDataClient::new);
    registry.register(Arc::new(InternationalPriceTool::new(market_api.clone())));
    registry.register(Arc::new(DomesticPriceTool::new(market_api)));

    registry
}
