//! Chat-assistant tool endpoint.
//!
//! Speaks JSON-RPC 2.0 on `POST /mcp` in the shape MCP hosts expect:
//! `initialize`, `tools/list` and `tools/call`. The fetch tools return the same
//! envelopes as the JSON API; the view tools return widget HTML.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::handlers::{render_detail, render_listing};
use crate::operations::{
    list_wave_hacks, timestamp, wave_hack_detail, DetailEnvelope, FetchRequest, ListingEnvelope,
};
use crate::state::AppState;

const JSONRPC_VERSION: &str = "2.0";
const PROTOCOL_VERSION: &str = "2025-06-18";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

/// Listing tools default to open waves only.
const TOOL_ACTIVE_ONLY_DEFAULT: bool = true;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// `None` only when the member is absent; an explicit `null` is a request.
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

impl RpcResponse {
    fn new(id: Value, outcome: Result<Value, RpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
            error,
        }
    }
}

/// The tools this server offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    FetchAkindoData,
    FetchWaveCute,
    ViewWaveCute,
    ViewWaveCuteDetail,
}

impl Tool {
    pub const ALL: [Tool; 4] = [
        Tool::FetchAkindoData,
        Tool::FetchWaveCute,
        Tool::ViewWaveCute,
        Tool::ViewWaveCuteDetail,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::FetchAkindoData => "fetch_akindo_data",
            Tool::FetchWaveCute => "fetch_wave_cute",
            Tool::ViewWaveCute => "view_wave_cute",
            Tool::ViewWaveCuteDetail => "view_wave_cute_detail",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    fn title(self) -> &'static str {
        match self {
            Tool::FetchAkindoData => "Fetch Akindo Wave Cute Data",
            Tool::FetchWaveCute => "Fetch Wave Cute Details",
            Tool::ViewWaveCute => "View Akindo Wave Cute Data",
            Tool::ViewWaveCuteDetail => "View Wave Cute Detail",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Tool::FetchAkindoData => {
                "Fetch Wave Cute data from Akindo API with pagination support"
            }
            Tool::FetchWaveCute => {
                "Fetch detailed information about a specific Wave Cute by ID from the Akindo API"
            }
            Tool::ViewWaveCute => {
                "Display Wave Cute data from Akindo API with pagination support in an interactive UI"
            }
            Tool::ViewWaveCuteDetail => {
                "Display detailed information about a specific Wave Cute by ID from the Akindo API"
            }
        }
    }

    fn input_schema(self) -> Value {
        match self {
            Tool::FetchAkindoData | Tool::ViewWaveCute => json!({
                "type": "object",
                "properties": {
                    "mode": {
                        "type": "string",
                        "enum": ["all", "single", "page"],
                        "default": "all",
                        "description": "Fetch mode: 'all' for all pages, 'single' for first page only, 'page' for specific page"
                    },
                    "page": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Specific page number to fetch (only used when mode is 'page')"
                    },
                    "activeOnly": {
                        "type": "boolean",
                        "default": TOOL_ACTIVE_ONLY_DEFAULT,
                        "description": "Filter to only show items with an active wave"
                    }
                }
            }),
            Tool::FetchWaveCute | Tool::ViewWaveCuteDetail => json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "string",
                        "minLength": 1,
                        "description": "The Wave Cute ID"
                    }
                },
                "required": ["id"]
            }),
        }
    }

    fn widget_meta(self) -> Option<Value> {
        let (invoking, invoked) = match self {
            Tool::ViewWaveCute => ("Loading wave cute data", "Wave cute viewer ready"),
            Tool::ViewWaveCuteDetail => ("Loading wave cute details", "Wave cute detail ready"),
            _ => return None,
        };
        Some(json!({
            "openai": {
                "toolInvocation": { "invoking": invoking, "invoked": invoked },
                "widgetAccessible": true,
                "resultCanProduceWidget": true
            }
        }))
    }

    pub fn definition(self) -> Value {
        let mut definition = json!({
            "name": self.name(),
            "title": self.title(),
            "description": self.description(),
            "inputSchema": self.input_schema(),
            "annotations": {
                "title": self.title(),
                "readOnlyHint": true,
                "destructiveHint": false,
                "idempotentHint": true
            }
        });
        if let Some(meta) = self.widget_meta() {
            definition["_meta"] = meta;
        }
        definition
    }
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Default, Deserialize)]
struct DetailArgs {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Serialize)]
struct TextContent {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

/// Result of a `tools/call`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    content: Vec<TextContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    structured_content: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_error: bool,
}

impl ToolResult {
    fn text(text: String, structured_content: Option<Value>, is_error: bool) -> Self {
        Self {
            content: vec![TextContent { kind: "text", text }],
            structured_content,
            is_error,
        }
    }

    /// Pretty JSON of an envelope as the text content.
    fn json<T: Serialize>(envelope: &T, is_error: bool) -> Self {
        let text = serde_json::to_string_pretty(envelope).unwrap_or_else(|e| failure_text(&e.to_string()));
        Self::text(text, None, is_error)
    }

    fn widget(rendered: Result<String, AppError>, structured_content: Value) -> Self {
        match rendered {
            Ok(html) => Self::text(html, Some(structured_content), false),
            Err(e) => Self::text(failure_text(&e.user_message()), None, true),
        }
    }
}

fn failure_text(message: &str) -> String {
    let failure = json!({
        "success": false,
        "error": message,
        "timestamp": timestamp(),
    });
    serde_json::to_string_pretty(&failure).unwrap_or_else(|_| failure.to_string())
}

fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, RpcError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid arguments: {e}")))
}

async fn call_tool(state: &AppState, tool: Tool, arguments: Value) -> Result<ToolResult, RpcError> {
    info!("Tool call: {}", tool.name());
    match tool {
        Tool::FetchAkindoData => {
            let request: FetchRequest = parse_arguments(arguments)?;
            let result = list_wave_hacks(&state.fetcher, &request, TOOL_ACTIVE_ONLY_DEFAULT).await;
            let envelope = ListingEnvelope::from(result);
            Ok(ToolResult::json(&envelope, !envelope.success))
        }
        Tool::FetchWaveCute => {
            let args: DetailArgs = parse_arguments(arguments)?;
            let result = wave_hack_detail(&state.fetcher, &args.id).await;
            let envelope = DetailEnvelope::from_result(&args.id, result);
            Ok(ToolResult::json(&envelope, !envelope.success))
        }
        Tool::ViewWaveCute => {
            let request: FetchRequest = parse_arguments(arguments)?;
            let result = list_wave_hacks(&state.fetcher, &request, TOOL_ACTIVE_ONLY_DEFAULT).await;
            let structured = json!({
                "mode": request.mode,
                "page": request.page,
                "activeOnly": request.active_only.unwrap_or(TOOL_ACTIVE_ONLY_DEFAULT),
            });
            let rendered = render_listing(state, "widget_list.html", &result, Utc::now());
            Ok(ToolResult::widget(rendered, structured))
        }
        Tool::ViewWaveCuteDetail => {
            let args: DetailArgs = parse_arguments(arguments)?;
            let result = wave_hack_detail(&state.fetcher, &args.id).await;
            let rendered = render_detail(state, "widget_detail.html", &args.id, &result, Utc::now());
            Ok(ToolResult::widget(rendered, json!({ "id": args.id })))
        }
    }
}

fn initialize(params: &Value) -> Value {
    let version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);
    json!({
        "protocolVersion": version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "title": "Akindo Wave Cute",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// Runs one JSON-RPC method.
pub async fn dispatch(state: &AppState, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "initialize" => Ok(initialize(&params)),
        "ping" => Ok(json!({})),
        "tools/list" => {
            let tools: Vec<Value> = Tool::ALL.into_iter().map(Tool::definition).collect();
            Ok(json!({ "tools": tools }))
        }
        "tools/call" => {
            let call: ToolCall = serde_json::from_value(params)
                .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid tools/call params: {e}")))?;
            let tool = Tool::from_name(&call.name)
                .ok_or_else(|| RpcError::new(INVALID_PARAMS, format!("Unknown tool: {}", call.name)))?;
            let result = call_tool(state, tool, call.arguments).await?;
            serde_json::to_value(result).map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
        }
        other => Err(RpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        )),
    }
}

/// POST /mcp - JSON-RPC tool endpoint.
pub async fn mcp(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Unparsable JSON-RPC request: {}", e);
            let error = RpcError::new(PARSE_ERROR, format!("Parse error: {e}"));
            return Json(RpcResponse::new(Value::Null, Err(error))).into_response();
        }
    };

    let Some(id) = request.id else {
        debug!("Notification: {}", request.method);
        return StatusCode::ACCEPTED.into_response();
    };

    if request.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
        let error = RpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\"");
        return Json(RpcResponse::new(id, Err(error))).into_response();
    }

    let outcome = dispatch(&state, &request.method, request.params).await;
    Json(RpcResponse::new(id, outcome)).into_response()
}
