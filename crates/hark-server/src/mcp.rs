//! Minimal MCP endpoint: JSON-RPC 2.0 over a single POST route.
//!
//! Supports `initialize`, `notifications/initialized`, `ping`, `tools/list`
//! and `tools/call` for the `transcribe` tool.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hark_core::{BatchTranscript, TranscribeRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::server::AppState;

pub const PROTOCOL_VERSION: &str = "2025-03-26";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id: id.unwrap_or(Value::Null),
        }
    }

    fn err(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
            id: id.unwrap_or(Value::Null),
        }
    }
}

/// Result of one tool invocation.
#[derive(Debug, Serialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Debug, Serialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl ToolResult {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolContent { kind: "text", text }],
            is_error,
        }
    }
}

/// Arguments of the `transcribe` tool.
#[derive(Debug, Deserialize)]
pub struct TranscribeArgs {
    pub in_paths: Vec<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub t: i32,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// POST /mcp
pub async fn mcp_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "unparseable JSON-RPC body");
            return Json(RpcResponse::err(None, PARSE_ERROR, "Parse error")).into_response();
        }
    };

    // Notifications get no body back
    if request.id.is_none() && request.method.starts_with("notifications/") {
        return StatusCode::ACCEPTED.into_response();
    }

    info!(method = %request.method, "mcp request");
    Json(dispatch(&state, request).await).into_response()
}

pub async fn dispatch(state: &AppState, request: RpcRequest) -> RpcResponse {
    if request.jsonrpc != "2.0" {
        return RpcResponse::err(request.id, INVALID_REQUEST, "Invalid Request");
    }

    match request.method.as_str() {
        "initialize" => RpcResponse::ok(request.id, initialize_result()),
        "ping" | "notifications/initialized" => RpcResponse::ok(request.id, json!({})),
        "tools/list" => RpcResponse::ok(request.id, json!({ "tools": [transcribe_tool()] })),
        "tools/call" => {
            let params: CallParams = match request
                .params
                .map(serde_json::from_value)
                .transpose()
            {
                Ok(Some(params)) => params,
                _ => return RpcResponse::err(request.id, INVALID_PARAMS, "Invalid params"),
            };
            if params.name != "transcribe" {
                return RpcResponse::err(
                    request.id,
                    INVALID_PARAMS,
                    format!("Unknown tool: {}", params.name),
                );
            }
            let args: TranscribeArgs = match serde_json::from_value(params.arguments) {
                Ok(args) => args,
                Err(e) => {
                    return RpcResponse::err(
                        request.id,
                        INVALID_PARAMS,
                        format!("Invalid params: {e}"),
                    );
                }
            };
            let result = call_transcribe(state, args).await;
            match serde_json::to_value(result) {
                Ok(value) => RpcResponse::ok(request.id, value),
                Err(e) => RpcResponse::err(request.id, INVALID_PARAMS, e.to_string()),
            }
        }
        other => RpcResponse::err(request.id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
    }
}

async fn call_transcribe(state: &AppState, args: TranscribeArgs) -> ToolResult {
    let req = TranscribeRequest {
        in_paths: args.in_paths,
        model: args.model,
        lang: args.lang,
        threads: args.t,
        models_dir: state.models_dir.clone(),
    };
    let cancel = state.shutdown.child_token();
    match state.transcriber.transcribe_batch(&req, &cancel).await {
        Ok(batch) => match serde_json::to_string_pretty(&joined_texts(&batch)) {
            Ok(text) => ToolResult::text(text, false),
            Err(e) => ToolResult::text(format!("transcribed, but serialization failed: {e}"), true),
        },
        Err(e) => ToolResult::text(format!("transcription failed: {e}"), true),
    }
}

/// One string per input: the concatenated segment text.
pub fn joined_texts(batch: &BatchTranscript) -> Vec<String> {
    batch.results.iter().map(|r| r.text()).collect()
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": "hark",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn transcribe_tool() -> Value {
    json!({
        "name": "transcribe",
        "description": "Transcribe audio or video (local paths or http(s) URLs) to text with whisper.cpp.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "in_paths": {
                    "type": "array",
                    "description": "Local paths or http(s) URLs of audio/video files.",
                    "items": { "type": "string" },
                    "minItems": 1,
                },
                "model": {
                    "type": "string",
                    "description": "Model alias or filename (e.g. tiny, medium, large-v3, ggml-small.bin).",
                },
                "lang": {
                    "type": "string",
                    "description": "Language code or 'auto' (e.g. zh, en, auto).",
                },
                "t": {
                    "type": "integer",
                    "description": "Engine threads; 0 picks a default.",
                    "minimum": 0,
                },
            },
            "required": ["in_paths"],
        },
    })
}
