use crate::config::MathConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("Math backend is not configured")]
    NotConfigured,
    #[error("Math backend returned HTTP {0}")]
    Status(u16),
    #[error("Math backend unreachable: {0}")]
    Transport(String),
    #[error("Malformed math backend response: {0}")]
    Parse(String),
}

/// Whiteboard snapshot sent for solving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    /// `data:image/png;base64,...` URL of the canvas.
    pub image: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SolveResponse {
    /// Lines shown under the whiteboard.
    pub fn summary(&self) -> Vec<String> {
        if self.success {
            vec![
                format!("Expression: {}", self.problem.as_deref().unwrap_or_default()),
                format!("Result: {}", self.result.as_deref().unwrap_or_default()),
            ]
        } else {
            vec![format!(
                "Error: {}",
                self.message.as_deref().unwrap_or("unknown error")
            )]
        }
    }
}

#[derive(Debug, Clone)]
pub struct MathSolverClient {
    client: reqwest::Client,
    endpoint: String,
}

impl MathSolverClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SolverError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SolverError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/calculate", base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &MathConfig) -> Result<Self, SolverError> {
        let base = config
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(SolverError::NotConfigured)?;
        Self::new(base, Duration::from_secs(config.timeout_secs.max(1)))
    }

    pub async fn solve(&self, request: &SolveRequest) -> Result<SolveResponse, SolverError> {
        debug!(endpoint = %self.endpoint, image_len = request.image.len(), "sending whiteboard");
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| SolverError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SolverError::Status(status.as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| SolverError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn request() -> SolveRequest {
        let mut variables = Map::new();
        variables.insert("x".to_string(), json!(5));
        variables.insert("y".to_string(), json!(10));
        SolveRequest {
            image: "data:image/png;base64,AAAA".to_string(),
            variables,
        }
    }

    #[test]
    fn test_summary_lines() {
        let ok = SolveResponse {
            success: true,
            problem: Some("x + y".into()),
            result: Some("15".into()),
            message: None,
        };
        assert_eq!(ok.summary(), vec!["Expression: x + y", "Result: 15"]);

        let failed = SolveResponse {
            success: false,
            problem: None,
            result: None,
            message: Some("no expression found".into()),
        };
        assert_eq!(failed.summary(), vec!["Error: no expression found"]);
    }

    #[test]
    fn test_unconfigured_client() {
        let err = MathSolverClient::from_config(&MathConfig::default()).expect_err("no url");
        assert_eq!(err, SolverError::NotConfigured);
    }

    #[tokio::test]
    async fn test_solve_posts_image_and_variables() {
        let app = Router::new().route(
            "/calculate",
            post(|Json(body): Json<Value>| async move {
                let x = body["variables"]["x"].as_i64().unwrap_or_default();
                let y = body["variables"]["y"].as_i64().unwrap_or_default();
                Json(json!({ "success": true, "problem": "x + y", "result": (x + y).to_string() }))
            }),
        );
        let base = serve(app).await;
        let client = MathSolverClient::new(&base, Duration::from_secs(5)).expect("client");

        let response = client.solve(&request()).await.expect("solve");
        assert!(response.success);
        assert_eq!(response.result.as_deref(), Some("15"));
    }

    #[tokio::test]
    async fn test_solve_maps_http_errors() {
        let app = Router::new().route(
            "/calculate",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = serve(app).await;
        let client = MathSolverClient::new(&base, Duration::from_secs(5)).expect("client");
        assert_eq!(
            client.solve(&request()).await,
            Err(SolverError::Status(500))
        );
    }
}
