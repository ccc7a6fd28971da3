//! Forecasting platform capabilities.
//!
//! The platform is consumed strictly as four opaque tools: list open
//! forecasts, fetch one forecast's detail and resolution criteria, fetch the
//! bot's previously submitted points, and submit a new point with a
//! rationale. Submission authenticates with the bot credentials; reads are
//! anonymous.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::registry::{parse_params, Tool, ToolResult};

/// Shared HTTP access to the forecasting service.
pub struct ForecastClient {
    http: reqwest::Client,
    base_url: String,
    user_id: u64,
    username: String,
    password: String,
}

impl ForecastClient {
    pub fn new(
        base_url: impl Into<String>,
        user_id: u64,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            user_id,
            username: username.into(),
            password: password.into(),
        })
    }

    fn url(&self, postfix: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), postfix)
    }

    async fn get(&self, postfix: &str) -> Result<Value, String> {
        let response = self
            .http
            .get(self.url(postfix))
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("request failed with status {}", response.status()));
        }
        response
            .json()
            .await
            .map_err(|e| format!("malformed response: {e}"))
    }

    async fn post(&self, postfix: &str, body: &Value, token: Option<&str>) -> Result<Value, String> {
        let mut request = self.http.post(self.url(postfix)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("request failed with status {}", response.status()));
        }
        response
            .json()
            .await
            .map_err(|e| format!("malformed response: {e}"))
    }

    /// Exchange bot credentials for a bearer token.
    async fn login(&self) -> Result<String, String> {
        let body = json!({
            "username": self.username,
            "password": self.password,
        });
        let response = self.post("users/login", &body, None).await?;
        response
            .get("token")
            .and_then(|t| t.as_str())
            .map(|t| t.to_string())
            .ok_or_else(|| "login response had no token".to_string())
    }
}

/// List forecasts that are open for the configured bot user.
pub struct GetForecastsTool {
    client: Arc<ForecastClient>,
}

impl GetForecastsTool {
    pub const NAME: &'static str = "get_forecasts";

    pub fn new(client: Arc<ForecastClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetForecastsTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Get the list of forecasts that are available for you to forecast."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value) -> ToolResult {
        match self
            .client
            .get(&format!("forecasts/stale-and-new/{}", self.client.user_id))
            .await
        {
            Ok(data) => ToolResult::success_data(data),
            Err(err) => ToolResult::error(err),
        }
    }
}

#[derive(Deserialize)]
struct ForecastIdParams {
    forecast_id: u64,
}

/// Fetch one forecast's full detail and resolution criteria.
pub struct GetForecastDataTool {
    client: Arc<ForecastClient>,
}

impl GetForecastDataTool {
    pub const NAME: &'static str = "get_forecast_data";

    pub fn new(client: Arc<ForecastClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetForecastDataTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Get the full data for a forecast, including its resolution criteria."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "forecast_id": {
                    "type": "integer",
                    "description": "The ID of the forecast to get data for."
                }
            },
            "required": ["forecast_id"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: ForecastIdParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        match self
            .client
            .get(&format!("forecasts/{}", params.forecast_id))
            .await
        {
            Ok(data) => ToolResult::success_data(data),
            Err(err) => ToolResult::error(err),
        }
    }
}

/// Fetch the bot's previously submitted points for a forecast.
pub struct GetForecastPointsTool {
    client: Arc<ForecastClient>,
}

impl GetForecastPointsTool {
    pub const NAME: &'static str = "get_forecast_points";

    pub fn new(client: Arc<ForecastClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetForecastPointsTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Get the forecast points you have previously submitted for a forecast."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "forecast_id": {
                    "type": "integer",
                    "description": "The ID of the forecast to get points for."
                }
            },
            "required": ["forecast_id"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: ForecastIdParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let body = json!({
            "forecast_id": params.forecast_id,
            "user_id": self.client.user_id,
        });
        match self.client.post("forecast-points/user", &body, None).await {
            Ok(data) => ToolResult::success_data(data),
            Err(err) => ToolResult::error(err),
        }
    }
}

#[derive(Deserialize)]
struct UpdateForecastParams {
    forecast_id: u64,
    point_forecast: f64,
    reason: String,
}

/// Submit a new point forecast with a rationale.
pub struct UpdateForecastTool {
    client: Arc<ForecastClient>,
}

impl UpdateForecastTool {
    pub const NAME: &'static str = "update_forecast";

    pub fn new(client: Arc<ForecastClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for UpdateForecastTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Submit a new point forecast for a forecast, with the reasoning behind it."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "forecast_id": {
                    "type": "integer",
                    "description": "The ID of the forecast to update."
                },
                "point_forecast": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": 1,
                    "description": "The new point forecast, a probability between 0 and 1."
                },
                "reason": {
                    "type": "string",
                    "description": "The reasoning behind the update."
                }
            },
            "required": ["forecast_id", "point_forecast", "reason"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: UpdateForecastParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if !(0.0..=1.0).contains(&params.point_forecast) {
            return ToolResult::invalid_parameters(
                "Invalid parameters: point_forecast must be between 0 and 1",
            );
        }

        let token = match self.client.login().await {
            Ok(token) => token,
            Err(err) => return ToolResult::error(format!("login failed: {err}")),
        };

        let body = json!({
            "forecast_id": params.forecast_id,
            "point_forecast": params.point_forecast,
            "reason": params.reason,
            "user_id": self.client.user_id,
        });
        match self
            .client
            .post("api/forecast-points", &body, Some(&token))
            .await
        {
            Ok(data) => ToolResult::success_data(data),
            Err(err) => ToolResult::error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Arc<ForecastClient> {
        ForecastClient::new("http://localhost:8000", 18, "bot", "secret")
    }

    #[tokio::test]
    async fn update_rejects_out_of_range_probability() {
        let tool = UpdateForecastTool::new(client());
        let result = tool
            .execute(json!({
                "forecast_id": 1,
                "point_forecast": 1.5,
                "reason": "because",
            }))
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("between 0 and 1"));
    }

    #[tokio::test]
    async fn forecast_id_is_required() {
        let tool = GetForecastDataTool::new(client());
        let result = tool.execute(json!({})).await;
        assert!(result.is_error);
        assert!(result.output.contains("invalid_parameters"));
    }
}
