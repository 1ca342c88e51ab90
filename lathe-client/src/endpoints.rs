//! Externally reachable endpoints
//!
//! Published pipelines and deployed services expose their own REST
//! endpoints, addressed by URL rather than through the platform API.

use lathe_core::dto::pipeline::{TriggerPipeline, TriggerResponse};
use lathe_core::dto::service::ScoringRequest;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::Credential;
use crate::error::{ClientError, Result};

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Authentication(error_text),
        _ => ClientError::api_error(status.as_u16(), error_text),
    })
}

// =============================================================================
// Published Pipelines
// =============================================================================

/// REST endpoint of a published pipeline
#[derive(Debug, Clone)]
pub struct PipelineEndpoint {
    url: String,
    client: Client,
}

impl PipelineEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, Client::new())
    }

    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start a run of the pipeline in `experiment`; returns the new run's id
    pub async fn trigger(&self, experiment: &str, credential: &Credential) -> Result<String> {
        let body = TriggerPipeline {
            experiment_name: experiment.to_string(),
        };

        let response = self
            .client
            .post(&self.url)
            .headers(credential.header()?)
            .json(&body)
            .send()
            .await?;

        let response: TriggerResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("Failed to parse trigger response: {}", e)))?;

        info!("Triggered pipeline run {} in '{}'", response.id, experiment);
        Ok(response.id)
    }
}

// =============================================================================
// Scoring
// =============================================================================

/// Scoring endpoint of a deployed service
#[derive(Debug, Clone)]
pub struct ScoringEndpoint {
    scoring_uri: String,
    client: Client,
    credential: Option<Credential>,
}

impl ScoringEndpoint {
    pub fn new(scoring_uri: impl Into<String>) -> Self {
        Self {
            scoring_uri: scoring_uri.into(),
            client: Client::new(),
            credential: None,
        }
    }

    /// Send a key with every scoring request, for services that require one
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Score `rows`, one prediction per row
    ///
    /// Scoring scripts commonly return their JSON array as a JSON string;
    /// both forms are accepted.
    ///
    /// # Errors
    /// `Parse` when the response is not an array with one entry per row.
    pub async fn score<T: DeserializeOwned>(&self, rows: &[Vec<f64>]) -> Result<Vec<T>> {
        let body = ScoringRequest {
            data: rows.to_vec(),
        };

        let mut request = self.client.post(&self.scoring_uri).json(&body);
        if let Some(credential) = &self.credential {
            request = credential.apply(request);
        }

        debug!("Scoring {} row(s) at {}", rows.len(), self.scoring_uri);
        let response = check_status(request.send().await?).await?;
        let text = response.text().await?;

        let predictions: Vec<T> = parse_predictions(&text)?;
        if predictions.len() != rows.len() {
            return Err(ClientError::Parse(format!(
                "expected {} predictions, got {}",
                rows.len(),
                predictions.len()
            )));
        }
        Ok(predictions)
    }
}

/// Decode a JSON array, unwrapping one level of string encoding if present
fn parse_predictions<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let parse_err = |e: serde_json::Error| ClientError::Parse(format!("Invalid scoring response: {e}"));

    let value = match serde_json::from_str::<Value>(text).map_err(parse_err)? {
        Value::String(inner) => serde_json::from_str::<Value>(&inner).map_err(parse_err)?,
        value => value,
    };

    serde_json::from_value(value).map_err(parse_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn test_parse_plain_and_double_encoded_arrays() {
        let plain: Vec<String> = parse_predictions(r#"["diabetic", "not-diabetic"]"#).unwrap();
        let encoded: Vec<String> =
            parse_predictions(r#""[\"diabetic\", \"not-diabetic\"]""#).unwrap();

        assert_eq!(plain, encoded);
        assert!(parse_predictions::<String>(r#"{"result": 1}"#).is_err());
    }

    #[tokio::test]
    async fn test_trigger_posts_experiment_name_with_auth_header() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/pipelines/abc")
            .match_header("authorization", "Bearer key-1")
            .match_body(Matcher::Json(serde_json::json!({
                "ExperimentName": "mslearn-diabetes-pipeline"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Id": "run-42"}"#)
            .create_async()
            .await;

        let endpoint = PipelineEndpoint::new(format!("{}/pipelines/abc", server.url()));
        let run_id = endpoint
            .trigger("mslearn-diabetes-pipeline", &Credential::bearer("key-1"))
            .await
            .unwrap();

        assert_eq!(run_id, "run-42");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_trigger_rejected_credential() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/pipelines/abc")
            .with_status(401)
            .create_async()
            .await;

        let endpoint = PipelineEndpoint::new(format!("{}/pipelines/abc", server.url()));
        let err = endpoint
            .trigger("exp", &Credential::bearer("stale"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_score_sends_rows_and_decodes_labels() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/score")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({
                "data": [[2.0, 180.0, 74.0], [0.0, 148.0, 58.0]]
            })))
            .with_status(200)
            .with_body(r#""[\"diabetic\", \"not-diabetic\"]""#)
            .create_async()
            .await;

        let endpoint = ScoringEndpoint::new(format!("{}/score", server.url()));
        let labels: Vec<String> = endpoint
            .score(&[vec![2.0, 180.0, 74.0], vec![0.0, 148.0, 58.0]])
            .await
            .unwrap();

        assert_eq!(labels, vec!["diabetic", "not-diabetic"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_score_length_mismatch_is_parse_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/score")
            .with_status(200)
            .with_body("[1]")
            .create_async()
            .await;

        let endpoint = ScoringEndpoint::new(format!("{}/score", server.url()));
        let err = endpoint
            .score::<u8>(&[vec![1.0], vec![2.0]])
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Parse(_)));
    }
}
