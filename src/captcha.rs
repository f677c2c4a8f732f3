//! anti-captcha.com client used to solve the Free Learning ReCAPTCHA.
//!
//! Protocol: createTask submits the challenge, getTaskResult is polled once
//! per second until the task is ready or the 120 second timeout elapses.
//! Every provider response may carry a non-zero `errorId`; those fail the
//! solve with the provider's own code and description.

use std::time::{Duration, Instant};

use log::info;
use serde_json::{json, Value};
use thiserror::Error;

use crate::api::{ApiError, ApiRequest, Transport};

const CREATE_TASK_URL: &str = "https://api.anti-captcha.com/createTask";
const GET_TASK_RESULT_URL: &str = "https://api.anti-captcha.com/getTaskResult";
const TASK_TYPE: &str = "NoCaptchaTaskProxyless";

/// During busy periods the provider may need about two minutes to solve a
/// ReCAPTCHA.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

/// Error raised while solving a captcha.
#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("Captcha provider error {code}: {description}")]
    Provider { code: String, description: String },

    #[error("Captcha was not solved within {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Outcome of one getTaskResult poll.
#[derive(Debug)]
enum PollOutcome {
    Ready(String),
    Pending,
}

/// Fail on a non-zero `errorId` in a provider response.
fn check_provider_error(value: &Value) -> Result<(), CaptchaError> {
    let error_id = value.get("errorId").and_then(Value::as_i64).unwrap_or(0);
    if error_id != 0 {
        return Err(CaptchaError::Provider {
            code: value
                .get("errorCode")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            description: value
                .get("errorDescription")
                .and_then(Value::as_str)
                .unwrap_or("no description")
                .to_string(),
        });
    }
    Ok(())
}

/// Classify a getTaskResult body: provider error, still processing, or ready
/// with the solution token.
fn evaluate_poll(value: &Value) -> Result<PollOutcome, CaptchaError> {
    check_provider_error(value)?;
    if value.get("status").and_then(Value::as_str) != Some("ready") {
        return Ok(PollOutcome::Pending);
    }
    let solution = value
        .get("solution")
        .and_then(|s| s.get("gRecaptchaResponse"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ApiError::shape(
                GET_TASK_RESULT_URL,
                "ready task result is missing solution.gRecaptchaResponse",
            )
        })?;
    Ok(PollOutcome::Ready(solution.to_string()))
}

/// anti-captcha.com client. Holds the provider credential and the polling
/// bounds.
pub struct CaptchaSolver<T: Transport> {
    transport: T,
    client_key: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl<T: Transport> CaptchaSolver<T> {
    pub fn new(transport: T, client_key: impl Into<String>) -> Self {
        CaptchaSolver {
            transport,
            client_key: client_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    /// Override the poll interval and timeout (tests shrink both).
    pub fn with_timing(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Test hook: inspect the transport's recorded requests.
    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Solve the ReCAPTCHA at `site_url` identified by `site_key`, returning
    /// the solution token.
    pub fn solve(&self, site_url: &str, site_key: &str) -> Result<String, CaptchaError> {
        let task_id = self.create_task(site_url, site_key)?;
        info!("Waiting for completion of captcha task {}...", task_id);
        let started = Instant::now();
        loop {
            let body = self.post(
                GET_TASK_RESULT_URL,
                json!({"clientKey": self.client_key, "taskId": task_id}),
            )?;
            match evaluate_poll(&body)? {
                PollOutcome::Ready(solution) => {
                    info!("Solution found for captcha task {}.", task_id);
                    return Ok(solution);
                }
                PollOutcome::Pending => {
                    if started.elapsed() >= self.timeout {
                        return Err(CaptchaError::Timeout {
                            seconds: self.timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(self.poll_interval);
                }
            }
        }
    }

    fn create_task(&self, site_url: &str, site_key: &str) -> Result<u64, CaptchaError> {
        let body = self.post(
            CREATE_TASK_URL,
            json!({
                "clientKey": self.client_key,
                "task": {
                    "type": TASK_TYPE,
                    "websiteURL": site_url,
                    "websiteKey": site_key,
                }
            }),
        )?;
        body.get("taskId")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                CaptchaError::Api(ApiError::shape(
                    CREATE_TASK_URL,
                    "createTask response is missing taskId",
                ))
            })
    }

    /// POST a JSON body and decode the response, after checking HTTP status
    /// and the provider error envelope.
    fn post(&self, url: &str, body: Value) -> Result<Value, CaptchaError> {
        let response = self.transport.execute(&ApiRequest::post(url).json(body))?;
        if !response.is_success() {
            return Err(CaptchaError::Api(ApiError::HttpStatus {
                status: response.status(),
                url: url.to_string(),
                context: Some("captcha provider".to_string()),
            }));
        }
        let value: Value = response.json()?;
        check_provider_error(&value)?;
        Ok(value)
    }
}
