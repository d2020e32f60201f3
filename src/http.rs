use std::time::Duration;

use thiserror::Error;

const ERROR_BODY_LIMIT: usize = 240;

#[derive(Debug, Error)]
pub(crate) enum HttpError {
    #[error("HTTP status {status}{}", body_suffix(.body))]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response decode failed: {0}")]
    Decode(String),
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(" ({body})")
    }
}

/// Thin blocking JSON client. Each request is issued once; there is no retry.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpClient {
    pub(crate) fn new(base_url: &str, connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn get_json<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, HttpError>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.get_text(path, query)?;
        serde_json::from_str(&body).map_err(|err| HttpError::Decode(err.to_string()))
    }

    pub(crate) fn get_text(&self, path: &str, query: &[(&str, &str)]) -> Result<String, HttpError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.agent.get(&url);
        for (key, value) in query {
            request = request.query(key, value);
        }

        match request.call() {
            Ok(response) => response
                .into_string()
                .map_err(|err| HttpError::Decode(err.to_string())),
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                let body = response_body
                    .trim()
                    .chars()
                    .take(ERROR_BODY_LIMIT)
                    .collect::<String>();
                Err(HttpError::Status { status, body })
            }
            Err(ureq::Error::Transport(err)) => Err(HttpError::Transport(err.to_string())),
        }
    }
}
