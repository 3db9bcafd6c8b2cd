//! Thin HTTP transport over the Wire Layer's endpoints, built on a
//! single configured `ureq::Agent`: manual byte-level bodies (JSON
//! encoded by hand rather than trusting a convenience helper), status
//! checked manually since `http_status_as_error` is disabled.

use std::{io::Read, path::Path, time::Duration};

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use ostreeup_core::wire;
use url::Url;

use crate::{error::ClientErr, multipart};

/// 60 minutes, per spec: large closures can take a long time to
/// upload, and the server's per-request timeout is exempted on the
/// upload route specifically so this is the effective bound.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60 * 60);

const MAX_RESPONSE_BYTES: u64 = 10 * 1024 * 1024;

pub struct PushClient {
    agent: ureq::Agent,
    base: Url,
    token: String,
}

impl PushClient {
    pub fn new(address: &str, token: impl Into<String>) -> Result<Self, ClientErr> {
        let base = Url::parse(address)?;
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(Duration::from_secs(60)))
            .timeout_recv_response(Some(REQUEST_TIMEOUT))
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .new_agent();
        Ok(Self { agent, base, token: token.into() })
    }

    fn url(&self, path: &str) -> String {
        let mut url = self.base.clone();
        url.set_path(path);
        url.to_string()
    }

    pub fn info(&self) -> Result<wire::InfoResponse, ClientErr> {
        self.get_json("/api/v1/info")
    }

    pub fn queue_create(
        &self,
        request: &wire::QueueCreateRequest,
    ) -> Result<wire::QueueCreateResponse, ClientErr> {
        static PATH: &str = "/api/v1/queue";
        let body = serde_json::to_vec(request)
            .map_err(|source| ClientErr::Decode { path: PATH, source: to_io_err(source) })?;

        let response = self
            .agent
            .post(self.url(PATH))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(CONTENT_TYPE, "application/json")
            .send(&body)
            .map_err(|err| ClientErr::Transport { path: PATH, source: Box::new(err) })?;

        let (status, body) = read_response(response, PATH)?;
        check_status(PATH, status, &body)?;
        serde_json::from_slice(&body)
            .map_err(|source| ClientErr::Decode { path: PATH, source: to_io_err(source) })
    }

    pub fn queue_missing(&self, id: &str) -> Result<wire::QueueObjectsResponse, ClientErr> {
        static PATH: &str = "/api/v1/queue/{id}";
        let url = self.url(&format!("/api/v1/queue/{id}"));
        let response = self
            .agent
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .call()
            .map_err(|err| ClientErr::Transport { path: PATH, source: Box::new(err) })?;

        let (status, body) = read_response(response, PATH)?;
        check_status(PATH, status, &body)?;
        serde_json::from_slice(&body)
            .map_err(|source| ClientErr::Decode { path: PATH, source: to_io_err(source) })
    }

    pub fn upload(
        &self,
        id: &str,
        object_name: &str,
        object_path: &Path,
        checksum_hex: &str,
    ) -> Result<(), ClientErr> {
        static PATH: &str = "/api/v1/queue/{id}";
        let (body, content_type) =
            multipart::build_upload_body(object_name, object_path, checksum_hex)?;
        let url = self.url(&format!("/api/v1/queue/{id}"));

        let response = self
            .agent
            .put(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(CONTENT_TYPE, content_type)
            .send(&body)
            .map_err(|err| ClientErr::Transport { path: PATH, source: Box::new(err) })?;

        let (status, body) = read_response(response, PATH)?;
        check_status(PATH, status, &body)
    }

    pub fn done(&self, id: &str) -> Result<(), ClientErr> {
        static PATH: &str = "/api/v1/done/{id}";
        let url = self.url(&format!("/api/v1/done/{id}"));
        let response = self
            .agent
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .call()
            .map_err(|err| ClientErr::Transport { path: PATH, source: Box::new(err) })?;

        let (status, body) = read_response(response, PATH)?;
        check_status(PATH, status, &body)
    }

    pub fn delete(&self, id: &str) -> Result<(), ClientErr> {
        static PATH: &str = "/api/v1/queue/{id}";
        let url = self.url(&format!("/api/v1/queue/{id}"));
        let response = self
            .agent
            .delete(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .call()
            .map_err(|err| ClientErr::Transport { path: PATH, source: Box::new(err) })?;

        let (status, body) = read_response(response, PATH)?;
        check_status(PATH, status, &body)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &'static str) -> Result<T, ClientErr> {
        let response = self
            .agent
            .get(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .call()
            .map_err(|err| ClientErr::Transport { path, source: Box::new(err) })?;

        let (status, body) = read_response(response, path)?;
        check_status(path, status, &body)?;
        serde_json::from_slice(&body)
            .map_err(|source| ClientErr::Decode { path, source: to_io_err(source) })
    }
}

fn read_response(
    response: http::Response<ureq::Body>,
    path: &'static str,
) -> Result<(u16, Vec<u8>), ClientErr> {
    let status = response.status().as_u16();
    let mut body = Vec::new();
    response
        .into_body()
        .into_with_config()
        .limit(MAX_RESPONSE_BYTES)
        .reader()
        .read_to_end(&mut body)
        .map_err(|source| ClientErr::Decode { path, source })?;
    Ok((status, body))
}

fn check_status(path: &'static str, status: u16, body: &[u8]) -> Result<(), ClientErr> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    let message = serde_json::from_slice::<wire::ErrorResponse>(body)
        .map(|err| err.error)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned());
    Err(ClientErr::Server { path, status, message })
}

fn to_io_err(err: serde_json::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, err)
}
