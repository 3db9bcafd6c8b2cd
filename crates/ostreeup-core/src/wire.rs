//! JSON request/response bodies shared by the client and the server, so
//! the two sides can never disagree about field names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{repo_mode::RepoMode, revision::RevisionPair, ObjectName, Revision};

/// `GET /api/v1/info` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfoResponse {
    pub mode: RepoMode,
    pub revs: BTreeMap<String, Revision>,
}

/// `POST /api/v1/queue` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueCreateRequest {
    pub refs: BTreeMap<String, RevisionPair>,
    pub objects: Vec<ObjectName>,
}

/// `POST /api/v1/queue` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueCreateResponse {
    pub id: String,
}

/// `GET /api/v1/queue/{id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueObjectsResponse {
    pub objects: Vec<ObjectName>,
}

/// Body of a JSON error response. Every non-2xx response from the Wire
/// Layer uses this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorResponse {
    pub error: String,
}
