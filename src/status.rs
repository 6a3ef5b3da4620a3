//! # Status Codes
//!
//! Outcome codes reported by the transport. Non-positive codes originate on the
//! client side, positive codes originate on a server node. Every code carries a
//! canonical status token (e.g. `AS_ERR_RECORD_NOT_FOUND`) and a descriptive
//! text used when formatting user-visible error messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every canonical status token.
pub const STATUS_TOKEN_PREFIX: &str = "AS_";

/// Integer outcome code of a single operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub i32);

impl StatusCode {
    // Client-side codes
    pub const TXN_ALREADY_ABORTED: StatusCode = StatusCode(-19);
    pub const TXN_ALREADY_COMMITTED: StatusCode = StatusCode(-18);
    pub const TXN_FAILED: StatusCode = StatusCode(-17);
    pub const BATCH_FAILED: StatusCode = StatusCode(-16);
    pub const NO_RESPONSE: StatusCode = StatusCode(-15);
    pub const MAX_ERROR_RATE: StatusCode = StatusCode(-12);
    pub const ASYNC_QUEUE_FULL: StatusCode = StatusCode(-11);
    pub const ERR_CONNECTION: StatusCode = StatusCode(-10);
    pub const ERR_TLS: StatusCode = StatusCode(-9);
    pub const ERR_INVALID_NODE: StatusCode = StatusCode(-8);
    pub const ERR_NO_MORE_CONNECTIONS: StatusCode = StatusCode(-7);
    pub const ERR_ASYNC_CONNECTION: StatusCode = StatusCode(-6);
    pub const ERR_CLIENT_ABORT: StatusCode = StatusCode(-5);
    pub const ERR_INVALID_HOST: StatusCode = StatusCode(-4);
    pub const NO_MORE_RECORDS: StatusCode = StatusCode(-3);
    pub const ERR_PARAM: StatusCode = StatusCode(-2);
    pub const ERR_CLIENT: StatusCode = StatusCode(-1);

    /// Success.
    pub const OK: StatusCode = StatusCode(0);

    // Server-side codes
    pub const ERR_SERVER: StatusCode = StatusCode(1);
    pub const ERR_RECORD_NOT_FOUND: StatusCode = StatusCode(2);
    pub const ERR_RECORD_GENERATION: StatusCode = StatusCode(3);
    pub const ERR_REQUEST_INVALID: StatusCode = StatusCode(4);
    pub const ERR_RECORD_EXISTS: StatusCode = StatusCode(5);
    pub const ERR_BIN_EXISTS: StatusCode = StatusCode(6);
    pub const ERR_CLUSTER_CHANGE: StatusCode = StatusCode(7);
    pub const ERR_SERVER_FULL: StatusCode = StatusCode(8);
    pub const ERR_TIMEOUT: StatusCode = StatusCode(9);
    pub const ERR_ALWAYS_FORBIDDEN: StatusCode = StatusCode(10);
    pub const ERR_CLUSTER: StatusCode = StatusCode(11);
    pub const ERR_BIN_INCOMPATIBLE_TYPE: StatusCode = StatusCode(12);
    pub const ERR_RECORD_TOO_BIG: StatusCode = StatusCode(13);
    pub const ERR_RECORD_BUSY: StatusCode = StatusCode(14);
    pub const ERR_SCAN_ABORTED: StatusCode = StatusCode(15);
    pub const ERR_UNSUPPORTED_FEATURE: StatusCode = StatusCode(16);
    pub const ERR_BIN_NOT_FOUND: StatusCode = StatusCode(17);
    pub const ERR_DEVICE_OVERLOAD: StatusCode = StatusCode(18);
    pub const ERR_RECORD_KEY_MISMATCH: StatusCode = StatusCode(19);
    pub const ERR_NAMESPACE_NOT_FOUND: StatusCode = StatusCode(20);
    pub const ERR_BIN_NAME: StatusCode = StatusCode(21);
    pub const ERR_FAIL_FORBIDDEN: StatusCode = StatusCode(22);
    pub const ERR_FAIL_ELEMENT_NOT_FOUND: StatusCode = StatusCode(23);
    pub const ERR_FAIL_ELEMENT_EXISTS: StatusCode = StatusCode(24);
    pub const ERR_FILTERED_OUT: StatusCode = StatusCode(27);
    pub const ERR_QUERY_END: StatusCode = StatusCode(50);
    pub const ERR_UDF: StatusCode = StatusCode(100);
    pub const MRT_BLOCKED: StatusCode = StatusCode(120);
    pub const MRT_VERSION_MISMATCH: StatusCode = StatusCode(121);
    pub const MRT_EXPIRED: StatusCode = StatusCode(122);
    pub const MRT_TOO_MANY_WRITES: StatusCode = StatusCode(123);
    pub const MRT_COMMITTED: StatusCode = StatusCode(124);
    pub const MRT_ABORTED: StatusCode = StatusCode(125);
    pub const ERR_BATCH_DISABLED: StatusCode = StatusCode(150);
    pub const ERR_BATCH_MAX_REQUESTS_EXCEEDED: StatusCode = StatusCode(151);
    pub const ERR_BATCH_QUEUES_FULL: StatusCode = StatusCode(152);
    pub const ERR_INDEX_FOUND: StatusCode = StatusCode(200);
    pub const ERR_INDEX_NOT_FOUND: StatusCode = StatusCode(201);
    pub const ERR_QUERY_ABORTED: StatusCode = StatusCode(210);

    /// True when the code signals success.
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// Server-origin codes are strictly positive.
    pub fn is_server_code(self) -> bool {
        self > Self::OK
    }

    /// Canonical status token, e.g. `AS_ERR_RECORD_NOT_FOUND`.
    pub fn token(self) -> Option<&'static str> {
        lookup(self).map(|entry| entry.1)
    }

    /// Canonical descriptive text for the code.
    pub fn description(self) -> &'static str {
        lookup(self)
            .map(|entry| entry.2)
            .unwrap_or("Unknown status code")
    }

    /// Resolve a canonical status token back to its code.
    pub fn from_token(token: &str) -> Option<StatusCode> {
        STATUS_TABLE
            .iter()
            .find(|(_, name, _)| *name == token)
            .map(|(code, _, _)| *code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token() {
            Some(token) => write!(f, "{token} ({})", self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        StatusCode(code)
    }
}

fn lookup(code: StatusCode) -> Option<&'static (StatusCode, &'static str, &'static str)> {
    STATUS_TABLE.iter().find(|(c, _, _)| *c == code)
}

static STATUS_TABLE: &[(StatusCode, &str, &str)] = &[
    (StatusCode::TXN_ALREADY_ABORTED, "AS_TXN_ALREADY_ABORTED", "Transaction commit called, but the transaction was already aborted."),
    (StatusCode::TXN_ALREADY_COMMITTED, "AS_TXN_ALREADY_COMMITTED", "Transaction abort called, but the transaction was already committed."),
    (StatusCode::TXN_FAILED, "AS_TXN_FAILED", "Transaction failed."),
    (StatusCode::BATCH_FAILED, "AS_BATCH_FAILED", "One or more keys failed in a batch."),
    (StatusCode::NO_RESPONSE, "AS_NO_RESPONSE", "No response received from server."),
    (StatusCode::MAX_ERROR_RATE, "AS_MAX_ERROR_RATE", "Max errors limit reached."),
    (StatusCode::ASYNC_QUEUE_FULL, "AS_ASYNC_QUEUE_FULL", "Async command delay queue is full."),
    (StatusCode::ERR_CONNECTION, "AS_ERR_CONNECTION", "Synchronous connection error."),
    (StatusCode::ERR_TLS, "AS_ERR_TLS_ERROR", "TLS related error."),
    (StatusCode::ERR_INVALID_NODE, "AS_ERR_INVALID_NODE", "Node invalid or could not be found."),
    (StatusCode::ERR_NO_MORE_CONNECTIONS, "AS_ERR_NO_MORE_CONNECTIONS", "Node has no more available connections."),
    (StatusCode::ERR_ASYNC_CONNECTION, "AS_ERR_ASYNC_CONNECTION", "Asynchronous connection error."),
    (StatusCode::ERR_CLIENT_ABORT, "AS_ERR_CLIENT_ABORT", "Query or scan was aborted in user's callback."),
    (StatusCode::ERR_INVALID_HOST, "AS_ERR_INVALID_HOST", "Host name could not be found in DNS lookup."),
    (StatusCode::NO_MORE_RECORDS, "AS_NO_MORE_RECORDS", "No more records available when parsing batch, scan or query records."),
    (StatusCode::ERR_PARAM, "AS_ERR_PARAM", "Invalid client API parameter."),
    (StatusCode::ERR_CLIENT, "AS_ERR_CLIENT", "Generic client API usage error."),
    (StatusCode::OK, "AS_OK", "Generic success."),
    (StatusCode::ERR_SERVER, "AS_ERR_SERVER", "Generic error returned by the server."),
    (StatusCode::ERR_RECORD_NOT_FOUND, "AS_ERR_RECORD_NOT_FOUND", "Record does not exist in database. May be returned by read, or write with policy Exists.UPDATE"),
    (StatusCode::ERR_RECORD_GENERATION, "AS_ERR_RECORD_GENERATION", "Generation of record in database does not satisfy write policy."),
    (StatusCode::ERR_REQUEST_INVALID, "AS_ERR_REQUEST_INVALID", "Request protocol invalid, or invalid protocol field."),
    (StatusCode::ERR_RECORD_EXISTS, "AS_ERR_RECORD_EXISTS", "Record already exists. May be returned by write with policy Exists.CREATE."),
    (StatusCode::ERR_BIN_EXISTS, "AS_ERR_BIN_EXISTS", "Bin already exists."),
    (StatusCode::ERR_CLUSTER_CHANGE, "AS_ERR_CLUSTER_CHANGE", "A cluster state change occurred during the request."),
    (StatusCode::ERR_SERVER_FULL, "AS_ERR_SERVER_FULL", "The server node is running out of memory and/or storage device space reserved for the specified namespace."),
    (StatusCode::ERR_TIMEOUT, "AS_ERR_TIMEOUT", "Request timed out. Can be triggered by client or server."),
    (StatusCode::ERR_ALWAYS_FORBIDDEN, "AS_ERR_ALWAYS_FORBIDDEN", "Operation not allowed in current configuration."),
    (StatusCode::ERR_CLUSTER, "AS_ERR_CLUSTER", "Generic cluster discovery and connection error."),
    (StatusCode::ERR_BIN_INCOMPATIBLE_TYPE, "AS_ERR_BIN_INCOMPATIBLE_TYPE", "Bin modification operation can't be done on an existing bin due to its value type."),
    (StatusCode::ERR_RECORD_TOO_BIG, "AS_ERR_RECORD_TOO_BIG", "Record being (re-)written can't fit in a storage write block."),
    (StatusCode::ERR_RECORD_BUSY, "AS_ERR_RECORD_BUSY", "Too many concurrent requests for one record - a \"hot-key\" situation."),
    (StatusCode::ERR_SCAN_ABORTED, "AS_ERR_SCAN_ABORTED", "Scan aborted by user."),
    (StatusCode::ERR_UNSUPPORTED_FEATURE, "AS_ERR_UNSUPPORTED_FEATURE", "Sometimes our doc, or our customers wishes, get ahead of us. We may have processed something that the server is not ready for (unsupported feature)."),
    (StatusCode::ERR_BIN_NOT_FOUND, "AS_ERR_BIN_NOT_FOUND", "Bin-level replace-only supported on server but not on client."),
    (StatusCode::ERR_DEVICE_OVERLOAD, "AS_ERR_DEVICE_OVERLOAD", "The server node's storage device(s) can't keep up with the write load."),
    (StatusCode::ERR_RECORD_KEY_MISMATCH, "AS_ERR_RECORD_KEY_MISMATCH", "Record key sent with command did not match key stored on server."),
    (StatusCode::ERR_NAMESPACE_NOT_FOUND, "AS_ERR_NAMESPACE_NOT_FOUND", "Namespace in request not found on server."),
    (StatusCode::ERR_BIN_NAME, "AS_ERR_BIN_NAME", "Sent too-long bin name or exceeded namespace's bin name quota."),
    (StatusCode::ERR_FAIL_FORBIDDEN, "AS_ERR_FAIL_FORBIDDEN", "Operation not allowed at this time."),
    (StatusCode::ERR_FAIL_ELEMENT_NOT_FOUND, "AS_ERR_FAIL_ELEMENT_NOT_FOUND", "Map element not found in UPDATE_ONLY write mode."),
    (StatusCode::ERR_FAIL_ELEMENT_EXISTS, "AS_ERR_FAIL_ELEMENT_EXISTS", "Map element exists in CREATE_ONLY write mode."),
    (StatusCode::ERR_FILTERED_OUT, "AS_ERR_FILTERED_OUT", "Write command loses conflict to XDR or the record was filtered out by an expression."),
    (StatusCode::ERR_QUERY_END, "AS_ERR_QUERY_END", "There are no more records left for query."),
    (StatusCode::ERR_UDF, "AS_ERR_UDF", "Generic UDF error."),
    (StatusCode::MRT_BLOCKED, "AS_MRT_BLOCKED", "Transaction record blocked by a different transaction."),
    (StatusCode::MRT_VERSION_MISMATCH, "AS_MRT_VERSION_MISMATCH", "Transaction read version mismatch identified during commit."),
    (StatusCode::MRT_EXPIRED, "AS_MRT_EXPIRED", "Transaction deadline reached without a successful commit or abort."),
    (StatusCode::MRT_TOO_MANY_WRITES, "AS_MRT_TOO_MANY_WRITES", "Transaction write command limit (4096) exceeded."),
    (StatusCode::MRT_COMMITTED, "AS_MRT_COMMITTED", "Transaction was already committed."),
    (StatusCode::MRT_ABORTED, "AS_MRT_ABORTED", "Transaction was already aborted."),
    (StatusCode::ERR_BATCH_DISABLED, "AS_ERR_BATCH_DISABLED", "Batch functionality has been disabled."),
    (StatusCode::ERR_BATCH_MAX_REQUESTS_EXCEEDED, "AS_ERR_BATCH_MAX_REQUESTS_EXCEEDED", "Batch max requests have been exceeded."),
    (StatusCode::ERR_BATCH_QUEUES_FULL, "AS_ERR_BATCH_QUEUES_FULL", "All batch queues are full."),
    (StatusCode::ERR_INDEX_FOUND, "AS_ERR_INDEX_FOUND", "Secondary index already exists."),
    (StatusCode::ERR_INDEX_NOT_FOUND, "AS_ERR_INDEX_NOT_FOUND", "Requested secondary index does not exist."),
    (StatusCode::ERR_QUERY_ABORTED, "AS_ERR_QUERY_ABORTED", "Query was aborted."),
];
