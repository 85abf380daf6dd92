use thiserror::Error;

/// Errors raised by a network connection
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    /// Transport-level errors (connect, TLS, body read)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Error object returned by the node
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code})")]
    RpcResponse {
        endpoint: String,
        code: i64,
        message: String,
    },

    /// Non-2xx HTTP status
    #[error("HTTP {status} from {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    /// Response could not be decoded
    #[error("Failed to decode {method} response: {message}")]
    Decode { method: String, message: String },

    /// Node reported a transaction that does not exist
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
}

impl RpcError {
    pub fn decode(method: &str, message: impl Into<String>) -> Self {
        RpcError::Decode {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed: transport failures,
    /// 5xx and 429
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Transport { .. } => true,
            RpcError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            RpcError::Transport { endpoint, .. } => Some(endpoint),
            RpcError::RpcResponse { endpoint, .. } => Some(endpoint),
            RpcError::HttpStatus { endpoint, .. } => Some(endpoint),
            RpcError::Decode { .. } | RpcError::TransactionNotFound(_) => None,
        }
    }
}

/// Result type for connection operations
pub type RpcResult<T> = Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display() {
        let err = RpcError::RpcResponse {
            endpoint: "http://node".to_string(),
            code: -32000,
            message: "nonce too low".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "RPC response error: nonce too low (endpoint: http://node, code: -32000)"
        );
        assert_eq!(err.endpoint(), Some("http://node"));

        let err = RpcError::decode("eth_getBalance", "not hex");
        assert_eq!(err.to_string(), "Failed to decode eth_getBalance response: not hex");
        assert_eq!(err.endpoint(), None);
    }

    #[test]
    fn test_transient_errors() {
        let transport = RpcError::Transport {
            endpoint: "http://node".to_string(),
            message: "connection reset".to_string(),
        };
        let status = |status| RpcError::HttpStatus {
            endpoint: "http://node".to_string(),
            status,
        };
        assert!(transport.is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!RpcError::decode("eth_getTransactionReceipt", "bad").is_transient());
        assert!(!RpcError::RpcResponse {
            endpoint: "http://node".to_string(),
            code: -32000,
            message: "execution reverted".to_string(),
        }
        .is_transient());
    }
}
