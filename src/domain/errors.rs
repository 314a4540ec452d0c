use thiserror::Error;

/// Failure reported by a market-data source for a single fetch.
///
/// The assembler retries `Transient` failures and gives up immediately on
/// `Terminal` ones.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Transient fetch failure: {reason}")]
    Transient { reason: String },

    #[error("Terminal fetch failure: {reason}")]
    Terminal { reason: String },
}

impl FetchError {
    pub fn transient(reason: impl Into<String>) -> Self {
        FetchError::Transient {
            reason: reason.into(),
        }
    }

    pub fn terminal(reason: impl Into<String>) -> Self {
        FetchError::Terminal {
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Errors raised while assembling a market window
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("Market data for {symbol} unavailable after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        symbol: String,
        attempts: u32,
        last_error: FetchError,
    },

    #[error("Market data request for {symbol} rejected: {source}")]
    Terminal {
        symbol: String,
        #[source]
        source: FetchError,
    },

    #[error("No market data returned for {symbol} in [{start_ms}, {end_ms})")]
    EmptyWindow {
        symbol: String,
        start_ms: i64,
        end_ms: i64,
    },
}

/// Errors related to the durable CMW ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to read ledger: {reason}")]
    Read { reason: String },

    #[error("Ledger blob is corrupt: {reason}")]
    Corrupt { reason: String },

    #[error("Failed to persist ledger: {reason}")]
    Write { reason: String },
}

/// Errors from the miner RPC transport. The dispatcher treats all of them as
/// "no response".
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Miner {hotkey} unreachable: {reason}")]
    Unreachable { hotkey: String, reason: String },

    #[error("Miner {hotkey} timed out after {timeout_ms}ms")]
    Timeout { hotkey: String, timeout_ms: u64 },

    #[error("Miner {hotkey} returned an undecodable payload: {reason}")]
    Decode { hotkey: String, reason: String },
}
