//! Electrum protocol operations over a Stratum socket.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use super::stratum::{StratumError, StratumSocket};

const GET_BALANCE: &str = "blockchain.address.get_balance";
const SUBSCRIBE_ADDRESS: &str = "blockchain.address.subscribe";
const SUBSCRIBE_NUMBLOCKS: &str = "blockchain.numblocks.subscribe";

#[derive(Debug, Clone, Deserialize)]
struct BalanceDto {
    confirmed: i64,
    unconfirmed: i64,
}

/// Address balance in satoshis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    pub address: String,
    pub confirmed: i64,
    pub unconfirmed: i64,
    unused: bool,
}

impl Balance {
    fn unused(address: &str) -> Self {
        Self {
            address: address.to_string(),
            confirmed: 0,
            unconfirmed: 0,
            unused: true,
        }
    }

    /// Whether the server has never seen the address.
    pub fn is_unused(&self) -> bool {
        self.unused
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unused {
            write!(f, "Balance of {} 0 (Unused)", self.address)
        } else if self.unconfirmed == 0 {
            write!(f, "Balance of {} {} confirmed", self.address, self.confirmed)
        } else {
            write!(
                f,
                "Balance of {} {} confirmed + {} unconfirmed",
                self.address, self.confirmed, self.unconfirmed
            )
        }
    }
}

/// Electrum server client.
pub struct Electrum {
    socket: StratumSocket,
}

impl Electrum {
    pub fn new(socket: StratumSocket) -> Self {
        Self { socket }
    }

    /// Point-in-time balance of an address.
    pub async fn balance_now_of(&self, address: &str) -> Result<Balance, StratumError> {
        let result = self
            .socket
            .call(GET_BALANCE, &[Value::from(address)])
            .await?;
        let dto: BalanceDto = serde_json::from_value(result)?;
        debug!(
            "Balance of {}: {} confirmed, {} unconfirmed",
            address, dto.confirmed, dto.unconfirmed
        );
        Ok(Balance {
            address: address.to_string(),
            confirmed: dto.confirmed,
            unconfirmed: dto.unconfirmed,
            unused: false,
        })
    }

    /// Subscribe to an address and resolve its current balance. A `null`
    /// status from the server means the address has never been used.
    pub async fn subscribe_balance(&self, address: &str) -> Result<Balance, StratumError> {
        let status = self
            .socket
            .call(SUBSCRIBE_ADDRESS, &[Value::from(address)])
            .await?;
        if status.is_null() {
            return Ok(Balance::unused(address));
        }
        self.balance_now_of(address).await
    }

    /// Wait until the server pushes a change affecting an address, then
    /// re-query with `balance_now_of`. Requires a prior `subscribe_balance`.
    pub async fn balance_changed(&self, address: &str) -> Result<(), StratumError> {
        let mut notifications = self.socket.notifications();
        loop {
            match notifications.recv().await {
                Ok(n) if n.method == SUBSCRIBE_ADDRESS && mentions(&n.params, address) => {
                    return Ok(());
                }
                Ok(_) => {}
                // Missed messages may have included our address; let the
                // caller re-query
                Err(RecvError::Lagged(_)) => return Ok(()),
                Err(RecvError::Closed) => return Err(StratumError::Closed),
            }
        }
    }

    /// Current block height. The server keeps pushing subsequent heights;
    /// see `next_block_height`.
    pub async fn block_height(&self) -> Result<u64, StratumError> {
        let result = self.socket.call(SUBSCRIBE_NUMBLOCKS, &[]).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Wait for the next pushed block height.
    pub async fn next_block_height(&self) -> Result<u64, StratumError> {
        let mut notifications = self.socket.notifications();
        loop {
            match notifications.recv().await {
                Ok(n) if n.method == SUBSCRIBE_NUMBLOCKS => {
                    // The height travels as a one-element params list
                    if let Some(height) = n.params.get(0).and_then(Value::as_u64) {
                        return Ok(height);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Err(StratumError::Closed),
            }
        }
    }
}

fn mentions(params: &Value, address: &str) -> bool {
    match params {
        Value::Array(items) => items.iter().any(|item| item.as_str() == Some(address)),
        other => other.as_str() == Some(address),
    }
}
