//! JSON-RPC-backed [`BlockchainAdapter`], speaking the standard
//! `getblockcount` / `getblock` / `getrawtransaction` surface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapter::{BlockchainAdapter, IndexRange, RawTransaction};
use crate::error::{ChainError, Result};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

pub struct JsonRpcAdapter {
    url: String,
    client: reqwest::Client,
    first_block: u64,
}

impl JsonRpcAdapter {
    pub fn new(url: impl Into<String>, first_block: u64) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            first_block,
        }
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let req = JsonRpcRequest { jsonrpc: "2.0", method, params, id: 1 };
        let resp: JsonRpcResponse = self
            .client
            .post(&self.url)
            .json(&req)
            .send()
            .await?
            .json()
            .await?;
        if let Some(err) = resp.error {
            return Err(ChainError::Rpc(format!("{}: {}", err.code, err.message)));
        }
        resp.result.ok_or_else(|| ChainError::BadResponse("missing result".into()))
    }
}

#[async_trait]
impl BlockchainAdapter for JsonRpcAdapter {
    async fn index_range(&self) -> Result<IndexRange> {
        match self.call("getblockcount", vec![]).await {
            Ok(v) => {
                let last = v
                    .as_u64()
                    .ok_or_else(|| ChainError::BadResponse("getblockcount not a u64".into()))?;
                Ok(IndexRange { first: self.first_block, last: Some(last) })
            }
            Err(_) => Ok(IndexRange { first: self.first_block, last: None }),
        }
    }

    async fn block_transactions(&self, height: u64) -> Result<Vec<RawTransaction>> {
        let hash = self.call("getblockhash", vec![json!(height)]).await?;
        let block = self.call("getblock", vec![hash, json!(2)]).await?;
        let txs = block
            .get("tx")
            .and_then(Value::as_array)
            .ok_or_else(|| ChainError::BadResponse("block missing tx array".into()))?;

        let mut out = Vec::with_capacity(txs.len());
        for tx in txs {
            let txid = tx
                .get("txid")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let sender_address = tx
                .get("vin")
                .and_then(Value::as_array)
                .and_then(|v| v.first())
                .and_then(|v| v.get("address"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let nulldata = tx
                .get("vout")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .find_map(|out| out.get("scriptPubKey")?.get("nulldata")?.as_str())
                .map(str::to_string);
            out.push(RawTransaction { txid, block_height: height, sender_address, nulldata });
        }
        Ok(out)
    }
}
