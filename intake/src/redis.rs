use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::time::timeout;

// Dedup lookups sit on the hot path, so cap how long we wait for the store
const REDIS_TIMEOUT_MILLISECS: u64 = 500;

/// The narrow slice of redis the dedup store needs.
#[async_trait]
pub trait Client: Send + Sync {
    async fn get(&self, k: String) -> Result<Option<String>>;
    async fn setex(&self, k: String, v: String, ttl: Duration) -> Result<()>;
}

pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub fn new(addr: String) -> Result<RedisClient> {
        let client = redis::Client::open(addr)?;

        Ok(RedisClient { client })
    }
}

#[async_trait]
impl Client for RedisClient {
    async fn get(&self, k: String) -> Result<Option<String>> {
        let mut conn = self.client.get_async_connection().await?;

        let results = conn.get(k);
        let fut = timeout(Duration::from_millis(REDIS_TIMEOUT_MILLISECS), results).await?;

        Ok(fut?)
    }

    async fn setex(&self, k: String, v: String, ttl: Duration) -> Result<()> {
        let mut conn = self.client.get_async_connection().await?;

        let results = conn.set_ex(k, v, ttl.as_secs() as usize);
        let fut = timeout(Duration::from_millis(REDIS_TIMEOUT_MILLISECS), results).await?;

        Ok(fut?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRedisCall {
    Get { key: String },
    Setex { key: String, value: String, ttl_secs: u64 },
}

#[derive(Clone, Default)]
pub struct MockRedisClient {
    get_ret: HashMap<String, String>,
    get_fails: bool,
    setex_fails: bool,
    calls: Arc<Mutex<Vec<MockRedisCall>>>,
}

impl MockRedisClient {
    pub fn new() -> MockRedisClient {
        Default::default()
    }

    pub fn get_ret(&mut self, key: &str, ret: &str) -> Self {
        self.get_ret.insert(key.to_owned(), ret.to_owned());
        self.clone()
    }

    pub fn clear_key(&mut self, key: &str) -> Self {
        self.get_ret.remove(key);
        self.clone()
    }

    pub fn fail_get(&mut self) -> Self {
        self.get_fails = true;
        self.clone()
    }

    pub fn fail_setex(&mut self) -> Self {
        self.setex_fails = true;
        self.clone()
    }

    pub fn get_calls(&self) -> Vec<MockRedisCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, call: MockRedisCall) {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn get(&self, k: String) -> Result<Option<String>> {
        self.record(MockRedisCall::Get { key: k.clone() });
        if self.get_fails {
            anyhow::bail!("connection refused");
        }
        Ok(self.get_ret.get(&k).cloned())
    }

    async fn setex(&self, k: String, v: String, ttl: Duration) -> Result<()> {
        self.record(MockRedisCall::Setex {
            key: k,
            value: v,
            ttl_secs: ttl.as_secs(),
        });
        if self.setex_fails {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}
