use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::consensus::{NodeId, Vote};

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("peer {peer} unreachable: {source}")]
    Unreachable {
        peer: NodeId,
        #[source]
        source: reqwest::Error,
    },

    #[error("peer {peer} rejected vote with status {status}")]
    Rejected { peer: NodeId, status: u16 },
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

impl BroadcastReport {
    pub fn record<E>(&mut self, result: &Result<(), E>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Sends a vote to every participant except `from`.
///
/// Best-effort: no ordering, no acknowledgement, no retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, from: NodeId, total_nodes: usize, vote: Vote) -> BroadcastReport;
}

/// Delivers votes over `POST /message` to `host:base_port + peer`.
pub struct HttpBroadcaster {
    client: Client,
    host: String,
    base_port: u16,
}

impl HttpBroadcaster {
    pub fn new(host: impl Into<String>, base_port: u16, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build broadcast HTTP client")?;

        Ok(Self {
            client,
            host: host.into(),
            base_port,
        })
    }

    pub fn peer_url(&self, peer: NodeId, route: &str) -> String {
        format!(
            "http://{}:{}{}",
            self.host,
            self.base_port as usize + peer,
            route
        )
    }

    async fn send_to(&self, peer: NodeId, vote: &Vote) -> Result<(), BroadcastError> {
        let response = self
            .client
            .post(self.peer_url(peer, "/message"))
            .json(vote)
            .send()
            .await
            .map_err(|source| BroadcastError::Unreachable { peer, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BroadcastError::Rejected {
                peer,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Broadcaster for HttpBroadcaster {
    async fn broadcast(&self, from: NodeId, total_nodes: usize, vote: Vote) -> BroadcastReport {
        let sends = (0..total_nodes)
            .filter(|peer| *peer != from)
            .map(|peer| self.send_to(peer, &vote));

        let mut report = BroadcastReport::default();
        for result in join_all(sends).await {
            if let Err(e) = &result {
                tracing::debug!(node = from, step = vote.step, "vote not delivered: {}", e);
            }
            report.record(&result);
        }
        report
    }
}
