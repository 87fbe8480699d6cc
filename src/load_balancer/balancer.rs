//! Per-service load balancer.
//!
//! # Responsibilities
//! - Refresh the cached endpoint pool from the discoverer on a timer
//! - Serve "next endpoint" decisions without ever blocking on I/O
//!
//! # Design Decisions
//! - One background task per balancer; requests are answered through a
//!   channel so a routing decision is always computed against the pool
//!   that is current at the moment the request is served
//! - A failed refresh keeps the previous pool and logs a warning
//! - The pool mutex is held only to swap the slice or run the router

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::discover::{DiscoverError, ServiceDiscoverer};
use crate::load_balancer::{Endpoint, RequestRouter};

#[derive(Debug, Error)]
pub enum BalancerError {
    #[error("load balancer for '{0}' is stopped")]
    Stopped(String),
}

/// Hands out backend endpoints for one named service.
///
/// Constructed by [`LoadBalancer::start`], which performs the initial
/// discovery inline and refuses to produce a balancer whose pool would
/// be empty.
pub struct LoadBalancer {
    service: String,
    requests: mpsc::Sender<oneshot::Sender<Endpoint>>,
    quit: mpsc::Sender<oneshot::Sender<()>>,
    pool: Arc<Mutex<Vec<Endpoint>>>,
}

impl LoadBalancer {
    /// Run the initial discovery and spawn the refresh task.
    ///
    /// Fails if the first discovery fails; no balancer is produced in
    /// that case, so every live balancer has a pool of at least one
    /// endpoint.
    pub async fn start(
        service: impl Into<String>,
        discoverer: Box<dyn ServiceDiscoverer>,
        router: Box<dyn RequestRouter>,
        fetch_interval: Duration,
    ) -> Result<Self, DiscoverError> {
        let service = service.into();
        let initial = discoverer.discover().await?;
        tracing::info!(service = %service, endpoints = initial.len(), "load balancer started");

        let pool = Arc::new(Mutex::new(initial));
        let (requests_tx, requests_rx) = mpsc::channel(1);
        let (quit_tx, quit_rx) = mpsc::channel(1);

        let task = RefreshTask {
            service: service.clone(),
            discoverer,
            router,
            pool: pool.clone(),
            requests: requests_rx,
            quit: quit_rx,
            fetch_interval,
        };
        tokio::spawn(task.run());

        Ok(Self {
            service,
            requests: requests_tx,
            quit: quit_tx,
            pool,
        })
    }

    /// Receive the next endpoint decision from the refresh task.
    ///
    /// Never blocks on discovery; the answer always comes from the most
    /// recently successful cache.
    pub async fn next(&self) -> Result<Endpoint, BalancerError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(tx)
            .await
            .map_err(|_| BalancerError::Stopped(self.service.clone()))?;
        rx.await
            .map_err(|_| BalancerError::Stopped(self.service.clone()))
    }

    /// Current pool size, for the admin surface.
    pub fn pool_size(&self) -> usize {
        self.pool.lock().expect("endpoint pool lock poisoned").len()
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Signal the refresh task to exit and wait for its acknowledgement.
    pub async fn stop(&self) {
        let (tx, rx) = oneshot::channel();
        if self.quit.send(tx).await.is_ok() {
            let _ = rx.await;
        }
    }
}

struct RefreshTask {
    service: String,
    discoverer: Box<dyn ServiceDiscoverer>,
    router: Box<dyn RequestRouter>,
    pool: Arc<Mutex<Vec<Endpoint>>>,
    requests: mpsc::Receiver<oneshot::Sender<Endpoint>>,
    quit: mpsc::Receiver<oneshot::Sender<()>>,
    fetch_interval: Duration,
}

impl RefreshTask {
    async fn run(mut self) {
        let mut tick = tokio::time::interval(self.fetch_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first interval tick fires immediately; the initial fetch
        // already happened in start()
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => self.refresh().await,
                request = self.requests.recv() => match request {
                    Some(reply) => {
                        let _ = reply.send(self.next_endpoint());
                    }
                    None => break,
                },
                ack = self.quit.recv() => {
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                    break;
                }
            }
        }

        tracing::debug!(service = %self.service, "load balancer refresh task exiting");
    }

    async fn refresh(&mut self) {
        match self.discoverer.discover().await {
            Ok(endpoints) => {
                let mut pool = self.pool.lock().expect("endpoint pool lock poisoned");
                *pool = endpoints;
            }
            Err(e) => {
                tracing::warn!(service = %self.service, error = %e, "unable to fetch updated endpoint list");
            }
        }
    }

    fn next_endpoint(&self) -> Endpoint {
        let pool = self.pool.lock().expect("endpoint pool lock poisoned");
        self.router.route(&pool)
    }
}
