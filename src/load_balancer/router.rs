//! Request routing strategies.
//!
//! # Design Decisions
//! - `route` is never called with an empty slice; the balancer only
//!   serves requests once an initial discovery has succeeded
//! - Determinism is not required, long-run fairness is

use rand::Rng;

use crate::load_balancer::Endpoint;

/// Decides which endpoint the next request goes to.
pub trait RequestRouter: Send + Sync {
    fn route(&self, endpoints: &[Endpoint]) -> Endpoint;
}

/// Uniform random selection.
#[derive(Debug, Default)]
pub struct RandomRouter;

impl RandomRouter {
    pub fn new() -> Self {
        Self
    }
}

impl RequestRouter for RandomRouter {
    fn route(&self, endpoints: &[Endpoint]) -> Endpoint {
        let idx = rand::thread_rng().gen_range(0..endpoints.len());
        endpoints[idx].clone()
    }
}
