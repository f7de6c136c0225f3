// src/core/router/pool.rs

//! Connection pools for forwarded requests: a verifying pool
//! for non-cluster peers and a name-skip-verify pool for intra-cluster
//! hops, where peer identity is already established by the cluster token
//! rather than the TLS chain.

use reqwest::Client;
use std::time::Duration;

const MAX_IDLE_CONNS_PER_HOST: usize = 32;
const DIAL_AND_TLS_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct RouterPools {
    /// Used for requests to peers whose TLS chain we verify normally.
    pub verifying: Client,
    /// Used for intra-cluster hops; the peer's identity is attested by the
    /// cluster-scoped hop token, not the certificate chain.
    pub skip_verify: Client,
}

impl RouterPools {
    pub fn build() -> Self {
        let verifying = Client::builder()
            .pool_max_idle_per_host(MAX_IDLE_CONNS_PER_HOST)
            .pool_idle_timeout(IDLE_TIMEOUT)
            .connect_timeout(DIAL_AND_TLS_TIMEOUT)
            .build()
            .expect("verifying client builds with static config");

        let skip_verify = Client::builder()
            .pool_max_idle_per_host(MAX_IDLE_CONNS_PER_HOST)
            .pool_idle_timeout(IDLE_TIMEOUT)
            .connect_timeout(DIAL_AND_TLS_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .expect("skip-verify client builds with static config");

        Self { verifying, skip_verify }
    }
}

impl Default for RouterPools {
    fn default() -> Self {
        Self::build()
    }
}
