//! Turns connection failures into registry entries
//!
//! The proxy engine reports failures through [`FailureObserver`]. Each report
//! becomes at most one registration. The cache check, store write and merge
//! recompute run as one critical section so concurrent failures for the same
//! host cannot double-register it or publish a stale ignore set.

pub mod events;

pub use events::{
    ExtractionError, HandshakeFailure, NegotiationContext, ServerIdentity, TransportFailure,
};

use crate::filter::IgnoreSetCache;
use crate::merge::EffectiveIgnoreSet;
use ignore_registry::{normalize_domain, transfer, Origin, RegisterOutcome, RegistryStore};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Interface the proxy engine calls when a connection fails
///
/// Implementations must never panic or block indefinitely: they run on the
/// engine's event path.
pub trait FailureObserver: Send + Sync {
    /// A transport session ended with an error
    fn on_transport_failure(&self, event: &TransportFailure);

    /// A TLS handshake failed
    fn on_handshake_failure(&self, event: &HandshakeFailure);
}

/// What became of one failure report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// The host was written to the registry
    Registered(RegisterOutcome),
    /// The host is already in the ignore set
    AlreadyIgnored,
    /// The failure was not TLS related
    NotTls,
    /// No usable host could be derived from the event
    NoIdentity,
    /// The registry could not be written; retried on the next failure
    StoreUnavailable,
}

impl CollectOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectOutcome::Registered(RegisterOutcome::Inserted) => "inserted",
            CollectOutcome::Registered(RegisterOutcome::Updated) => "updated",
            CollectOutcome::AlreadyIgnored => "cached",
            CollectOutcome::NotTls => "not-tls",
            CollectOutcome::NoIdentity => "no-identity",
            CollectOutcome::StoreUnavailable => "unavailable",
        }
    }
}

/// Failure collector owning the ignore-set cache
pub struct FailureCollector {
    store: Arc<RegistryStore>,
    external_base: Vec<String>,
    compat_file: Option<PathBuf>,
    cache: Mutex<IgnoreSetCache>,
    effective: watch::Sender<Arc<EffectiveIgnoreSet>>,
}

impl FailureCollector {
    /// Create a collector with an empty cache
    ///
    /// Call [`rebuild`](Self::rebuild) before use to load the store's active set.
    pub fn new(store: Arc<RegistryStore>, external_base: Vec<String>) -> Self {
        let initial = Arc::new(EffectiveIgnoreSet::new(external_base.clone()));
        let (effective, _) = watch::channel(initial);

        Self {
            store,
            external_base,
            compat_file: None,
            cache: Mutex::new(IgnoreSetCache::new()),
            effective,
        }
    }

    /// Keep a flat ignore file in sync with the active set
    pub fn with_compat_file(mut self, path: Option<PathBuf>) -> Self {
        self.compat_file = path;
        self
    }

    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.store
    }

    /// Receive every newly published effective ignore set
    pub fn subscribe(&self) -> watch::Receiver<Arc<EffectiveIgnoreSet>> {
        self.effective.subscribe()
    }

    /// The most recently published effective ignore set
    pub fn effective(&self) -> Arc<EffectiveIgnoreSet> {
        self.effective.borrow().clone()
    }

    /// Whether the proxy should currently pass this host through
    pub fn is_ignored(&self, host: &str, ip: Option<IpAddr>) -> bool {
        self.effective.borrow().matches(host, ip)
    }

    /// Snapshot of the cached hosts, sorted
    pub fn cached_hosts(&self) -> Vec<String> {
        self.lock_cache().map(|cache| cache.sorted()).unwrap_or_default()
    }

    /// Reload the cache from the store and republish the effective set
    ///
    /// Returns the number of cached hosts.
    pub fn rebuild(&self) -> usize {
        let Some(mut cache) = self.lock_cache() else {
            return 0;
        };
        let count = cache.rebuild(&self.store);
        self.publish(&cache);
        count
    }

    /// Handle a transport failure and report what happened
    pub fn record_transport_failure(&self, event: &TransportFailure) -> CollectOutcome {
        if !event.is_tls_error() {
            return CollectOutcome::NotTls;
        }
        let Some(server_name) = event.server_name() else {
            debug!("TLS transport failure without server name, ignoring");
            return CollectOutcome::NoIdentity;
        };

        info!("TLS transport failure detected for {}", server_name);
        self.collect(server_name, &Origin::TransportTlsError)
    }

    /// Handle a handshake failure and report what happened
    pub fn record_handshake_failure(&self, event: &HandshakeFailure) -> CollectOutcome {
        let host = match event.identity() {
            Ok(ServerIdentity::Hostname(host)) => host,
            Ok(ServerIdentity::PeerIp(ip)) => {
                warn!("TLS handshake failed, SNI not available, using server IP: {}", ip);
                ip.to_string()
            }
            Err(e) => {
                error!("TLS handshake failed but no identity could be extracted: {}", e);
                return CollectOutcome::NoIdentity;
            }
        };

        info!("TLS handshake failure detected for {}", host);
        self.collect(&host, &Origin::HandshakeTlsError)
    }

    fn collect(&self, raw_host: &str, origin: &Origin) -> CollectOutcome {
        let host = match normalize_domain(raw_host) {
            Ok(host) => host,
            Err(e) => {
                warn!("Dropping failure for unusable host: {}", e);
                return CollectOutcome::NoIdentity;
            }
        };

        let Some(mut cache) = self.lock_cache() else {
            return CollectOutcome::StoreUnavailable;
        };

        if cache.contains(&host) {
            debug!("{} already ignored", host);
            return CollectOutcome::AlreadyIgnored;
        }

        let Some(outcome) = self.store.register(&host, origin) else {
            warn!("Ignore list not updated for {} this round", host);
            return CollectOutcome::StoreUnavailable;
        };

        info!("Adding {} to ignore list (origin: {})", host, origin);
        cache.insert(host);
        self.publish(&cache);
        CollectOutcome::Registered(outcome)
    }

    /// Merge the cache into the base list, publish it and refresh the flat file
    fn publish(&self, cache: &IgnoreSetCache) {
        let active = cache.sorted();
        let effective = EffectiveIgnoreSet::merged(&self.external_base, &active);

        if active.is_empty() {
            info!("Keeping configured ignore hosts (registry is empty)");
        } else {
            info!(
                "Combined ignore hosts: {} configured + {} from registry = {} total",
                self.external_base.len(),
                active.len(),
                effective.len()
            );
        }

        if let Some(path) = &self.compat_file {
            match transfer::write_export_file(path, &active) {
                Ok(()) => debug!("Exported {} domains to {:?}", active.len(), path),
                Err(e) => error!("Failed to save compatibility file: {}", e),
            }
        }

        self.effective.send_replace(Arc::new(effective));
    }

    fn lock_cache(&self) -> Option<MutexGuard<'_, IgnoreSetCache>> {
        match self.cache.lock() {
            Ok(cache) => Some(cache),
            Err(_) => {
                error!("Ignore set cache lock poisoned");
                None
            }
        }
    }
}

impl FailureObserver for FailureCollector {
    fn on_transport_failure(&self, event: &TransportFailure) {
        self.record_transport_failure(event);
    }

    fn on_handshake_failure(&self, event: &HandshakeFailure) {
        self.record_handshake_failure(event);
    }
}
