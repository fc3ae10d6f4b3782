use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::watch;

/// Health status of one tracked service, mirroring the gRPC health protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServingStatus {
    Unknown,
    Serving,
    NotServing,
    ServiceUnknown,
}

/// Tracks per-service health with a broadcast channel per service so
/// watchers see every change.
///
/// The empty service name is the aggregate: `Serving` only while every
/// tracked service is `Serving`.
pub struct HealthRegistry {
    services: RwLock<HashMap<String, watch::Sender<ServingStatus>>>,
    aggregate: watch::Sender<ServingStatus>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        let (aggregate, _) = watch::channel(ServingStatus::Serving);
        Self {
            services: RwLock::new(HashMap::new()),
            aggregate,
        }
    }

    /// Sets a service's status, registering the service on first use, and
    /// recomputes the aggregate.
    pub fn set_status(&self, service: &str, status: ServingStatus) {
        {
            let mut services = self.services.write();
            match services.get(service) {
                Some(tx) => {
                    tx.send_replace(status);
                }
                None => {
                    let (tx, _) = watch::channel(status);
                    services.insert(service.to_string(), tx);
                }
            }
        }
        self.recompute_aggregate();
    }

    /// Current status; the empty name queries the aggregate, unknown names
    /// answer `ServiceUnknown`.
    pub fn check(&self, service: &str) -> ServingStatus {
        if service.is_empty() {
            return *self.aggregate.borrow();
        }
        self.services
            .read()
            .get(service)
            .map(|tx| *tx.borrow())
            .unwrap_or(ServingStatus::ServiceUnknown)
    }

    /// Subscribes to a service's status changes (the empty name subscribes
    /// to the aggregate).
    ///
    /// A not-yet-registered service gets a channel on demand holding
    /// `ServiceUnknown`, so a watcher connected before the service registers
    /// still sees the registration when it happens.
    pub fn watch(&self, service: &str) -> watch::Receiver<ServingStatus> {
        if service.is_empty() {
            return self.aggregate.subscribe();
        }
        let mut services = self.services.write();
        if let Some(tx) = services.get(service) {
            return tx.subscribe();
        }
        let (tx, rx) = watch::channel(ServingStatus::ServiceUnknown);
        services.insert(service.to_string(), tx);
        rx
    }

    fn recompute_aggregate(&self) {
        let services = self.services.read();
        // Watcher-created placeholders are not registered services yet; they
        // carry no weight in the aggregate.
        let all_serving = services
            .values()
            .map(|tx| *tx.borrow())
            .filter(|status| *status != ServingStatus::ServiceUnknown)
            .all(|status| status == ServingStatus::Serving);
        let status = if all_serving {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        };
        self.aggregate.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
