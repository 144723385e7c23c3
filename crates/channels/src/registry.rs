use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};

use {
    serde::Serialize,
    tracing::{debug, info},
};

#[cfg(feature = "metrics")]
use chatmux_metrics::{connections, counter, gauge};

use crate::{
    Credential, Result,
    bus::EventBus,
    handle::ConnectionHandle,
    state::ConnectionState,
    transport::TransportFactory,
};

struct ConnectionEntry {
    handle: ConnectionHandle,
    ref_count: usize,
}

/// Point-in-time view of one registry entry, safe to log or print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub fingerprint: String,
    pub ref_count: usize,
    pub state: ConnectionState,
}

/// Owns at most one live connection per credential and reference-counts
/// the ports using it.
///
/// `acquire` and `release` complete synchronously. The table lock is never
/// held while a transport is started or torn down, so transports may emit
/// events from inside `start()`.
pub struct ConnectionRegistry {
    bus: EventBus,
    factory: Arc<dyn TransportFactory>,
    entries: Mutex<HashMap<Credential, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new(bus: EventBus, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            bus,
            factory,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The bus every connection created here publishes to.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Get the connection for `token`, creating and starting it on first use.
    ///
    /// Returns before the connection is open. If the existing connection's
    /// last start attempt failed, it is started again.
    pub fn acquire(&self, token: &str) -> Result<ConnectionHandle> {
        let credential = Credential::parse(token)?;

        let (handle, fresh, ref_count) = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            match entries.get_mut(&credential) {
                Some(entry) => {
                    entry.ref_count += 1;
                    (entry.handle.clone(), false, entry.ref_count)
                },
                None => {
                    let transport = self.factory.create(&credential);
                    let handle =
                        ConnectionHandle::new(credential.clone(), transport, self.bus.clone());
                    entries.insert(credential.clone(), ConnectionEntry {
                        handle: handle.clone(),
                        ref_count: 1,
                    });
                    #[cfg(feature = "metrics")]
                    {
                        gauge!(connections::ACTIVE).set(entries.len() as f64);
                        counter!(connections::OPENED_TOTAL).increment(1);
                    }
                    (handle, true, 1)
                },
            }
        };

        if fresh {
            info!(credential = %credential, "creating connection");
            handle.start();
        } else {
            debug!(credential = %credential, ref_count, "reusing connection");
            handle.retry_if_failed();
        }
        Ok(handle)
    }

    /// Drop one reference. The last release removes the entry at once and
    /// closes the transport in the background. Unknown credentials are a
    /// no-op.
    pub fn release(&self, credential: &Credential) {
        let closing = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let Some(entry) = entries.get_mut(credential) else {
                debug!(credential = %credential, "release of unknown connection ignored");
                return;
            };
            entry.ref_count = entry.ref_count.saturating_sub(1);
            if entry.ref_count > 0 {
                debug!(credential = %credential, ref_count = entry.ref_count, "connection released");
                return;
            }
            let removed = entries.remove(credential);
            #[cfg(feature = "metrics")]
            {
                gauge!(connections::ACTIVE).set(entries.len() as f64);
                counter!(connections::CLOSED_TOTAL).increment(1);
            }
            removed
        };

        if let Some(entry) = closing {
            info!(credential = %credential, "closing connection");
            entry.handle.shutdown();
        }
    }

    pub fn ref_count(&self, credential: &Credential) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(credential).map_or(0, |e| e.ref_count)
    }

    pub fn contains(&self, credential: &Credential) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(credential)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries sorted by fingerprint.
    pub fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<_> = entries
            .iter()
            .map(|(credential, entry)| ConnectionSnapshot {
                fingerprint: credential.fingerprint(),
                ref_count: entry.ref_count,
                state: entry.handle.state(),
            })
            .collect();
        out.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        out
    }

    /// Tear down every connection regardless of reference counts.
    pub fn shutdown_all(&self) {
        let drained: Vec<ConnectionEntry> = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            #[cfg(feature = "metrics")]
            gauge!(connections::ACTIVE).set(0.0);
            entries.drain().map(|(_, entry)| entry).collect()
        };
        if !drained.is_empty() {
            info!(count = drained.len(), "closing all connections");
        }
        for entry in drained {
            entry.handle.shutdown();
        }
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.snapshot())
            .finish()
    }
}
