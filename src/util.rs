use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use http::Uri;

use crate::policy::KeyGranularity;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn read_unpoisoned<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn write_unpoisoned<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn millis_u64(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}

/// Target of one outbound request, reduced to the pieces the gate keys on.
///
/// The port is kept only when non-default (not 80/443); the endpoint path is
/// kept only under [`KeyGranularity::HostAndEndpoint`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RequestTarget {
    host: String,
    endpoint: Option<String>,
    key: String,
}

impl RequestTarget {
    pub(crate) fn from_uri(uri: &Uri, granularity: KeyGranularity) -> Option<Self> {
        let raw_host = uri.host()?;
        if raw_host.is_empty() {
            return None;
        }

        let mut host = raw_host.to_ascii_lowercase();
        if let Some(port) = uri.port_u16() {
            if port != 80 && port != 443 {
                host.push(':');
                host.push_str(&port.to_string());
            }
        }

        let endpoint = match granularity {
            KeyGranularity::Host => None,
            KeyGranularity::HostAndEndpoint => {
                let path = uri.path();
                if path.is_empty() || path == "/" {
                    None
                } else {
                    Some(path.to_owned())
                }
            }
        };

        let key = match &endpoint {
            Some(endpoint) => format!("{host}{endpoint}"),
            None => host.clone(),
        };

        Some(Self {
            host,
            endpoint,
            key,
        })
    }

    pub(crate) fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub(crate) fn endpoint_owned(&self) -> Option<String> {
        self.endpoint.clone()
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }
}
