// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! A remote worker host's configuration.
//!
//! Grounded on §3/§6's `NodeSetting`. Identity is the host name alone
//! (two settings for the same host are the same node); `timeout_factor`
//! may be a fixed scalar or something evaluated at read time (e.g. a
//! load-dependent knob), modeled as [`TimeoutFactor`].

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::sync::Arc;

/// A composition's timeout multiplier: either a fixed number or a
/// callback evaluated fresh each time it's read.
#[derive(Clone)]
pub enum TimeoutFactor {
    Scalar(f64),
    Dynamic(Arc<dyn Fn() -> f64 + Send + Sync>),
}

impl TimeoutFactor {
    pub fn evaluate(&self) -> f64 {
        match self {
            TimeoutFactor::Scalar(v) => *v,
            TimeoutFactor::Dynamic(f) => f(),
        }
    }
}

impl std::fmt::Debug for TimeoutFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutFactor::Scalar(v) => write!(f, "TimeoutFactor::Scalar({v})"),
            TimeoutFactor::Dynamic(_) => write!(f, "TimeoutFactor::Dynamic(..)"),
        }
    }
}

impl Default for TimeoutFactor {
    fn default() -> Self {
        TimeoutFactor::Scalar(1.0)
    }
}

impl Serialize for TimeoutFactor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            TimeoutFactor::Scalar(v) => serializer.serialize_f64(*v),
            TimeoutFactor::Dynamic(_) => {
                Err(serde::ser::Error::custom("a dynamic timeout factor cannot be serialized"))
            }
        }
    }
}

impl<'de> Deserialize<'de> for TimeoutFactor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        f64::deserialize(deserializer).map(TimeoutFactor::Scalar)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSetting {
    pub host: String,
    pub ssh_port: u16,
    pub username: String,
    pub path: String,
    pub basepath: String,
    pub description: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub keyfile: Option<String>,
    #[serde(default)]
    pub timeout_factor: TimeoutFactor,
}

impl PartialEq for NodeSetting {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
    }
}

impl Eq for NodeSetting {}

impl std::hash::Hash for NodeSetting {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.host.hash(state);
    }
}

impl NodeSetting {
    pub fn new(
        host: impl Into<String>,
        ssh_port: u16,
        username: impl Into<String>,
        path: impl Into<String>,
        basepath: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            ssh_port,
            username: username.into(),
            path: path.into(),
            basepath: basepath.into(),
            description: description.into(),
            password: None,
            keyfile: None,
            timeout_factor: TimeoutFactor::default(),
        }
    }

    /// SHA-1 hexdigest of the host name.
    pub fn hash(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.host.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_host_only() {
        let mut a = NodeSetting::new("h1", 22, "u", "/p", "/", "desc-a");
        let b = NodeSetting::new("h1", 2222, "other", "/q", "/", "desc-b");
        assert_eq!(a, b);
        a.description = "changed".to_string();
        assert_eq!(a, b);
    }

    #[test]
    fn hash_is_deterministic() {
        let a = NodeSetting::new("h1", 22, "u", "/p", "/", "d");
        let b = NodeSetting::new("h1", 22, "u", "/p", "/", "d");
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn round_trips_through_yaml() {
        let setting = NodeSetting::new("h1", 22, "u", "/p", "/", "d");
        let yaml = serde_yaml::to_string(&setting).unwrap();
        let back: NodeSetting = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(setting, back);
    }
}
