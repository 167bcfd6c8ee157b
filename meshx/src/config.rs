//! Tunables for the core, collected into an owned value.
//!
//! The original carries these as preprocessor constants
//! (`MESHX_TXCM_TX_Q_LEN`, `MESHX_TXCM_MSG_RETRY_MAX`, ...); per the
//! REDESIGN FLAGS direction they become fields on a value handed to
//! [`crate::txcm::Txcm::init`] instead of module-level globals.
//!
//! `MeshxConfig` derives `serde::{Serialize, Deserialize}` so a node
//! binary can load it from a JSON config blob (e.g. one staged alongside
//! firmware, or read back out of NVS for diagnostics) rather than
//! hand-editing constants, the same way the teacher's firmware encodes
//! its own settings as JSON (`bluetooth::types::encode_json_frame`).

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// TXCM and model-layer tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshxConfig {
    /// Maximum number of queued (not in-flight) Txcm items.
    pub txcm_queue_depth: usize,
    /// Maximum payload length carried by a single Txcm item.
    pub txcm_max_payload: usize,
    /// Number of retries attempted for an ACKED message before timeout.
    pub txcm_max_retry: u8,
    /// How long a transport should wait for an ACK before reporting a
    /// timeout on the in-flight message. TXCM itself never times anything
    /// out on its own clock (spec.md §5: its only suspension point is the
    /// blocking signal-queue read) — this is read by the transport/client
    /// dispatch layer that turns an expired wait into a [`crate::txcm::Txcm::resend`]
    /// call, the same division of labour as the original's mesh stack
    /// (which owns the ack-wait timer) reporting into
    /// `base_from_ble_msg_handle` rather than TXCM timing itself.
    #[serde(with = "duration_millis")]
    pub txcm_ack_timeout: Duration,
}

impl Default for MeshxConfig {
    fn default() -> Self {
        Self {
            txcm_queue_depth: 10,
            txcm_max_payload: 64,
            txcm_max_retry: 3,
            txcm_ack_timeout: Duration::from_millis(2000),
        }
    }
}

impl MeshxConfig {
    /// Parse a config from a JSON document (missing fields fall back to
    /// [`Default::default`] field-by-field is not attempted — a partial
    /// document is rejected, matching `serde_json`'s usual strictness).
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Render as a JSON document, e.g. for a startup diagnostic log line.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// `serde_json` has no native duration type; `txcm_ack_timeout` is
/// represented on the wire as whole milliseconds.
mod duration_millis {
    use core::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let config = MeshxConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(MeshxConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn ack_timeout_is_encoded_as_milliseconds() {
        let json = MeshxConfig::default().to_json().unwrap();
        assert!(json.contains("\"txcm_ack_timeout\":2000"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(MeshxConfig::from_json("{not json}").is_err());
    }
}
