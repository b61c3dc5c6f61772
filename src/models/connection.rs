use serde::{Deserialize, Serialize};

/// Connection metadata as reported by the proxy backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionMetadata {
    /// Network protocol (tcp/udp)
    pub network: String,

    /// Inbound type (HTTP, Socks5, Tun, ...)
    #[serde(rename = "type")]
    pub conn_type: String,

    /// Source IP address, empty for connections originating inside the core
    #[serde(rename = "sourceIP")]
    pub source_ip: String,

    #[serde(rename = "sourcePort")]
    pub source_port: String,

    #[serde(rename = "destinationIP")]
    pub destination_ip: String,

    #[serde(rename = "destinationPort")]
    pub destination_port: String,

    /// Target hostname
    pub host: String,

    /// SNI host (TLS connections)
    #[serde(rename = "sniffHost")]
    pub sniff_host: String,

    #[serde(rename = "inboundName")]
    pub inbound_name: String,

    #[serde(rename = "dnsMode")]
    pub dns_mode: String,

    /// Process name
    pub process: String,

    #[serde(rename = "processPath")]
    pub process_path: String,

    #[serde(rename = "remoteDestination")]
    pub remote_destination: String,

    #[serde(rename = "specialProxy")]
    pub special_proxy: String,

    /// Process UID (Unix systems)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
}

/// One active connection at one point in time, exactly as the backend reports it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConnectionSnapshot {
    /// Opaque id, stable for the lifetime of the connection
    pub id: String,

    /// Cumulative bytes uploaded
    pub upload: u64,

    /// Cumulative bytes downloaded
    pub download: u64,

    /// Proxy chain, outermost first
    pub chains: Vec<String>,

    /// Matched rule type
    pub rule: String,

    /// Matched rule payload
    #[serde(rename = "rulePayload")]
    pub rule_payload: String,

    /// Connection start time (ISO 8601)
    pub start: String,

    pub metadata: ConnectionMetadata,
}

/// A snapshot enriched with the instantaneous speed since the previous cycle.
///
/// Speeds are signed: a counter that goes backwards between two cycles shows
/// up as a negative speed rather than being hidden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(flatten)]
    pub snapshot: RawConnectionSnapshot,

    #[serde(rename = "downloadSpeed")]
    pub download_speed: i64,

    #[serde(rename = "uploadSpeed")]
    pub upload_speed: i64,
}

impl Connection {
    pub fn id(&self) -> &str {
        &self.snapshot.id
    }

    pub fn source_ip(&self) -> &str {
        &self.snapshot.metadata.source_ip
    }

    /// Whether the given proxy name appears anywhere in the chain
    pub fn uses_proxy(&self, proxy: &str) -> bool {
        self.snapshot.chains.iter().any(|name| name == proxy)
    }
}

/// Message pushed by the backend's `/connections` endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionsMessage {
    /// Currently open connections; absent or empty means "nothing new"
    pub connections: Option<Vec<RawConnectionSnapshot>>,

    /// Cumulative upload of the backend process
    #[serde(rename = "uploadTotal")]
    pub upload_total: u64,

    /// Cumulative download of the backend process
    #[serde(rename = "downloadTotal")]
    pub download_total: u64,

    /// Resident memory of the backend, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
}

impl ConnectionsMessage {
    /// Connections carried by this message, if there are any
    pub fn active(&self) -> Option<&[RawConnectionSnapshot]> {
        match &self.connections {
            Some(list) if !list.is_empty() => Some(list.as_slice()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_message() {
        let json = r#"{
            "downloadTotal": 4096,
            "uploadTotal": 1024,
            "connections": [{
                "id": "5b1f",
                "upload": 10,
                "download": 20,
                "chains": ["HK-01", "Proxy"],
                "rule": "DomainSuffix",
                "rulePayload": "example.com",
                "start": "2024-05-01T10:00:00.000Z",
                "metadata": {
                    "network": "tcp",
                    "type": "Tun",
                    "sourceIP": "192.168.1.20",
                    "sourcePort": "51234",
                    "destinationIP": "93.184.216.34",
                    "destinationPort": "443",
                    "host": "example.com",
                    "process": "curl",
                    "uid": 1000
                }
            }]
        }"#;

        let msg: ConnectionsMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.upload_total, 1024);
        assert_eq!(msg.download_total, 4096);

        let active = msg.active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].rule_payload, "example.com");
        assert_eq!(active[0].metadata.source_ip, "192.168.1.20");
        assert_eq!(active[0].metadata.conn_type, "Tun");
        assert_eq!(active[0].metadata.uid, Some(1000));
    }

    #[test]
    fn test_partial_message_defaults() {
        let msg: ConnectionsMessage = serde_json::from_str(r#"{"uploadTotal": 5}"#).unwrap();
        assert!(msg.active().is_none());
        assert_eq!(msg.download_total, 0);

        let msg: ConnectionsMessage =
            serde_json::from_str(r#"{"connections": [], "uploadTotal": 1, "downloadTotal": 1}"#)
                .unwrap();
        assert!(msg.active().is_none());
    }

    #[test]
    fn test_malformed_message_is_rejected() {
        assert!(serde_json::from_str::<ConnectionsMessage>(r#"{"connections": 12"#).is_err());
        assert!(serde_json::from_str::<ConnectionsMessage>(r#"{"connections": 12}"#).is_err());
        assert!(serde_json::from_str::<ConnectionsMessage>("not even json").is_err());
    }

    #[test]
    fn test_connection_serializes_flat() {
        let conn = Connection {
            snapshot: RawConnectionSnapshot {
                id: "a".to_string(),
                download: 1500,
                ..Default::default()
            },
            download_speed: 500,
            upload_speed: 0,
        };

        let value = serde_json::to_value(&conn).unwrap();
        assert_eq!(value["id"], "a");
        assert_eq!(value["download"], 1500);
        assert_eq!(value["downloadSpeed"], 500);
        assert!(value.get("snapshot").is_none());
    }
}
