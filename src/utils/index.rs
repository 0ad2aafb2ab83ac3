use crate::merkle::Hash32;
use chrono::DateTime;

/// First 8 bytes of a root as hex, for log lines.
pub fn format_root_prefix(root: &Hash32) -> String {
	hex::encode(&root[..8])
}

/// RFC 3339 rendering of a unix timestamp; the raw number if it is out of range.
pub fn format_unix_timestamp(timestamp: i64) -> String {
	DateTime::from_timestamp(timestamp, 0)
		.map(|time| time.to_rfc3339())
		.unwrap_or_else(|| timestamp.to_string())
}
