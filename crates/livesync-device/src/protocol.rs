//! Wire format of the app runtime's debug channel
//!
//! Every message is a frame:
//!
//! ```text
//! frame   := length (u32, big-endian, byte length of payload) || payload
//! payload := UTF-16LE encoded JSON text
//! ```
//!
//! The CLI only ever sends `Page.reload`; inbound frames are not interpreted.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use livesync_core::prelude::*;

/// Size of the length prefix
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest payload accepted when reading frames back
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

pub const PAGE_RELOAD_METHOD: &str = "Page.reload";

/// Process-wide reload message counter, zero until the first reload is sent
static RELOAD_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Increment the reload counter and return the new value (first call returns 1)
pub fn next_reload_id() -> u64 {
    RELOAD_ID_COUNTER.fetch_add(1, Ordering::SeqCst) + 1
}

/// A debug-channel message.
///
/// Field order is part of the wire format: `method`, `params`, `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugMessage {
    pub method: String,
    pub params: serde_json::Value,
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageReloadParams {
    ignore_cache: bool,
}

/// Commands the CLI sends to the running app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCommand {
    /// Reload the current page, keeping the process alive
    PageReload { ignore_cache: bool },
}

impl DebugCommand {
    /// Build the JSON text for this command with message id `id`
    pub fn build(&self, id: u64) -> Result<String> {
        let message = match self {
            DebugCommand::PageReload { ignore_cache } => DebugMessage {
                method: PAGE_RELOAD_METHOD.to_string(),
                params: serde_json::to_value(PageReloadParams {
                    ignore_cache: *ignore_cache,
                })?,
                id,
            },
        };
        Ok(serde_json::to_string(&message)?)
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            DebugCommand::PageReload { .. } => "page reload",
        }
    }
}

/// Frame a JSON message for the wire
pub fn encode_frame(message: &str) -> Bytes {
    let payload: Vec<u8> = message.encode_utf16().flat_map(u16::to_le_bytes).collect();

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);
    buf.freeze()
}

/// Decode a UTF-16LE frame payload back into text
pub fn decode_payload(payload: &[u8]) -> Result<String> {
    if payload.len() % 2 != 0 {
        return Err(Error::protocol(format!(
            "UTF-16 payload has odd length {}",
            payload.len()
        )));
    }

    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).map_err(|e| Error::protocol(format!("invalid UTF-16 payload: {e}")))
}

/// Read a single frame from the stream and return its decoded text.
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<String> {
    let len = r.read_u32().await?;

    if len > MAX_FRAME_SIZE {
        return Err(Error::protocol(format!(
            "Frame size {} exceeds maximum allowed size {}",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload).await?;

    decode_payload(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_reload_json_is_bit_exact() {
        let json = DebugCommand::PageReload {
            ignore_cache: false,
        }
        .build(7)
        .unwrap();

        assert_eq!(
            json,
            r#"{"method":"Page.reload","params":{"ignoreCache":false},"id":7}"#
        );
    }

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame("ab");

        // 2 UTF-16 code units -> 4 payload bytes
        assert_eq!(&frame[..4], &[0, 0, 0, 4]);
        assert_eq!(&frame[4..], &[b'a', 0, b'b', 0]);
    }

    #[test]
    fn test_encode_frame_length_counts_bytes_not_chars() {
        // U+1F600 is a surrogate pair: 2 code units, 4 bytes
        let frame = encode_frame("\u{1F600}");
        assert_eq!(u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]), 4);
        assert_eq!(frame.len(), FRAME_HEADER_LEN + 4);
    }

    #[test]
    fn test_decode_payload_rejects_odd_length() {
        let err = decode_payload(&[b'a', 0, b'b']).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_read_frame_reads_encoded_message() {
        let json = DebugCommand::PageReload {
            ignore_cache: false,
        }
        .build(1)
        .unwrap();
        let frame = encode_frame(&json);

        let mut reader = tokio_test::io::Builder::new().read(&frame).build();
        let text = read_frame(&mut reader).await.unwrap();

        let message: DebugMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(message.method, PAGE_RELOAD_METHOD);
        assert_eq!(message.id, 1);
        assert_eq!(message.params["ignoreCache"], false);
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversized_length() {
        let header = (MAX_FRAME_SIZE + 1).to_be_bytes();
        let mut reader = tokio_test::io::Builder::new().read(&header).build();

        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_debug_command_description() {
        assert_eq!(
            DebugCommand::PageReload {
                ignore_cache: false
            }
            .description(),
            "page reload"
        );
    }
}
