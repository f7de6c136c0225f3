// src/core/adapters/console.rs

//! Console PTY/WebSocket binary framing.
//!
//! byte 0 is the frame type; server→client frames are always raw PTY bytes
//! with no framing of their own, so this module only needs to model the
//! client→server direction.

#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Input(Vec<u8>),
    Resize { rows: u16, cols: u16 },
    Control { kill: Option<String> },
}

#[derive(Debug, serde::Deserialize)]
struct ResizePayload {
    rows: u16,
    cols: u16,
}

#[derive(Debug, serde::Deserialize)]
struct ControlPayload {
    kill: Option<String>,
}

impl ClientFrame {
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let (&tag, rest) = bytes.split_first()?;
        match tag {
            0x00 => Some(ClientFrame::Input(rest.to_vec())),
            0x01 => {
                let p: ResizePayload = serde_json::from_slice(rest).ok()?;
                Some(ClientFrame::Resize { rows: p.rows, cols: p.cols })
            }
            0x02 => {
                let p: ControlPayload = serde_json::from_slice(rest).ok()?;
                Some(ClientFrame::Control { kill: p.kill })
            }
            _ => None,
        }
    }
}

/// Wraps a raw PTY byte chunk for the server→client direction. Per /// these carry no frame-type prefix, unlike client→server frames.
pub fn encode_server_chunk(bytes: &[u8]) -> Vec<u8> {
    bytes.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_input_frame() {
        let mut raw = vec![0x00];
        raw.extend_from_slice(b"hello");
        assert_eq!(ClientFrame::decode(&raw), Some(ClientFrame::Input(b"hello".to_vec())));
    }

    #[test]
    fn decodes_resize_frame() {
        let mut raw = vec![0x01];
        raw.extend_from_slice(br#"{"rows":40,"cols":120}"#);
        assert_eq!(ClientFrame::decode(&raw), Some(ClientFrame::Resize { rows: 40, cols: 120 }));
    }

    #[test]
    fn decodes_control_kill_frame() {
        let mut raw = vec![0x02];
        raw.extend_from_slice(br#"{"kill":"session-1"}"#);
        assert_eq!(
            ClientFrame::decode(&raw),
            Some(ClientFrame::Control { kill: Some("session-1".into()) })
        );
    }

    #[test]
    fn rejects_unknown_tag() {
        assert_eq!(ClientFrame::decode(&[0xff, 1, 2, 3]), None);
    }
}
