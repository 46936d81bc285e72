use super::{
    errors::{ProtocolError, ProtocolResult},
    messages::WireMessage,
};

/// Maximum allowed frame size (64KB). A full 16-player sync is a few KB.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Encode a message as a JSON text frame.
pub fn encode(message: &WireMessage) -> ProtocolResult<String> {
    let frame = serde_json::to_string(message)?;
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            actual: frame.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(frame)
}

/// Decode a JSON text frame, rejecting oversized input before parsing.
pub fn decode(frame: &str) -> ProtocolResult<WireMessage> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            actual: frame.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(serde_json::from_str(frame)?)
}
