//! Fixed-width wire encoding shared by the stream transports.
//!
//! Commands travel as [`COMMAND_LENGTH`]-byte ASCII tokens, right-padded with
//! spaces. Integers are 4-byte and floats 8-byte little-endian values; element
//! counts are never sent, both ends derive them from context.

use super::ChannelError;

pub const COMMAND_LENGTH: usize = 12;

pub fn encode_command(command: &str) -> Result<[u8; COMMAND_LENGTH], ChannelError> {
    if !command.is_ascii() {
        return Err(ChannelError::MalformedCommand(command.to_string()));
    }
    let bytes = command.as_bytes();
    if bytes.len() > COMMAND_LENGTH {
        return Err(ChannelError::CommandTooLong {
            command: command.to_string(),
            max: COMMAND_LENGTH,
        });
    }
    let mut frame = [b' '; COMMAND_LENGTH];
    frame[..bytes.len()].copy_from_slice(bytes);
    Ok(frame)
}

/// Decodes a command frame, dropping trailing space or NUL padding.
pub fn decode_command(frame: &[u8]) -> Result<String, ChannelError> {
    let end = frame
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    let token = &frame[..end];
    if !token.is_ascii() {
        return Err(ChannelError::MalformedCommand(
            String::from_utf8_lossy(token).into_owned(),
        ));
    }
    Ok(String::from_utf8_lossy(token).into_owned())
}

pub fn encode_i32s(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_i32s(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn encode_f64s(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_f64s(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(c);
            f64::from_le_bytes(raw)
        })
        .collect()
}
