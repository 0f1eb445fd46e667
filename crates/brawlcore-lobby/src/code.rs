//! Room code generation.

use rand::Rng;

/// The room code alphabet: 30 symbols, with the glyph pairs that read
/// alike at a glance (0/O, 1/I/L) removed.
pub const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Room codes are exactly this many characters.
pub const ROOM_CODE_LENGTH: usize = 6;

/// Draws a 6-character room code from the unambiguous alphabet.
///
/// Uniqueness is the registry's job (it rejection-samples against the
/// codes currently in use); with 30^6 possible codes the expected number
/// of retries is effectively zero.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| {
            ROOM_CODE_CHARSET[rng.random_range(0..ROOM_CODE_CHARSET.len())]
                as char
        })
        .collect()
}
