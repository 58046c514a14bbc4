//! Generador de silencio MP3.
//!
//! Un frame constante de silencio mantiene vivos los decoders de los
//! clientes entre tracks, durante la pausa y en los huecos. Es un literal:
//! un frame MPEG-2 Layer III de 36 bytes (8 kbps, 16 kHz, mono) con todas
//! las muestras a cero, que cualquier decoder de 128 kbps acepta
//! intercalado en el stream.

use bytes::Bytes;

/// Frame MP3 de silencio: cabecera + side info + main data a cero.
pub const SILENCE_FRAME: [u8; 36] = [
    0xff, 0xf3, 0x18, 0xc4, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Cuántas repeticiones del frame componen el bloque de purga de pausa
/// (~1 segundo de audio hacia delante en el buffer del cliente).
pub const PAUSE_FLUSH_REPEATS: usize = 100;

/// Un frame de silencio listo para emitir.
pub fn silence_frame() -> Bytes {
    Bytes::from_static(&SILENCE_FRAME)
}

/// Bloque de purga: el frame repetido `PAUSE_FLUSH_REPEATS` veces, en un
/// solo buffer para escribirlo de una vez a cada oyente.
pub fn pause_flush_block() -> Bytes {
    let mut block = Vec::with_capacity(SILENCE_FRAME.len() * PAUSE_FLUSH_REPEATS);
    for _ in 0..PAUSE_FLUSH_REPEATS {
        block.extend_from_slice(&SILENCE_FRAME);
    }
    Bytes::from(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_36_bytes_with_sync_word() {
        assert_eq!(SILENCE_FRAME.len(), 36);
        // 11 bits de sincronización MPEG
        assert_eq!(SILENCE_FRAME[0], 0xff);
        assert_eq!(SILENCE_FRAME[1] & 0xe0, 0xe0);
    }

    #[test]
    fn test_flush_block_is_100_frames() {
        let block = pause_flush_block();
        assert_eq!(block.len(), 36 * 100);
        assert_eq!(&block[..36], &SILENCE_FRAME[..]);
        assert_eq!(&block[3564..], &SILENCE_FRAME[..]);
    }
}
