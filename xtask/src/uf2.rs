//! UF2 encoder for the RP2040 bootrom's mass-storage loader.
//!
//! Block layout (512 bytes each):
//!
//! ```text
//! [0..4)     magic start 0   0x0A324655
//! [4..8)     magic start 1   0x9E5D5157
//! [8..12)    flags           0x00002000 (family id present)
//! [12..16)   target address  flash base + 256·block_no
//! [16..20)   payload size    256
//! [20..24)   block number
//! [24..28)   total blocks
//! [28..32)   family id       0xE48BFF56 (RP2040)
//! [32..508)  payload (256 bytes used, rest zero)
//! [508..512) magic end       0x0AB16F30
//! ```

use anyhow::{ensure, Result};

pub const MAGIC_START_0: u32 = 0x0A32_4655;
pub const MAGIC_START_1: u32 = 0x9E5D_5157;
pub const MAGIC_END: u32 = 0x0AB1_6F30;
pub const FLAG_FAMILY_ID_PRESENT: u32 = 0x0000_2000;
pub const FAMILY_ID_RP2040: u32 = 0xE48B_FF56;

pub const BLOCK_BYTES: usize = 512;
pub const PAYLOAD_BYTES: usize = 256;

/// Encode `image` as UF2 blocks targeting `base_addr` upward.
pub fn encode(image: &[u8], base_addr: u32) -> Result<Vec<u8>> {
    ensure!(!image.is_empty(), "refusing to encode an empty image");
    let num_blocks = image.len().div_ceil(PAYLOAD_BYTES);
    ensure!(
        num_blocks <= u32::MAX as usize,
        "image too large for UF2 block numbering"
    );

    let mut out = Vec::with_capacity(num_blocks * BLOCK_BYTES);
    for (block_no, chunk) in image.chunks(PAYLOAD_BYTES).enumerate() {
        let mut block = [0u8; BLOCK_BYTES];
        let target = base_addr + (block_no * PAYLOAD_BYTES) as u32;

        block[0..4].copy_from_slice(&MAGIC_START_0.to_le_bytes());
        block[4..8].copy_from_slice(&MAGIC_START_1.to_le_bytes());
        block[8..12].copy_from_slice(&FLAG_FAMILY_ID_PRESENT.to_le_bytes());
        block[12..16].copy_from_slice(&target.to_le_bytes());
        block[16..20].copy_from_slice(&(PAYLOAD_BYTES as u32).to_le_bytes());
        block[20..24].copy_from_slice(&(block_no as u32).to_le_bytes());
        block[24..28].copy_from_slice(&(num_blocks as u32).to_le_bytes());
        block[28..32].copy_from_slice(&FAMILY_ID_RP2040.to_le_bytes());
        block[32..32 + chunk.len()].copy_from_slice(chunk);
        block[508..512].copy_from_slice(&MAGIC_END.to_le_bytes());

        out.extend_from_slice(&block);
    }
    Ok(out)
}
