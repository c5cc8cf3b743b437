//! Commissioning parameters and the persisted commissioned flag.
//!
//! The setup passcode and discriminator are checked the way a Matter device
//! would before advertising them, and the manual pairing code is derived from
//! both for the startup log and the console.

use crate::error::{BridgeError, Result};
use crate::persist;
use chrono::{DateTime, Utc};
use log::{error, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File name of the commissioning record inside the persistence directory
pub const COMMISSIONING_FILE: &str = "commissioning.json";

/// Largest valid setup passcode (27 bits, exclusive of 99999999)
pub const MAX_PASSCODE: u32 = 99_999_998;

/// Discriminators are 12 bits
pub const MAX_DISCRIMINATOR: u16 = 0x0FFF;

/// Passcodes that are trivially guessable and must be rejected.
const INVALID_PASSCODES: [u32; 12] = [
    0, 11111111, 22222222, 33333333, 44444444, 55555555, 66666666, 77777777, 88888888, 99999999,
    12345678, 87654321,
];

pub fn validate_passcode(passcode: u32) -> Result<()> {
    if passcode == 0 || passcode > MAX_PASSCODE || INVALID_PASSCODES.contains(&passcode) {
        return Err(BridgeError::InvalidNodeConfig(format!(
            "invalid setup passcode {passcode}"
        )));
    }
    Ok(())
}

pub fn validate_discriminator(discriminator: u16) -> Result<()> {
    if discriminator > MAX_DISCRIMINATOR {
        return Err(BridgeError::InvalidNodeConfig(format!(
            "discriminator {discriminator} exceeds 12 bits"
        )));
    }
    Ok(())
}

/// Generate the manual pairing code from discriminator and passcode.
///
/// Matter short manual pairing code is an 11-digit decimal number.
/// Reference: Matter spec Section 5.1.4.1
pub fn generate_pairing_code(discriminator: u16, passcode: u32) -> String {
    // Chunk 1: top 2 bits of discriminator (bits 11-10)
    let chunk1 = (discriminator >> 10) & 0x03;

    // Chunk 2: discriminator bits 9-8 in upper 2 bits, passcode bits 13-0 in lower 14 bits
    let discriminator_bits_9_8 = ((discriminator >> 8) & 0x03) as u32;
    let chunk2 = (discriminator_bits_9_8 << 14) | (passcode & 0x3FFF);

    // Chunk 3: passcode bits 26-14
    let chunk3 = (passcode >> 14) & 0x1FFF;

    let payload = format!("{}{:05}{:04}", chunk1, chunk2, chunk3);
    let check_digit = verhoeff_checksum(&payload);
    format!("{}{}", payload, check_digit)
}

/// Split an 11-digit pairing code as `XXXX-XXX-XXXX` for display.
pub fn format_pairing_code(code: &str) -> String {
    if code.len() != 11 || !code.is_ascii() {
        return code.to_string();
    }
    format!("{}-{}-{}", &code[..4], &code[4..7], &code[7..])
}

/// Compute Verhoeff check digit for a string of decimal digits.
fn verhoeff_checksum(input: &str) -> u8 {
    const D: [[u8; 10]; 10] = [
        [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
        [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
        [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
        [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
        [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
        [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
        [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
        [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
        [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
        [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
    ];

    const P: [[u8; 10]; 8] = [
        [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
        [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
        [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
        [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
        [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
        [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
        [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
        [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
    ];

    const INV: [u8; 10] = [0, 4, 3, 2, 1, 5, 6, 7, 8, 9];

    let mut c: u8 = 0;
    let digits = input.bytes().filter(u8::is_ascii_digit).map(|b| b - b'0');
    for (i, d) in digits.rev().enumerate() {
        c = D[c as usize][P[(i + 1) % 8][d as usize] as usize];
    }
    INV[c as usize]
}

/// Persisted commissioning record
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissioningRecord {
    pub commissioned: bool,
    #[serde(default)]
    pub commissioned_at: Option<DateTime<Utc>>,
}

/// Store wrapper with auto-save
pub struct CommissioningStore {
    path: PathBuf,
    state: RwLock<CommissioningRecord>,
}

impl CommissioningStore {
    /// Open the record in `dir`. An unreadable file counts as uncommissioned.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let path = dir.into().join(COMMISSIONING_FILE);
        let state = match persist::load_json::<CommissioningRecord>(&path) {
            Ok(state) => {
                if state.commissioned {
                    info!("[Matter] Device already commissioned");
                }
                state
            }
            Err(e) => {
                error!("[Matter] Failed to load commissioning record: {}", e);
                CommissioningRecord::default()
            }
        };
        Self {
            path,
            state: RwLock::new(state),
        }
    }

    pub fn is_commissioned(&self) -> bool {
        self.state.read().commissioned
    }

    pub fn record(&self) -> CommissioningRecord {
        self.state.read().clone()
    }

    pub fn mark_commissioned(&self) {
        let mut state = self.state.write();
        if state.commissioned {
            return;
        }
        state.commissioned = true;
        state.commissioned_at = Some(Utc::now());
        if let Err(e) = persist::save_json(&self.path, &*state) {
            error!("[Matter] Failed to save commissioning record: {}", e);
        }
    }

    /// Forget the fabric. Used by factory reset.
    pub fn clear(&self) -> Result<()> {
        *self.state.write() = CommissioningRecord::default();
        persist::remove(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairing_code_reference_value() {
        let code = generate_pairing_code(3840, 20202021);
        assert_eq!(code, "34970112332");
        assert_eq!(format_pairing_code(&code), "3497-011-2332");
    }

    #[test]
    fn test_passcode_validation() {
        assert!(validate_passcode(20202021).is_ok());
        assert!(validate_passcode(0).is_err());
        assert!(validate_passcode(12345678).is_err());
        assert!(validate_passcode(100_000_000).is_err());
    }

    #[test]
    fn test_discriminator_validation() {
        assert!(validate_discriminator(3840).is_ok());
        assert!(validate_discriminator(0x1000).is_err());
    }

    #[test]
    fn test_store_persists_flag() {
        let dir = persist::temp_dir();
        let store = CommissioningStore::open(&dir);
        assert!(!store.is_commissioned());
        store.mark_commissioned();
        assert!(store.record().commissioned_at.is_some());

        let reopened = CommissioningStore::open(&dir);
        assert!(reopened.is_commissioned());
        reopened.clear().unwrap();
        assert!(!CommissioningStore::open(&dir).is_commissioned());
    }
}
