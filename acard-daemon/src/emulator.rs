//! Stand-in emulator: answers every APDU with one status word and reports a fixed AID registry.

use std::sync::atomic::{AtomicU64, Ordering};

use acard_core::{Emulator, SessionContext};

/// ISO 7816 "file or application not found".
pub const SW_FILE_NOT_FOUND: u16 = 0x6A82;

pub struct FixedStatusEmulator {
    status_word: u16,
    aids: Vec<String>,
    processed: AtomicU64,
}

impl FixedStatusEmulator {
    pub fn new(status_word: u16, aids: Vec<String>) -> Self {
        Self {
            status_word,
            aids,
            processed: AtomicU64::new(0),
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

impl Emulator for FixedStatusEmulator {
    fn process(&self, ctx: &SessionContext, apdu: &[u8]) -> Vec<u8> {
        self.processed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(session = %ctx.id, len = apdu.len(), "apdu");
        self.status_word.to_be_bytes().to_vec()
    }

    fn registered_aids(&self, _ctx: &SessionContext) -> Vec<String> {
        self.aids.clone()
    }

    fn deactivate(&self) {
        tracing::debug!(processed = self.processed(), "emulator deactivated");
        self.processed.store(0, Ordering::Relaxed);
    }
}
