//! Ownership of the pin bank shared by the external DAC and the external pad.
//!
//! The header doesn't bring out enough pins for both, so exactly one of them
//! holds the bank at any time. Audio routing and the input sampler both go
//! through this arbiter instead of inspecting each other's state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinBankOwner {
    AudioDac,
    ExternalController,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSink {
    #[default]
    Speaker,
    ExternalDac,
}

impl AudioSink {
    /// Who gets the bank while this sink is active.
    pub const fn bank_owner(self) -> PinBankOwner {
        match self {
            AudioSink::ExternalDac => PinBankOwner::AudioDac,
            AudioSink::Speaker => PinBankOwner::ExternalController,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PinBankArbiter {
    owner: Arc<watch::Sender<PinBankOwner>>,
}

impl PinBankArbiter {
    pub fn new(initial: PinBankOwner) -> Self {
        let (owner, _) = watch::channel(initial);
        Self {
            owner: Arc::new(owner),
        }
    }

    pub fn for_sink(sink: AudioSink) -> Self {
        Self::new(sink.bank_owner())
    }

    /// Hands the bank to `owner`. Returns `true` if ownership changed.
    pub fn grant(&self, owner: PinBankOwner) -> bool {
        let changed = self.owner.send_if_modified(|current| {
            if *current == owner {
                false
            } else {
                *current = owner;
                true
            }
        });
        if changed {
            info!("Pin bank granted to {:?}", owner);
        }
        changed
    }

    /// Routes audio to `sink` and moves the bank accordingly.
    pub fn select_audio_sink(&self, sink: AudioSink) -> bool {
        info!("Selecting audio sink {:?}", sink);
        self.grant(sink.bank_owner())
    }

    pub fn owner(&self) -> PinBankOwner {
        *self.owner.borrow()
    }

    pub fn audio_sink(&self) -> AudioSink {
        match self.owner() {
            PinBankOwner::AudioDac => AudioSink::ExternalDac,
            PinBankOwner::ExternalController => AudioSink::Speaker,
        }
    }

    pub fn controller_available(&self) -> bool {
        self.owner() == PinBankOwner::ExternalController
    }

    pub fn subscribe(&self) -> watch::Receiver<PinBankOwner> {
        self.owner.subscribe()
    }
}

impl Default for PinBankArbiter {
    fn default() -> Self {
        Self::for_sink(AudioSink::default())
    }
}
