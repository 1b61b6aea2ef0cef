//! Import/export driven by an external file picker
//!
//! The picker is asynchronous and may never answer. Only one transfer can be
//! in flight; requests made while busy are rejected, never queued. After the
//! picker answers the controller stays busy for one more update so the input
//! that closed the dialog cannot start a second transfer.

use std::path::PathBuf;

use crate::persistence::SaveError;
use crate::session::{SaveSession, slot_file_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRequest {
    Import { slot: u32, activate: bool },
    Export { slot: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPhase {
    #[default]
    Idle,
    /// Picker is open
    AwaitingDialog(TransferRequest),
    /// Picker answered; cleared on the next update
    Settling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Imported { slot: u32, source: PathBuf },
    Exported { slot: u32, path: PathBuf },
    /// Picker closed without a choice
    Cancelled,
    /// Picker answered while no transfer was pending
    Ignored,
}

#[derive(Debug, Default)]
pub struct TransferController {
    phase: TransferPhase,
}

impl TransferController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase != TransferPhase::Idle
    }

    pub fn pending(&self) -> Option<TransferRequest> {
        match self.phase {
            TransferPhase::AwaitingDialog(request) => Some(request),
            _ => None,
        }
    }

    pub fn begin_import(&mut self, slot: u32, activate: bool) -> Result<(), SaveError> {
        self.begin(TransferRequest::Import { slot, activate })
    }

    pub fn begin_export(&mut self, slot: u32) -> Result<(), SaveError> {
        self.begin(TransferRequest::Export { slot })
    }

    fn begin(&mut self, request: TransferRequest) -> Result<(), SaveError> {
        if self.is_busy() {
            log::warn!("Transfer {:?} ignored, {:?} in progress", request, self.phase);
            return Err(SaveError::TransferBusy);
        }
        log::debug!("Opening file picker for {:?}", request);
        self.phase = TransferPhase::AwaitingDialog(request);
        Ok(())
    }

    /// Feed the picker's answer. `None` means the user cancelled.
    ///
    /// For exports the picked path may be a directory, in which case the
    /// default export file name is used inside it.
    pub fn resolve(
        &mut self,
        session: &mut SaveSession,
        picked: Option<PathBuf>,
    ) -> Result<TransferOutcome, SaveError> {
        let TransferPhase::AwaitingDialog(request) = self.phase else {
            log::warn!("File picker answered with no transfer pending");
            return Ok(TransferOutcome::Ignored);
        };
        self.phase = TransferPhase::Settling;

        let Some(path) = picked else {
            log::info!("{:?} cancelled", request);
            return Ok(TransferOutcome::Cancelled);
        };

        match request {
            TransferRequest::Import { slot, activate } => {
                session.import(slot, &path, activate)?;
                Ok(TransferOutcome::Imported { slot, source: path })
            }
            TransferRequest::Export { slot } => {
                let path = if path.is_dir() {
                    session.export(slot, &path, None)?
                } else {
                    session.store().export(&slot_file_name(slot), &path)?
                };
                Ok(TransferOutcome::Exported { slot, path })
            }
        }
    }

    /// Per-frame tick
    pub fn update(&mut self) {
        if self.phase == TransferPhase::Settling {
            self.phase = TransferPhase::Idle;
        }
    }
}
