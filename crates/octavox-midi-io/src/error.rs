//! Error types for the MIDI protocol engine.
//!
//! Only construction and transport-link faults surface here. Framing errors
//! resync locally inside the reassemblers, and protocol rejections are
//! logged and dropped (MIDI has no negative-acknowledgement channel).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("device name already registered: {0}")]
    DuplicateDevice(String),

    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
