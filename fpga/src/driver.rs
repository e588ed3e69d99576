//! Character-device access to the hasher kernel driver.
//!
//! The driver programs the registers, pulses start and sleeps on the
//! completion interrupt inside a single `read(2)` call, so one submission is
//! one blocking read of the 16-byte command record.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read as _},
    path::Path,
};

use crate::{Error, Result};

/// Default device node created for the hasher driver.
pub const DEVICE: &str = "/dev/hasher";

/// Size of the command record the driver expects.
pub const MESSAGE_LEN: usize = 16;

/// Open handle to the hasher kernel driver. Closed on drop.
pub struct Driver {
    file: File,
}

impl Driver {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|error| match error.kind() {
                io::ErrorKind::PermissionDenied => Error::SudoRequired,
                _ => Error::Io(error),
            })?;
        tracing::debug!("opened hasher driver at {}", path.display());
        Ok(Self { file })
    }

    /// Run one job to completion.
    ///
    /// Returns the driver's status: zero on success, anything else means the
    /// submission was rejected. A negative status from the driver surfaces
    /// as an I/O error.
    pub fn submit(&self, message: &[u8; MESSAGE_LEN]) -> Result<usize> {
        // the driver copies *from* the buffer handed to read(2)
        let mut message = *message;
        let status = (&self.file).read(&mut message)?;
        Ok(status)
    }
}
