// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: GPL-3.0-only OR LicenseRef-Slint-Royalty-free-2.0 OR LicenseRef-Slint-Software-3.0

#![doc = include_str!("README.md")]
#![deny(unsafe_code)]

use core::ffi::c_void;

mod config;
mod context;
mod display;
mod egl;
mod error;
mod gbm;
mod platform;
#[cfg(test)]
mod testing;

pub use context::{Context, DisplayInfo, Flags};
pub use display::DisplayKind;
pub use error::{Error, ErrorKind, Operation};
pub use platform::{DEFAULT_DEVICE_NODE, DisplaySelection, Platform};

/// Unbinds the current context from the calling thread, so that it can be activated on
/// another thread.
pub fn release() -> Result<(), Error> {
    Platform::system()?.release_thread()
}

/// Looks up an OpenGL function in the process-wide [`Platform`].
///
/// Returns null for unknown names and when the EGL library cannot be loaded.
pub fn get_proc_address(name: &str) -> *const c_void {
    match Platform::system() {
        Ok(platform) => platform.get_proc_address(name),
        Err(e) => {
            log::debug!("Cannot look up {name}: {e}");
            core::ptr::null()
        }
    }
}
