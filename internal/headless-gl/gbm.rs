// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: GPL-3.0-only OR LicenseRef-Slint-Royalty-free-2.0 OR LicenseRef-Slint-Software-3.0

#![allow(unsafe_code)]

use core::ffi::{c_int, c_void};
use std::ffi::OsStr;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Operation};

/// Opaque `struct gbm_device *`.
pub type GbmDevicePtr = *mut c_void;

/// Allocation and release of GBM devices.
pub trait GbmApi: Send + Sync {
    /// Returns a null pointer on failure.
    fn create_device(&self, fd: BorrowedFd<'_>) -> GbmDevicePtr;
    fn destroy_device(&self, device: GbmDevicePtr);
}

/// Sonames tried, in order, when `HEADLESS_GL_GBM_LIBRARY` is not set.
pub const DEFAULT_LIBRARY_NAMES: [&str; 2] = ["libgbm.so.1", "libgbm.so"];

/// [`GbmApi`] backed by the system's `libgbm`, opened with `dlopen`.
pub struct LibGbm {
    create_device: unsafe extern "C" fn(c_int) -> GbmDevicePtr,
    destroy_device: unsafe extern "C" fn(GbmDevicePtr),
    _library: libloading::Library,
}

impl LibGbm {
    pub fn load_first<I>(names: I) -> Result<Self, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<OsStr>,
    {
        let mut last_err = None;
        for name in names {
            match Self::open(name.as_ref()) {
                Ok(gbm) => return Ok(gbm),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| Error::new(Operation::LoadLibrary, ErrorKind::LibraryUnavailable)))
    }

    pub fn open(name: impl AsRef<OsStr>) -> Result<Self, Error> {
        let load_err = |e: libloading::Error| {
            Error::with_source(Operation::LoadLibrary, ErrorKind::LibraryUnavailable, e)
        };
        unsafe {
            let library = libloading::Library::new(name.as_ref()).map_err(load_err)?;
            let create_device = *library
                .get::<unsafe extern "C" fn(c_int) -> GbmDevicePtr>(b"gbm_create_device")
                .map_err(load_err)?;
            let destroy_device = *library
                .get::<unsafe extern "C" fn(GbmDevicePtr)>(b"gbm_device_destroy")
                .map_err(load_err)?;
            Ok(Self { create_device, destroy_device, _library: library })
        }
    }
}

impl GbmApi for LibGbm {
    fn create_device(&self, fd: BorrowedFd<'_>) -> GbmDevicePtr {
        unsafe { (self.create_device)(fd.as_raw_fd()) }
    }

    fn destroy_device(&self, device: GbmDevicePtr) {
        unsafe { (self.destroy_device)(device) }
    }
}

/// A GBM device together with the DRM device node it was created from.
///
/// Dropping it destroys the GBM device first and then closes the file descriptor.
pub struct DeviceObject {
    gbm: Arc<dyn GbmApi>,
    device: GbmDevicePtr,
    // Declared last: the descriptor is closed after `Drop::drop` destroyed the device.
    fd: OwnedFd,
}

// The GBM device is only touched on creation and destruction.
unsafe impl Send for DeviceObject {}
unsafe impl Sync for DeviceObject {}

impl DeviceObject {
    /// Creates a GBM device on `fd`. On failure `fd` is closed before returning.
    pub fn new(gbm: Arc<dyn GbmApi>, fd: OwnedFd) -> Result<Self, Error> {
        let device = gbm.create_device(fd.as_fd());
        if device.is_null() {
            return Err(Error::new(Operation::CreateDevice, ErrorKind::DeviceError));
        }
        Ok(Self { gbm, device, fd })
    }

    pub fn as_ptr(&self) -> GbmDevicePtr {
        self.device
    }
}

impl AsFd for DeviceObject {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl Drop for DeviceObject {
    fn drop(&mut self) {
        log::trace!("Destroying GBM device on fd {}", self.fd.as_raw_fd());
        self.gbm.destroy_device(self.device);
    }
}
