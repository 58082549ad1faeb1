// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: GPL-3.0-only OR LicenseRef-Slint-Royalty-free-2.0 OR LicenseRef-Slint-Software-3.0

use std::sync::Arc;

use crate::egl::{self, EGLDisplay, EGLint, EglApi};
use crate::error::{Error, ErrorKind, Operation};
use crate::gbm::DeviceObject;
use crate::platform::{DisplaySelection, Platform};

/// How the display of a [`Context`](crate::Context) was obtained.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DisplayKind {
    /// `eglGetDisplay(EGL_DEFAULT_DISPLAY)`.
    Default,
    /// A GBM platform display on an open DRM device node.
    Device,
}

/// An initialized EGL display and, for device-backed displays, the GBM device it runs on.
///
/// Contexts sharing objects with each other hold the same `Display`. When the last of
/// them is gone, a device-backed display is terminated and its device released. The default
/// display is process-wide and stays initialized.
pub(crate) struct Display {
    egl: Arc<dyn EglApi>,
    handle: EGLDisplay,
    kind: DisplayKind,
    version: (EGLint, EGLint),
    device: Option<DeviceObject>,
}

// EGL display handles are valid on every thread.
#[allow(unsafe_code)]
unsafe impl Send for Display {}
#[allow(unsafe_code)]
unsafe impl Sync for Display {}

impl Display {
    pub fn egl(&self) -> &Arc<dyn EglApi> {
        &self.egl
    }

    pub fn handle(&self) -> EGLDisplay {
        self.handle
    }

    pub fn kind(&self) -> DisplayKind {
        self.kind
    }

    pub fn version(&self) -> (EGLint, EGLint) {
        self.version
    }

    #[cfg(test)]
    pub fn device(&self) -> Option<&DeviceObject> {
        self.device.as_ref()
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        if let Some(device) = self.device.take() {
            if !self.egl.terminate(self.handle) {
                let kind = ErrorKind::from_code(self.egl.get_error());
                log::warn!("Failed to terminate GBM display: {kind}");
            }
            drop(device);
        }
    }
}

/// A way of obtaining an initialized display.
pub(crate) trait DisplayStrategy {
    fn kind(&self) -> DisplayKind;

    /// On error, everything acquired along the way has been released again.
    fn resolve(&self, platform: &Platform) -> Result<Display, Error>;
}

pub(crate) struct DefaultDisplay;

impl DisplayStrategy for DefaultDisplay {
    fn kind(&self) -> DisplayKind {
        DisplayKind::Default
    }

    fn resolve(&self, platform: &Platform) -> Result<Display, Error> {
        let egl = platform.egl();
        let handle = egl.get_display(egl::EGL_DEFAULT_DISPLAY);
        if handle == egl::EGL_NO_DISPLAY {
            return Err(Error::new(Operation::GetDisplay, ErrorKind::NoDisplay));
        }
        let version = egl
            .initialize(handle)
            .ok_or_else(|| Error::egl(Operation::Initialize, egl.get_error()))?;
        Ok(Display { egl: egl.clone(), handle, kind: self.kind(), version, device: None })
    }
}

pub(crate) struct DeviceDisplay;

impl DisplayStrategy for DeviceDisplay {
    fn kind(&self) -> DisplayKind {
        DisplayKind::Device
    }

    fn resolve(&self, platform: &Platform) -> Result<Display, Error> {
        let egl = platform.egl();
        let extensions = egl.query_string(egl::EGL_NO_DISPLAY, egl::EGL_EXTENSIONS);
        let supported = extensions.as_deref().is_some_and(|extensions| {
            egl::GBM_PLATFORM_EXTENSIONS.iter().any(|name| egl::has_extension(extensions, name))
        });
        if !supported {
            return Err(Error::new(Operation::QueryExtensions, ErrorKind::Unsupported));
        }

        let gbm = platform
            .gbm()
            .ok_or_else(|| Error::new(Operation::CreateDevice, ErrorKind::DeviceError))?;

        // TODO: pick the node from the DRM devices present instead of assuming card0.
        let node = platform.device_node();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(node)
            .map_err(|e| Error::with_source(Operation::OpenDevice, ErrorKind::DeviceError, e))?;
        let device = DeviceObject::new(gbm.clone(), file.into())?;

        let handle = egl.get_platform_display(egl::EGL_PLATFORM_GBM_MESA, device.as_ptr());
        if handle == egl::EGL_NO_DISPLAY {
            return Err(Error::new(Operation::GetPlatformDisplay, ErrorKind::NoDisplay));
        }
        let version = egl
            .initialize(handle)
            .ok_or_else(|| Error::egl(Operation::Initialize, egl.get_error()))?;

        log::debug!("Using GBM display on {}", node.display());
        Ok(Display { egl: egl.clone(), handle, kind: self.kind(), version, device: Some(device) })
    }
}

/// Tries `primary`, then `fallback`. If both fail, the error of `primary` is returned.
fn resolve_with_fallback(
    platform: &Platform,
    primary: &dyn DisplayStrategy,
    fallback: &dyn DisplayStrategy,
) -> Result<Display, Error> {
    let primary_err = match primary.resolve(platform) {
        Ok(display) => return Ok(display),
        Err(e) => e,
    };
    log::debug!(
        "{:?} display unavailable ({primary_err}), trying {:?}",
        primary.kind(),
        fallback.kind()
    );
    fallback.resolve(platform).map_err(|fallback_err| {
        log::debug!("{:?} display unavailable: {fallback_err}", fallback.kind());
        primary_err
    })
}

pub(crate) fn resolve(platform: &Platform) -> Result<Display, Error> {
    match platform.display_selection() {
        DisplaySelection::Auto => resolve_with_fallback(platform, &DefaultDisplay, &DeviceDisplay),
        DisplaySelection::Default => DefaultDisplay.resolve(platform),
        DisplaySelection::Device => DeviceDisplay.resolve(platform),
    }
}
