// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: GPL-3.0-only OR LicenseRef-Slint-Royalty-free-2.0 OR LicenseRef-Slint-Software-3.0

use core::ffi::c_void;
use std::ffi::{CString, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::context::{Context, Flags};
use crate::egl::{EglApi, LibEgl};
use crate::error::{Error, ErrorKind, Operation};
use crate::gbm::{GbmApi, LibGbm};

/// The DRM device node used for the device-backed display.
pub const DEFAULT_DEVICE_NODE: &str = "/dev/dri/card0";

/// Which display strategies [`Context::new`] may use.
#[non_exhaustive]
#[derive(Default, Copy, Clone, Eq, PartialEq, Debug)]
pub enum DisplaySelection {
    /// Use the default display, and fall back to a GBM device display if that fails.
    #[default]
    Auto,
    /// Only use the default display.
    Default,
    /// Only use a display backed by a GBM device on [`DEFAULT_DEVICE_NODE`].
    Device,
}

impl TryFrom<&str> for DisplaySelection {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Self::Auto,
            "default" => Self::Default,
            "device" | "gbm" => Self::Device,
            _ => {
                return Err(format!(
                    "Invalid display selection '{value}'. Must be one of auto, default or device"
                ));
            }
        })
    }
}

impl DisplaySelection {
    /// Reads the selection from `HEADLESS_GL_DISPLAY`.
    pub fn from_env() -> Self {
        Self::parse(std::env::var("HEADLESS_GL_DISPLAY").ok().as_deref())
    }

    /// Parses a configured value. Missing or invalid values select [`DisplaySelection::Auto`].
    pub fn parse(value: Option<&str>) -> Self {
        value.map_or(Self::Auto, |value| {
            Self::try_from(value).unwrap_or_else(|e| {
                log::warn!("{e}, using auto");
                Self::Auto
            })
        })
    }
}

fn library_names(variable: &str, defaults: &[&str]) -> Vec<OsString> {
    match std::env::var_os(variable) {
        Some(name) if !name.is_empty() => vec![name],
        _ => defaults.iter().map(OsString::from).collect(),
    }
}

/// The native libraries and settings contexts are created with.
///
/// Most applications use the process-wide [`Platform::system`], which is what
/// [`Context::new`] does. [`Platform::load`] gives a separate instance, for example to
/// pick a different [`DisplaySelection`].
///
/// The EGL and GBM entry points take raw handles and stay private to this crate:
///
/// ```compile_fail
/// let gbm = headless_gl::gbm::LibGbm::open("libgbm.so.1").unwrap();
/// ```
///
/// ```compile_fail
/// let platform = headless_gl::Platform::load().unwrap();
/// let egl = platform.egl();
/// ```
pub struct Platform {
    egl: Arc<dyn EglApi>,
    gbm: Option<Arc<dyn GbmApi>>,
    selection: DisplaySelection,
    device_node: PathBuf,
}

static SYSTEM: OnceCell<Platform> = OnceCell::new();

impl Platform {
    pub(crate) fn new(egl: Arc<dyn EglApi>, gbm: Option<Arc<dyn GbmApi>>) -> Self {
        Self { egl, gbm, selection: DisplaySelection::Auto, device_node: DEFAULT_DEVICE_NODE.into() }
    }

    pub fn with_display_selection(mut self, selection: DisplaySelection) -> Self {
        self.selection = selection;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_device_node(mut self, device_node: impl Into<PathBuf>) -> Self {
        self.device_node = device_node.into();
        self
    }

    /// Loads `libEGL` and, if available, `libgbm`, configured from the environment:
    ///
    /// * `HEADLESS_GL_EGL_LIBRARY`: path or soname of the EGL library.
    /// * `HEADLESS_GL_GBM_LIBRARY`: path or soname of the GBM library.
    /// * `HEADLESS_GL_DISPLAY`: `auto`, `default` or `device`, see [`DisplaySelection`].
    pub fn load() -> Result<Self, Error> {
        let egl = LibEgl::load_first(library_names(
            "HEADLESS_GL_EGL_LIBRARY",
            &crate::egl::DEFAULT_LIBRARY_NAMES,
        ))?;
        let gbm = match LibGbm::load_first(library_names(
            "HEADLESS_GL_GBM_LIBRARY",
            &crate::gbm::DEFAULT_LIBRARY_NAMES,
        )) {
            Ok(gbm) => Some(Arc::new(gbm) as Arc<dyn GbmApi>),
            Err(e) => {
                log::debug!("GBM is not available, the device-backed display is disabled: {e}");
                None
            }
        };
        Ok(Self::new(Arc::new(egl), gbm).with_display_selection(DisplaySelection::from_env()))
    }

    /// The process-wide platform, loaded on first use.
    ///
    /// A failed load is not cached; the next call tries again.
    pub fn system() -> Result<&'static Platform, Error> {
        SYSTEM.get_or_try_init(Self::load)
    }

    pub(crate) fn egl(&self) -> &Arc<dyn EglApi> {
        &self.egl
    }

    pub(crate) fn gbm(&self) -> Option<&Arc<dyn GbmApi>> {
        self.gbm.as_ref()
    }

    pub fn display_selection(&self) -> DisplaySelection {
        self.selection
    }

    pub fn device_node(&self) -> &Path {
        &self.device_node
    }

    /// Creates a context on a newly resolved display. See [`Context::new`].
    pub fn new_context(&self, major: u8, minor: u8, flags: Flags) -> Result<Context, Error> {
        let display = crate::display::resolve(self)?;
        Context::create(Arc::new(display), major, minor, flags, None)
    }

    /// Creates a context sharing objects with `existing`. See [`Context::new_shared`].
    pub fn new_shared_context(
        &self,
        major: u8,
        minor: u8,
        flags: Flags,
        existing: &Context,
    ) -> Result<Context, Error> {
        if !Arc::ptr_eq(existing.display().egl(), &self.egl) {
            return Err(Error::new(Operation::CreateContext, ErrorKind::BadContext));
        }
        Context::create(existing.display().clone(), major, minor, flags, Some(existing))
    }

    /// Unbinds any context from the calling thread and frees EGL's per-thread state.
    pub fn release_thread(&self) -> Result<(), Error> {
        if !self.egl.release_thread() {
            return Err(Error::egl(Operation::ReleaseThread, self.egl.get_error()));
        }
        Ok(())
    }

    /// Looks up an OpenGL or EGL function. Returns null for unknown names and for names
    /// containing a nul byte.
    pub fn get_proc_address(&self, name: &str) -> *const c_void {
        match CString::new(name) {
            Ok(name) => self.egl.get_proc_address(&name),
            Err(_) => core::ptr::null(),
        }
    }
}

#[test]
fn display_selection_parsing() {
    assert_eq!(DisplaySelection::parse(None), DisplaySelection::Auto);
    assert_eq!(DisplaySelection::parse(Some("auto")), DisplaySelection::Auto);
    assert_eq!(DisplaySelection::parse(Some("Default")), DisplaySelection::Default);
    assert_eq!(DisplaySelection::parse(Some(" device ")), DisplaySelection::Device);
    assert_eq!(DisplaySelection::parse(Some("gbm")), DisplaySelection::Device);
    assert_eq!(DisplaySelection::parse(Some("wayland")), DisplaySelection::Auto);
    assert!(DisplaySelection::try_from("wayland").is_err());
}

#[test]
fn unknown_entry_points_resolve_to_null() {
    let fixture = crate::testing::Fixture::new(Default::default());
    assert!(fixture.platform.get_proc_address("this_function_does_not_exist").is_null());
    assert!(fixture.platform.get_proc_address("glCl\0ear").is_null());
    assert!(!fixture.platform.get_proc_address("glClear").is_null());
}

#[test]
fn release_thread_clears_current_context() {
    let fixture = crate::testing::Fixture::new(Default::default());
    let context = fixture.platform.new_context(3, 3, Flags::CORE).unwrap();
    context.activate().unwrap();
    assert!(context.is_current());
    fixture.platform.release_thread().unwrap();
    assert!(!context.is_current());
    context.destroy().unwrap();
}

#[test]
fn sharing_requires_the_same_egl() {
    let first = crate::testing::Fixture::new(Default::default());
    let second = crate::testing::Fixture::new(Default::default());
    let context = first.platform.new_context(3, 3, Flags::empty()).unwrap();
    let err = second.platform.new_shared_context(3, 3, Flags::empty(), &context).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::BadContext);
    assert!(second.egl.created().is_empty());
}
