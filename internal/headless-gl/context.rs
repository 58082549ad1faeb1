// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: GPL-3.0-only OR LicenseRef-Slint-Royalty-free-2.0 OR LicenseRef-Slint-Software-3.0

use core::ffi::c_void;
use std::ffi::CString;
use std::sync::Arc;

use crate::config::select_config;
use crate::display::{Display, DisplayKind};
use crate::egl::{self, EGLConfig, EGLContext, EGLDisplay, EGLint};
use crate::error::{Error, Operation};
use crate::platform::Platform;

bitflags::bitflags! {
    /// Options for a new [`Context`].
    ///
    /// `CORE` and `COMPATIBILITY` may be combined. If neither is set, a core profile
    /// context is requested.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        const CORE = 1 << 0;
        const COMPATIBILITY = 1 << 1;
        const DEBUG = 1 << 2;
    }
}

fn profile_mask(flags: Flags) -> EGLint {
    let mut mask = 0;
    if flags.contains(Flags::COMPATIBILITY) {
        mask |= egl::EGL_CONTEXT_OPENGL_COMPATIBILITY_PROFILE_BIT;
    }
    if flags.contains(Flags::CORE) || mask == 0 {
        mask |= egl::EGL_CONTEXT_OPENGL_CORE_PROFILE_BIT;
    }
    mask
}

/// The `eglCreateContext` attribute list, terminated by `EGL_NONE`.
pub(crate) fn context_attributes(major: u8, minor: u8, flags: Flags) -> Vec<EGLint> {
    let mut attribs = vec![
        egl::EGL_CONTEXT_MAJOR_VERSION,
        major.into(),
        egl::EGL_CONTEXT_MINOR_VERSION,
        minor.into(),
        egl::EGL_CONTEXT_OPENGL_PROFILE_MASK,
        profile_mask(flags),
    ];
    if flags.contains(Flags::DEBUG) {
        attribs.extend([egl::EGL_CONTEXT_OPENGL_DEBUG, egl::EGL_TRUE as EGLint]);
    }
    attribs.push(egl::EGL_NONE);
    attribs
}

fn build(
    display: &Display,
    config: EGLConfig,
    attribs: &[EGLint],
    share: EGLContext,
) -> Result<EGLContext, Error> {
    let egl = display.egl();
    if !egl.bind_api(egl::EGL_OPENGL_API) {
        return Err(Error::egl(Operation::BindApi, egl.get_error()));
    }
    let context = egl.create_context(display.handle(), config, share, attribs);
    if context == egl::EGL_NO_CONTEXT {
        return Err(Error::egl(Operation::CreateContext, egl.get_error()));
    }
    Ok(context)
}

/// Strings describing the display a [`Context`] was created on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayInfo {
    pub vendor: String,
    pub version: String,
    pub client_apis: String,
    pub extensions: Vec<String>,
    /// The version `eglInitialize` reported.
    pub egl_version: (i32, i32),
}

/// An OpenGL rendering context that is made current without a surface.
///
/// The context can be moved to another thread, but it can only be current on one thread
/// at a time: call [`Context::deactivate`] or [`release`](crate::release) on the old thread
/// before activating it on the new one.
pub struct Context {
    display: Arc<Display>,
    context: EGLContext,
    config: EGLConfig,
    version: (u8, u8),
    flags: Flags,
}

// EGL contexts may be used from any thread, as long as they are current on at most one.
#[allow(unsafe_code)]
unsafe impl Send for Context {}

impl Context {
    /// Creates a context for OpenGL `major.minor` on the process-wide [`Platform`].
    ///
    /// The default EGL display is tried first. If it cannot be initialized, a display on
    /// the GBM device `/dev/dri/card0` is used instead, unless `HEADLESS_GL_DISPLAY`
    /// selects one of the two. When both fail, the error of the default display is
    /// returned.
    pub fn new(major: u8, minor: u8, flags: Flags) -> Result<Self, Error> {
        Platform::system()?.new_context(major, minor, flags)
    }

    /// Creates a context that shares textures, buffers and other objects with `existing`.
    ///
    /// The new context uses the display of `existing`. Either context can be destroyed
    /// without affecting the other.
    pub fn new_shared(
        major: u8,
        minor: u8,
        flags: Flags,
        existing: &Context,
    ) -> Result<Self, Error> {
        Platform::system()?.new_shared_context(major, minor, flags, existing)
    }

    pub(crate) fn create(
        display: Arc<Display>,
        major: u8,
        minor: u8,
        flags: Flags,
        share: Option<&Context>,
    ) -> Result<Self, Error> {
        let config = select_config(&display)?;
        let attribs = context_attributes(major, minor, flags);
        let share_handle = share.map_or(egl::EGL_NO_CONTEXT, |share| share.context);
        let context = build(&display, config, &attribs, share_handle)?;
        log::debug!(
            "Created OpenGL {major}.{minor} context ({flags:?}) on {:?} display",
            display.kind()
        );
        Ok(Self { display, context, config, version: (major, minor), flags })
    }

    pub(crate) fn display(&self) -> &Arc<Display> {
        &self.display
    }

    /// Makes the context current on the calling thread, replacing the thread's current
    /// context if there is one.
    pub fn activate(&self) -> Result<(), Error> {
        let egl = self.display.egl();
        if !egl.bind_api(egl::EGL_OPENGL_API) {
            return Err(Error::egl(Operation::MakeCurrent, egl.get_error()));
        }
        if !egl.make_current(self.display.handle(), self.context) {
            return Err(Error::egl(Operation::MakeCurrent, egl.get_error()));
        }
        Ok(())
    }

    /// Unbinds the context if it is current on the calling thread.
    pub fn deactivate(&self) -> Result<(), Error> {
        if !self.is_current() {
            return Ok(());
        }
        let egl = self.display.egl();
        if !egl.make_current(self.display.handle(), egl::EGL_NO_CONTEXT) {
            return Err(Error::egl(Operation::MakeCurrent, egl.get_error()));
        }
        Ok(())
    }

    /// Whether this context is current on the calling thread.
    pub fn is_current(&self) -> bool {
        self.context != egl::EGL_NO_CONTEXT
            && self.display.egl().get_current_context() == self.context
    }

    /// Destroys the context. If it is current on the calling thread, it is unbound first.
    ///
    /// The display, and the GBM device backing it, are released together with the last
    /// context using them.
    pub fn destroy(mut self) -> Result<(), Error> {
        self.release()
    }

    fn release(&mut self) -> Result<(), Error> {
        let context = core::mem::replace(&mut self.context, egl::EGL_NO_CONTEXT);
        if context == egl::EGL_NO_CONTEXT {
            return Ok(());
        }
        let egl = self.display.egl();
        let display = self.display.handle();

        let mut result = Ok(());
        if egl.get_current_context() == context && !egl.make_current(display, egl::EGL_NO_CONTEXT)
        {
            result = Err(Error::egl(Operation::MakeCurrent, egl.get_error()));
        }
        if !egl.destroy_context(display, context) {
            let err = Error::egl(Operation::DestroyContext, egl.get_error());
            if result.is_ok() {
                result = Err(err);
            } else {
                log::warn!("Error destroying OpenGL context after failed unbind: {err}");
            }
        } else {
            log::trace!("Destroyed EGL context {context:?}");
        }
        result
    }

    /// Looks up an OpenGL function. Only meaningful while the context is current.
    ///
    /// Returns null for unknown names.
    pub fn get_proc_address(&self, name: &str) -> *const c_void {
        match CString::new(name) {
            Ok(name) => self.display.egl().get_proc_address(&name),
            Err(_) => core::ptr::null(),
        }
    }

    pub fn display_info(&self) -> DisplayInfo {
        let egl = self.display.egl();
        let query = |name| egl.query_string(self.display.handle(), name).unwrap_or_default();
        DisplayInfo {
            vendor: query(egl::EGL_VENDOR),
            version: query(egl::EGL_VERSION),
            client_apis: query(egl::EGL_CLIENT_APIS),
            extensions: query(egl::EGL_EXTENSIONS).split_whitespace().map(Into::into).collect(),
            egl_version: self.display.version(),
        }
    }

    /// The requested OpenGL version.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn display_kind(&self) -> DisplayKind {
        self.display.kind()
    }

    pub fn raw_display(&self) -> EGLDisplay {
        self.display.handle()
    }

    pub fn raw_context(&self) -> EGLContext {
        self.context
    }

    pub fn raw_config(&self) -> EGLConfig {
        self.config
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Error destroying OpenGL context: {e}");
        }
    }
}
