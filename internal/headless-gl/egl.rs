// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: GPL-3.0-only OR LicenseRef-Slint-Royalty-free-2.0 OR LicenseRef-Slint-Software-3.0

//! The EGL entry points this crate needs, loaded from the system library at runtime.

#![allow(unsafe_code)]
#![allow(non_camel_case_types)]

use core::ffi::{CStr, c_char, c_void};
use std::ffi::OsStr;

use crate::error::{Error, ErrorKind, Operation};

pub type EGLint = i32;
pub type EGLenum = u32;
pub type EGLBoolean = u32;
pub type EGLAttrib = isize;
pub type EGLDisplay = *const c_void;
pub type EGLConfig = *const c_void;
pub type EGLContext = *const c_void;
pub type EGLSurface = *const c_void;
pub type EGLNativeDisplayType = *mut c_void;

pub const EGL_FALSE: EGLBoolean = 0;
pub const EGL_TRUE: EGLBoolean = 1;

pub const EGL_DEFAULT_DISPLAY: EGLNativeDisplayType = core::ptr::null_mut();
pub const EGL_NO_DISPLAY: EGLDisplay = core::ptr::null();
pub const EGL_NO_CONTEXT: EGLContext = core::ptr::null();
pub const EGL_NO_SURFACE: EGLSurface = core::ptr::null();
pub const EGL_NO_CONFIG: EGLConfig = core::ptr::null();

pub const EGL_SUCCESS: EGLint = 0x3000;
pub const EGL_NOT_INITIALIZED: EGLint = 0x3001;
pub const EGL_BAD_ACCESS: EGLint = 0x3002;
pub const EGL_BAD_ALLOC: EGLint = 0x3003;
pub const EGL_BAD_ATTRIBUTE: EGLint = 0x3004;
pub const EGL_BAD_CONFIG: EGLint = 0x3005;
pub const EGL_BAD_CONTEXT: EGLint = 0x3006;
pub const EGL_BAD_CURRENT_SURFACE: EGLint = 0x3007;
pub const EGL_BAD_DISPLAY: EGLint = 0x3008;
pub const EGL_BAD_MATCH: EGLint = 0x3009;
pub const EGL_BAD_NATIVE_PIXMAP: EGLint = 0x300A;
pub const EGL_BAD_NATIVE_WINDOW: EGLint = 0x300B;
pub const EGL_BAD_PARAMETER: EGLint = 0x300C;
pub const EGL_BAD_SURFACE: EGLint = 0x300D;
pub const EGL_CONTEXT_LOST: EGLint = 0x300E;

pub const EGL_CONFIG_CAVEAT: EGLint = 0x3027;
pub const EGL_NONE: EGLint = 0x3038;
pub const EGL_RENDERABLE_TYPE: EGLint = 0x3040;
pub const EGL_CONFORMANT: EGLint = 0x3042;
pub const EGL_OPENGL_BIT: EGLint = 0x0008;

pub const EGL_VENDOR: EGLint = 0x3053;
pub const EGL_VERSION: EGLint = 0x3054;
pub const EGL_EXTENSIONS: EGLint = 0x3055;
pub const EGL_CLIENT_APIS: EGLint = 0x308D;

pub const EGL_OPENGL_API: EGLenum = 0x30A2;

pub const EGL_CONTEXT_MAJOR_VERSION: EGLint = 0x3098;
pub const EGL_CONTEXT_MINOR_VERSION: EGLint = 0x30FB;
pub const EGL_CONTEXT_OPENGL_PROFILE_MASK: EGLint = 0x30FD;
pub const EGL_CONTEXT_OPENGL_DEBUG: EGLint = 0x31B0;
pub const EGL_CONTEXT_OPENGL_CORE_PROFILE_BIT: EGLint = 0x0001;
pub const EGL_CONTEXT_OPENGL_COMPATIBILITY_PROFILE_BIT: EGLint = 0x0002;

pub const EGL_PLATFORM_GBM_MESA: EGLenum = 0x31D7;

/// Client extensions, any of which allows `EGL_PLATFORM_GBM_MESA` displays.
pub const GBM_PLATFORM_EXTENSIONS: [&str; 2] = ["EGL_MESA_platform_gbm", "EGL_KHR_platform_gbm"];

/// The subset of EGL used to create and manage surface-less contexts.
///
/// Methods mirror the native calls one to one. A method reporting failure (`false`, `None`
/// or a null handle) leaves the reason in the thread's EGL error, to be picked up with
/// [`EglApi::get_error`] before any other call is made. Handles passed in must have been
/// returned by the same implementation.
pub trait EglApi: Send + Sync {
    fn get_error(&self) -> EGLint;
    fn get_display(&self, display_id: EGLNativeDisplayType) -> EGLDisplay;
    fn get_platform_display(&self, platform: EGLenum, native_display: *mut c_void) -> EGLDisplay;
    /// Returns the EGL version supported by the display on success.
    fn initialize(&self, display: EGLDisplay) -> Option<(EGLint, EGLint)>;
    fn terminate(&self, display: EGLDisplay) -> bool;
    fn query_string(&self, display: EGLDisplay, name: EGLint) -> Option<String>;
    /// Fills `configs` and returns the number of matching configs written.
    fn choose_config(
        &self,
        display: EGLDisplay,
        attrib_list: &[EGLint],
        configs: &mut [EGLConfig],
    ) -> Option<usize>;
    fn bind_api(&self, api: EGLenum) -> bool;
    fn create_context(
        &self,
        display: EGLDisplay,
        config: EGLConfig,
        share_context: EGLContext,
        attrib_list: &[EGLint],
    ) -> EGLContext;
    fn destroy_context(&self, display: EGLDisplay, context: EGLContext) -> bool;
    /// Binds `context` to the calling thread without draw or read surfaces.
    fn make_current(&self, display: EGLDisplay, context: EGLContext) -> bool;
    fn get_current_context(&self) -> EGLContext;
    fn release_thread(&self) -> bool;
    fn get_proc_address(&self, name: &CStr) -> *const c_void;
}

/// Sonames tried, in order, when `HEADLESS_GL_EGL_LIBRARY` is not set.
pub const DEFAULT_LIBRARY_NAMES: [&str; 2] = ["libEGL.so.1", "libEGL.so"];

type GetPlatformDisplayFn =
    unsafe extern "system" fn(EGLenum, *mut c_void, *const EGLAttrib) -> EGLDisplay;
type GetPlatformDisplayExtFn =
    unsafe extern "system" fn(EGLenum, *mut c_void, *const EGLint) -> EGLDisplay;

enum PlatformDisplayEntry {
    Core(GetPlatformDisplayFn),
    Ext(GetPlatformDisplayExtFn),
    Missing,
}

/// [`EglApi`] backed by the system's `libEGL`, opened with `dlopen`.
pub struct LibEgl {
    get_error: unsafe extern "system" fn() -> EGLint,
    get_display: unsafe extern "system" fn(EGLNativeDisplayType) -> EGLDisplay,
    get_platform_display: PlatformDisplayEntry,
    initialize: unsafe extern "system" fn(EGLDisplay, *mut EGLint, *mut EGLint) -> EGLBoolean,
    terminate: unsafe extern "system" fn(EGLDisplay) -> EGLBoolean,
    query_string: unsafe extern "system" fn(EGLDisplay, EGLint) -> *const c_char,
    choose_config: unsafe extern "system" fn(
        EGLDisplay,
        *const EGLint,
        *mut EGLConfig,
        EGLint,
        *mut EGLint,
    ) -> EGLBoolean,
    bind_api: unsafe extern "system" fn(EGLenum) -> EGLBoolean,
    create_context:
        unsafe extern "system" fn(EGLDisplay, EGLConfig, EGLContext, *const EGLint) -> EGLContext,
    destroy_context: unsafe extern "system" fn(EGLDisplay, EGLContext) -> EGLBoolean,
    make_current:
        unsafe extern "system" fn(EGLDisplay, EGLSurface, EGLSurface, EGLContext) -> EGLBoolean,
    get_current_context: unsafe extern "system" fn() -> EGLContext,
    release_thread: unsafe extern "system" fn() -> EGLBoolean,
    get_proc_address: unsafe extern "system" fn(*const c_char) -> *const c_void,
    // Must outlive the function pointers above.
    _library: libloading::Library,
}

/// Resolves `name` in `library`.
///
/// # Safety
///
/// `T` must be the function pointer type matching the C declaration of `name`.
unsafe fn symbol<T: Copy>(library: &libloading::Library, name: &[u8]) -> Result<T, Error> {
    unsafe { library.get::<T>(name) }
        .map(|symbol| *symbol)
        .map_err(|e| Error::with_source(Operation::LoadLibrary, ErrorKind::LibraryUnavailable, e))
}

impl LibEgl {
    /// Opens the first loadable library out of `names`.
    pub fn load_first<I>(names: I) -> Result<Self, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<OsStr>,
    {
        let mut last_err = None;
        for name in names {
            match Self::open(name.as_ref()) {
                Ok(egl) => return Ok(egl),
                Err(e) => {
                    log::debug!("Could not load EGL from {:?}: {e}", name.as_ref());
                    last_err = Some(e);
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| Error::new(Operation::LoadLibrary, ErrorKind::LibraryUnavailable)))
    }

    /// Opens the EGL library at `name` (a path or a soname) and resolves its entry points.
    pub fn open(name: impl AsRef<OsStr>) -> Result<Self, Error> {
        // Safety: loading libEGL runs no initialization code with preconditions of its own.
        let library = unsafe { libloading::Library::new(name.as_ref()) }.map_err(|e| {
            Error::with_source(Operation::LoadLibrary, ErrorKind::LibraryUnavailable, e)
        })?;

        // Safety: the types below match the EGL 1.5 declarations of each entry point.
        unsafe {
            let get_proc_address: unsafe extern "system" fn(*const c_char) -> *const c_void =
                symbol(&library, b"eglGetProcAddress")?;

            let get_platform_display =
                match symbol::<GetPlatformDisplayFn>(&library, b"eglGetPlatformDisplay") {
                    Ok(entry) => PlatformDisplayEntry::Core(entry),
                    Err(_) => {
                        // EGL 1.4 implementations only have the EXT variant, reachable through
                        // eglGetProcAddress.
                        let ext = get_proc_address(c"eglGetPlatformDisplayEXT".as_ptr());
                        if ext.is_null() {
                            PlatformDisplayEntry::Missing
                        } else {
                            PlatformDisplayEntry::Ext(core::mem::transmute::<
                                *const c_void,
                                GetPlatformDisplayExtFn,
                            >(ext))
                        }
                    }
                };

            Ok(Self {
                get_error: symbol(&library, b"eglGetError")?,
                get_display: symbol(&library, b"eglGetDisplay")?,
                get_platform_display,
                initialize: symbol(&library, b"eglInitialize")?,
                terminate: symbol(&library, b"eglTerminate")?,
                query_string: symbol(&library, b"eglQueryString")?,
                choose_config: symbol(&library, b"eglChooseConfig")?,
                bind_api: symbol(&library, b"eglBindAPI")?,
                create_context: symbol(&library, b"eglCreateContext")?,
                destroy_context: symbol(&library, b"eglDestroyContext")?,
                make_current: symbol(&library, b"eglMakeCurrent")?,
                get_current_context: symbol(&library, b"eglGetCurrentContext")?,
                release_thread: symbol(&library, b"eglReleaseThread")?,
                get_proc_address,
                _library: library,
            })
        }
    }
}

impl EglApi for LibEgl {
    fn get_error(&self) -> EGLint {
        unsafe { (self.get_error)() }
    }

    fn get_display(&self, display_id: EGLNativeDisplayType) -> EGLDisplay {
        unsafe { (self.get_display)(display_id) }
    }

    fn get_platform_display(&self, platform: EGLenum, native_display: *mut c_void) -> EGLDisplay {
        match self.get_platform_display {
            PlatformDisplayEntry::Core(entry) => {
                let attribs = [EGL_NONE as EGLAttrib];
                unsafe { entry(platform, native_display, attribs.as_ptr()) }
            }
            PlatformDisplayEntry::Ext(entry) => {
                let attribs = [EGL_NONE];
                unsafe { entry(platform, native_display, attribs.as_ptr()) }
            }
            PlatformDisplayEntry::Missing => EGL_NO_DISPLAY,
        }
    }

    fn initialize(&self, display: EGLDisplay) -> Option<(EGLint, EGLint)> {
        let (mut major, mut minor) = (0, 0);
        (unsafe { (self.initialize)(display, &mut major, &mut minor) } != EGL_FALSE)
            .then_some((major, minor))
    }

    fn terminate(&self, display: EGLDisplay) -> bool {
        unsafe { (self.terminate)(display) != EGL_FALSE }
    }

    fn query_string(&self, display: EGLDisplay, name: EGLint) -> Option<String> {
        let value = unsafe { (self.query_string)(display, name) };
        if value.is_null() {
            return None;
        }
        // Safety: EGL returns a static, nul-terminated string.
        Some(unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned())
    }

    fn choose_config(
        &self,
        display: EGLDisplay,
        attrib_list: &[EGLint],
        configs: &mut [EGLConfig],
    ) -> Option<usize> {
        debug_assert_eq!(attrib_list.last(), Some(&EGL_NONE));
        let mut num_configs = 0;
        let ok = unsafe {
            (self.choose_config)(
                display,
                attrib_list.as_ptr(),
                configs.as_mut_ptr(),
                configs.len() as EGLint,
                &mut num_configs,
            )
        };
        (ok != EGL_FALSE).then_some(num_configs.max(0) as usize)
    }

    fn bind_api(&self, api: EGLenum) -> bool {
        unsafe { (self.bind_api)(api) != EGL_FALSE }
    }

    fn create_context(
        &self,
        display: EGLDisplay,
        config: EGLConfig,
        share_context: EGLContext,
        attrib_list: &[EGLint],
    ) -> EGLContext {
        debug_assert_eq!(attrib_list.last(), Some(&EGL_NONE));
        unsafe { (self.create_context)(display, config, share_context, attrib_list.as_ptr()) }
    }

    fn destroy_context(&self, display: EGLDisplay, context: EGLContext) -> bool {
        unsafe { (self.destroy_context)(display, context) != EGL_FALSE }
    }

    fn make_current(&self, display: EGLDisplay, context: EGLContext) -> bool {
        unsafe { (self.make_current)(display, EGL_NO_SURFACE, EGL_NO_SURFACE, context) != EGL_FALSE }
    }

    fn get_current_context(&self) -> EGLContext {
        unsafe { (self.get_current_context)() }
    }

    fn release_thread(&self) -> bool {
        unsafe { (self.release_thread)() != EGL_FALSE }
    }

    fn get_proc_address(&self, name: &CStr) -> *const c_void {
        unsafe { (self.get_proc_address)(name.as_ptr()) }
    }
}

/// Whether `extensions`, a space separated EGL extension string, lists `name`.
pub fn has_extension(extensions: &str, name: &str) -> bool {
    extensions.split_ascii_whitespace().any(|extension| extension == name)
}

#[test]
fn extension_lookup_matches_whole_tokens() {
    let extensions = "EGL_EXT_platform_base EGL_MESA_platform_gbm_extra EGL_KHR_platform_gbm";
    assert!(has_extension(extensions, "EGL_KHR_platform_gbm"));
    assert!(!has_extension(extensions, "EGL_MESA_platform_gbm"));
    assert!(!has_extension("", "EGL_MESA_platform_gbm"));
}
