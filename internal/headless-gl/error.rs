// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: GPL-3.0-only OR LicenseRef-Slint-Royalty-free-2.0 OR LicenseRef-Slint-Software-3.0

use std::sync::Arc;

use crate::egl::{self, EGLint};

/// The cause of a failure, either mapped from an EGL error code or raised by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Error, derive_more::Display)]
#[non_exhaustive]
pub enum ErrorKind {
    /// EGL is not initialized, or could not be initialized, for the display.
    #[display("not initialized")]
    NotInitialized,
    #[display("bad access")]
    BadAccess,
    #[display("bad alloc")]
    BadAlloc,
    #[display("bad attribute")]
    BadAttribute,
    #[display("bad config")]
    BadConfig,
    #[display("bad context")]
    BadContext,
    #[display("bad current surface")]
    BadCurrentSurface,
    #[display("bad display")]
    BadDisplay,
    #[display("bad match")]
    BadMatch,
    #[display("bad native pixmap")]
    BadNativePixmap,
    #[display("bad native window")]
    BadNativeWindow,
    #[display("bad parameter")]
    BadParameter,
    #[display("bad surface")]
    BadSurface,
    /// A power management event occurred and the context must be recreated.
    #[display("context lost")]
    ContextLost,
    /// An error code outside of the EGL 1.5 error table.
    #[display("unknown error: {_0:#x}")]
    Unknown(#[error(not(source))] EGLint),
    /// No EGL display could be obtained.
    #[display("no valid EGL display")]
    NoDisplay,
    /// The display has no configuration satisfying the rendering requirements.
    #[display("no valid EGL config")]
    NoConfig,
    /// The client extension needed for the device-backed display is not advertised.
    #[display("extension is unsupported")]
    Unsupported,
    /// The DRM device node could not be opened or no GBM device could be created for it.
    #[display("GBM device error")]
    DeviceError,
    /// The EGL library, or one of the entry points this crate requires, could not be loaded.
    #[display("EGL library unavailable")]
    LibraryUnavailable,
}

impl ErrorKind {
    /// Maps a code returned by `eglGetError` to an error kind.
    ///
    /// `EGL_SUCCESS` is not an error and maps to `Unknown`; callers only map codes after a
    /// call reported failure.
    pub fn from_code(code: EGLint) -> Self {
        match code {
            egl::EGL_NOT_INITIALIZED => Self::NotInitialized,
            egl::EGL_BAD_ACCESS => Self::BadAccess,
            egl::EGL_BAD_ALLOC => Self::BadAlloc,
            egl::EGL_BAD_ATTRIBUTE => Self::BadAttribute,
            egl::EGL_BAD_CONFIG => Self::BadConfig,
            egl::EGL_BAD_CONTEXT => Self::BadContext,
            egl::EGL_BAD_CURRENT_SURFACE => Self::BadCurrentSurface,
            egl::EGL_BAD_DISPLAY => Self::BadDisplay,
            egl::EGL_BAD_MATCH => Self::BadMatch,
            egl::EGL_BAD_NATIVE_PIXMAP => Self::BadNativePixmap,
            egl::EGL_BAD_NATIVE_WINDOW => Self::BadNativeWindow,
            egl::EGL_BAD_PARAMETER => Self::BadParameter,
            egl::EGL_BAD_SURFACE => Self::BadSurface,
            egl::EGL_CONTEXT_LOST => Self::ContextLost,
            code => Self::Unknown(code),
        }
    }

    /// Returns the EGL error code this kind was mapped from, if it corresponds to one.
    pub fn code(&self) -> Option<EGLint> {
        Some(match self {
            Self::NotInitialized => egl::EGL_NOT_INITIALIZED,
            Self::BadAccess => egl::EGL_BAD_ACCESS,
            Self::BadAlloc => egl::EGL_BAD_ALLOC,
            Self::BadAttribute => egl::EGL_BAD_ATTRIBUTE,
            Self::BadConfig => egl::EGL_BAD_CONFIG,
            Self::BadContext => egl::EGL_BAD_CONTEXT,
            Self::BadCurrentSurface => egl::EGL_BAD_CURRENT_SURFACE,
            Self::BadDisplay => egl::EGL_BAD_DISPLAY,
            Self::BadMatch => egl::EGL_BAD_MATCH,
            Self::BadNativePixmap => egl::EGL_BAD_NATIVE_PIXMAP,
            Self::BadNativeWindow => egl::EGL_BAD_NATIVE_WINDOW,
            Self::BadParameter => egl::EGL_BAD_PARAMETER,
            Self::BadSurface => egl::EGL_BAD_SURFACE,
            Self::ContextLost => egl::EGL_CONTEXT_LOST,
            Self::Unknown(code) => *code,
            Self::NoDisplay
            | Self::NoConfig
            | Self::Unsupported
            | Self::DeviceError
            | Self::LibraryUnavailable => return None,
        })
    }
}

/// The step of context setup or use that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[non_exhaustive]
pub enum Operation {
    #[display("dlopen")]
    LoadLibrary,
    #[display("eglGetDisplay")]
    GetDisplay,
    #[display("eglInitialize")]
    Initialize,
    #[display("eglQueryString")]
    QueryExtensions,
    #[display("open")]
    OpenDevice,
    #[display("gbm_create_device")]
    CreateDevice,
    #[display("eglGetPlatformDisplay")]
    GetPlatformDisplay,
    #[display("eglChooseConfig")]
    ChooseConfig,
    #[display("eglBindAPI")]
    BindApi,
    #[display("eglCreateContext")]
    CreateContext,
    #[display("eglMakeCurrent")]
    MakeCurrent,
    #[display("eglDestroyContext")]
    DestroyContext,
    #[display("eglReleaseThread")]
    ReleaseThread,
}

impl Operation {
    /// Whether this operation only runs on a context that was successfully created.
    ///
    /// Failures of these operations are not expected at runtime; they indicate a handle
    /// that was invalidated behind the back of its [`Context`](crate::Context).
    pub fn is_post_construction(&self) -> bool {
        matches!(self, Self::MakeCurrent | Self::DestroyContext | Self::ReleaseThread)
    }
}

/// Error returned when creating, activating or destroying a context fails.
#[derive(Debug, Clone)]
pub struct Error {
    operation: Operation,
    kind: ErrorKind,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub(crate) fn new(operation: Operation, kind: ErrorKind) -> Self {
        Self { operation, kind, source: None }
    }

    pub(crate) fn with_source(
        operation: Operation,
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { operation, kind, source: Some(Arc::new(source)) }
    }

    /// Builds an error from an EGL error code. Must be called right after the failing call,
    /// before anything else talks to EGL on this thread.
    pub(crate) fn egl(operation: Operation, code: EGLint) -> Self {
        Self::new(operation, ErrorKind::from_code(code))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The raw EGL error code, for errors reported by EGL itself.
    pub fn code(&self) -> Option<EGLint> {
        self.kind.code()
    }

    /// True for failures of [`Context::activate`](crate::Context::activate),
    /// [`Context::destroy`](crate::Context::destroy) and [`release`](crate::release).
    ///
    /// These never fail on a valid context, so such an error means the context or its
    /// display was invalidated by someone else. Construction errors return false.
    pub fn is_invariant_violation(&self) -> bool {
        self.operation.is_post_construction()
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.operation, self.kind)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.source {
            Some(source) => Some(source.as_ref()),
            None => Some(&self.kind),
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.operation == other.operation && self.kind == other.kind
    }
}

#[test]
fn native_codes_round_trip_through_kind() {
    for code in egl::EGL_NOT_INITIALIZED..=egl::EGL_CONTEXT_LOST {
        let kind = ErrorKind::from_code(code);
        assert!(!matches!(kind, ErrorKind::Unknown(_)), "{code:#x} should be a known code");
        assert_eq!(kind.code(), Some(code));
    }
}

#[test]
fn unknown_code_keeps_raw_value() {
    let kind = ErrorKind::from_code(0x4242);
    assert_eq!(kind, ErrorKind::Unknown(0x4242));
    assert_eq!(kind.to_string(), "unknown error: 0x4242");
    assert_eq!(ErrorKind::from_code(egl::EGL_SUCCESS), ErrorKind::Unknown(egl::EGL_SUCCESS));
}

#[test]
fn local_kinds_have_no_native_code() {
    assert_eq!(ErrorKind::NoConfig.code(), None);
    assert_eq!(ErrorKind::NoDisplay.code(), None);
    assert_eq!(ErrorKind::Unsupported.code(), None);
    assert_eq!(ErrorKind::DeviceError.code(), None);
}

#[test]
fn display_names_the_failing_call() {
    let err = Error::egl(Operation::Initialize, egl::EGL_BAD_DISPLAY);
    assert_eq!(err.to_string(), "eglInitialize: bad display");
    assert!(!err.is_invariant_violation());

    let err = Error::egl(Operation::MakeCurrent, egl::EGL_BAD_CONTEXT);
    assert_eq!(err.to_string(), "eglMakeCurrent: bad context");
    assert!(err.is_invariant_violation());
}

#[test]
fn io_source_is_exposed() {
    use std::error::Error as _;

    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such device");
    let err = Error::with_source(Operation::OpenDevice, ErrorKind::DeviceError, io);
    assert_eq!(err.to_string(), "open: GBM device error (no such device)");
    assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("no such device"));
}
