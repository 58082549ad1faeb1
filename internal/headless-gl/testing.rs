// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: GPL-3.0-only OR LicenseRef-Slint-Royalty-free-2.0 OR LicenseRef-Slint-Software-3.0

//! In-memory EGL and GBM implementations for unit tests.
//!
//! Both record every call into a shared journal so that tests can check the order in which
//! resources are acquired and released.

use core::ffi::{CStr, c_void};
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::sync::{Arc, Mutex};

use crate::egl::*;
use crate::gbm::{GbmApi, GbmDevicePtr};
use crate::platform::{DisplaySelection, Platform};

pub const DEFAULT_DISPLAY: usize = 0xd150;
pub const PLATFORM_DISPLAY: usize = 0xd160;
pub const CONFIG: usize = 0xc0f;

pub type Journal = Arc<Mutex<Vec<String>>>;

/// What the fake EGL implementation lets succeed.
#[derive(Clone, Debug)]
pub struct Behavior {
    pub default_display: bool,
    pub default_initialize: bool,
    pub client_extensions: Option<String>,
    pub platform_display: bool,
    pub platform_initialize: bool,
    pub choose_config: bool,
    pub matching_configs: usize,
    pub bind_api: bool,
    pub create_context: bool,
    pub destroy_context: bool,
    pub make_current: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            default_display: true,
            default_initialize: true,
            client_extensions: Some("EGL_EXT_platform_base EGL_MESA_platform_gbm".into()),
            platform_display: true,
            platform_initialize: true,
            choose_config: true,
            matching_configs: 3,
            bind_api: true,
            create_context: true,
            destroy_context: true,
            make_current: true,
        }
    }
}

impl Behavior {
    /// No default display is reachable, as on a machine without a display server.
    pub fn without_default_display() -> Self {
        Self { default_display: false, ..Default::default() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreatedContext {
    pub handle: usize,
    pub display: usize,
    pub config: usize,
    pub share: usize,
    pub attribs: Vec<EGLint>,
}

#[derive(Default)]
struct EglState {
    behavior: Behavior,
    error: Option<EGLint>,
    next_context: usize,
    created: Vec<CreatedContext>,
    live: Vec<usize>,
    current: usize,
    bound_api: Option<EGLenum>,
    platform_native_display: Option<usize>,
    config_attribs: Vec<EGLint>,
}

pub struct FakeEgl {
    state: Mutex<EglState>,
    journal: Journal,
}

impl FakeEgl {
    pub fn new(behavior: Behavior, journal: Journal) -> Self {
        Self {
            state: Mutex::new(EglState { behavior, next_context: 0x100, ..Default::default() }),
            journal,
        }
    }

    pub fn set_behavior(&self, f: impl FnOnce(&mut Behavior)) {
        f(&mut self.state.lock().unwrap().behavior)
    }

    pub fn created(&self) -> Vec<CreatedContext> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn last_created(&self) -> CreatedContext {
        self.created().pop().expect("no context was created")
    }

    pub fn live_contexts(&self) -> Vec<usize> {
        self.state.lock().unwrap().live.clone()
    }

    pub fn current(&self) -> usize {
        self.state.lock().unwrap().current
    }

    pub fn bound_api(&self) -> Option<EGLenum> {
        self.state.lock().unwrap().bound_api
    }

    pub fn platform_native_display(&self) -> Option<usize> {
        self.state.lock().unwrap().platform_native_display
    }

    pub fn config_attribs(&self) -> Vec<EGLint> {
        self.state.lock().unwrap().config_attribs.clone()
    }

    fn record(&self, call: &str) {
        self.journal.lock().unwrap().push(call.into());
    }

    fn fail(state: &mut EglState, code: EGLint) {
        state.error = Some(code);
    }
}

impl EglApi for FakeEgl {
    fn get_error(&self) -> EGLint {
        self.state.lock().unwrap().error.take().unwrap_or(EGL_SUCCESS)
    }

    fn get_display(&self, display_id: EGLNativeDisplayType) -> EGLDisplay {
        self.record("eglGetDisplay");
        assert!(display_id.is_null());
        let state = self.state.lock().unwrap();
        if state.behavior.default_display { DEFAULT_DISPLAY as EGLDisplay } else { EGL_NO_DISPLAY }
    }

    fn get_platform_display(&self, platform: EGLenum, native_display: *mut c_void) -> EGLDisplay {
        self.record("eglGetPlatformDisplay");
        assert_eq!(platform, EGL_PLATFORM_GBM_MESA);
        let mut state = self.state.lock().unwrap();
        state.platform_native_display = Some(native_display as usize);
        if state.behavior.platform_display {
            PLATFORM_DISPLAY as EGLDisplay
        } else {
            Self::fail(&mut state, EGL_BAD_PARAMETER);
            EGL_NO_DISPLAY
        }
    }

    fn initialize(&self, display: EGLDisplay) -> Option<(EGLint, EGLint)> {
        self.record("eglInitialize");
        let mut state = self.state.lock().unwrap();
        let ok = match display as usize {
            DEFAULT_DISPLAY => state.behavior.default_initialize,
            PLATFORM_DISPLAY => state.behavior.platform_initialize,
            _ => {
                Self::fail(&mut state, EGL_BAD_DISPLAY);
                return None;
            }
        };
        if !ok {
            Self::fail(&mut state, EGL_NOT_INITIALIZED);
            return None;
        }
        Some((1, 5))
    }

    fn terminate(&self, _display: EGLDisplay) -> bool {
        self.record("eglTerminate");
        true
    }

    fn query_string(&self, display: EGLDisplay, name: EGLint) -> Option<String> {
        let state = self.state.lock().unwrap();
        if display.is_null() {
            return (name == EGL_EXTENSIONS).then(|| state.behavior.client_extensions.clone())?;
        }
        Some(
            match name {
                EGL_VENDOR => "Fake Vendor",
                EGL_VERSION => "1.5 Fake",
                EGL_CLIENT_APIS => "OpenGL OpenGL_ES",
                EGL_EXTENSIONS => "EGL_KHR_create_context EGL_KHR_surfaceless_context",
                _ => return None,
            }
            .into(),
        )
    }

    fn choose_config(
        &self,
        _display: EGLDisplay,
        attrib_list: &[EGLint],
        configs: &mut [EGLConfig],
    ) -> Option<usize> {
        self.record("eglChooseConfig");
        let mut state = self.state.lock().unwrap();
        state.config_attribs = attrib_list.to_vec();
        if !state.behavior.choose_config {
            Self::fail(&mut state, EGL_BAD_ATTRIBUTE);
            return None;
        }
        let count = state.behavior.matching_configs.min(configs.len());
        for config in &mut configs[..count] {
            *config = CONFIG as EGLConfig;
        }
        Some(count)
    }

    fn bind_api(&self, api: EGLenum) -> bool {
        self.record("eglBindAPI");
        let mut state = self.state.lock().unwrap();
        if !state.behavior.bind_api {
            Self::fail(&mut state, EGL_BAD_PARAMETER);
            return false;
        }
        state.bound_api = Some(api);
        true
    }

    fn create_context(
        &self,
        display: EGLDisplay,
        config: EGLConfig,
        share_context: EGLContext,
        attrib_list: &[EGLint],
    ) -> EGLContext {
        self.record("eglCreateContext");
        let mut state = self.state.lock().unwrap();
        if !state.behavior.create_context {
            Self::fail(&mut state, EGL_BAD_MATCH);
            return EGL_NO_CONTEXT;
        }
        if !share_context.is_null() && !state.live.contains(&(share_context as usize)) {
            Self::fail(&mut state, EGL_BAD_CONTEXT);
            return EGL_NO_CONTEXT;
        }
        let handle = state.next_context;
        state.next_context += 0x10;
        state.live.push(handle);
        state.created.push(CreatedContext {
            handle,
            display: display as usize,
            config: config as usize,
            share: share_context as usize,
            attribs: attrib_list.to_vec(),
        });
        handle as EGLContext
    }

    fn destroy_context(&self, _display: EGLDisplay, context: EGLContext) -> bool {
        self.record("eglDestroyContext");
        let mut state = self.state.lock().unwrap();
        let handle = context as usize;
        if !state.behavior.destroy_context || !state.live.contains(&handle) {
            Self::fail(&mut state, EGL_BAD_CONTEXT);
            return false;
        }
        state.live.retain(|live| *live != handle);
        true
    }

    fn make_current(&self, _display: EGLDisplay, context: EGLContext) -> bool {
        self.record("eglMakeCurrent");
        let mut state = self.state.lock().unwrap();
        let handle = context as usize;
        if !state.behavior.make_current {
            Self::fail(&mut state, EGL_BAD_ACCESS);
            return false;
        }
        if handle != 0 && !state.live.contains(&handle) {
            Self::fail(&mut state, EGL_BAD_CONTEXT);
            return false;
        }
        state.current = handle;
        true
    }

    fn get_current_context(&self) -> EGLContext {
        self.state.lock().unwrap().current as EGLContext
    }

    fn release_thread(&self) -> bool {
        self.record("eglReleaseThread");
        self.state.lock().unwrap().current = 0;
        true
    }

    fn get_proc_address(&self, name: &CStr) -> *const c_void {
        match name.to_bytes() {
            b"glClear" => 0x6c01 as *const c_void,
            b"glGetString" => 0x6c02 as *const c_void,
            _ => core::ptr::null(),
        }
    }
}

#[derive(Default)]
struct GbmState {
    fail: bool,
    next: usize,
    live: Vec<usize>,
    destroyed: Vec<usize>,
    fds: Vec<RawFd>,
}

#[derive(Default)]
pub struct FakeGbm {
    state: Mutex<GbmState>,
    journal: Journal,
}

impl FakeGbm {
    pub fn with_journal(journal: Journal) -> Self {
        Self { state: Default::default(), journal }
    }

    pub fn failing() -> Self {
        Self { state: Mutex::new(GbmState { fail: true, ..Default::default() }), ..Default::default() }
    }

    pub fn set_failing(&self, fail: bool) {
        self.state.lock().unwrap().fail = fail;
    }

    pub fn live_devices(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().next
    }

    pub fn destroyed(&self) -> Vec<GbmDevicePtr> {
        self.state.lock().unwrap().destroyed.iter().map(|ptr| *ptr as GbmDevicePtr).collect()
    }

    pub fn fds(&self) -> Vec<RawFd> {
        self.state.lock().unwrap().fds.clone()
    }
}

impl GbmApi for FakeGbm {
    fn create_device(&self, fd: BorrowedFd<'_>) -> GbmDevicePtr {
        self.journal.lock().unwrap().push("gbm_create_device".into());
        let mut state = self.state.lock().unwrap();
        state.fds.push(fd.as_raw_fd());
        if state.fail {
            return core::ptr::null_mut();
        }
        state.next += 1;
        let device = 0x9b00 + state.next;
        state.live.push(device);
        device as GbmDevicePtr
    }

    fn destroy_device(&self, device: GbmDevicePtr) {
        self.journal.lock().unwrap().push("gbm_device_destroy".into());
        let mut state = self.state.lock().unwrap();
        let device = device as usize;
        assert!(state.live.contains(&device), "destroying unknown GBM device {device:#x}");
        state.live.retain(|live| *live != device);
        state.destroyed.push(device);
    }
}

/// A platform over fresh fakes, using `/dev/null` as the DRM device node.
pub struct Fixture {
    pub egl: Arc<FakeEgl>,
    pub gbm: Arc<FakeGbm>,
    pub journal: Journal,
    pub platform: Platform,
}

impl Fixture {
    pub fn new(behavior: Behavior) -> Self {
        let journal = Journal::default();
        let egl = Arc::new(FakeEgl::new(behavior, journal.clone()));
        let gbm = Arc::new(FakeGbm::with_journal(journal.clone()));
        let platform = Platform::new(egl.clone(), Some(gbm.clone() as Arc<dyn GbmApi>))
            .with_device_node("/dev/null");
        Self { egl, gbm, journal, platform }
    }

    pub fn select(mut self, selection: DisplaySelection) -> Self {
        self.platform = self.platform.with_display_selection(selection);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.journal.lock().unwrap().clear();
    }

    /// Index of the first journal entry equal to `call`.
    pub fn position(&self, call: &str) -> usize {
        let calls = self.calls();
        calls.iter().position(|c| c == call).unwrap_or_else(|| panic!("{call} not in {calls:?}"))
    }
}
