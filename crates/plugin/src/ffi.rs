//! C-ABI types shared by the orchestrator and compiled plugins.
//!
//! Plugins and the host are built by separate compiler invocations, so
//! nothing crossing the boundary relies on the Rust ABI: strings travel as
//! pointer/length pairs, errors travel through a callback, and panics are
//! caught on the plugin side before they reach an `extern "C"` frame.

use std::any::Any;
use std::borrow::Cow;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::{Plugin, PluginContext};

/// Borrowed UTF-8 string passed across the boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl RawStr {
    pub fn new(value: &str) -> Self {
        Self {
            ptr: value.as_ptr(),
            len: value.len(),
        }
    }

    /// # Safety
    /// `ptr` must point to `len` readable bytes that outlive `'a`.
    pub unsafe fn as_str<'a>(self) -> Cow<'a, str> {
        if self.ptr.is_null() || self.len == 0 {
            return Cow::Borrowed("");
        }
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr, self.len) };
        String::from_utf8_lossy(bytes)
    }
}

/// Context handed to the plugin's initialize function.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawContext {
    pub name: RawStr,
    pub mod_dir: RawStr,
    pub config: RawStr,
}

/// Callback the plugin reports error messages through, outermost cause first.
#[repr(C)]
pub struct ErrorSink {
    pub data: *mut c_void,
    pub report: unsafe extern "C" fn(data: *mut c_void, message: RawStr),
}

impl ErrorSink {
    fn push(&self, message: &str) {
        unsafe { (self.report)(self.data, RawStr::new(message)) }
    }
}

/// Status returned by the initialize function.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Ok = 0,
    Failed = 1,
    Panicked = 2,
}

/// Signature of the initialize function stored in a [`PluginDeclaration`].
pub type InitializeFn =
    unsafe extern "C" fn(ctx: *const RawContext, sink: *const ErrorSink) -> InitStatus;

/// The static every plugin exports under [`crate::DECLARATION_SYMBOL`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PluginDeclaration {
    pub api_version: u32,
    pub initialize: InitializeFn,
}

/// Failure reported by a plugin's initialize function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitFailure {
    pub status: InitStatus,

    /// Error messages, outermost first.
    pub causes: Vec<String>,
}

impl InitFailure {
    /// The deepest reported cause.
    pub fn innermost(&self) -> &str {
        self.causes
            .last()
            .map(String::as_str)
            .unwrap_or("plugin reported failure without a message")
    }
}

impl PluginDeclaration {
    /// Declaration for `P` at the current API version.
    pub const fn new<P: Plugin>() -> Self {
        Self {
            api_version: crate::API_VERSION,
            initialize: trampoline::<P>,
        }
    }

    /// Calls the plugin's initialize function.
    ///
    /// # Safety
    /// `initialize` must still point into a loaded library.
    pub unsafe fn call(&self, context: &PluginContext<'_>) -> Result<(), InitFailure> {
        let mod_dir = context.mod_dir().to_string_lossy();
        let raw = RawContext {
            name: RawStr::new(context.name()),
            mod_dir: RawStr::new(&mod_dir),
            config: RawStr::new(context.config_json()),
        };

        let mut causes: Vec<String> = Vec::new();
        let sink = ErrorSink {
            data: (&mut causes as *mut Vec<String>).cast(),
            report: collect_message,
        };

        let status = unsafe { (self.initialize)(&raw, &sink) };

        match status {
            InitStatus::Ok => Ok(()),
            status => Err(InitFailure { status, causes }),
        }
    }
}

unsafe extern "C" fn collect_message(data: *mut c_void, message: RawStr) {
    let causes = unsafe { &mut *data.cast::<Vec<String>>() };
    causes.push(unsafe { message.as_str() }.into_owned());
}

unsafe extern "C" fn trampoline<P: Plugin>(
    ctx: *const RawContext,
    sink: *const ErrorSink,
) -> InitStatus {
    let (ctx, sink) = unsafe { (&*ctx, &*sink) };
    let name = unsafe { ctx.name.as_str() };
    let mod_dir = unsafe { ctx.mod_dir.as_str() };
    let config = unsafe { ctx.config.as_str() };
    let context = PluginContext::new(&name, Path::new(mod_dir.as_ref()), &config);

    match panic::catch_unwind(AssertUnwindSafe(|| P::initialize(&context))) {
        Ok(Ok(())) => InitStatus::Ok,
        Ok(Err(err)) => {
            let outermost: &(dyn std::error::Error + 'static) = &*err;
            let mut cause = Some(outermost);
            while let Some(e) = cause {
                sink.push(&e.to_string());
                cause = e.source();
            }
            InitStatus::Failed
        }
        Err(payload) => {
            sink.push(&panic_message(payload.as_ref()));
            InitStatus::Panicked
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
