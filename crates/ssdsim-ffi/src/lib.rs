//! C ABI for the SSD simulator (`libssdsim`).
//!
//! Exposes the four-function surface declared in `include/ssdsim_api.h`:
//!
//! ```c
//! int  ssdsim_init(const char* config_path);
//! int  ssdsim_submit(const ssd_io_t* req);
//! int  ssdsim_poll(int max_cpls, ssd_cpl_t* out);
//! void ssdsim_shutdown(void);
//! ```
//!
//! One simulation per process lives behind a mutex, so calls from any
//! thread are serialized. No entry point unwinds into the caller: a panic
//! inside the simulator is logged and reported as an error code.

use std::ffi::CStr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, Once, PoisonError};

use libc::{c_char, c_int, c_void};
use ssdsim_core::{Completion, IoSubmission, SimContext, SimError};

/// `ssdsim_submit`: request accepted.
pub const SSDSIM_OK: c_int = 0;
/// `ssdsim_submit`: submission queue full, retry after polling.
pub const SSDSIM_BUSY: c_int = 1;
/// `ssdsim_submit`: no simulation running.
pub const SSDSIM_NOT_INITIALIZED: c_int = 2;
/// `ssdsim_submit`: null request pointer.
pub const SSDSIM_NULL_REQUEST: c_int = 3;
/// `ssdsim_submit`: the simulator faulted; the request was not accepted.
pub const SSDSIM_INTERNAL_ERROR: c_int = 4;

/// `ssdsim_init`: config could not be loaded or was rejected.
pub const SSDSIM_INIT_BAD_CONFIG: c_int = 1;
/// `ssdsim_init`: path was null or not UTF-8.
pub const SSDSIM_INIT_BAD_PATH: c_int = 2;
/// `ssdsim_init`: the simulator faulted while starting.
pub const SSDSIM_INIT_INTERNAL_ERROR: c_int = 3;

/// `ssdsim_poll` return when no simulation is running.
pub const SSDSIM_POLL_NOT_INITIALIZED: c_int = -1;
/// `ssdsim_poll` return when the simulator faulted.
pub const SSDSIM_POLL_INTERNAL_ERROR: c_int = -2;

/// Mirror of `ssd_io_t`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SsdIo {
    pub user_tag: *mut c_void,
    pub lba: u64,
    pub size_bytes: u32,
    pub is_write: c_int,
    pub buf: *mut c_void,
}

impl SsdIo {
    fn to_submission(self) -> IoSubmission {
        IoSubmission {
            tag: self.user_tag as usize,
            lba: self.lba,
            size_bytes: self.size_bytes,
            is_write: self.is_write != 0,
            buffer: self.buf as usize,
        }
    }
}

/// Mirror of `ssd_cpl_t`. `ns` is the simulated completion time.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SsdCpl {
    pub user_tag: *mut c_void,
    pub status: c_int,
    pub ns: u64,
}

impl From<&Completion> for SsdCpl {
    fn from(cpl: &Completion) -> Self {
        Self {
            user_tag: cpl.tag as *mut c_void,
            status: cpl.status,
            ns: cpl.complete_time.as_nanos(),
        }
    }
}

static CONTEXT: Mutex<SimContext> = Mutex::new(SimContext::new());
static LOGGER: Once = Once::new();

fn context() -> MutexGuard<'static, SimContext> {
    // A panic while holding the lock is caught below; the context itself
    // is still consistent between calls.
    CONTEXT.lock().unwrap_or_else(PoisonError::into_inner)
}

fn init_logging() {
    LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .try_init();
    });
}

fn guarded<R>(name: &str, on_panic: R, f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => r,
        Err(_) => {
            log::error!("{name}: panic inside simulator");
            on_panic
        }
    }
}

/// Initialize the simulator from a JSON config file.
///
/// Returns 0 on success, including when a simulation is already running
/// (the call is then a no-op), 1 for a rejected config, 2 for a bad path
/// and 3 on an internal fault. A path that does not exist starts the
/// simulator with default settings.
///
/// # Safety
///
/// `config_path` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ssdsim_init(config_path: *const c_char) -> c_int {
    init_logging();
    if config_path.is_null() {
        log::error!("ssdsim_init: null config path");
        return SSDSIM_INIT_BAD_PATH;
    }
    // SAFETY: non-null and NUL-terminated per the contract above.
    let path = match unsafe { CStr::from_ptr(config_path) }.to_str() {
        Ok(p) => p.to_owned(),
        Err(_) => {
            log::error!("ssdsim_init: config path is not valid UTF-8");
            return SSDSIM_INIT_BAD_PATH;
        }
    };
    guarded("ssdsim_init", SSDSIM_INIT_INTERNAL_ERROR, || {
        match context().init_from_path(&path) {
            Ok(_) => SSDSIM_OK,
            Err(e) => {
                log::error!("ssdsim_init({path}): {e}");
                SSDSIM_INIT_BAD_CONFIG
            }
        }
    })
}

/// Submit one request. Never blocks.
///
/// Returns 0 when accepted, 1 when the submission queue is full, 2 when
/// not initialized, 3 for a null request and 4 on an internal fault.
///
/// # Safety
///
/// `req` must be null or point to a valid `ssd_io_t`. `user_tag` and `buf`
/// are never dereferenced.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ssdsim_submit(req: *const SsdIo) -> c_int {
    if req.is_null() {
        return SSDSIM_NULL_REQUEST;
    }
    // SAFETY: non-null and valid per the contract above.
    let sub = unsafe { *req }.to_submission();
    guarded("ssdsim_submit", SSDSIM_INTERNAL_ERROR, || {
        match context().submit(sub) {
            Ok(()) => SSDSIM_OK,
            Err(SimError::Busy { .. }) => SSDSIM_BUSY,
            Err(SimError::NotInitialized) => SSDSIM_NOT_INITIALIZED,
            Err(e) => {
                log::error!("ssdsim_submit: {e}");
                SSDSIM_INTERNAL_ERROR
            }
        }
    })
}

/// Collect up to `max_cpls` completions into `out`, advancing simulated
/// time as needed. Returns the number written, -1 if not initialized, or
/// -2 on an internal fault.
///
/// # Safety
///
/// `out` must be null or point to at least `max_cpls` writable `ssd_cpl_t`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ssdsim_poll(max_cpls: c_int, out: *mut SsdCpl) -> c_int {
    if out.is_null() || max_cpls <= 0 {
        return if context().is_initialized() {
            0
        } else {
            SSDSIM_POLL_NOT_INITIALIZED
        };
    }
    let max = max_cpls as usize;
    let polled = guarded("ssdsim_poll", Err(SSDSIM_POLL_INTERNAL_ERROR), || {
        context().poll(max).map_err(|_| SSDSIM_POLL_NOT_INITIALIZED)
    });
    let cpls = match polled {
        Ok(cpls) => cpls,
        Err(rc) => return rc,
    };
    // SAFETY: `out` holds at least `max_cpls` entries and `cpls.len() <= max`.
    let slots = unsafe { std::slice::from_raw_parts_mut(out, cpls.len()) };
    for (slot, cpl) in slots.iter_mut().zip(&cpls) {
        *slot = SsdCpl::from(cpl);
    }
    cpls.len() as c_int
}

/// Tear down the simulation. Requests in flight are discarded. Safe to
/// call when not initialized.
#[unsafe(no_mangle)]
pub extern "C" fn ssdsim_shutdown() {
    guarded("ssdsim_shutdown", (), || {
        if let Some(stats) = context().shutdown() {
            log::debug!(
                "ssdsim_shutdown: {} submitted, {} completed, {} busy",
                stats.submitted,
                stats.completed,
                stats.rejected_busy
            );
        }
    });
}
