//! `ssdsim probe`: load libssdsim the way a benchmark plugin does and
//! run one request through it.

use std::ffi::{CStr, CString};
use std::ptr;

use libc::{c_char, c_int, c_void};

/// Environment variable that overrides the library location.
pub const LIB_PATH_ENV: &str = "SSD_SIM_LIB_PATH";

#[cfg(target_os = "macos")]
pub const DEFAULT_LIB_PATH: &str = "./libssdsim.dylib";
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_LIB_PATH: &str = "./libssdsim.so";

// Fields are read by the loaded library.
#[allow(dead_code)]
#[repr(C)]
struct SsdIo {
    user_tag: *mut c_void,
    lba: u64,
    size_bytes: u32,
    is_write: c_int,
    buf: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct SsdCpl {
    user_tag: *mut c_void,
    status: c_int,
    ns: u64,
}

type InitFn = unsafe extern "C" fn(*const c_char) -> c_int;
type SubmitFn = unsafe extern "C" fn(*const SsdIo) -> c_int;
type PollFn = unsafe extern "C" fn(c_int, *mut SsdCpl) -> c_int;
type ShutdownFn = unsafe extern "C" fn();

/// Pick the library path: explicit flag, then the env override, then the
/// platform default.
pub fn resolve_library_path(explicit: Option<&str>, env: Option<String>) -> String {
    explicit
        .map(str::to_string)
        .or(env)
        .unwrap_or_else(|| DEFAULT_LIB_PATH.to_string())
}

fn last_dl_error() -> String {
    // SAFETY: dlerror returns null or a valid C string owned by libc.
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        "unknown error".to_string()
    } else {
        unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
    }
}

/// A `dlopen` handle, closed on drop.
pub struct Library {
    handle: *mut c_void,
}

impl Library {
    pub fn open(path: &str) -> Result<Self, String> {
        let c_path = CString::new(path).map_err(|_| format!("path contains NUL: {path}"))?;
        // SAFETY: c_path is a valid NUL-terminated string.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_LAZY | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(format!("dlopen({path}) failed: {}", last_dl_error()));
        }
        Ok(Self { handle })
    }

    fn symbol(&self, name: &str) -> Result<*mut c_void, String> {
        let c_name = CString::new(name).map_err(|_| format!("bad symbol name: {name}"))?;
        // SAFETY: handle is open and c_name is NUL-terminated.
        let sym = unsafe { libc::dlsym(self.handle, c_name.as_ptr()) };
        if sym.is_null() {
            Err(format!("missing symbol {name}: {}", last_dl_error()))
        } else {
            Ok(sym)
        }
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        // SAFETY: handle came from a successful dlopen and is closed once.
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

struct Api {
    init: InitFn,
    submit: SubmitFn,
    poll: PollFn,
    shutdown: ShutdownFn,
}

impl Api {
    fn resolve(lib: &Library) -> Result<Self, String> {
        let init = lib.symbol("ssdsim_init")?;
        let submit = lib.symbol("ssdsim_submit")?;
        let poll = lib.symbol("ssdsim_poll")?;
        let shutdown = lib.symbol("ssdsim_shutdown")?;
        // SAFETY: the symbols are the functions declared in ssdsim_api.h,
        // with the signatures above.
        unsafe {
            Ok(Self {
                init: std::mem::transmute::<*mut c_void, InitFn>(init),
                submit: std::mem::transmute::<*mut c_void, SubmitFn>(submit),
                poll: std::mem::transmute::<*mut c_void, PollFn>(poll),
                shutdown: std::mem::transmute::<*mut c_void, ShutdownFn>(shutdown),
            })
        }
    }
}

/// Outcome of the one-request smoke cycle.
#[derive(Debug)]
pub struct SmokeResult {
    pub init_rc: i32,
    pub submit_rc: i32,
    pub polls: u32,
    pub completion_ns: Option<u64>,
    pub status: Option<i32>,
}

const MAX_POLLS: u32 = 1000;

fn smoke(api: &Api, config_path: &str) -> Result<SmokeResult, String> {
    let c_cfg = CString::new(config_path).map_err(|_| "config path contains NUL".to_string())?;
    // SAFETY: calls follow the contract in ssdsim_api.h.
    let init_rc = unsafe { (api.init)(c_cfg.as_ptr()) };
    let mut result = SmokeResult {
        init_rc,
        submit_rc: -1,
        polls: 0,
        completion_ns: None,
        status: None,
    };
    if init_rc != 0 {
        return Ok(result);
    }

    let tag = 0x5eed_usize;
    let req = SsdIo {
        user_tag: tag as *mut c_void,
        lba: 0,
        size_bytes: 4096,
        is_write: 1,
        buf: ptr::null_mut(),
    };
    result.submit_rc = unsafe { (api.submit)(&req) };
    if result.submit_rc == 0 {
        let mut out = [SsdCpl {
            user_tag: ptr::null_mut(),
            status: -1,
            ns: 0,
        }; 1];
        while result.polls < MAX_POLLS {
            result.polls += 1;
            let n = unsafe { (api.poll)(1, out.as_mut_ptr()) };
            if n > 0 {
                if out[0].user_tag as usize != tag {
                    log::warn!("completion carried unexpected tag {:p}", out[0].user_tag);
                }
                result.completion_ns = Some(out[0].ns);
                result.status = Some(out[0].status);
                break;
            }
            if n < 0 {
                break;
            }
        }
    }
    unsafe { (api.shutdown)() };
    Ok(result)
}

/// Run the probe command.
pub fn run(lib: Option<&str>, config_path: &str) {
    let path = resolve_library_path(lib, std::env::var(LIB_PATH_ENV).ok());
    println!("Probing: {path}");

    let library = Library::open(&path).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let api = Api::resolve(&library).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    println!("  Symbols:   ssdsim_init, ssdsim_submit, ssdsim_poll, ssdsim_shutdown");

    let r = smoke(&api, config_path).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    println!("  init:      rc={}", r.init_rc);
    if r.init_rc != 0 {
        eprintln!("ssdsim_init({config_path}) failed");
        std::process::exit(1);
    }
    println!("  submit:    rc={}", r.submit_rc);
    match (r.completion_ns, r.status) {
        (Some(ns), Some(status)) => {
            println!("  poll:      1 completion after {} call(s)", r.polls);
            println!("  status:    {status}");
            println!("  complete:  {:.3} us (simulated)", ns as f64 / 1e3);
        }
        _ => {
            eprintln!("No completion after {} poll(s)", r.polls);
            std::process::exit(1);
        }
    }
}
