//! End-to-end tests through the exported C functions.
//!
//! The library holds one process-wide simulation, so every test takes
//! `SERIAL` and starts from a shut-down state.

use std::ffi::CString;
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use libc::c_void;
use ssdsim::{
    SSDSIM_BUSY, SSDSIM_INIT_BAD_CONFIG, SSDSIM_INIT_BAD_PATH, SSDSIM_NOT_INITIALIZED,
    SSDSIM_NULL_REQUEST, SSDSIM_OK, SSDSIM_POLL_NOT_INITIALIZED, SsdCpl, SsdIo, ssdsim_init,
    ssdsim_poll, ssdsim_shutdown, ssdsim_submit,
};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    ssdsim_shutdown();
    guard
}

fn io(tag: usize, lba: u64, is_write: bool) -> SsdIo {
    SsdIo {
        user_tag: tag as *mut c_void,
        lba,
        size_bytes: 4096,
        is_write: is_write as i32,
        buf: ptr::null_mut(),
    }
}

fn empty_cpls(n: usize) -> Vec<SsdCpl> {
    vec![
        SsdCpl {
            user_tag: ptr::null_mut(),
            status: -1,
            ns: 0,
        };
        n
    ]
}

fn init_with(json: Option<&str>) -> (tempfile::TempDir, i32) {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("ssd.json");
    if let Some(json) = json {
        std::fs::write(&path, json).unwrap();
    }
    let c_path = CString::new(path.to_str().unwrap()).unwrap();
    let rc = unsafe { ssdsim_init(c_path.as_ptr()) };
    (tmp, rc)
}

#[test]
fn full_cycle_write_then_read() {
    let _g = serial();
    let (_tmp, rc) = init_with(None);
    assert_eq!(rc, SSDSIM_OK);

    let w = io(0x10, 3, true);
    let r = io(0x20, 3, false);
    assert_eq!(unsafe { ssdsim_submit(&w) }, SSDSIM_OK);
    assert_eq!(unsafe { ssdsim_submit(&r) }, SSDSIM_OK);

    let mut out = empty_cpls(4);
    let mut got = Vec::new();
    while got.len() < 2 {
        let n = unsafe { ssdsim_poll(out.len() as i32, out.as_mut_ptr()) };
        assert!(n >= 0);
        got.extend_from_slice(&out[..n as usize]);
    }
    assert_eq!(got[0].user_tag as usize, 0x10);
    assert_eq!(got[0].status, 0);
    assert_eq!(got[0].ns, 605_000);
    assert_eq!(got[1].user_tag as usize, 0x20);
    assert_eq!(got[1].ns, 605_000 + 55_000);

    ssdsim_shutdown();
}

#[test]
fn calls_before_init_fail() {
    let _g = serial();
    let req = io(1, 0, true);
    assert_eq!(unsafe { ssdsim_submit(&req) }, SSDSIM_NOT_INITIALIZED);
    let mut out = empty_cpls(1);
    assert_eq!(unsafe { ssdsim_poll(1, out.as_mut_ptr()) }, -1);
    // Shutdown without init is harmless.
    ssdsim_shutdown();
}

#[test]
fn null_arguments() {
    let _g = serial();
    assert_eq!(unsafe { ssdsim_init(ptr::null()) }, SSDSIM_INIT_BAD_PATH);
    let (_tmp, rc) = init_with(None);
    assert_eq!(rc, SSDSIM_OK);
    assert_eq!(unsafe { ssdsim_submit(ptr::null()) }, SSDSIM_NULL_REQUEST);
    assert_eq!(unsafe { ssdsim_poll(4, ptr::null_mut()) }, 0);
    let mut out = empty_cpls(1);
    assert_eq!(unsafe { ssdsim_poll(0, out.as_mut_ptr()) }, 0);
    assert_eq!(unsafe { ssdsim_poll(-3, out.as_mut_ptr()) }, 0);
    ssdsim_shutdown();
}

#[test]
fn malformed_config_rejected() {
    let _g = serial();
    let (_tmp, rc) = init_with(Some("{ definitely not json"));
    assert_eq!(rc, SSDSIM_INIT_BAD_CONFIG);
    let req = io(1, 0, true);
    assert_eq!(unsafe { ssdsim_submit(&req) }, SSDSIM_NOT_INITIALIZED);
}

#[test]
fn oversized_capacity_hint_rejected_without_abort() {
    let _g = serial();
    let (_tmp, rc) = init_with(Some(r#"{ "l2p_capacity_hint": 1000000000000000 }"#));
    assert_eq!(rc, SSDSIM_INIT_BAD_CONFIG);
    let (_tmp, rc) = init_with(Some(r#"{ "host": { "queue_depth": 1000000000000 } }"#));
    assert_eq!(rc, SSDSIM_INIT_BAD_CONFIG);
    let req = io(1, 0, true);
    assert_eq!(unsafe { ssdsim_submit(&req) }, SSDSIM_NOT_INITIALIZED);
}

#[test]
fn zero_poll_steps_rejected() {
    let _g = serial();
    let (_tmp, rc) = init_with(Some(r#"{ "host": { "poll_max_steps": 0 } }"#));
    assert_eq!(rc, SSDSIM_INIT_BAD_CONFIG);
    let mut out = empty_cpls(1);
    assert_eq!(
        unsafe { ssdsim_poll(1, out.as_mut_ptr()) },
        SSDSIM_POLL_NOT_INITIALIZED
    );
}

#[test]
fn busy_then_accepts_after_poll() {
    let _g = serial();
    let (_tmp, rc) = init_with(Some(r#"{ "host": { "queue_depth": 8 } }"#));
    assert_eq!(rc, SSDSIM_OK);

    for tag in 0..8 {
        assert_eq!(unsafe { ssdsim_submit(&io(tag, tag as u64, true)) }, SSDSIM_OK);
    }
    assert_eq!(unsafe { ssdsim_submit(&io(8, 8, true)) }, SSDSIM_BUSY);

    let mut out = empty_cpls(1);
    assert_eq!(unsafe { ssdsim_poll(1, out.as_mut_ptr()) }, 1);
    assert_eq!(out[0].user_tag as usize, 0);
    assert_eq!(unsafe { ssdsim_submit(&io(8, 8, true)) }, SSDSIM_OK);
    ssdsim_shutdown();
}

#[test]
fn double_init_is_noop() {
    let _g = serial();
    let (_tmp, rc) = init_with(Some(r#"{ "host": { "queue_depth": 1 } }"#));
    assert_eq!(rc, SSDSIM_OK);
    // Second init with a larger queue must not replace the running one.
    let (_tmp2, rc2) = init_with(None);
    assert_eq!(rc2, SSDSIM_OK);
    assert_eq!(unsafe { ssdsim_submit(&io(1, 0, true)) }, SSDSIM_OK);
    assert_eq!(unsafe { ssdsim_submit(&io(2, 1, true)) }, SSDSIM_BUSY);
    ssdsim_shutdown();
}

#[test]
fn shutdown_discards_in_flight() {
    let _g = serial();
    let (_tmp, rc) = init_with(None);
    assert_eq!(rc, SSDSIM_OK);
    assert_eq!(unsafe { ssdsim_submit(&io(1, 0, true)) }, SSDSIM_OK);
    ssdsim_shutdown();

    let (_tmp2, rc2) = init_with(None);
    assert_eq!(rc2, SSDSIM_OK);
    let mut out = empty_cpls(4);
    assert_eq!(unsafe { ssdsim_poll(4, out.as_mut_ptr()) }, 0);
    ssdsim_shutdown();
}
