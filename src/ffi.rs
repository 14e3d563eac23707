//! FFI bindings for cyclecast
//!
//! This module provides C-compatible functions for calling the engine from other
//! languages. Requests and responses are JSON in null-terminated C strings.
//! Returned strings are allocated here and must be freed with `cyclecast_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::pipeline::{calendar_json, cycle_stats_json, dashboard_json, trend_json};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Shared body of the JSON entry points.
///
/// A null `config_json` selects the default configuration.
unsafe fn run_request(
    request_json: *const c_char,
    config_json: *const c_char,
    compute: fn(&str, Option<&EngineConfig>) -> Result<String, EngineError>,
) -> *mut c_char {
    clear_last_error();

    let Some(request) = cstr_to_string(request_json) else {
        set_last_error("Invalid request string pointer");
        return ptr::null_mut();
    };

    let config = if config_json.is_null() {
        None
    } else {
        let Some(raw) = cstr_to_string(config_json) else {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        };
        match EngineConfig::from_json(&raw) {
            Ok(config) => Some(config),
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match compute(&request, config.as_ref()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute cycle statistics for a JSON request.
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string or NULL.
/// - Returns a newly allocated string that must be freed with `cyclecast_free_string`.
/// - Returns NULL on error; call `cyclecast_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cyclecast_stats_json(
    request_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    run_request(request_json, config_json, cycle_stats_json)
}

/// Compute a month calendar grid for a JSON request.
///
/// # Safety
/// Same contract as `cyclecast_stats_json`.
#[no_mangle]
pub unsafe extern "C" fn cyclecast_calendar_json(
    request_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    run_request(request_json, config_json, calendar_json)
}

/// Compute the dashboard context for a JSON request.
///
/// # Safety
/// Same contract as `cyclecast_stats_json`.
#[no_mangle]
pub unsafe extern "C" fn cyclecast_dashboard_json(
    request_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    run_request(request_json, config_json, dashboard_json)
}

/// Compute the cycle-length trend for a JSON request.
///
/// # Safety
/// Same contract as `cyclecast_stats_json`.
#[no_mangle]
pub unsafe extern "C" fn cyclecast_trend_json(
    request_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    run_request(request_json, config_json, trend_json)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by cyclecast functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a cyclecast function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cyclecast_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next cyclecast call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn cyclecast_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn cyclecast_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn sample_request() -> CString {
        CString::new(
            r#"{
            "records": [
                {"id": 1, "date": "2026-02-07T00:00:00Z", "is_period": true},
                {"id": 2, "date": "2026-02-16T00:00:00Z", "is_period": true}
            ],
            "baseline": {"cycle_length": 29, "period_length": 6},
            "now": "2026-02-17T08:00:00Z",
            "timezone": "UTC"
        }"#,
        )
        .unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let value = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        cyclecast_free_string(ptr);
        value
    }

    #[test]
    fn test_ffi_stats_json() {
        let request = sample_request();

        unsafe {
            let result = take_string(cyclecast_stats_json(request.as_ptr(), ptr::null()));
            assert!(result.contains("\"next_period_start\":\"2026-03-17\""));
            assert!(result.contains("\"current_phase\":\"menstrual\""));
            assert!(cyclecast_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_calendar_and_dashboard() {
        let request = sample_request();

        unsafe {
            let calendar = take_string(cyclecast_calendar_json(request.as_ptr(), ptr::null()));
            assert!(calendar.starts_with('['));
            assert!(calendar.contains("\"is_today\":true"));

            let dashboard = take_string(cyclecast_dashboard_json(request.as_ptr(), ptr::null()));
            assert!(dashboard.contains("reference_cycle_length"));

            let trend = take_string(cyclecast_trend_json(request.as_ptr(), ptr::null()));
            assert!(trend.contains("\"baseline_cycle_length\":29"));
        }
    }

    #[test]
    fn test_ffi_config_is_applied() {
        let request = sample_request();
        let config = CString::new(r#"{"luteal_phase_days": 0}"#).unwrap();

        unsafe {
            let result = cyclecast_stats_json(request.as_ptr(), config.as_ptr());
            assert!(result.is_null());

            let error = CStr::from_ptr(cyclecast_last_error()).to_str().unwrap();
            assert!(error.contains("luteal_phase_days"));
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = cyclecast_stats_json(invalid_json.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error = cyclecast_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            let result = cyclecast_stats_json(ptr::null(), ptr::null());
            assert!(result.is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = cyclecast_version();
            assert!(!version.is_null());
            assert_eq!(
                CStr::from_ptr(version).to_str().unwrap(),
                env!("CARGO_PKG_VERSION")
            );
        }
    }
}
