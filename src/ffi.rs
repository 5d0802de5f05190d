//! FFI bindings for repflux
//!
//! This module provides C-compatible functions for calling repflux from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `repflux_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::pipeline::AnalysisProcessor;
use crate::schema::StreamRecord;
use crate::session::ExerciseSession;
use crate::types::{AnalysisMode, ExerciseType};

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

/// Caller must free the returned string
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize to a C string, recording the error on failure
fn json_to_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Optional config JSON: NULL means defaults
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<AnalysisConfig, AnalysisError> {
    if config_json.is_null() {
        return Ok(AnalysisConfig::default());
    }
    match cstr_to_string(config_json) {
        Some(json) => AnalysisConfig::from_json(&json),
        None => Err(AnalysisError::InvalidConfig(
            "config is not valid UTF-8".to_string(),
        )),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyse a pose.landmark_stream.v1 NDJSON document and return the result JSON.
///
/// Analysis failures (unknown exercise, empty stream) are reported inside the
/// result with `success: false`; NULL is returned only for invalid arguments.
///
/// # Safety
/// - `exercise_type`, `analysis_mode` and `ndjson` must be valid null-terminated C strings.
/// - `config_json` may be NULL for default thresholds.
/// - Returns a newly allocated string that must be freed with `repflux_free_string`.
/// - Returns NULL on error; call `repflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn repflux_analyze_ndjson(
    exercise_type: *const c_char,
    analysis_mode: *const c_char,
    ndjson: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(exercise_str) = cstr_to_string(exercise_type) else {
        set_last_error("Invalid exercise_type string pointer");
        return ptr::null_mut();
    };
    let Some(mode_str) = cstr_to_string(analysis_mode) else {
        set_last_error("Invalid analysis_mode string pointer");
        return ptr::null_mut();
    };
    let Some(ndjson_str) = cstr_to_string(ndjson) else {
        set_last_error("Invalid ndjson string pointer");
        return ptr::null_mut();
    };

    let processor = match config_from_ptr(config_json).and_then(AnalysisProcessor::with_config) {
        Ok(p) => p,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let result = processor.analyze_ndjson(&exercise_str, &mode_str, &ndjson_str);
    json_to_cstr(&result)
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to a live ExerciseSession
pub struct RepfluxSessionHandle {
    session: ExerciseSession,
}

/// Start a session for frames pushed one at a time.
///
/// # Safety
/// - `exercise_type` and `analysis_mode` must be valid null-terminated C strings.
/// - `fps` <= 0 selects the configured default frame rate.
/// - `config_json` may be NULL for default thresholds.
/// - Must be freed with `repflux_session_free`.
/// - Returns NULL on error; call `repflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn repflux_session_new(
    exercise_type: *const c_char,
    analysis_mode: *const c_char,
    fps: f64,
    config_json: *const c_char,
) -> *mut RepfluxSessionHandle {
    clear_last_error();

    let Some(exercise_str) = cstr_to_string(exercise_type) else {
        set_last_error("Invalid exercise_type string pointer");
        return ptr::null_mut();
    };
    let Some(mode_str) = cstr_to_string(analysis_mode) else {
        set_last_error("Invalid analysis_mode string pointer");
        return ptr::null_mut();
    };

    let built = config_from_ptr(config_json)
        .and_then(|config| build_session(&exercise_str, &mode_str, fps, &config));

    match built {
        Ok(session) => Box::into_raw(Box::new(RepfluxSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

fn build_session(
    exercise_str: &str,
    mode_str: &str,
    fps: f64,
    config: &AnalysisConfig,
) -> Result<ExerciseSession, AnalysisError> {
    let exercise = exercise_str.parse::<ExerciseType>()?;
    let mode = mode_str.parse::<AnalysisMode>()?;
    config.validate()?;
    Ok(ExerciseSession::new(exercise, mode, config, Some(fps)))
}

/// Push one frame record and return the frame report JSON.
///
/// `frame_json` is a pose.landmark_stream.v1 frame record. A record that
/// cannot be decoded is counted as an undetected frame; the report's `fault`
/// field carries the reason. A stream header is rejected and not counted.
///
/// # Safety
/// - `session` must be a valid pointer returned by `repflux_session_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `repflux_free_string`.
/// - Returns NULL on error; call `repflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn repflux_session_push_frame(
    session: *mut RepfluxSessionHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let Some(frame_str) = cstr_to_string(frame_json) else {
        set_last_error("Invalid frame_json string pointer");
        return ptr::null_mut();
    };

    let decoded = match serde_json::from_str::<StreamRecord>(&frame_str) {
        Ok(StreamRecord::Frame(frame)) => frame.validate().map(|_| frame).map_err(|e| e.to_string()),
        Ok(StreamRecord::Stream(_)) => {
            tracing::warn!("stream header pushed as a frame");
            set_last_error("Stream header records cannot be pushed as frames");
            return ptr::null_mut();
        }
        Err(e) => Err(e.to_string()),
    };

    let report = match decoded {
        Ok(frame) => handle.session.process_frame(&frame.into_sample()),
        Err(message) => {
            let line = handle.session.frames_processed() as usize + 1;
            handle
                .session
                .skip_frame(&AnalysisError::FrameDecode { line, message })
        }
    };

    json_to_cstr(&report)
}

/// Produce the analysis result for everything pushed so far.
///
/// The session stays usable; finalizing twice yields the same result.
///
/// # Safety
/// - `session` must be a valid pointer returned by `repflux_session_new`.
/// - Returns a newly allocated string that must be freed with `repflux_free_string`.
/// - Returns NULL on error; call `repflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn repflux_session_finalize(
    session: *const RepfluxSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &*session;

    json_to_cstr(&handle.session.finalize())
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `repflux_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn repflux_session_free(session: *mut RepfluxSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by repflux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a repflux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn repflux_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next repflux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn repflux_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the engine version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn repflux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn situp_frame(knee: (f64, f64)) -> CString {
        CString::new(format!(
            r#"{{"type":"frame","landmarks":{{"left_shoulder":{{"x":0.5,"y":0.3,"visibility":0.9}},"left_hip":{{"x":0.5,"y":0.6,"visibility":0.9}},"left_knee":{{"x":{},"y":{},"visibility":0.9}}}}}}"#,
            knee.0, knee.1
        ))
        .unwrap()
    }

    unsafe fn take_json(ptr: *mut c_char) -> serde_json::Value {
        assert!(!ptr.is_null());
        let value = serde_json::from_str(CStr::from_ptr(ptr).to_str().unwrap()).unwrap();
        repflux_free_string(ptr);
        value
    }

    #[test]
    fn test_ffi_analyze_ndjson() {
        let exercise = CString::new("SITUPS").unwrap();
        let mode = CString::new("FILE").unwrap();
        let ndjson = CString::new(
            r#"{"type":"stream","schema_version":"pose.landmark_stream.v1","fps":30.0}
{"type":"frame","index":0,"landmarks":null}"#,
        )
        .unwrap();

        unsafe {
            let result = take_json(repflux_analyze_ndjson(
                exercise.as_ptr(),
                mode.as_ptr(),
                ndjson.as_ptr(),
                ptr::null(),
            ));
            assert_eq!(result["success"], true);
            assert_eq!(result["frames_processed"], 1);
            assert_eq!(result["total_reps"], 0);
            assert_eq!(result["cheat_detected"], true);
        }
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        let exercise = CString::new("SITUPS").unwrap();
        let mode = CString::new("FILE").unwrap();

        unsafe {
            let session = repflux_session_new(exercise.as_ptr(), mode.as_ptr(), 30.0, ptr::null());
            assert!(!session.is_null());

            // Torso lying flat (180 deg), curled up (~34 deg), then back down
            for knee in [(0.5, 0.9), (0.7, 0.3), (0.5, 0.9)] {
                let frame = situp_frame(knee);
                let report = take_json(repflux_session_push_frame(session, frame.as_ptr()));
                assert_eq!(report["detected"], true);
            }

            let garbage = CString::new("{not a frame").unwrap();
            let report = take_json(repflux_session_push_frame(session, garbage.as_ptr()));
            assert!(report["fault"].is_string());

            let first = take_json(repflux_session_finalize(session));
            let second = take_json(repflux_session_finalize(session));
            assert_eq!(first, second);
            assert_eq!(first["total_reps"], 1);
            assert_eq!(first["frames_processed"], 4);
            assert_eq!(first["extraction_faults"], 1);

            repflux_session_free(session);
        }
    }

    #[test]
    fn test_ffi_session_rejects_stream_header() {
        let exercise = CString::new("SITUPS").unwrap();
        let mode = CString::new("FILE").unwrap();
        let header = CString::new(
            r#"{"type":"stream","schema_version":"pose.landmark_stream.v1","fps":30.0}"#,
        )
        .unwrap();

        unsafe {
            let session = repflux_session_new(exercise.as_ptr(), mode.as_ptr(), 30.0, ptr::null());
            assert!(!session.is_null());

            let report = repflux_session_push_frame(session, header.as_ptr());
            assert!(report.is_null());
            assert!(!repflux_last_error().is_null());

            let frame = situp_frame((0.5, 0.9));
            let report = take_json(repflux_session_push_frame(session, frame.as_ptr()));
            assert_eq!(report["frame_index"], 1);
            assert!(repflux_last_error().is_null());

            let result = take_json(repflux_session_finalize(session));
            assert_eq!(result["frames_processed"], 1);
            assert_eq!(result["low_confidence_frames"], 0);
            assert_eq!(result["cheat_detected"], false);

            repflux_session_free(session);
        }
    }

    #[test]
    fn test_ffi_session_rejects_unknown_exercise() {
        let exercise = CString::new("DEADLIFT").unwrap();
        let mode = CString::new("LIVE").unwrap();

        unsafe {
            let session = repflux_session_new(exercise.as_ptr(), mode.as_ptr(), 30.0, ptr::null());
            assert!(session.is_null());

            let error = repflux_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("DEADLIFT"));
        }
    }

    #[test]
    fn test_ffi_invalid_config() {
        let exercise = CString::new("BICEP_CURLS").unwrap();
        let mode = CString::new("FILE").unwrap();
        let ndjson = CString::new("").unwrap();
        let config = CString::new(r#"{"live_cheat_ratio": 0.0}"#).unwrap();

        unsafe {
            let result = repflux_analyze_ndjson(
                exercise.as_ptr(),
                mode.as_ptr(),
                ndjson.as_ptr(),
                config.as_ptr(),
            );
            assert!(result.is_null());
            assert!(!repflux_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = repflux_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
