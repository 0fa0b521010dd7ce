//! rdp-known-hosts C FFI bindings.
//!
//! Provides a C-compatible API over the certificate store so a C connection
//! layer can make its trust-on-first-use decision: build certificate data
//! from the presented PEM, look up the endpoint, and save or compare.
//!
#![allow(clippy::doc_overindented_list_items)]
//! # Memory contract
//!
//! - All `*mut c_char` output strings are heap-allocated via [`CString`] and
//!   **must** be freed by the caller using [`rkh_free_string`].
//! - Opaque store handles **must** be freed using [`rkh_store_free`], and
//!   opaque certificate data handles using [`rkh_data_free`].
//! - The static string returned by [`rkh_version`] must **not** be freed.
//!
//! # Error codes
//!
//! | Constant                 | Value | Meaning                              |
//! |--------------------------|-------|--------------------------------------|
//! | `RKH_OK`                 | 0     | Success                              |
//! | `RKH_ERR_NULL_PTR`       | -1    | A required pointer was null          |
//! | `RKH_ERR_INVALID_UTF8`   | -2    | A string was not valid UTF-8         |
//! | `RKH_ERR_PARSE`          | -3    | Certificate or config did not parse  |
//! | `RKH_ERR_INVALID_RECORD` | -4    | Host or fingerprint not storable     |
//! | `RKH_ERR_IO`             | -5    | Filesystem I/O failure               |
//! | `RKH_ERR_LOCK_TIMEOUT`   | -6    | Another writer held the store        |
//! | `RKH_ERR_NOT_FOUND`      | -7    | No record for the endpoint           |

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

use rdp_known_hosts::{
    compare, compare_ex, CertificateData, CertificateStore, StoreError, StoreOptions,
    TrustStatus,
};

// ── Error codes ───────────────────────────────────────────────────────────────

/// Success.
pub const RKH_OK: i32 = 0;
/// A required pointer argument was null.
pub const RKH_ERR_NULL_PTR: i32 = -1;
/// A string argument contained invalid UTF-8.
pub const RKH_ERR_INVALID_UTF8: i32 = -2;
/// A certificate or configuration document could not be parsed.
pub const RKH_ERR_PARSE: i32 = -3;
/// A host or fingerprint cannot be represented in the store.
pub const RKH_ERR_INVALID_RECORD: i32 = -4;
/// A filesystem I/O operation failed.
pub const RKH_ERR_IO: i32 = -5;
/// The store lock could not be acquired in time.
pub const RKH_ERR_LOCK_TIMEOUT: i32 = -6;
/// The store holds no record for the requested endpoint.
pub const RKH_ERR_NOT_FOUND: i32 = -7;

// ── Trust status ──────────────────────────────────────────────────────────────

/// The stored record matches the presented certificate.
pub const RKH_TRUSTED: libc::c_int = 0;
/// Nothing is stored for the endpoint.
pub const RKH_UNKNOWN: libc::c_int = 1;
/// A different certificate is stored for the endpoint.
pub const RKH_MISMATCH: libc::c_int = 2;

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Convert a `*const c_char` to a `&str`, returning an error code on failure.
///
/// # Safety
///
/// `ptr` must either be null (handled gracefully) or point to a valid,
/// null-terminated C string that remains valid for the duration of `'a`.
unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Result<&'a str, i32> {
    if ptr.is_null() {
        return Err(RKH_ERR_NULL_PTR);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| RKH_ERR_INVALID_UTF8)
}

/// Allocate a `CString` and write it into `*out`.
///
/// # Safety
///
/// `out` must be null (rejected) or valid for writes.
unsafe fn write_string_out(s: &str, out: *mut *mut c_char) -> i32 {
    if out.is_null() {
        return RKH_ERR_NULL_PTR;
    }
    match CString::new(s) {
        Ok(cs) => {
            *out = cs.into_raw();
            RKH_OK
        }
        // Decoded names may carry NUL bytes; C cannot hold them.
        Err(_) => RKH_ERR_INVALID_RECORD,
    }
}

/// Map a [`StoreError`] to one of the `RKH_ERR_*` constants.
fn map_error(e: &StoreError) -> i32 {
    match e {
        StoreError::Parse(_) => RKH_ERR_PARSE,
        StoreError::InvalidRecord(_) => RKH_ERR_INVALID_RECORD,
        StoreError::Io(_) => RKH_ERR_IO,
        StoreError::LockTimeout { .. } => RKH_ERR_LOCK_TIMEOUT,
    }
}

fn box_data(data: CertificateData) -> *mut c_void {
    Box::into_raw(Box::new(data)) as *mut c_void
}

/// # Safety
///
/// `ptr` must be null or a live handle from an `rkh_data_*` constructor.
unsafe fn data_ref<'a>(ptr: *const c_void) -> Result<&'a CertificateData, i32> {
    if ptr.is_null() {
        return Err(RKH_ERR_NULL_PTR);
    }
    Ok(&*(ptr as *const CertificateData))
}

/// # Safety
///
/// `ptr` must be null or a live handle from [`rkh_store_new`].
unsafe fn store_ref<'a>(ptr: *const c_void) -> Result<&'a CertificateStore, i32> {
    if ptr.is_null() {
        return Err(RKH_ERR_NULL_PTR);
    }
    Ok(&*(ptr as *const CertificateStore))
}

macro_rules! try_code {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(code) => return code,
        }
    };
}

// ── Version ───────────────────────────────────────────────────────────────────

/// Return the library version string as a null-terminated C string.
///
/// The caller **must not** free this pointer.
#[no_mangle]
pub extern "C" fn rkh_version() -> *const c_char {
    static VERSION: &[u8] = b"0.1.0\0";
    VERSION.as_ptr() as *const c_char
}

// ── Store handles ─────────────────────────────────────────────────────────────

/// Open a store rooted at `root`.
///
/// # Parameters
///
/// - `root`        — store root directory; created on first save.
/// - `config_json` — optional JSON object with store options; pass `NULL`
///                   for the defaults.
/// - `store_out`   — on success, receives an opaque handle that the caller
///                   must release with [`rkh_store_free`].
///
/// # Returns
///
/// `RKH_OK` on success, `RKH_ERR_PARSE` if `config_json` is not a valid
/// options object, or another `RKH_ERR_*` code.
///
/// # Safety
///
/// `root` and `store_out` must be non-null; `config_json` may be null.
#[no_mangle]
pub unsafe extern "C" fn rkh_store_new(
    root: *const c_char,
    config_json: *const c_char,
    store_out: *mut *mut c_void,
) -> i32 {
    let root = try_code!(cstr_to_str(root));
    if store_out.is_null() {
        return RKH_ERR_NULL_PTR;
    }

    let options = if config_json.is_null() {
        StoreOptions::default()
    } else {
        let text = try_code!(cstr_to_str(config_json));
        match serde_json::from_str::<StoreOptions>(text) {
            Ok(options) => options,
            Err(_) => return RKH_ERR_PARSE,
        }
    };

    let store = CertificateStore::with_options(root, options);
    *store_out = Box::into_raw(Box::new(store)) as *mut c_void;
    RKH_OK
}

/// Free a store handle. Passing `NULL` is a no-op.
///
/// # Safety
///
/// `store` must be null or a handle from [`rkh_store_new`] that has not
/// already been freed.
#[no_mangle]
pub unsafe extern "C" fn rkh_store_free(store: *mut c_void) {
    if !store.is_null() {
        drop(Box::from_raw(store as *mut CertificateStore));
    }
}

// ── Certificate data ──────────────────────────────────────────────────────────

/// Build certificate data from a PEM buffer holding exactly one certificate.
///
/// # Safety
///
/// `host` and `data_out` must be non-null; `pem` must point to `pem_len`
/// readable bytes.
#[no_mangle]
pub unsafe extern "C" fn rkh_data_from_pem(
    host: *const c_char,
    port: u16,
    pem: *const u8,
    pem_len: usize,
    data_out: *mut *mut c_void,
) -> i32 {
    let host = try_code!(cstr_to_str(host));
    if pem.is_null() || data_out.is_null() {
        return RKH_ERR_NULL_PTR;
    }

    let bytes = std::slice::from_raw_parts(pem, pem_len);
    match CertificateData::from_pem(host, port, bytes) {
        Ok(data) => {
            *data_out = box_data(data);
            RKH_OK
        }
        Err(e) => map_error(&e),
    }
}

/// Build compact certificate data (no PEM text) from its parts.
///
/// # Safety
///
/// All pointer arguments must be non-null, valid C strings, except
/// `data_out` which must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn rkh_data_from_parts(
    host: *const c_char,
    port: u16,
    subject: *const c_char,
    issuer: *const c_char,
    fingerprint: *const c_char,
    data_out: *mut *mut c_void,
) -> i32 {
    let host = try_code!(cstr_to_str(host));
    let subject = try_code!(cstr_to_str(subject));
    let issuer = try_code!(cstr_to_str(issuer));
    let fingerprint = try_code!(cstr_to_str(fingerprint));
    if data_out.is_null() {
        return RKH_ERR_NULL_PTR;
    }

    match CertificateData::from_parts(host, port, subject, issuer, fingerprint) {
        Ok(data) => {
            *data_out = box_data(data);
            RKH_OK
        }
        Err(e) => map_error(&e),
    }
}

/// Free a certificate data handle. Passing `NULL` is a no-op.
///
/// # Safety
///
/// `data` must be null or a handle returned by this crate that has not
/// already been freed.
#[no_mangle]
pub unsafe extern "C" fn rkh_data_free(data: *mut c_void) {
    if !data.is_null() {
        drop(Box::from_raw(data as *mut CertificateData));
    }
}

/// Copy the host name into `*out`; free it with [`rkh_free_string`].
///
/// # Safety
///
/// `data` and `out` must be non-null.
#[no_mangle]
pub unsafe extern "C" fn rkh_data_host(data: *const c_void, out: *mut *mut c_char) -> i32 {
    let data = try_code!(data_ref(data));
    write_string_out(data.host(), out)
}

/// Write the port into `*out`.
///
/// # Safety
///
/// `data` and `out` must be non-null.
#[no_mangle]
pub unsafe extern "C" fn rkh_data_port(data: *const c_void, out: *mut u16) -> i32 {
    let data = try_code!(data_ref(data));
    if out.is_null() {
        return RKH_ERR_NULL_PTR;
    }
    *out = data.port();
    RKH_OK
}

/// Copy the subject into `*out`; free it with [`rkh_free_string`].
///
/// # Safety
///
/// `data` and `out` must be non-null.
#[no_mangle]
pub unsafe extern "C" fn rkh_data_subject(data: *const c_void, out: *mut *mut c_char) -> i32 {
    let data = try_code!(data_ref(data));
    write_string_out(data.subject(), out)
}

/// Copy the issuer into `*out`; free it with [`rkh_free_string`].
///
/// # Safety
///
/// `data` and `out` must be non-null.
#[no_mangle]
pub unsafe extern "C" fn rkh_data_issuer(data: *const c_void, out: *mut *mut c_char) -> i32 {
    let data = try_code!(data_ref(data));
    write_string_out(data.issuer(), out)
}

/// Copy the fingerprint into `*out`; free it with [`rkh_free_string`].
///
/// # Safety
///
/// `data` and `out` must be non-null.
#[no_mangle]
pub unsafe extern "C" fn rkh_data_fingerprint(
    data: *const c_void,
    out: *mut *mut c_char,
) -> i32 {
    let data = try_code!(data_ref(data));
    write_string_out(data.fingerprint(), out)
}

/// Copy the PEM text into `*out`, or write `NULL` if it is not known.
///
/// # Safety
///
/// `data` and `out` must be non-null.
#[no_mangle]
pub unsafe extern "C" fn rkh_data_pem(data: *const c_void, out: *mut *mut c_char) -> i32 {
    let data = try_code!(data_ref(data));
    if out.is_null() {
        return RKH_ERR_NULL_PTR;
    }
    match data.pem() {
        Some(pem) => write_string_out(pem, out),
        None => {
            *out = std::ptr::null_mut();
            RKH_OK
        }
    }
}

// ── Store operations ──────────────────────────────────────────────────────────

/// Look up the record stored for `(host, port)`.
///
/// # Returns
///
/// `RKH_OK` with a new handle in `*data_out` (free it with
/// [`rkh_data_free`]), `RKH_ERR_NOT_FOUND` with `*data_out` set to `NULL`,
/// or another `RKH_ERR_*` code.
///
/// # Safety
///
/// `store`, `host` and `data_out` must be non-null.
#[no_mangle]
pub unsafe extern "C" fn rkh_store_load(
    store: *const c_void,
    host: *const c_char,
    port: u16,
    data_out: *mut *mut c_void,
) -> i32 {
    let store = try_code!(store_ref(store));
    let host = try_code!(cstr_to_str(host));
    if data_out.is_null() {
        return RKH_ERR_NULL_PTR;
    }
    *data_out = std::ptr::null_mut();

    match store.load(host, port) {
        Ok(Some(data)) => {
            *data_out = box_data(data);
            RKH_OK
        }
        Ok(None) => RKH_ERR_NOT_FOUND,
        Err(e) => map_error(&e),
    }
}

/// Save `data` as the trusted record for its endpoint.
///
/// # Safety
///
/// `store` and `data` must be non-null handles.
#[no_mangle]
pub unsafe extern "C" fn rkh_store_save(store: *const c_void, data: *const c_void) -> i32 {
    let store = try_code!(store_ref(store));
    let data = try_code!(data_ref(data));
    match store.save(data) {
        Ok(()) => RKH_OK,
        Err(e) => map_error(&e),
    }
}

/// Remove the record for the endpoint of `data`. Absent records are not an
/// error.
///
/// # Safety
///
/// `store` and `data` must be non-null handles.
#[no_mangle]
pub unsafe extern "C" fn rkh_store_remove(store: *const c_void, data: *const c_void) -> i32 {
    let store = try_code!(store_ref(store));
    let data = try_code!(data_ref(data));
    match store.remove(data) {
        Ok(()) => RKH_OK,
        Err(e) => map_error(&e),
    }
}

/// Classify `data` against the store, writing one of `RKH_TRUSTED`,
/// `RKH_UNKNOWN` or `RKH_MISMATCH` into `*status_out`.
///
/// # Safety
///
/// All pointer arguments must be non-null.
#[no_mangle]
pub unsafe extern "C" fn rkh_store_contains(
    store: *const c_void,
    data: *const c_void,
    status_out: *mut libc::c_int,
) -> i32 {
    let store = try_code!(store_ref(store));
    let data = try_code!(data_ref(data));
    if status_out.is_null() {
        return RKH_ERR_NULL_PTR;
    }

    match store.contains(data) {
        Ok(status) => {
            *status_out = match status {
                TrustStatus::Trusted => RKH_TRUSTED,
                TrustStatus::Unknown => RKH_UNKNOWN,
                TrustStatus::Mismatch(_) => RKH_MISMATCH,
            };
            RKH_OK
        }
        Err(e) => map_error(&e),
    }
}

// ── Comparison ────────────────────────────────────────────────────────────────

/// Write 1 into `*equal_out` if `a` and `b` have the same subject, issuer
/// and fingerprint, else 0.
///
/// # Safety
///
/// All pointer arguments must be non-null.
#[no_mangle]
pub unsafe extern "C" fn rkh_compare(
    a: *const c_void,
    b: *const c_void,
    equal_out: *mut libc::c_int,
) -> i32 {
    let a = try_code!(data_ref(a));
    let b = try_code!(data_ref(b));
    if equal_out.is_null() {
        return RKH_ERR_NULL_PTR;
    }
    *equal_out = libc::c_int::from(compare(a, b));
    RKH_OK
}

/// Like [`rkh_compare`], but also requires both sides to carry identical
/// PEM text.
///
/// # Safety
///
/// All pointer arguments must be non-null.
#[no_mangle]
pub unsafe extern "C" fn rkh_compare_ex(
    a: *const c_void,
    b: *const c_void,
    equal_out: *mut libc::c_int,
) -> i32 {
    let a = try_code!(data_ref(a));
    let b = try_code!(data_ref(b));
    if equal_out.is_null() {
        return RKH_ERR_NULL_PTR;
    }
    *equal_out = libc::c_int::from(compare_ex(a, b));
    RKH_OK
}

// ── Memory management ─────────────────────────────────────────────────────────

/// Free a string previously returned by this library.
///
/// Passing `NULL` is a no-op.
///
/// # Safety
///
/// `s` must be either null or a pointer that was returned by one of the
/// `rkh_*` functions in this crate and that has not already been freed.
#[no_mangle]
pub unsafe extern "C" fn rkh_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
