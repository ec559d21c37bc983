//! `esp_log_set_vprintf` hook.
//!
//! ESP-IDF funnels every `ESP_LOGx` line through a single `vprintf`-like
//! function pointer. We swap in [`net_log_vprintf`], keep the old pointer,
//! and hand it the original `(fmt, args)` when the line must be echoed.

use core::ffi::{c_char, c_int};
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use esp_idf_svc::sys::{esp_log_set_vprintf, printf, va_list, vprintf_like_t, vsnprintf};

use crate::config::LINE_CAPACITY;
use crate::engine::NetLogger;
use crate::hook::LineSink;
use crate::line::Level;

type Vprintf = unsafe extern "C" fn(*const c_char, va_list) -> c_int;

static ENGINE: AtomicPtr<NetLogger<'static>> = AtomicPtr::new(core::ptr::null_mut());
static PREVIOUS: AtomicUsize = AtomicUsize::new(0);

/// Writes formatted lines straight to stdout.
///
/// Remembered as the engine's previous sink for lines that do not come
/// through `vprintf` (direct `dispatch` calls).
pub struct ConsoleSink;

static CONSOLE: ConsoleSink = ConsoleSink;

impl LineSink for ConsoleSink {
    fn consume(&self, line: &[u8]) -> usize {
        // SAFETY: "%.*s" reads exactly `line.len()` bytes from `line`.
        let n = unsafe { printf(b"%.*s\0".as_ptr() as *const c_char, line.len() as c_int, line.as_ptr()) };
        n.max(0) as usize
    }
}

/// Echo path for one intercepted call: replays `(fmt, args)` into the
/// previous vprintf.
struct PendingCall {
    fmt: *const c_char,
    args: va_list,
}

// SAFETY: lives on the stack of the intercepted call and is only used there.
unsafe impl Sync for PendingCall {}

impl LineSink for PendingCall {
    fn consume(&self, _line: &[u8]) -> usize {
        match previous() {
            // SAFETY: same contract as the call we intercepted.
            Some(f) => unsafe { f(self.fmt, self.args) }.max(0) as usize,
            None => 0,
        }
    }
}

fn previous() -> Option<Vprintf> {
    let raw = PREVIOUS.load(Ordering::Acquire);
    if raw == 0 {
        None
    } else {
        // SAFETY: only ever stored from a valid `vprintf_like_t`.
        Some(unsafe { core::mem::transmute::<usize, Vprintf>(raw) })
    }
}

/// Install `engine` as the ESP-IDF log sink, once.
///
/// Returns `false` if the hook was already installed.
pub fn install(engine: &'static NetLogger<'static>, local_echo: bool) -> bool {
    engine.initialize(local_echo, || {
        ENGINE.store(engine as *const _ as *mut _, Ordering::Release);
        // SAFETY: `net_log_vprintf` matches `vprintf_like_t`.
        let prev: vprintf_like_t = unsafe { esp_log_set_vprintf(Some(net_log_vprintf)) };
        PREVIOUS.store(prev.map_or(0, |f| f as usize), Ordering::Release);
        Some(&CONSOLE as &dyn LineSink)
    })
}

/// Replacement `vprintf` handed to ESP-IDF.
unsafe extern "C" fn net_log_vprintf(fmt: *const c_char, args: va_list) -> c_int {
    let echo = PendingCall { fmt, args };
    let engine = ENGINE.load(Ordering::Acquire);
    if engine.is_null() {
        return echo.consume(&[]) as c_int;
    }

    let mut buf = [0u8; LINE_CAPACITY];
    let n = vsnprintf(buf.as_mut_ptr() as *mut c_char, buf.len() as _, fmt, args);
    if n < 0 {
        return 0;
    }
    // vsnprintf reserves the last byte for the terminator.
    let len = (n as usize).min(LINE_CAPACITY - 1);
    let text = match core::str::from_utf8(&buf[..len]) {
        Ok(s) => s,
        // Truncation may split a multibyte char; keep the valid prefix.
        Err(e) => core::str::from_utf8_unchecked(&buf[..e.valid_up_to()]),
    };

    // SAFETY: ENGINE only ever holds a `&'static NetLogger`.
    let engine = &*engine;
    engine.dispatch_with(Level::Info, "", format_args!("{}", text), &echo) as c_int
}
