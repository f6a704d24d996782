// Raw platform glue for the hardware-fault trap: signal handlers plus the
// sigsetjmp/siglongjmp bindings the libc crate does not export.
//
// One process-wide set of handlers, one per-thread stack of jump frames.
// A fault on a thread with no active frame is re-raised with the default
// disposition; the trap never swallows faults it does not own.
use std::cell::Cell;
use std::mem;
use std::os::raw::c_int;
use std::ptr;
use std::sync::Once;

// Opaque, oversized storage for the platform sigjmp_buf.
#[repr(C, align(16))]
pub(super) struct JumpBuf([u8; 512]);

impl JumpBuf {
    fn zeroed() -> Self {
        JumpBuf([0u8; 512])
    }

    fn as_mut_ptr(&mut self) -> *mut JumpBuf {
        self
    }
}

unsafe extern "C" {
    // glibc only exports the double-underscore spelling; the header
    // macro normally hides that.
    #[cfg_attr(
        all(target_os = "linux", target_env = "gnu"),
        link_name = "__sigsetjmp"
    )]
    fn sigsetjmp(env: *mut JumpBuf, save_mask: c_int) -> c_int;
    fn siglongjmp(env: *mut JumpBuf, value: c_int) -> !;
}

/// Diagnostic context captured by the handler at trap time.
pub(super) struct FaultContext {
    pub signal: c_int,
    pub address: usize,
}

struct TrapFrame {
    env: JumpBuf,
    signal: c_int,
    address: usize,
    prev: *mut TrapFrame,
}

thread_local! {
    static ACTIVE: Cell<*mut TrapFrame> = const { Cell::new(ptr::null_mut()) };
}

const TRAPPED_SIGNALS: [c_int; 4] = [libc::SIGSEGV, libc::SIGBUS, libc::SIGILL, libc::SIGFPE];

static INSTALL: Once = Once::new();

fn install_handlers() {
    INSTALL.call_once(|| unsafe {
        for signal in TRAPPED_SIGNALS {
            let mut action: libc::sigaction = mem::zeroed();
            action.sa_sigaction = trap_handler as libc::sighandler_t;
            action.sa_flags = libc::SA_SIGINFO | libc::SA_NODEFER | libc::SA_ONSTACK;
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(signal, &action, ptr::null_mut());
        }
    });
}

extern "C" fn trap_handler(signal: c_int, info: *mut libc::siginfo_t, _context: *mut libc::c_void) {
    let frame = ACTIVE
        .try_with(|slot| slot.get())
        .unwrap_or(ptr::null_mut());
    if frame.is_null() {
        // Not ours: restore the default disposition and let the fault
        // re-deliver on return.
        unsafe {
            libc::signal(signal, libc::SIG_DFL);
            libc::raise(signal);
        }
        return;
    }
    unsafe {
        (*frame).signal = signal;
        (*frame).address = fault_address(info);
        siglongjmp((*frame).env.as_mut_ptr(), 1)
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn fault_address(info: *mut libc::siginfo_t) -> usize {
    if info.is_null() {
        0
    } else {
        unsafe { (*info).si_addr() as usize }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
unsafe fn fault_address(info: *mut libc::siginfo_t) -> usize {
    if info.is_null() {
        0
    } else {
        unsafe { (*info).si_addr as usize }
    }
}

// Keeps the per-thread frame stack balanced on both the normal and the
// unwinding exit path.
struct FrameScope;

impl FrameScope {
    fn push(frame: *mut TrapFrame) -> Self {
        ACTIVE.with(|slot| {
            unsafe {
                (*frame).prev = slot.get();
            }
            slot.set(frame);
        });
        FrameScope
    }
}

impl Drop for FrameScope {
    fn drop(&mut self) {
        ACTIVE.with(|slot| {
            let top = slot.get();
            if !top.is_null() {
                slot.set(unsafe { (*top).prev });
            }
        });
    }
}

/// Runs `op` with the calling thread's hardware faults routed back here.
///
/// A trapped fault abandons the guarded call without unwinding it: values
/// live inside it are leaked and partial side effects stay in place.
#[inline(never)]
pub(super) fn run_guarded<T>(op: impl FnOnce() -> T) -> Result<T, FaultContext> {
    install_handlers();
    let mut frame = TrapFrame {
        env: JumpBuf::zeroed(),
        signal: 0,
        address: 0,
        prev: ptr::null_mut(),
    };
    let frame_ptr: *mut TrapFrame = &mut frame;
    let _scope = FrameScope::push(frame_ptr);
    if unsafe { sigsetjmp((*frame_ptr).env.as_mut_ptr(), 1) } == 0 {
        Ok(op())
    } else {
        Err(FaultContext {
            signal: unsafe { ptr::read_volatile(&(*frame_ptr).signal) },
            address: unsafe { ptr::read_volatile(&(*frame_ptr).address) },
        })
    }
}
