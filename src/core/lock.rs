//! Purpose: Re-entrant scoped locking over the host-OS mutual-exclusion primitive.
//! Exports: `Lock`, `LockGuard`, `SPIN_COUNT`.
//! Role: Serializes access to shared plugin state across host-spawned threads.
//! Invariants: Release runs exactly once per acquire, on every exit path.
//! Invariants: Same-thread re-acquisition never deadlocks.

use crate::core::error::Error;
#[cfg(unix)]
use crate::core::error::ErrorKind;
use std::marker::PhantomData;

/// Short active-wait phase before falling back to the kernel wait, tuned
/// for low-latency acquisition under light contention.
pub const SPIN_COUNT: u32 = 20;

pub(crate) trait MutexBackend {
    type Handle;

    fn init(&self) -> Result<Self::Handle, Error>;
    fn acquire(&self, handle: &Self::Handle);
    fn try_acquire(&self, handle: &Self::Handle) -> bool;
    fn release(&self, handle: &Self::Handle);
    fn destroy(&self, handle: &Self::Handle);
}

pub(crate) struct RawLock<B: MutexBackend> {
    backend: B,
    handle: B::Handle,
}

impl<B: MutexBackend> RawLock<B> {
    fn init_with_backend(backend: B) -> Result<Self, Error> {
        let handle = backend.init()?;
        Ok(Self { backend, handle })
    }

    fn acquire(&self) {
        for _ in 0..SPIN_COUNT {
            if self.backend.try_acquire(&self.handle) {
                return;
            }
            std::hint::spin_loop();
        }
        self.backend.acquire(&self.handle);
    }

    fn release(&self) {
        self.backend.release(&self.handle);
    }
}

impl<B: MutexBackend> Drop for RawLock<B> {
    fn drop(&mut self) {
        self.backend.destroy(&self.handle);
    }
}

#[derive(Clone)]
pub(crate) struct OsMutexBackend;

#[cfg(unix)]
impl MutexBackend for OsMutexBackend {
    // Heap-pinned: pthread mutexes must not move after init.
    type Handle = Box<std::cell::UnsafeCell<libc::pthread_mutex_t>>;

    fn init(&self) -> Result<Self::Handle, Error> {
        let handle: Self::Handle =
            Box::new(std::cell::UnsafeCell::new(unsafe { std::mem::zeroed() }));
        unsafe {
            let mut attr: libc::pthread_mutexattr_t = std::mem::zeroed();
            let rc = libc::pthread_mutexattr_init(&mut attr);
            if rc != 0 {
                return Err(init_error(rc));
            }
            let rc = libc::pthread_mutexattr_settype(&mut attr, libc::PTHREAD_MUTEX_RECURSIVE);
            if rc != 0 {
                libc::pthread_mutexattr_destroy(&mut attr);
                return Err(init_error(rc));
            }
            let rc = libc::pthread_mutex_init(handle.get(), &attr);
            libc::pthread_mutexattr_destroy(&mut attr);
            if rc != 0 {
                return Err(init_error(rc));
            }
        }
        Ok(handle)
    }

    fn acquire(&self, handle: &Self::Handle) {
        // The recursive type cannot report EDEADLK for same-thread
        // re-acquisition; remaining failure modes are init-time only.
        unsafe {
            libc::pthread_mutex_lock(handle.get());
        }
    }

    fn try_acquire(&self, handle: &Self::Handle) -> bool {
        unsafe { libc::pthread_mutex_trylock(handle.get()) == 0 }
    }

    fn release(&self, handle: &Self::Handle) {
        unsafe {
            libc::pthread_mutex_unlock(handle.get());
        }
    }

    fn destroy(&self, handle: &Self::Handle) {
        unsafe {
            libc::pthread_mutex_destroy(handle.get());
        }
    }
}

#[cfg(unix)]
fn init_error(rc: i32) -> Error {
    Error::new(ErrorKind::Init)
        .with_message("mutex construction failed")
        .with_code(rc)
        .with_source(std::io::Error::from_raw_os_error(rc))
}

/// Owner-tracking fallback for targets without pthreads. Same re-entrant
/// contract as the Unix backend.
#[cfg(not(unix))]
impl MutexBackend for OsMutexBackend {
    type Handle = portable::PortableMutex;

    fn init(&self) -> Result<Self::Handle, Error> {
        Ok(portable::PortableMutex::new())
    }

    fn acquire(&self, handle: &Self::Handle) {
        handle.acquire();
    }

    fn try_acquire(&self, handle: &Self::Handle) -> bool {
        handle.try_acquire()
    }

    fn release(&self, handle: &Self::Handle) {
        handle.release();
    }

    fn destroy(&self, _handle: &Self::Handle) {}
}

#[cfg(not(unix))]
mod portable {
    use std::sync::{Condvar, Mutex, PoisonError};
    use std::thread::{self, ThreadId};

    struct OwnerState {
        owner: Option<ThreadId>,
        depth: u32,
    }

    pub(crate) struct PortableMutex {
        state: Mutex<OwnerState>,
        ready: Condvar,
    }

    impl PortableMutex {
        pub(crate) fn new() -> Self {
            Self {
                state: Mutex::new(OwnerState {
                    owner: None,
                    depth: 0,
                }),
                ready: Condvar::new(),
            }
        }

        pub(crate) fn acquire(&self) {
            let me = thread::current().id();
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            loop {
                match state.owner {
                    None => {
                        state.owner = Some(me);
                        state.depth = 1;
                        return;
                    }
                    Some(owner) if owner == me => {
                        state.depth += 1;
                        return;
                    }
                    Some(_) => {
                        state = self.ready.wait(state).unwrap_or_else(PoisonError::into_inner);
                    }
                }
            }
        }

        pub(crate) fn try_acquire(&self) -> bool {
            let me = thread::current().id();
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    true
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    true
                }
                Some(_) => false,
            }
        }

        pub(crate) fn release(&self) {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.depth = state.depth.saturating_sub(1);
            if state.depth == 0 {
                state.owner = None;
                self.ready.notify_one();
            }
        }
    }
}

/// Wraps exactly one host-OS mutual-exclusion primitive, owned exclusively
/// for this value's lifetime and destroyed exactly once on drop.
///
/// Construction is the only fallible step and is expected to happen once
/// at plugin startup; a failure there is fatal to initialization, not a
/// runtime error. Holding a guard indefinitely starves other callers
/// indefinitely; no timeout or cancellation exists.
pub struct Lock {
    raw: RawLock<OsMutexBackend>,
}

// The handle is only touched through the backend's thread-safe primitive
// calls; the guard pins release to the acquiring thread.
unsafe impl Send for Lock {}
unsafe impl Sync for Lock {}

impl Lock {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            raw: RawLock::init_with_backend(OsMutexBackend)?,
        })
    }

    /// Blocks the calling thread until exclusive ownership is obtained.
    /// Re-entrant: the owning thread may acquire again before releasing.
    pub fn acquire(&self) -> LockGuard<'_> {
        self.raw.acquire();
        LockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }
}

/// Releases the lock when dropped, on every exit path from the guarded
/// region. Not `Send`: release must happen on the acquiring thread.
pub struct LockGuard<'a> {
    lock: &'a Lock,
    _not_send: PhantomData<*mut ()>,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.raw.release();
    }
}
