//! # Unix Platform Backend
//!
//! Implements [`Platform`] on top of `mmap`/`mprotect`/`madvise`/`munmap`
//! and synchronous signal interception.
//!
//! ## Memory Mapping
//!
//! Reservations are anonymous private mappings created with `PROT_NONE`
//! (and `MAP_NORESERVE` where available), so the kernel hands out address
//! space without committing frames or swap. Committing a page is an
//! `mprotect` to read/write; anonymous pages materialize zero-filled on
//! first touch. Decommitting drops the frame with `MADV_DONTNEED` and then
//! re-protects to `PROT_NONE` so the next access faults again.
//!
//! ## Signal Interception
//!
//! Access to a `PROT_NONE` page raises `SIGSEGV` (`SIGBUS` on some hosts),
//! delivered synchronously on the faulting thread. The installed handler
//! extracts the faulting address from `siginfo`, dispatches it to the
//! registered [`FaultHook`], and returns normally on
//! [`FaultVerdict::Resumed`] so the faulting instruction restarts against
//! the now-materialized page.
//!
//! On [`FaultVerdict::NotOurs`] the handler re-installs whatever
//! disposition was in place before interception and returns; the
//! instruction re-faults immediately and the previous handler (usually the
//! default action) receives it unchanged. Genuine wild pointers therefore
//! still crash the process with an ordinary segfault.
//!
//! ## Signal-Safety Caveat
//!
//! Taking a general-purpose mutex and allocating from within a signal
//! handler is not formally async-signal-safe. The design leans on two
//! facts: synchronous memory faults are delivered to the thread that
//! touched the page, and for this workload that thread never already holds
//! the engine lock except through the fault-handler re-entry that the
//! re-entrant lock explicitly permits. Faults raised from inside arbitrary
//! library code that holds unrelated locks (e.g. the allocator) are outside
//! the supported envelope.

use std::io;
use std::mem;
use std::ptr;
use std::sync::OnceLock;

use eyre::{bail, ensure, Result};
use tracing::error;

use super::{FaultHook, FaultVerdict, Platform};
use crate::config::PAGE_SIZE;

static HOOK: OnceLock<FaultHook> = OnceLock::new();
static PREV_SEGV: OnceLock<SavedAction> = OnceLock::new();
static PREV_BUS: OnceLock<SavedAction> = OnceLock::new();

/// Previously installed disposition, restored when a fault is not ours.
struct SavedAction(libc::sigaction);

// SAFETY: libc::sigaction is plain data; it is written once at install time
// and only read afterwards.
unsafe impl Send for SavedAction {}
unsafe impl Sync for SavedAction {}

#[cfg(target_os = "linux")]
const RESERVE_FLAGS: libc::c_int =
    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE;
#[cfg(not(target_os = "linux"))]
const RESERVE_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANON;

/// [`Platform`] implementation backed by the host kernel.
#[derive(Debug, Default)]
pub struct OsPlatform;

impl OsPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for OsPlatform {
    fn reserve(&self, nbytes: usize) -> Result<usize> {
        ensure!(
            nbytes > 0 && nbytes % PAGE_SIZE == 0,
            "reservation size {} is not a positive page multiple",
            nbytes
        );
        // SAFETY: a fresh anonymous mapping at a kernel-chosen address.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                nbytes,
                libc::PROT_NONE,
                RESERVE_FLAGS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            bail!("mmap of {} bytes failed: {}", nbytes, io::Error::last_os_error());
        }
        Ok(addr as usize)
    }

    fn commit(&self, page: usize) -> Result<()> {
        debug_assert_eq!(page % PAGE_SIZE, 0);
        // SAFETY: `page` lies inside a live reservation; the engine only
        // commits pages it reserved itself.
        let rc = unsafe {
            libc::mprotect(
                page as *mut libc::c_void,
                PAGE_SIZE,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if rc != 0 {
            bail!(
                "mprotect(RW) of page {:#x} failed: {}",
                page,
                io::Error::last_os_error()
            );
        }
        Ok(())
    }

    fn decommit(&self, page: usize) -> Result<()> {
        debug_assert_eq!(page % PAGE_SIZE, 0);
        // SAFETY: as in `commit`; MADV_DONTNEED drops the frame without
        // disturbing the surrounding reservation.
        unsafe {
            if libc::madvise(page as *mut libc::c_void, PAGE_SIZE, libc::MADV_DONTNEED) != 0 {
                bail!(
                    "madvise(DONTNEED) of page {:#x} failed: {}",
                    page,
                    io::Error::last_os_error()
                );
            }
            if libc::mprotect(page as *mut libc::c_void, PAGE_SIZE, libc::PROT_NONE) != 0 {
                bail!(
                    "mprotect(NONE) of page {:#x} failed: {}",
                    page,
                    io::Error::last_os_error()
                );
            }
        }
        Ok(())
    }

    fn release(&self, base: usize, nbytes: usize) -> Result<()> {
        debug_assert_eq!(base % PAGE_SIZE, 0);
        // SAFETY: `base`/`nbytes` came from a successful `reserve`.
        let rc = unsafe { libc::munmap(base as *mut libc::c_void, nbytes) };
        if rc != 0 {
            bail!(
                "munmap of region {:#x}+{} failed: {}",
                base,
                nbytes,
                io::Error::last_os_error()
            );
        }
        Ok(())
    }

    fn install_fault_intercept(&self, hook: FaultHook) -> Result<()> {
        if HOOK.set(hook).is_err() {
            bail!("fault intercept already installed for this process");
        }
        install_signal_handler(libc::SIGSEGV, &PREV_SEGV)?;
        install_signal_handler(libc::SIGBUS, &PREV_BUS)?;
        Ok(())
    }

    fn guarded(&self, _page: usize) -> bool {
        // The MMU raises real faults; there is no guard bit to probe.
        false
    }
}

fn install_signal_handler(signal: libc::c_int, prev: &OnceLock<SavedAction>) -> Result<()> {
    // SAFETY: standard sigaction installation; the previous disposition is
    // saved so not-ours faults can be handed back.
    unsafe {
        let mut action: libc::sigaction = mem::zeroed();
        action.sa_sigaction = fault_trampoline as usize;
        // SA_NODEFER keeps the signal deliverable while the handler runs,
        // matching the re-entrant locking discipline of the engine.
        action.sa_flags = libc::SA_SIGINFO | libc::SA_NODEFER;
        libc::sigemptyset(&mut action.sa_mask);

        let mut old: libc::sigaction = mem::zeroed();
        if libc::sigaction(signal, &action, &mut old) != 0 {
            bail!(
                "sigaction({}) failed: {}",
                signal,
                io::Error::last_os_error()
            );
        }
        let _ = prev.set(SavedAction(old));
    }
    Ok(())
}

/// Signal entry point. Runs on the faulting thread.
extern "C" fn fault_trampoline(
    signal: libc::c_int,
    info: *mut libc::siginfo_t,
    _context: *mut libc::c_void,
) {
    // SAFETY: the kernel hands us a valid siginfo for SA_SIGINFO handlers.
    let addr = unsafe { (*info).si_addr() } as usize;

    let verdict = match HOOK.get() {
        Some(hook) => hook(addr),
        None => FaultVerdict::NotOurs,
    };
    if verdict == FaultVerdict::Resumed {
        return;
    }

    // Not ours: put the previous disposition back and return. The
    // instruction re-faults immediately and reaches that handler (the
    // default action for an unhandled segfault kills the process).
    let prev = match signal {
        libc::SIGBUS => PREV_BUS.get(),
        _ => PREV_SEGV.get(),
    };
    // SAFETY: restoring a disposition saved at install time, or resetting
    // to the default when installation never completed.
    unsafe {
        match prev {
            Some(saved) => {
                if libc::sigaction(signal, &saved.0, ptr::null_mut()) != 0 {
                    error!(signal, "failed to restore previous fault handler");
                }
            }
            None => {
                let mut dfl: libc::sigaction = mem::zeroed();
                dfl.sa_sigaction = libc::SIG_DFL;
                libc::sigaction(signal, &dfl, ptr::null_mut());
            }
        }
    }
}
