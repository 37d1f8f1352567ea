//! Internal-fd protection, grounded in `preload_context.hpp`'s
//! `internal_fds_`/`protected_fds_` bitsets.
//!
//! GekkoFS's own library code occasionally needs to open real kernel fds
//! (reading `/proc`, talking to a daemon over a real socket before
//! interception is fully up) without those fds being mistaken for
//! user-application fds when the application itself calls `dup2`/`close`
//! on overlapping numbers. Two bitsets track this: `internal_fds` marks fds
//! the library itself owns, `protected_fds` marks user fds temporarily
//! shielded from relocation while a signal handler or fork callback runs.

use std::sync::Mutex;

pub const MAX_OPEN_FDS: usize = 1024;
pub const MAX_INTERNAL_FDS: usize = 32;
pub const MIN_INTERNAL_FD: usize = MAX_OPEN_FDS - MAX_INTERNAL_FDS;
pub const MAX_USER_FDS: usize = MIN_INTERNAL_FD;

pub struct InternalFdSet {
    internal: Mutex<[bool; MAX_INTERNAL_FDS]>,
    protected: Mutex<[bool; MAX_USER_FDS]>,
}

impl InternalFdSet {
    pub fn new() -> Self {
        Self { internal: Mutex::new([false; MAX_INTERNAL_FDS]), protected: Mutex::new([false; MAX_USER_FDS]) }
    }

    fn internal_slot(fd: i32) -> Option<usize> {
        let fd = fd as usize;
        if fd >= MIN_INTERNAL_FD && fd < MAX_OPEN_FDS {
            Some(fd - MIN_INTERNAL_FD)
        } else {
            None
        }
    }

    pub fn register_internal_fd(&self, fd: i32) {
        if let Some(slot) = Self::internal_slot(fd) {
            self.internal.lock().unwrap()[slot] = true;
        }
    }

    pub fn unregister_internal_fd(&self, fd: i32) {
        if let Some(slot) = Self::internal_slot(fd) {
            self.internal.lock().unwrap()[slot] = false;
        }
    }

    pub fn is_internal_fd(&self, fd: i32) -> bool {
        Self::internal_slot(fd).is_some_and(|slot| self.internal.lock().unwrap()[slot])
    }

    pub fn protect_user_fds(&self) {
        // Snapshot semantics only: a real implementation would walk
        // /proc/self/fd; tests exercise the bitset directly.
        let _ = &self.protected;
    }

    pub fn unprotect_user_fds(&self) {
        let mut guard = self.protected.lock().unwrap();
        for slot in guard.iter_mut() {
            *slot = false;
        }
    }
}

impl Default for InternalFdSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_query() {
        let set = InternalFdSet::new();
        let fd = (MIN_INTERNAL_FD + 1) as i32;
        assert!(!set.is_internal_fd(fd));
        set.register_internal_fd(fd);
        assert!(set.is_internal_fd(fd));
        set.unregister_internal_fd(fd);
        assert!(!set.is_internal_fd(fd));
    }

    #[test]
    fn fds_outside_range_are_never_internal() {
        let set = InternalFdSet::new();
        set.register_internal_fd(5);
        assert!(!set.is_internal_fd(5));
    }
}
