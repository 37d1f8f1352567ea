//! Reentrance guard, per spec.md §4.1: GekkoFS's own RPC client code makes
//! libc calls (socket I/O, file access for logging) that must NOT be
//! recursively intercepted. A thread-local flag, checked first by the
//! dispatcher, forwards straight to the real libc function while set.

use std::cell::Cell;

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

pub fn in_hook() -> bool {
    IN_HOOK.with(|f| f.get())
}

/// RAII guard: sets the flag on construction, clears it on drop (even on
/// panic/unwind), so a hook can freely call out to networking code without
/// re-triggering itself.
pub struct ReentranceGuard {
    _private: (),
}

pub fn guard() -> ReentranceGuard {
    IN_HOOK.with(|f| f.set(true));
    ReentranceGuard { _private: () }
}

impl Drop for ReentranceGuard {
    fn drop(&mut self) {
        IN_HOOK.with(|f| f.set(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_sets_and_clears() {
        assert!(!in_hook());
        {
            let _g = guard();
            assert!(in_hook());
        }
        assert!(!in_hook());
    }
}
