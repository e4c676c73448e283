//! Caller identity as seen by the access-control layer
//!
//! Authentication happens elsewhere; this module only describes the result
//! (a [`Principal`]) and where the current one comes from (a
//! [`PrincipalSource`]). [`ThreadPrincipal`] binds the principal to the calling
//! thread for the duration of a request, restoring the previous one when the
//! returned guard is dropped.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::marker::PhantomData;

/// Authenticated (or not) caller identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    identity: String,
    authenticated: bool,
}

impl Principal {
    /// Principal that passed authentication
    pub fn authenticated(identity: impl Into<String>) -> Self {
        Principal {
            identity: identity.into(),
            authenticated: true,
        }
    }

    /// Principal known by name only; never granted anything
    pub fn unauthenticated(identity: impl Into<String>) -> Self {
        Principal {
            identity: identity.into(),
            authenticated: false,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

/// Supplies the principal of the current call
pub trait PrincipalSource: Send + Sync {
    fn principal(&self) -> Option<Principal>;
}

/// Always reports the same principal
#[derive(Debug, Clone, Default)]
pub struct StaticPrincipal(Option<Principal>);

impl StaticPrincipal {
    pub fn new(principal: Principal) -> Self {
        StaticPrincipal(Some(principal))
    }

    /// Source with no principal at all
    pub fn none() -> Self {
        StaticPrincipal(None)
    }
}

impl PrincipalSource for StaticPrincipal {
    fn principal(&self) -> Option<Principal> {
        self.0.clone()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Principal>> = const { RefCell::new(None) };
}

/// Principal bound to the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPrincipal;

impl ThreadPrincipal {
    /// Bind `principal` to this thread until the guard is dropped
    ///
    /// # Examples
    ///
    /// ```
    /// use quadguard::iam::{Principal, PrincipalSource, ThreadPrincipal};
    ///
    /// let source = ThreadPrincipal;
    /// {
    ///     let _guard = ThreadPrincipal::bind(Principal::authenticated("alice"));
    ///     assert_eq!(source.principal().unwrap().identity(), "alice");
    /// }
    /// assert!(source.principal().is_none());
    /// ```
    #[must_use = "the principal is unbound as soon as the guard is dropped"]
    pub fn bind(principal: Principal) -> PrincipalGuard {
        let previous = CURRENT.with(|slot| slot.replace(Some(principal)));
        PrincipalGuard {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl PrincipalSource for ThreadPrincipal {
    fn principal(&self) -> Option<Principal> {
        CURRENT.with(|slot| slot.borrow().clone())
    }
}

/// Restores the previously bound principal on drop
pub struct PrincipalGuard {
    previous: Option<Principal>,
    // Bound to the thread whose slot it restores
    _not_send: PhantomData<*const ()>,
}

impl Drop for PrincipalGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_static_principal() {
        let source = StaticPrincipal::new(Principal::authenticated("alice"));
        let principal = source.principal().unwrap();
        assert_eq!(principal.identity(), "alice");
        assert!(principal.is_authenticated());

        assert!(StaticPrincipal::none().principal().is_none());
    }

    #[test]
    fn test_thread_binding_nests_and_restores() {
        let source = ThreadPrincipal;
        assert!(source.principal().is_none());

        let outer = ThreadPrincipal::bind(Principal::authenticated("alice"));
        {
            let _inner = ThreadPrincipal::bind(Principal::unauthenticated("bob"));
            let current = source.principal().unwrap();
            assert_eq!(current.identity(), "bob");
            assert!(!current.is_authenticated());
        }
        assert_eq!(source.principal().unwrap().identity(), "alice");

        drop(outer);
        assert!(source.principal().is_none());
    }

    #[test]
    fn test_thread_binding_is_per_thread() {
        let _guard = ThreadPrincipal::bind(Principal::authenticated("alice"));
        let seen = thread::spawn(|| ThreadPrincipal.principal())
            .join()
            .unwrap();
        assert!(seen.is_none());
    }
}
