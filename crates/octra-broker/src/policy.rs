//! The auto-execute policy.
//!
//! A fixed allow-list of read-only, non-fund-moving methods may bypass
//! human approval when the capability's scope permits it. Fund-moving
//! methods never qualify, regardless of scope or configuration.

use std::collections::BTreeSet;

use octra_core::Scope;

/// Methods that only read state and may auto-execute.
const READ_ONLY_METHODS: &[&str] = &["read_stats", "read_output", "view_state", "get_public_key"];

/// Methods that move funds. Unconditionally excluded from auto-execution.
const FUND_MOVING_METHODS: &[&str] = &["transfer", "send_funds", "withdraw", "claim"];

/// Decides which invocations may skip the approval surface.
#[derive(Debug, Clone)]
pub struct AutoExecPolicy {
    allowed: BTreeSet<String>,
}

impl AutoExecPolicy {
    /// The built-in read-only allow-list.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            allowed: READ_ONLY_METHODS.iter().map(ToString::to_string).collect(),
        }
    }

    /// A policy that never auto-executes (every call needs approval).
    #[must_use]
    pub fn deny_all() -> Self {
        Self {
            allowed: BTreeSet::new(),
        }
    }

    /// Whether a method is classified as fund-moving.
    #[must_use]
    pub fn is_fund_moving(method: &str) -> bool {
        FUND_MOVING_METHODS.contains(&method)
    }

    /// Whether an invocation of `method` under a capability of `scope` may
    /// execute without human approval.
    #[must_use]
    pub fn permits(&self, method: &str, scope: Scope) -> bool {
        if Self::is_fund_moving(method) {
            return false;
        }
        self.allowed.contains(method) && scope.permits_read()
    }
}

impl Default for AutoExecPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_methods_permitted() {
        let policy = AutoExecPolicy::standard();
        assert!(policy.permits("read_stats", Scope::Read));
        assert!(policy.permits("read_stats", Scope::Compute));
        assert!(policy.permits("view_state", Scope::Write));
    }

    #[test]
    fn test_unlisted_methods_need_approval() {
        let policy = AutoExecPolicy::standard();
        assert!(!policy.permits("submit_input", Scope::Compute));
        assert!(!policy.permits("unlisted_method", Scope::Compute));
    }

    #[test]
    fn test_fund_moving_never_auto_executes() {
        let policy = AutoExecPolicy::standard();
        for method in ["transfer", "send_funds", "withdraw", "claim"] {
            assert!(AutoExecPolicy::is_fund_moving(method));
            assert!(!policy.permits(method, Scope::Compute));
        }
    }

    #[test]
    fn test_deny_all() {
        let policy = AutoExecPolicy::deny_all();
        assert!(!policy.permits("read_stats", Scope::Read));
    }
}
