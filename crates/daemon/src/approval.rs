//! `ApprovalGate` — spec.md GLOSSARY: "policy object listing which
//! tool/action names may execute without explicit user approval."
//!
//! Grounded on `aigent_exec::ExecutionPolicy`'s `tool_allowlist`/
//! `approval_exempt_tools` fields, generalized from tool execution to
//! proposal/action names.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct ApprovalGate {
    exempt: HashSet<String>,
}

impl ApprovalGate {
    pub fn new(exempt_actions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { exempt: exempt_actions.into_iter().map(Into::into).collect() }
    }

    /// `true` when `action` may run without a human approving a proposal
    /// first.
    pub fn is_exempt(&self, action: &str) -> bool {
        self.exempt.contains(action)
    }

    pub fn allow(&mut self, action: impl Into<String>) {
        self.exempt.insert(action.into());
    }

    pub fn revoke(&mut self, action: &str) {
        self.exempt.remove(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exempt_actions_bypass_approval() {
        let gate = ApprovalGate::new(["log", "notify"]);
        assert!(gate.is_exempt("notify"));
        assert!(!gate.is_exempt("send_email"));
    }

    #[test]
    fn allow_and_revoke_mutate_the_set() {
        let mut gate = ApprovalGate::default();
        gate.allow("send_email");
        assert!(gate.is_exempt("send_email"));
        gate.revoke("send_email");
        assert!(!gate.is_exempt("send_email"));
    }
}
