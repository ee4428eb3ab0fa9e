use serde::{Deserialize, Serialize};

/// A single token of the iframe `sandbox` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxToken {
    AllowScripts,
    AllowSameOrigin,
    AllowForms,
    AllowPopups,
    AllowModals,
    AllowPointerLock,
    AllowPopupsToEscapeSandbox,
    AllowPresentation,
    AllowTopNavigationByUserActivation,
}

impl SandboxToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxToken::AllowScripts => "allow-scripts",
            SandboxToken::AllowSameOrigin => "allow-same-origin",
            SandboxToken::AllowForms => "allow-forms",
            SandboxToken::AllowPopups => "allow-popups",
            SandboxToken::AllowModals => "allow-modals",
            SandboxToken::AllowPointerLock => "allow-pointer-lock",
            SandboxToken::AllowPopupsToEscapeSandbox => "allow-popups-to-escape-sandbox",
            SandboxToken::AllowPresentation => "allow-presentation",
            SandboxToken::AllowTopNavigationByUserActivation => {
                "allow-top-navigation-by-user-activation"
            }
        }
    }
}

/// How `alert`/`confirm`/`prompt` behave inside the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogPolicy {
    /// Replace the blocking primitives with non-blocking stubs.
    #[default]
    Suppressed,
    /// Leave the browser's native dialogs in place.
    Passthrough,
}

/// Permission set granted to an embedded surface.
///
/// `allow-scripts` and `allow-same-origin` are always granted: the
/// measurement script and the message channel do not work without them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SandboxPolicy {
    pub forms: bool,
    pub popups: bool,
    /// Native blocking dialogs. Off by default: a modal inside the surface
    /// halts the host document.
    pub modals: bool,
    /// Additional tokens appended after the standard ones.
    pub extra: Vec<SandboxToken>,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            forms: true,
            popups: true,
            modals: false,
            extra: Vec::new(),
        }
    }
}

impl SandboxPolicy {
    /// Only the two tokens the surface cannot work without.
    pub fn minimal() -> Self {
        Self {
            forms: false,
            popups: false,
            modals: false,
            extra: Vec::new(),
        }
    }

    /// Deduplicated tokens in a stable order.
    pub fn tokens(&self) -> Vec<SandboxToken> {
        let mut tokens = vec![SandboxToken::AllowScripts, SandboxToken::AllowSameOrigin];
        if self.forms {
            tokens.push(SandboxToken::AllowForms);
        }
        if self.popups {
            tokens.push(SandboxToken::AllowPopups);
        }
        if self.modals {
            tokens.push(SandboxToken::AllowModals);
        }
        for token in &self.extra {
            if !tokens.contains(token) {
                tokens.push(*token);
            }
        }
        tokens
    }

    /// Whether native dialogs can open at all under this permission set.
    pub fn permits_modals(&self) -> bool {
        self.tokens().contains(&SandboxToken::AllowModals)
    }

    /// Value for the iframe `sandbox` attribute.
    pub fn attribute_value(&self) -> String {
        self.tokens()
            .iter()
            .map(SandboxToken::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Dialog behaviour actually applied. Without `allow-modals` the native
    /// dialogs throw, so they are stubbed even when passthrough was requested.
    pub fn effective_dialogs(&self, requested: DialogPolicy) -> DialogPolicy {
        if self.permits_modals() {
            requested
        } else {
            DialogPolicy::Suppressed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_omits_modals() {
        let policy = SandboxPolicy::default();
        assert_eq!(
            policy.attribute_value(),
            "allow-scripts allow-same-origin allow-forms allow-popups"
        );
        assert!(!policy.permits_modals());
    }

    #[test]
    fn test_minimal_policy_keeps_required_tokens() {
        assert_eq!(
            SandboxPolicy::minimal().attribute_value(),
            "allow-scripts allow-same-origin"
        );
    }

    #[test]
    fn test_extra_tokens_are_deduplicated() {
        let policy = SandboxPolicy {
            extra: vec![
                SandboxToken::AllowScripts,
                SandboxToken::AllowPointerLock,
                SandboxToken::AllowPointerLock,
            ],
            ..SandboxPolicy::minimal()
        };
        assert_eq!(
            policy.tokens(),
            vec![
                SandboxToken::AllowScripts,
                SandboxToken::AllowSameOrigin,
                SandboxToken::AllowPointerLock,
            ]
        );
    }

    #[test]
    fn test_passthrough_requires_modals() {
        let locked = SandboxPolicy::default();
        assert_eq!(
            locked.effective_dialogs(DialogPolicy::Passthrough),
            DialogPolicy::Suppressed
        );

        let open = SandboxPolicy {
            extra: vec![SandboxToken::AllowModals],
            ..SandboxPolicy::default()
        };
        assert_eq!(
            open.effective_dialogs(DialogPolicy::Passthrough),
            DialogPolicy::Passthrough
        );
        assert_eq!(
            open.effective_dialogs(DialogPolicy::Suppressed),
            DialogPolicy::Suppressed
        );
    }
}
