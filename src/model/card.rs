/// Current intent of a plugin card's action button. Determines which
/// operation a press dispatches; `Disabled` is terminal for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Install,
    Activate,
    Disabled,
}

/// Button state for one plugin card. Derived from host-supplied facts at
/// page build; afterwards driven only by request outcomes. The in-flight
/// marker is transient and never persisted.
#[derive(Debug, Clone)]
pub struct CardButton {
    pub slug: String,
    pub label: String,
    pub intent: Intent,
    pub in_flight: bool,
}

impl CardButton {
    /// Derive the initial state from the two installed/active facts.
    pub fn derive(slug: &str, installed: bool, active: bool) -> Self {
        let (label, intent) = if active {
            ("Activated", Intent::Disabled)
        } else if installed {
            ("Activate", Intent::Activate)
        } else {
            ("Install Now", Intent::Install)
        };

        Self {
            slug: slug.to_string(),
            label: label.to_string(),
            intent,
            in_flight: false,
        }
    }

    /// Guarded transition into the in-flight state. Returns false (and
    /// changes nothing) when the press must be ignored: empty slug,
    /// terminal button, or a request already outstanding.
    pub fn begin_request(&mut self) -> bool {
        if self.slug.is_empty() || self.intent == Intent::Disabled || self.in_flight {
            return false;
        }

        self.in_flight = true;
        true
    }

    /// Apply an install outcome. Success moves the button to the
    /// activate intent; failure restores the pre-request appearance.
    /// The in-flight marker is cleared either way.
    pub fn apply_install(&mut self, success: bool) {
        if success {
            self.label = "Activate".to_string();
            self.intent = Intent::Activate;
        }
        self.in_flight = false;
    }

    /// Apply an activate outcome. Success makes the button terminal.
    pub fn apply_activate(&mut self, success: bool) {
        if success {
            self.label = "Activated".to_string();
            self.intent = Intent::Disabled;
        }
        self.in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_from_host_facts() {
        let not_installed = CardButton::derive("akismet", false, false);
        assert_eq!(not_installed.intent, Intent::Install);
        assert_eq!(not_installed.label, "Install Now");

        let installed = CardButton::derive("akismet", true, false);
        assert_eq!(installed.intent, Intent::Activate);
        assert_eq!(installed.label, "Activate");

        let active = CardButton::derive("akismet", true, true);
        assert_eq!(active.intent, Intent::Disabled);
        assert_eq!(active.label, "Activated");
    }

    #[test]
    fn begin_request_guards() {
        let mut empty_slug = CardButton::derive("", false, false);
        assert!(!empty_slug.begin_request());
        assert!(!empty_slug.in_flight);

        let mut terminal = CardButton::derive("akismet", true, true);
        assert!(!terminal.begin_request());

        let mut card = CardButton::derive("akismet", false, false);
        assert!(card.begin_request());
        // Second press while in flight is ignored.
        assert!(!card.begin_request());
        assert!(card.in_flight);
    }

    #[test]
    fn install_success_switches_to_activate_intent() {
        let mut card = CardButton::derive("akismet", false, false);
        card.begin_request();
        card.apply_install(true);

        assert_eq!(card.intent, Intent::Activate);
        assert_eq!(card.label, "Activate");
        assert!(!card.in_flight);
    }

    #[test]
    fn install_failure_reverts_to_exact_pre_request_state() {
        let mut card = CardButton::derive("akismet", false, false);
        let label_before = card.label.clone();
        card.begin_request();
        card.apply_install(false);

        assert_eq!(card.intent, Intent::Install);
        assert_eq!(card.label, label_before);
        assert!(!card.in_flight);
    }

    #[test]
    fn activate_success_is_terminal() {
        let mut card = CardButton::derive("akismet", true, false);
        card.begin_request();
        card.apply_activate(true);

        assert_eq!(card.intent, Intent::Disabled);
        assert_eq!(card.label, "Activated");
        assert!(!card.in_flight);

        // Terminal buttons never issue another request.
        assert!(!card.begin_request());
    }

    #[test]
    fn activate_failure_leaves_activate_state() {
        let mut card = CardButton::derive("akismet", true, false);
        card.begin_request();
        card.apply_activate(false);

        assert_eq!(card.intent, Intent::Activate);
        assert_eq!(card.label, "Activate");
        assert!(!card.in_flight);
    }
}
