use crate::scan::ScanOutcome;

/// How the host runs the process; decides what happens after a run with no data at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostingMode {
    /// Host restarts the process on its own schedule; exit instead of idling with no data.
    OneShot,
    /// Long-lived process; always wait for the next fire.
    Daemon,
}

impl HostingMode {
    pub fn from_persistent(persistent: bool) -> Self {
        if persistent {
            Self::Daemon
        } else {
            Self::OneShot
        }
    }

    pub fn should_terminate(self, outcome: &ScanOutcome) -> bool {
        self == Self::OneShot && outcome.all_absent()
    }
}
