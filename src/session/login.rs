//! The login state machine, grounded on `doppelganger.go`'s top-level
//! `userInfo`-driven flow (username prompt, new-account offer, the
//! type-your-password-twice dance, then ordinary login).

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPhase {
    AwaitUsername,
    AskCreate,
    NewPassword1,
    NewPassword2 { password: String },
    AwaitPassword,
    Command,
}

impl LoginPhase {
    /// Whether the line editor should echo what the user types during this
    /// phase. Only the password-entry phases hide input.
    pub fn echoes_input(&self) -> bool {
        !matches!(
            self,
            LoginPhase::NewPassword1 | LoginPhase::NewPassword2 { .. } | LoginPhase::AwaitPassword
        )
    }

    /// Fixed prompts for every phase except `Command`, whose prompt depends
    /// on which room (if any) the session currently holds.
    pub fn fixed_prompt(&self) -> Option<&'static str> {
        match self {
            LoginPhase::AwaitUsername => Some("Username: "),
            LoginPhase::AskCreate => Some("Create new account? (y/n) "),
            LoginPhase::NewPassword1 => Some("Password for new account: "),
            LoginPhase::NewPassword2 { .. } => Some("Repeat password: "),
            LoginPhase::AwaitPassword => Some("Password: "),
            LoginPhase::Command => None,
        }
    }
}
