//! Line protocol spoken on the appliance's serial console.
//!
//! Every status line the firmware prints starts with a bracketed tag such as
//! `[REG]`. The host monitor keys off these tags and a handful of fixed
//! phrases to decide when the operator is typing a secret, so both sides take
//! the strings from here.

/// Component tag prefixed to console lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Boot,
    Mode,
    Reg,
    Auth,
    Hid,
    Cmd,
    Warning,
    Error,
}

impl Tag {
    pub const ALL: [Tag; 8] = [
        Tag::Boot,
        Tag::Mode,
        Tag::Reg,
        Tag::Auth,
        Tag::Hid,
        Tag::Cmd,
        Tag::Warning,
        Tag::Error,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Tag::Boot => "[BOOT]",
            Tag::Mode => "[MODE]",
            Tag::Reg => "[REG]",
            Tag::Auth => "[AUTH]",
            Tag::Hid => "[HID]",
            Tag::Cmd => "[CMD]",
            Tag::Warning => "[WARNING]",
            Tag::Error => "[ERROR]",
        }
    }

    /// Map a `log` target (the last path segment is enough) to its tag.
    pub fn from_target(target: &str) -> Option<Tag> {
        let leaf = target.rsplit("::").next().unwrap_or(target);
        match leaf {
            "boot" => Some(Tag::Boot),
            "mode" => Some(Tag::Mode),
            "reg" | "registration" => Some(Tag::Reg),
            "auth" | "authentication" => Some(Tag::Auth),
            "hid" => Some(Tag::Hid),
            "cmd" | "console" => Some(Tag::Cmd),
            _ => None,
        }
    }

    /// First tag that appears anywhere in `line`.
    pub fn find(line: &str) -> Option<Tag> {
        Tag::ALL
            .into_iter()
            .filter_map(|tag| line.find(tag.label()).map(|at| (at, tag)))
            .min_by_key(|(at, _)| *at)
            .map(|(_, tag)| tag)
    }
}

pub const PROMPT_ENTER_SECRET: &str = "Enter password (max 32 chars, Enter to confirm):";
pub const PROMPT_CONFIRM_SECRET: &str = "Confirm password:";
pub const MSG_EMPTY_SECRET: &str = "Empty password not allowed";
pub const MSG_SECRET_TIMEOUT: &str = "Password entry timeout";
pub const MSG_MISMATCH: &str = "Mismatch!";
pub const MSG_TOO_MANY_MISMATCHES: &str = "Too many mismatches";

const KEY_ENTER_SECRET: &str = "Enter password";
const KEY_CONFIRM_SECRET: &str = "Confirm password";
const KEY_MISMATCH: &str = "Mismatch";
const KEY_EMPTY_SECRET: &str = "Empty password";

/// Console commands start with this byte; anything else is ignored while idle.
pub const COMMAND_PREFIX: u8 = b'!';
pub const COMMAND_RESET: &str = "!RESET";
pub const COMMAND_STATUS: &str = "!STATUS";
/// Longest command line the firmware buffers.
pub const COMMAND_MAX_LEN: usize = 16;

/// Commands accepted on the console while no registration is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Reset,
    Status,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case(COMMAND_RESET) {
            Some(ConsoleCommand::Reset)
        } else if trimmed.eq_ignore_ascii_case(COMMAND_STATUS) {
            Some(ConsoleCommand::Status)
        } else {
            None
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ConsoleCommand::Reset => COMMAND_RESET,
            ConsoleCommand::Status => COMMAND_STATUS,
        }
    }
}

/// How a complete console line affects secret entry on the host side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// The device is waiting for a secret; input should be masked.
    SecretPrompt,
    /// The last secret was refused but the device keeps prompting.
    SecretRejected,
    /// Secret entry ended without success.
    SecretAbandoned,
    /// Any other tagged status line.
    Tagged(Tag),
    Plain,
}

pub fn classify_line(line: &str) -> LineKind {
    let line = line.trim();
    if line.contains(KEY_ENTER_SECRET) || line.contains(KEY_CONFIRM_SECRET) {
        LineKind::SecretPrompt
    } else if line.contains(KEY_MISMATCH) || line.contains(KEY_EMPTY_SECRET) {
        LineKind::SecretRejected
    } else if line.contains(MSG_SECRET_TIMEOUT) || line.contains(MSG_TOO_MANY_MISMATCHES) {
        LineKind::SecretAbandoned
    } else if let Some(tag) = Tag::find(line) {
        LineKind::Tagged(tag)
    } else {
        LineKind::Plain
    }
}
