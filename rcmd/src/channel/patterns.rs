//! Pattern constants and the idle-prompt pattern type.

use std::fmt;
use std::sync::LazyLock;

use regex::bytes::Regex;

/// Line anchor, prompt-name characters, prompt character.
pub const GENERIC_PROMPT: &str = r"[\r\n][\w\-@/.():~\[\]]+[#>%$]";

/// In-band password prompt.
pub const PASSWORD_PROMPT: &str = r"[Pp]assword:";

/// In-band username prompt.
pub const LOGIN_PROMPT: &str = r"(?i)(?:username|login):";

/// Pager markers seen across vendors.
pub const PAGINATION: &str = r"--More--|-- More --|<--- More --->|---\(more\)---|---\(more \d+%\)---|Press any key to continue";

/// Characters that end a prompt.
pub const PROMPT_CHARS: &[char] = &['#', '>', '%', '$'];

static GENERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(GENERIC_PROMPT).expect("generic prompt pattern is valid"));

/// The pattern that says "the device is idle and waiting for input".
///
/// Starts out as [`GENERIC_PROMPT`] and is narrowed to the device's own
/// hostname once a prompt has been seen.
#[derive(Clone)]
pub struct PromptPattern {
    source: String,
    regex: Regex,
}

impl PromptPattern {
    /// The vendor-neutral prompt class.
    pub fn generic() -> Self {
        Self {
            source: GENERIC_PROMPT.to_string(),
            regex: GENERIC.clone(),
        }
    }

    /// Compile a caller-provided prompt pattern.
    pub fn new(source: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = Regex::new(&source)?;
        Ok(Self { source, regex })
    }

    /// Pattern for prompts that start with `prefix`.
    pub fn for_prefix(prefix: &str) -> Result<Self, regex::Error> {
        Self::new(format!(r"\r\n{}\S*[#>%$]", regex::escape(prefix)))
    }

    /// Host prefix of a matched prompt: the run of name characters after
    /// the line anchor, up to whitespace, `(` or a prompt character.
    pub fn host_prefix(matched: &str) -> Option<&str> {
        let name = matched.trim_start_matches(['\r', '\n']);
        let end = name
            .find(|c: char| c.is_whitespace() || c == '(' || PROMPT_CHARS.contains(&c))
            .unwrap_or(name.len());
        let prefix = &name[..end];
        (!prefix.is_empty()).then_some(prefix)
    }

    /// Narrow to the host prefix of `matched`, or `None` if it has none.
    pub fn narrow(matched: &str) -> Result<Option<Self>, regex::Error> {
        Self::host_prefix(matched).map(Self::for_prefix).transpose()
    }

    /// Get the pattern source.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Get a reference to the compiled regex.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl fmt::Debug for PromptPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PromptPattern").field(&self.source).finish()
    }
}

impl PartialEq for PromptPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PromptPattern {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_prompt_matches_vendor_prompts() {
        let prompt = PromptPattern::generic();
        for text in [
            "\r\nswitch#",
            "\r\nrouter>",
            "\r\nedge-fw/admin(config)#",
            "\r\nnetops@mx960-re0>",
            "\nuser@host:~$",
        ] {
            assert!(prompt.regex().is_match(text.as_bytes()), "{text:?}");
        }
        assert!(!prompt.regex().is_match(b"Building configuration..."));
    }

    #[test]
    fn test_host_prefix() {
        assert_eq!(PromptPattern::host_prefix("\r\nswitch#"), Some("switch"));
        assert_eq!(
            PromptPattern::host_prefix("\r\nswitch(config-if)#"),
            Some("switch")
        );
        assert_eq!(
            PromptPattern::host_prefix("\nnetops@mx960>"),
            Some("netops@mx960")
        );
        assert_eq!(PromptPattern::host_prefix("\r\n#"), None);
    }

    #[test]
    fn test_narrowed_pattern() {
        let narrowed = PromptPattern::narrow("\r\ncore1.lab#").unwrap().unwrap();
        assert_eq!(narrowed.as_str(), r"\r\ncore1\.lab\S*[#>%$]");
        assert!(narrowed.regex().is_match(b"\r\ncore1.lab(config)#"));
        assert!(!narrowed.regex().is_match(b"\r\ncore1xlab#"));
    }

    #[test]
    fn test_narrowing_is_idempotent() {
        let first = PromptPattern::narrow("\r\nsw-01>").unwrap().unwrap();
        let m = first.regex().find(b"output\r\nsw-01>").unwrap();
        let matched = String::from_utf8_lossy(m.as_bytes());
        let second = PromptPattern::narrow(&matched).unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_pagination_markers() {
        let pager = Regex::new(PAGINATION).unwrap();
        for marker in [
            " --More-- ",
            "-- More --",
            "<--- More --->",
            "---(more)---",
            "---(more 42%)---",
            "Press any key to continue",
        ] {
            assert!(pager.is_match(marker.as_bytes()), "{marker}");
        }
    }

    #[test]
    fn test_login_prompts() {
        let login = Regex::new(LOGIN_PROMPT).unwrap();
        assert!(login.is_match(b"Username: "));
        assert!(login.is_match(b"mx960 (ttyp0)\r\n\r\nlogin: "));
        let password = Regex::new(PASSWORD_PROMPT).unwrap();
        assert!(password.is_match(b"Password: "));
    }
}
