//! Working directory detection and the initial shell command
//!
//! Only prompts shaped like `user@host:/some/path$` are recognised. Anything
//! fancier (colours, `#` prompts, trailing spaces inside the prompt) is ignored.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::SessionProfile;

static PROMPT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@]+@[^:]+:([^$]+)\$$").expect("prompt pattern is valid")
});

/// Extract the working directory from a rendered prompt line.
///
/// The candidate between the first `:` and the trailing `$` is accepted only if
/// it is rooted (`/`) or home-relative (`~`).
pub fn extract_start_path(line: &str) -> Option<String> {
    let caps = PROMPT_REGEX.captures(line.trim())?;
    let path = caps.get(1)?.as_str();
    if path.starts_with('~') || path.starts_with('/') {
        Some(path.to_string())
    } else {
        None
    }
}

/// The single line typed into a fresh shell, if the profile asks for one.
///
/// Priority: login script, then `cd <start path>`, then `ssh <title>` for
/// ssh-config sessions.
pub fn initial_command(profile: &SessionProfile) -> Option<String> {
    if let Some(script) = profile.login_script.as_deref().filter(|s| !s.is_empty()) {
        return Some(format!("{}\r", script));
    }
    if let Some(path) = profile.start_path.as_deref().filter(|s| !s.is_empty()) {
        return Some(format!("cd {}\r", path));
    }
    if profile.is_config_sourced() {
        return Some(format!("ssh {}\r", profile.title));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_home_relative() {
        assert_eq!(
            extract_start_path("zxd@zxd-Q85M-D2A:~/dev$"),
            Some("~/dev".to_string())
        );
    }

    #[test]
    fn test_extract_absolute() {
        assert_eq!(
            extract_start_path("root@host:/var/log$"),
            Some("/var/log".to_string())
        );
    }

    #[test]
    fn test_extract_trims_surrounding_whitespace() {
        assert_eq!(
            extract_start_path("  me@box:/tmp$   "),
            Some("/tmp".to_string())
        );
    }

    #[test]
    fn test_extract_rejects_non_prompt() {
        assert_eq!(extract_start_path("not-a-prompt"), None);
        assert_eq!(extract_start_path(""), None);
        assert_eq!(extract_start_path("user@host:/tmp$ ls"), None);
        assert_eq!(extract_start_path("root@host:/root#"), None);
    }

    #[test]
    fn test_extract_rejects_relative_path() {
        assert_eq!(extract_start_path("user@host:relative$"), None);
    }

    #[test]
    fn test_login_script_wins_over_start_path() {
        let profile = SessionProfile::remote("h")
            .with_start_path("/srv")
            .with_login_script("tmux attach");
        assert_eq!(initial_command(&profile), Some("tmux attach\r".to_string()));
    }

    #[test]
    fn test_start_path_becomes_cd() {
        let profile = SessionProfile::remote("h").with_start_path("~/dev");
        assert_eq!(initial_command(&profile), Some("cd ~/dev\r".to_string()));
    }

    #[test]
    fn test_ssh_config_session_runs_ssh() {
        let profile = SessionProfile::ssh_config("bastion");
        assert_eq!(initial_command(&profile), Some("ssh bastion\r".to_string()));
    }

    #[test]
    fn test_plain_session_has_no_initial_command() {
        assert_eq!(initial_command(&SessionProfile::local()), None);
        let empty = SessionProfile::remote("h").with_login_script("");
        assert_eq!(initial_command(&empty), None);
    }
}
