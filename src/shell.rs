use std::io::Write;
use std::process::{Command as ProcessCommand, Stdio};

use anyhow::{Context, Result, anyhow};

/// Public watch link used by the share action.
pub(crate) fn share_url(content_id: &str) -> String {
    format!("https://techedstudioscontact-oss.github.io/aniryx/?watch={content_id}")
}

#[cfg(unix)]
pub(crate) fn with_sigint_ignored<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R>,
{
    unsafe {
        let mut new_action: libc::sigaction = std::mem::zeroed();
        new_action.sa_sigaction = libc::SIG_IGN;
        libc::sigemptyset(&mut new_action.sa_mask);
        new_action.sa_flags = 0;

        let mut old_action: libc::sigaction = std::mem::zeroed();
        if libc::sigaction(libc::SIGINT, &new_action, &mut old_action) != 0 {
            return Err(anyhow!("failed to ignore SIGINT"));
        }

        let result = f();
        let _ = libc::sigaction(libc::SIGINT, &old_action, std::ptr::null_mut());
        result
    }
}

#[cfg(not(unix))]
pub(crate) fn with_sigint_ignored<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R>,
{
    f()
}

/// Open a URL in the system browser. Tries the platform openers in order and
/// reports failure as an error the caller can surface as a notice.
pub(crate) fn open_in_browser(url: &str) -> Result<()> {
    let openers: &[&str] = if cfg!(target_os = "macos") {
        &["open"]
    } else {
        &["xdg-open", "sensible-browser"]
    };

    for opener in openers {
        let launched = ProcessCommand::new(opener)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if launched.is_ok() {
            return Ok(());
        }
    }
    Err(anyhow!("no browser opener available for {url}"))
}

/// Copy text to the clipboard via whichever helper is installed. Returns false
/// when none is available so the caller can fall back to showing the text.
pub(crate) fn copy_to_clipboard(text: &str) -> bool {
    let helpers: &[(&str, &[&str])] = &[
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
        ("pbcopy", &[]),
    ];

    for (helper, args) in helpers {
        let child = ProcessCommand::new(helper)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let Ok(mut child) = child else {
            continue;
        };
        let wrote = child
            .stdin
            .take()
            .context("clipboard helper stdin missing")
            .and_then(|mut stdin| {
                stdin
                    .write_all(text.as_bytes())
                    .context("clipboard helper write failed")
            });
        if wrote.is_ok() && child.wait().map(|s| s.success()).unwrap_or(false) {
            return true;
        }
    }
    false
}
