use colored::*;
use indicatif::ProgressBar;
use std::sync::Mutex;

use crate::error::Error;

// Bar currently drawn in place; status lines are printed around it.
static ACTIVE_BAR: Mutex<Option<ProgressBar>> = Mutex::new(None);

pub const BANNER: &str = r#"
  __  __             _   _
 |  \/  | __ _ _ __ | |_(_)___
 | |\/| |/ _` | '_ \| __| / __|
 | |  | | (_| | | | | |_| \__ \
 |_|  |_|\__,_|_| |_|\__|_|___/
"#;

pub fn attach_bar(bar: &ProgressBar) {
    if let Ok(mut active) = ACTIVE_BAR.lock() {
        *active = Some(bar.clone());
    }
}

pub fn detach_bar() {
    if let Ok(mut active) = ACTIVE_BAR.lock() {
        *active = None;
    }
}

pub fn bar_attached() -> bool {
    ACTIVE_BAR.lock().map(|a| a.is_some()).unwrap_or(false)
}

/// Runs `print` with the active bar cleared, then redraws it.
fn emit<F: FnOnce()>(print: F) {
    let bar = ACTIVE_BAR.lock().ok().and_then(|a| a.clone());
    match bar {
        Some(bar) => bar.suspend(print),
        None => print(),
    }
}

pub fn info(msg: &str) {
    emit(|| println!("{} {}", "[*]".bright_blue().bold(), msg.normal()));
}

pub fn success(msg: &str) {
    emit(|| println!("{} {}", "[+]".bright_green().bold(), msg.bold()));
}

pub fn warn(msg: &str) {
    emit(|| println!("{} {}", "[!]".bright_yellow().bold(), msg.bright_white()));
}

pub fn error(msg: &str) {
    emit(|| eprintln!("{} {}", "[-] ERROR:".bright_red().bold(), msg.bright_white()));
}

/// Prints a recoverable failure in the colour matching its kind.
pub fn report(err: &Error) {
    match err {
        Error::PayloadMissing { .. } | Error::NotStaged(_) => warn(&err.to_string()),
        _ => error(&err.to_string()),
    }
}

pub fn phase(title: &str) {
    emit(|| println!("\n{}", format!("--- [ {} ] ---", title).bright_cyan().bold()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines_go_through_attached_bar() {
        let bar = ProgressBar::hidden();
        attach_bar(&bar);
        assert!(bar_attached());
        info("while bar is live");
        warn("still live");
        detach_bar();
        assert!(!bar_attached());
        info("after bar");
    }
}
