//! Clipboard access.
//!
//! The system clipboard is reached through `arboard`. When there is none
//! (a headless box, an SSH session) the text is handed to the terminal with
//! the OSC 52 escape sequence, which most modern terminal emulators honour.

use std::cell::RefCell;
use std::io::{self, IsTerminal, Write};

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

pub trait Clipboard {
    fn copy(&self, text: &str) -> Result<()>;
}

/// Platform clipboard with an OSC 52 fallback.
///
/// On X11 and Wayland the copied text is served by the `arboard` handle, so
/// it stays pasteable only while this value is alive.
#[derive(Default)]
pub struct SystemClipboard {
    native: RefCell<Option<arboard::Clipboard>>,
}

impl Clipboard for SystemClipboard {
    fn copy(&self, text: &str) -> Result<()> {
        let mut stdout = io::stdout();
        let terminal = if stdout.is_terminal() {
            Some(&mut stdout as &mut dyn Write)
        } else {
            None
        };
        copy_or_fallback(self.copy_native(text), text, terminal)
    }
}

impl SystemClipboard {
    fn copy_native(&self, text: &str) -> Result<()> {
        let mut native = self.native.borrow_mut();
        let clipboard = match native.take() {
            Some(clipboard) => clipboard,
            None => arboard::Clipboard::new().context("no system clipboard")?,
        };
        native
            .insert(clipboard)
            .set_text(text)
            .context("system clipboard refused the text")
    }
}

/// Keep a native success, otherwise write OSC 52 to the terminal if there is one.
fn copy_or_fallback(native: Result<()>, text: &str, terminal: Option<&mut dyn Write>) -> Result<()> {
    let Err(err) = native else {
        return Ok(());
    };
    let Some(out) = terminal else {
        return Err(err.context("stdout is not a terminal, cannot use OSC 52"));
    };
    out.write_all(osc52_sequence(text).as_bytes())?;
    out.flush()?;
    Ok(())
}

/// `ESC ] 52 ; c ; <base64> BEL`
pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", BASE64.encode(text.as_bytes()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
