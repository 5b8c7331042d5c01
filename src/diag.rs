//! Diagnostic output used during scheduler bring-up.
//!
//! The scheduler never owns a UART. The board support code hands it a
//! [`DiagnosticSink`] (usually a thin wrapper around its serial driver's
//! blocking send) and the kernel writes a few lines through it while
//! initializing. Nothing is written from interrupt handlers.

use core::fmt::{self, Write};

/// Opaque "send these bytes somewhere a human can read them".
pub trait DiagnosticSink {
    fn send(&mut self, bytes: &[u8]);
}

/// [`core::fmt::Write`] adapter over a sink.
///
/// Line feeds go out as CR LF for serial terminals.
pub struct DiagWriter<'a>(pub &'a mut dyn DiagnosticSink);

impl Write for DiagWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut lines = s.split('\n');
        if let Some(first) = lines.next() {
            self.0.send(first.as_bytes());
        }
        for line in lines {
            self.0.send(b"\r\n");
            if !line.is_empty() {
                self.0.send(line.as_bytes());
            }
        }
        Ok(())
    }
}

/// Print a formatted string to a diagnostic sink.
///
/// ```ignore
/// diag_print!(sink, "Counter: {}", counter);
/// ```
#[macro_export]
macro_rules! diag_print {
    ($sink:expr, $($arg:tt)*) => {{
        use core::fmt::Write as _;
        let _ = write!($crate::diag::DiagWriter($sink), $($arg)*);
    }};
}

/// Print a formatted string to a diagnostic sink with a newline.
#[macro_export]
macro_rules! diag_println {
    ($sink:expr) => {
        $crate::diag_print!($sink, "\n")
    };
    ($sink:expr, $($arg:tt)*) => {{
        $crate::diag_print!($sink, $($arg)*);
        $crate::diag_print!($sink, "\n");
    }};
}
