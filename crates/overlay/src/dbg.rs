//! `tracing` output for GUI subsystem processes.
//!
//! Messages go to the debugger output through `OutputDebugStringW` and can be
//! read with a debugger or DebugView.

use std::io::{self, Write};

use tracing_subscriber::fmt::MakeWriter;
use windows::{Win32::System::Diagnostics::Debug::OutputDebugStringW, core::PCWSTR};

/// Creates a [`WinDbgWriter`] per log record.
#[derive(Debug, Default, Clone, Copy)]
pub struct WinDbgMakeWriter;

impl WinDbgMakeWriter {
    pub fn new() -> Self {
        Self
    }
}

impl<'a> MakeWriter<'a> for WinDbgMakeWriter {
    type Writer = WinDbgWriter;

    fn make_writer(&'a self) -> Self::Writer {
        WinDbgWriter { line: Vec::new() }
    }
}

/// Collects one record and outputs it when dropped.
pub struct WinDbgWriter {
    line: Vec<u16>,
}

impl Write for WinDbgWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.line
            .extend(String::from_utf8_lossy(buf).encode_utf16());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for WinDbgWriter {
    fn drop(&mut self) {
        if self.line.is_empty() {
            return;
        }

        self.line.push(0);
        unsafe {
            OutputDebugStringW(PCWSTR(self.line.as_ptr()));
        }
    }
}
