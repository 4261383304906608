//! Serial console seam shared by the secret reader and the command parser.
use core::fmt::{self, Write};

use heapless::String;
use shared::console::Tag;

/// Longest formatted console line; longer output is truncated.
pub const LINE_CAPACITY: usize = 128;

/// Byte-oriented serial console.
pub trait Console {
    /// Next received byte, if any. Never blocks.
    fn read_byte(&mut self) -> Option<u8>;

    fn write_str(&mut self, text: &str);

    /// Write `[TAG] text` followed by CRLF.
    fn write_line(&mut self, tag: Tag, text: &str) {
        self.write_str(tag.label());
        self.write_str(" ");
        self.write_str(text);
        self.write_str("\r\n");
    }

    /// Formatted variant of [`Console::write_line`].
    fn write_line_fmt(&mut self, tag: Tag, args: fmt::Arguments<'_>) {
        let mut line: String<LINE_CAPACITY> = String::new();
        // Truncation keeps whatever fitted.
        let _ = line.write_fmt(args);
        self.write_line(tag, &line);
    }
}

impl<C: Console + ?Sized> Console for &mut C {
    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn write_str(&mut self, text: &str) {
        (**self).write_str(text)
    }
}
