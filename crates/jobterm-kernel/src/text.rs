//! Display text helpers: truncation, chunk splitting, OS error wording.

use nix::errno::Errno;
use nix::sys::signal::Signal;

/// Widest command text shown by `jobs` and `fg`, in characters.
pub const DISPLAY_WIDTH: usize = 199;

/// Marker appended to truncated text.
pub const ELLIPSIS: &str = "...";

/// Widest directory shown after `cd`, in characters.
pub const CD_DISPLAY_WIDTH: usize = 200;

/// Truncate `text` to at most [`DISPLAY_WIDTH`] characters.
///
/// Text longer than the width keeps its first `DISPLAY_WIDTH - 3` characters
/// followed by `...`, so the result is exactly `DISPLAY_WIDTH` long.
pub fn truncate_for_display(text: &str) -> String {
    truncate_to(text, DISPLAY_WIDTH)
}

/// Truncate `text` to `width` characters, ending in `...` when cut.
pub fn truncate_to(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let keep = width.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Directory as shown after a successful `cd`: long paths keep their tail.
pub fn display_directory(dir: &str) -> String {
    let len = dir.chars().count();
    if len > CD_DISPLAY_WIDTH {
        let tail: String = dir.chars().skip(len - CD_DISPLAY_WIDTH).collect();
        format!("...{}", tail)
    } else {
        dir.to_string()
    }
}

/// Split one read's worth of bytes into display lines.
///
/// Every `\n` ends a line. Bytes after the last newline become a line of
/// their own, so a logical line split across two reads is shown as two
/// fragments.
pub fn split_chunk(chunk: &[u8]) -> Vec<String> {
    let mut lines: Vec<String> = chunk
        .split(|b| *b == b'\n')
        .map(|l| String::from_utf8_lossy(l).into_owned())
        .collect();
    // split() yields a trailing empty piece when the chunk ends in '\n'
    if chunk.last() == Some(&b'\n') || chunk.is_empty() {
        lines.pop();
    }
    lines
}

/// Accumulates raw output and hands out complete lines.
///
/// Bytes after the last newline are held back until more data arrives or
/// [`finish`](Self::finish) is called at end of stream.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `bytes`, returning every line they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        match self.pending.iter().rposition(|b| *b == b'\n') {
            Some(end) => {
                let complete: Vec<u8> = self.pending.drain(..=end).collect();
                split_chunk(&complete)
            }
            None => Vec::new(),
        }
    }

    /// The unterminated remainder, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The C library's wording for an I/O error ("No such file or directory").
pub fn os_error_text(err: &std::io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => Errno::from_raw(code).desc().to_string(),
        None => err.to_string(),
    }
}

/// The C library's wording for an errno.
pub fn errno_text(errno: Errno) -> &'static str {
    errno.desc()
}

/// Signal name for a raw signal number (`SIGINT`), or the number itself.
pub fn signal_name(signo: i32) -> String {
    match Signal::try_from(signo) {
        Ok(sig) => sig.as_str().to_string(),
        Err(_) => signo.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_for_display("sleep 100"), "sleep 100");
        let exact = "x".repeat(DISPLAY_WIDTH);
        assert_eq!(truncate_for_display(&exact), exact);
    }

    #[test]
    fn long_text_is_cut_at_196_plus_ellipsis() {
        let long = "a".repeat(300);
        let cut = truncate_for_display(&long);
        assert_eq!(cut.chars().count(), DISPLAY_WIDTH);
        assert!(cut.ends_with("..."));
        assert_eq!(&cut[..196], &long[..196]);
    }

    #[test]
    fn one_over_width_is_cut() {
        let text = "b".repeat(DISPLAY_WIDTH + 1);
        let cut = truncate_for_display(&text);
        assert_eq!(cut, format!("{}...", "b".repeat(196)));
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let text = "é".repeat(250);
        let cut = truncate_for_display(&text);
        assert_eq!(cut.chars().count(), DISPLAY_WIDTH);
    }

    #[test]
    fn long_directory_keeps_tail() {
        let dir = format!("/{}", "d".repeat(250));
        let shown = display_directory(&dir);
        assert!(shown.starts_with("..."));
        assert_eq!(shown.chars().count(), CD_DISPLAY_WIDTH + 3);
        assert_eq!(display_directory("/tmp"), "/tmp");
    }

    #[test]
    fn split_complete_lines() {
        assert_eq!(split_chunk(b"a\nb\n"), vec!["a", "b"]);
    }

    #[test]
    fn split_keeps_trailing_fragment() {
        assert_eq!(split_chunk(b"a\npart"), vec!["a", "part"]);
        assert_eq!(split_chunk(b"part"), vec!["part"]);
    }

    #[test]
    fn split_keeps_blank_lines() {
        assert_eq!(split_chunk(b"a\n\nb\n"), vec!["a", "", "b"]);
        assert!(split_chunk(b"").is_empty());
    }

    #[test]
    fn line_buffer_joins_split_lines() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"12"), Vec::<String>::new());
        assert_eq!(buf.push(b"34\n5"), vec!["1234"]);
        assert_eq!(buf.push(b"\n\n"), vec!["5", ""]);
        assert!(buf.is_empty());
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn line_buffer_finishes_fragment() {
        let mut buf = LineBuffer::new();
        buf.push(b"done\ntail");
        assert_eq!(buf.finish().as_deref(), Some("tail"));
        assert!(buf.is_empty());
    }

    #[test]
    fn line_buffer_keeps_split_utf8() {
        let mut buf = LineBuffer::new();
        let bytes = "é\n".as_bytes();
        assert!(buf.push(&bytes[..1]).is_empty());
        assert_eq!(buf.push(&bytes[1..]), vec!["é"]);
    }

    #[test]
    fn os_error_wording() {
        let err = std::io::Error::from_raw_os_error(2);
        assert_eq!(os_error_text(&err), "No such file or directory");
    }

    #[test]
    fn signal_names() {
        assert_eq!(signal_name(9), "SIGKILL");
        assert_eq!(signal_name(2), "SIGINT");
    }
}
