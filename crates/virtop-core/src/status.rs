//! Status line text and its wrapped layout.

/// Upper bound on the rows the status line may occupy.
pub const MAX_STATUS_LINES: usize = 6;

/// Current status message, wrapped to the last known display width.
#[derive(Debug, Clone, Default)]
pub struct StatusFormatter {
    text: String,
    width: usize,
    lines: Vec<String>,
}

impl StatusFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the message and re-wraps it at the current width.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.text = message.into();
        self.lines = wrap(&self.text, self.width);
    }

    /// Re-wraps the current message after a resize.
    pub fn reflow(&mut self, width: usize) {
        self.width = width;
        self.lines = wrap(&self.text, width);
    }

    /// Message as it was set.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Wrapped lines, at most [`MAX_STATUS_LINES`] of them.
    pub fn lines(&self) -> &[String] {
        &self.lines[..self.lines.len().min(MAX_STATUS_LINES)]
    }

    /// Rows to reserve for the status line: 1 to [`MAX_STATUS_LINES`].
    pub fn height(&self) -> u16 {
        self.lines.len().clamp(1, MAX_STATUS_LINES) as u16
    }
}

/// Greedy word wrap of a single logical line.
///
/// Embedded line breaks become spaces. Each line breaks at the last space at
/// or before `width`; a word longer than `width` is hard-broken. Spaces at a
/// break are dropped. A width of zero (not laid out yet) leaves the text on
/// one line.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let flat: Vec<char> = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if width == 0 {
        return vec![flat.into_iter().collect()];
    }

    let mut lines = Vec::new();
    let mut rest: &[char] = &flat;
    while rest.len() > width {
        let window = &rest[..=width];
        match window.iter().rposition(|&c| c == ' ') {
            Some(idx) if idx > 0 => {
                lines.push(trim_spaces_end(&rest[..idx]).iter().collect());
                rest = trim_spaces_start(&rest[idx + 1..]);
            }
            _ => {
                lines.push(rest[..width].iter().collect());
                rest = trim_spaces_start(&rest[width..]);
            }
        }
    }
    lines.push(rest.iter().collect());
    lines
}

fn trim_spaces_start(chars: &[char]) -> &[char] {
    let start = chars.iter().position(|&c| c != ' ').unwrap_or(chars.len());
    &chars[start..]
}

fn trim_spaces_end(chars: &[char]) -> &[char] {
    let end = chars.iter().rposition(|&c| c != ' ').map_or(0, |i| i + 1);
    &chars[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_at_word_boundaries() {
        let lines = wrap("alpha beta gamma", 10);
        assert_eq!(lines, ["alpha beta", "gamma"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
        assert_eq!(lines.join(" "), "alpha beta gamma");
    }

    #[test]
    fn breaks_before_boundary_when_no_space_at_it() {
        let lines = wrap("alpha beta gamma", 8);
        assert_eq!(lines, ["alpha", "beta", "gamma"]);
        assert_eq!(lines.join(" "), "alpha beta gamma");
    }

    #[test]
    fn runs_of_spaces_do_not_leak_into_lines() {
        let lines = wrap("Failed to start web-01:  Libvirt err 55", 10);
        assert_eq!(lines, ["Failed to", "start", "web-01:", "Libvirt", "err 55"]);
        assert!(lines.iter().all(|l| !l.starts_with(' ') && !l.ends_with(' ')));

        assert_eq!(wrap("abcd  efgh", 4), ["abcd", "efgh"]);
        assert_eq!(wrap("abcdef   gh", 3), ["abc", "def", "gh"]);
    }

    #[test]
    fn hard_breaks_long_words() {
        assert_eq!(wrap("abcdefghijkl", 5), ["abcde", "fghij", "kl"]);
    }

    #[test]
    fn collapses_line_breaks() {
        assert_eq!(wrap("one\ntwo", 20), ["one two"]);
    }

    #[test]
    fn zero_width_is_unwrapped() {
        assert_eq!(wrap("alpha beta gamma", 0), ["alpha beta gamma"]);
    }

    #[test]
    fn short_and_empty_text_is_one_line() {
        assert_eq!(wrap("ok", 10), ["ok"]);
        assert_eq!(wrap("", 10), [""]);
    }

    #[test]
    fn handles_multibyte_characters() {
        assert_eq!(wrap("ééé ààà", 3), ["ééé", "ààà"]);
    }

    #[test]
    fn formatter_reflows_on_resize() {
        let mut status = StatusFormatter::new();
        status.set_status("Failed to start web-01: Libvirt err 55: domain is already running");
        assert_eq!(status.height(), 1);

        status.reflow(20);
        assert!(status.height() > 1);
        assert!(status.lines().iter().all(|l| l.chars().count() <= 20));

        status.reflow(200);
        assert_eq!(status.height(), 1);
        assert_eq!(status.lines()[0], status.text());
    }

    #[test]
    fn height_is_capped() {
        let mut status = StatusFormatter::new();
        status.reflow(4);
        status.set_status("aaaa bbbb cccc dddd eeee ffff gggg hhhh");
        assert_eq!(status.height(), MAX_STATUS_LINES as u16);
        assert_eq!(status.lines().len(), MAX_STATUS_LINES);
    }
}
