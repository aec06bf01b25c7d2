//! Inline format-code parser
//!
//! Turns a marked-up line such as `"&aGreen &lbold&r plain"` into plain text plus
//! the style spans and animated segments that apply to it. All indices are
//! character indices into the plain (post-parse) text.
//!
//! Scanning is a single left-to-right pass over a small state machine:
//! - at most one active color (a new color closes the previous one),
//! - a set of active styles keyed by [`StyleKind`],
//! - an optional open animated segment.
//!
//! Closed spans are appended to the output in the order they close. The end of
//! input behaves like a trailing reset, so nothing is left open.

use crate::palette::is_color_code;
use rand::Rng;

/// Characters that introduce a format code
pub const MARKERS: [char; 2] = ['&', '§'];

/// Zero-width placeholder that may follow a marker
///
/// `&` + U+200B emits a literal `&` outside an animated segment and a space
/// inside one.
pub const PLACEHOLDER: char = '\u{200B}';

/// Typographic styles that stack independently of color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleKind {
    Bold,
    Italic,
    Strikethrough,
    Underline,
}

impl StyleKind {
    /// All styles, in the order their spans are emitted on reset
    pub const ALL: [StyleKind; 4] = [
        StyleKind::Bold,
        StyleKind::Italic,
        StyleKind::Strikethrough,
        StyleKind::Underline,
    ];

    /// Style selected by a format code
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'l' => Some(StyleKind::Bold),
            'o' => Some(StyleKind::Italic),
            'm' => Some(StyleKind::Strikethrough),
            'n' => Some(StyleKind::Underline),
            _ => None,
        }
    }

    /// Format code for this style
    pub fn code(self) -> char {
        match self {
            StyleKind::Bold => 'l',
            StyleKind::Italic => 'o',
            StyleKind::Strikethrough => 'm',
            StyleKind::Underline => 'n',
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// A recognised marker code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatCode {
    /// One of the sixteen color codes
    Color(char),
    /// Bold, italic, strikethrough or underline
    Style(StyleKind),
    /// Start of an animated (scrambled) segment
    Animate,
    /// Close every active span and segment
    Reset,
}

impl FormatCode {
    /// Parse the character following a marker
    pub fn from_char(code: char) -> Option<Self> {
        if is_color_code(code) {
            return Some(FormatCode::Color(code));
        }
        if let Some(style) = StyleKind::from_code(code) {
            return Some(FormatCode::Style(style));
        }
        match code {
            'k' => Some(FormatCode::Animate),
            'r' => Some(FormatCode::Reset),
            _ => None,
        }
    }
}

/// Half-open range `[start, end)` of plain text carrying one format code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatSpan {
    /// The color or style code
    pub code: char,
    /// First covered character
    pub start: usize,
    /// One past the last covered character
    pub end: usize,
}

impl FormatSpan {
    /// Create a span, or `None` if the range is empty
    pub fn new(code: char, start: usize, end: usize) -> Option<Self> {
        (start < end).then_some(Self { code, start, end })
    }

    /// Whether this span sets the foreground color
    pub fn is_color(&self) -> bool {
        is_color_code(self.code)
    }

    /// Style set by this span, if it is not a color span
    pub fn style(&self) -> Option<StyleKind> {
        StyleKind::from_code(self.code)
    }

    /// Number of covered characters
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Always false; empty spans are never constructed
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether the character at `index` is covered
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }
}

/// Range of plain text whose glyphs are random substitutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimatedSegment {
    pub start: usize,
    pub end: usize,
}

impl AnimatedSegment {
    /// Whether the character at `index` is inside the segment
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }
}

/// Plain text plus the spans and segments parsed out of one line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMarkup {
    /// Text with markers and codes removed
    pub text: String,
    /// Closed style and color spans, in closing order
    pub spans: Vec<FormatSpan>,
    /// Closed animated segments, in closing order
    pub animations: Vec<AnimatedSegment>,
}

impl ParsedMarkup {
    /// Length of the plain text in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether any segment is animated
    pub fn has_animation(&self) -> bool {
        !self.animations.is_empty()
    }
}

#[derive(Default)]
struct ScanState {
    out: ParsedMarkup,
    len: usize,
    active_color: Option<(char, usize)>,
    active_styles: [Option<usize>; 4],
    animation_start: Option<usize>,
}

impl ScanState {
    fn is_animating(&self) -> bool {
        self.animation_start.is_some()
    }

    fn push(&mut self, c: char) {
        self.out.text.push(c);
        self.len += 1;
    }

    fn apply(&mut self, code: FormatCode) {
        match code {
            FormatCode::Color(code) => {
                self.close_color();
                self.active_color = Some((code, self.len));
            }
            FormatCode::Style(kind) => {
                let len = self.len;
                self.active_styles[kind.index()].get_or_insert(len);
            }
            FormatCode::Animate => {
                let len = self.len;
                self.animation_start.get_or_insert(len);
            }
            FormatCode::Reset => self.reset(),
        }
    }

    fn close_color(&mut self) {
        if let Some((code, start)) = self.active_color.take() {
            self.out.spans.extend(FormatSpan::new(code, start, self.len));
        }
    }

    fn reset(&mut self) {
        self.close_color();
        for kind in StyleKind::ALL {
            if let Some(start) = self.active_styles[kind.index()].take() {
                self.out
                    .spans
                    .extend(FormatSpan::new(kind.code(), start, self.len));
            }
        }
        if let Some(start) = self.animation_start.take() {
            if start < self.len {
                self.out.animations.push(AnimatedSegment {
                    start,
                    end: self.len,
                });
            }
        }
    }

    fn finish(mut self) -> ParsedMarkup {
        self.reset();
        self.out
    }
}

/// Whether `c` introduces a format code
pub fn is_marker(c: char) -> bool {
    MARKERS.contains(&c)
}

/// Parse a line using the thread-local random generator for substitutions
pub fn parse_markup(text: &str) -> ParsedMarkup {
    parse_markup_with_rng(text, &mut rand::thread_rng())
}

/// Parse a line, drawing animated substitutes from `rng`
pub fn parse_markup_with_rng<R: Rng + ?Sized>(text: &str, rng: &mut R) -> ParsedMarkup {
    let mut state = ScanState::default();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if is_marker(c) {
            if let Some(&next) = chars.peek() {
                if next == PLACEHOLDER {
                    chars.next();
                    let out = if state.is_animating() { ' ' } else { c };
                    state.push(out);
                    continue;
                }
                if let Some(code) = FormatCode::from_char(next) {
                    chars.next();
                    state.apply(code);
                    continue;
                }
            }
        }

        let out = if state.is_animating() {
            random_substitute(rng)
        } else {
            c
        };
        state.push(out);
    }

    state.finish()
}

/// Cheap check for an animate code without a full parse
pub fn contains_animation(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if is_marker(c) && chars.peek() == Some(&'k') {
            return true;
        }
    }
    false
}

/// Printable ASCII (`!`..=`~`) other than the `&` marker
fn random_substitute<R: Rng + ?Sized>(rng: &mut R) -> char {
    let mut byte = rng.gen_range(b'!'..b'~');
    if byte >= b'&' {
        byte += 1;
    }
    byte as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn parse(text: &str) -> ParsedMarkup {
        parse_markup_with_rng(text, &mut StdRng::seed_from_u64(7))
    }

    fn colors(parsed: &ParsedMarkup) -> Vec<FormatSpan> {
        parsed.spans.iter().copied().filter(|s| s.is_color()).collect()
    }

    #[test]
    fn test_plain_text_passes_through() {
        let parsed = parse("Hello, world! 123");
        assert_eq!(parsed.text, "Hello, world! 123");
        assert!(parsed.spans.is_empty());
        assert!(parsed.animations.is_empty());
        assert!(!parsed.has_animation());
    }

    #[test]
    fn test_color_closed_by_reset() {
        let parsed = parse("&ahello&rworld");
        assert_eq!(parsed.text, "helloworld");
        assert_eq!(parsed.spans, vec![FormatSpan { code: 'a', start: 0, end: 5 }]);
    }

    #[test]
    fn test_new_color_closes_previous() {
        let parsed = parse("&ahel&blo&r");
        assert_eq!(parsed.text, "hello");
        assert_eq!(
            colors(&parsed),
            vec![
                FormatSpan { code: 'a', start: 0, end: 3 },
                FormatSpan { code: 'b', start: 3, end: 5 },
            ]
        );
    }

    #[test]
    fn test_adjacent_colors_never_nest() {
        let parsed = parse("&a&bhello&r");
        assert_eq!(parsed.text, "hello");
        // `&a` closes at the position `&b` begins; its empty span is dropped.
        assert_eq!(colors(&parsed), vec![FormatSpan { code: 'b', start: 0, end: 5 }]);
        for i in 0..5 {
            assert!(colors(&parsed).iter().filter(|s| s.contains(i)).count() <= 1);
        }
    }

    #[test]
    fn test_styles_stack_with_color() {
        let parsed = parse("&l&obold&citalic&r!");
        assert_eq!(parsed.text, "bolditalic!");
        assert!(parsed.spans.contains(&FormatSpan { code: 'l', start: 0, end: 10 }));
        assert!(parsed.spans.contains(&FormatSpan { code: 'o', start: 0, end: 10 }));
        assert!(parsed.spans.contains(&FormatSpan { code: 'c', start: 4, end: 10 }));
        assert_eq!(parsed.spans.len(), 3);
    }

    #[test]
    fn test_repeated_style_keeps_first_start() {
        let parsed = parse("&nab&ncd");
        assert_eq!(parsed.spans, vec![FormatSpan { code: 'n', start: 0, end: 4 }]);
    }

    #[test]
    fn test_unterminated_spans_close_at_end() {
        let parsed = parse("&eyellow &mstruck");
        assert_eq!(parsed.text, "yellow struck");
        assert!(parsed.spans.contains(&FormatSpan { code: 'e', start: 0, end: 13 }));
        assert!(parsed.spans.contains(&FormatSpan { code: 'm', start: 7, end: 13 }));
    }

    #[test]
    fn test_animated_segment_shape() {
        let parsed = parse("&kabc&r");
        assert_eq!(parsed.char_len(), 3);
        assert_eq!(parsed.animations, vec![AnimatedSegment { start: 0, end: 3 }]);
        assert!(parsed.text.chars().all(|c| c.is_ascii_graphic() && c != '&'));
    }

    #[test]
    fn test_animated_substitution_varies() {
        let mut rng = StdRng::seed_from_u64(42);
        let differs = (0..16)
            .map(|_| parse_markup_with_rng("&kabc&r", &mut rng))
            .any(|p| p.text != "abc");
        assert!(differs);
    }

    #[test]
    fn test_animation_closed_at_end_of_input() {
        let parsed = parse("ab&kcd");
        assert_eq!(parsed.animations, vec![AnimatedSegment { start: 2, end: 4 }]);
        assert!(parsed.text.starts_with("ab"));
        assert!(parsed.has_animation());
    }

    #[test]
    fn test_placeholder_escapes_marker() {
        let parsed = parse("a&\u{200B}b");
        assert_eq!(parsed.text, "a&b");

        let parsed = parse("&kx&\u{200B}y&r");
        assert_eq!(parsed.char_len(), 3);
        assert_eq!(parsed.text.chars().nth(1), Some(' '));
    }

    #[test]
    fn test_trailing_marker_is_literal() {
        assert_eq!(parse("50&").text, "50&");
        assert_eq!(parse("§").text, "§");
    }

    #[test]
    fn test_unknown_code_is_literal() {
        let parsed = parse("&zq&A");
        assert_eq!(parsed.text, "&zq&A");
        assert!(parsed.spans.is_empty());
    }

    #[test]
    fn test_section_sign_marker() {
        let parsed = parse("§6gold§r");
        assert_eq!(parsed.text, "gold");
        assert_eq!(parsed.spans, vec![FormatSpan { code: '6', start: 0, end: 4 }]);
    }

    #[test]
    fn test_indices_count_characters() {
        let parsed = parse("&dこんにちは&r!");
        assert_eq!(parsed.spans, vec![FormatSpan { code: 'd', start: 0, end: 5 }]);
        assert_eq!(parsed.char_len(), 6);
    }

    #[test]
    fn test_contains_animation() {
        assert!(contains_animation("x&ky"));
        assert!(contains_animation("§k"));
        assert!(!contains_animation("&akey"));
        assert!(!contains_animation("k&"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse(""), ParsedMarkup::default());
    }
}
