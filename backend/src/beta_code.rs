//! Conversion between Beta Code and Unicode Greek.
//!
//! Beta Code writes Greek with ASCII letters and punctuation markers:
//!
//! - `*` before a letter marks a capital (`*A` → Α). Letter case is ignored,
//!   since Perseus texts are encoded in lower case.
//! - `)` smooth breathing, `(` rough breathing
//! - `/` acute, `\` grave, `=` circumflex
//! - `+` diaeresis, `|` iota subscript
//! - `%26` short (breve), `%27` long (macron)
//! - `S` is σ inside a word and ς at the end of one; `S1`, `S2` and `S3`
//!   force the medial, final and lunate forms.
//!
//! Markers may follow the letter (`A)/`), sit between the asterisk and a
//! capital (`*)/A`), or precede the asterisk (`)/*A`). Whatever the input
//! order, marks are composed in one fixed order: length, breathing,
//! diaeresis, accent, iota subscript.
//!
//! Sequences that cannot be read as Greek pass through unchanged. Corpora mix
//! encodings, and one odd character must not fail a whole text.
//!
//! See <http://www.tlg.uci.edu/encoding/quickbeta.pdf> for the full scheme.

use unicode_normalization::UnicodeNormalization;

use crate::errors::TransliterationError;

const SMOOTH: char = '\u{0313}';
const ROUGH: char = '\u{0314}';
const ACUTE: char = '\u{0301}';
const GRAVE: char = '\u{0300}';
const CIRCUMFLEX: char = '\u{0342}';
const DIAERESIS: char = '\u{0308}';
const IOTA_SUBSCRIPT: char = '\u{0345}';
const BREVE: char = '\u{0306}';
const MACRON: char = '\u{0304}';

/// Written for a smooth breathing that has no vowel to sit on, e.g. `KAT)` → κατʼ.
const ELISION: char = '\u{02BC}';

/// Beta Code letter, lower case, capital.
static LETTERS: &[(char, char, char)] = &[
    ('A', 'α', 'Α'),
    ('B', 'β', 'Β'),
    ('G', 'γ', 'Γ'),
    ('D', 'δ', 'Δ'),
    ('E', 'ε', 'Ε'),
    ('V', 'ϝ', 'Ϝ'),
    ('Z', 'ζ', 'Ζ'),
    ('H', 'η', 'Η'),
    ('Q', 'θ', 'Θ'),
    ('I', 'ι', 'Ι'),
    ('K', 'κ', 'Κ'),
    ('L', 'λ', 'Λ'),
    ('M', 'μ', 'Μ'),
    ('N', 'ν', 'Ν'),
    ('C', 'ξ', 'Ξ'),
    ('O', 'ο', 'Ο'),
    ('P', 'π', 'Π'),
    ('R', 'ρ', 'Ρ'),
    ('S', 'σ', 'Σ'),
    ('T', 'τ', 'Τ'),
    ('U', 'υ', 'Υ'),
    ('F', 'φ', 'Φ'),
    ('X', 'χ', 'Χ'),
    ('Y', 'ψ', 'Ψ'),
    ('W', 'ω', 'Ω'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Smooth,
    Rough,
    Acute,
    Grave,
    Circumflex,
    Diaeresis,
    IotaSubscript,
    Short,
    Long,
}

impl Mark {
    fn beta(&self) -> &'static str {
        match self {
            Mark::Smooth => ")",
            Mark::Rough => "(",
            Mark::Acute => "/",
            Mark::Grave => "\\",
            Mark::Circumflex => "=",
            Mark::Diaeresis => "+",
            Mark::IotaSubscript => "|",
            Mark::Short => "%26",
            Mark::Long => "%27",
        }
    }

    fn from_combining(c: char) -> Option<Mark> {
        match c {
            SMOOTH => Some(Mark::Smooth),
            ROUGH => Some(Mark::Rough),
            ACUTE => Some(Mark::Acute),
            GRAVE => Some(Mark::Grave),
            CIRCUMFLEX => Some(Mark::Circumflex),
            DIAERESIS => Some(Mark::Diaeresis),
            IOTA_SUBSCRIPT => Some(Mark::IotaSubscript),
            BREVE => Some(Mark::Short),
            MACRON => Some(Mark::Long),
            _ => None,
        }
    }
}

/// Read a marker starting at `i`, returning it with its width in chars.
fn mark_at(cs: &[char], i: usize) -> Option<(Mark, usize)> {
    let mark = match cs.get(i)? {
        ')' => Mark::Smooth,
        '(' => Mark::Rough,
        '/' => Mark::Acute,
        '\\' => Mark::Grave,
        '=' => Mark::Circumflex,
        '+' => Mark::Diaeresis,
        '|' => Mark::IotaSubscript,
        '%' => {
            return match (cs.get(i + 1), cs.get(i + 2)) {
                (Some('2'), Some('6')) => Some((Mark::Short, 3)),
                (Some('2'), Some('7')) => Some((Mark::Long, 3)),
                _ => None,
            };
        }
        _ => return None,
    };
    Some((mark, 1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Breathing {
    #[default]
    None,
    Smooth,
    Rough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Accent {
    #[default]
    None,
    Acute,
    Grave,
    Circumflex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Length {
    #[default]
    None,
    Short,
    Long,
}

/// Which sigma to write. `Contextual` follows the word boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SigmaForm {
    #[default]
    Contextual,
    Medial,
    Final,
    Lunate,
}

/// One letter with its diacritics, independent of either notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BetaCodeToken {
    /// Upper case Beta Code letter.
    pub letter: char,
    pub capital: bool,
    pub breathing: Breathing,
    pub accent: Accent,
    pub diaeresis: bool,
    pub iota_subscript: bool,
    pub length: Length,
    pub sigma: SigmaForm,
    pub at_word_end: bool,
}

impl BetaCodeToken {
    fn new(letter: char, capital: bool) -> Self {
        BetaCodeToken {
            letter,
            capital,
            breathing: Breathing::None,
            accent: Accent::None,
            diaeresis: false,
            iota_subscript: false,
            length: Length::None,
            sigma: SigmaForm::Contextual,
            at_word_end: false,
        }
    }

    fn is_vowel(&self) -> bool {
        matches!(self.letter, 'A' | 'E' | 'H' | 'I' | 'O' | 'U' | 'W')
    }

    fn accepts(&self, mark: Mark) -> bool {
        match mark {
            Mark::Smooth | Mark::Rough => self.is_vowel() || self.letter == 'R',
            Mark::Acute | Mark::Grave | Mark::Circumflex => self.is_vowel(),
            Mark::Diaeresis => matches!(self.letter, 'I' | 'U'),
            Mark::IotaSubscript => matches!(self.letter, 'A' | 'H' | 'W'),
            Mark::Short | Mark::Long => matches!(self.letter, 'A' | 'I' | 'U'),
        }
    }

    /// Put the mark on this letter if the letter can carry it.
    fn try_apply(&mut self, mark: Mark) -> bool {
        if !self.accepts(mark) {
            return false;
        }
        match mark {
            Mark::Smooth => self.breathing = Breathing::Smooth,
            Mark::Rough => self.breathing = Breathing::Rough,
            Mark::Acute => self.accent = Accent::Acute,
            Mark::Grave => self.accent = Accent::Grave,
            Mark::Circumflex => self.accent = Accent::Circumflex,
            Mark::Diaeresis => self.diaeresis = true,
            Mark::IotaSubscript => self.iota_subscript = true,
            Mark::Short => self.length = Length::Short,
            Mark::Long => self.length = Length::Long,
        }
        true
    }

    fn base_char(&self) -> char {
        if self.letter == 'S' {
            return match (self.capital, self.sigma) {
                (true, SigmaForm::Lunate) => 'Ϲ',
                (true, _) => 'Σ',
                (false, SigmaForm::Lunate) => 'ϲ',
                (false, SigmaForm::Medial) => 'σ',
                (false, SigmaForm::Final) => 'ς',
                (false, SigmaForm::Contextual) => {
                    if self.at_word_end {
                        'ς'
                    } else {
                        'σ'
                    }
                }
            };
        }

        LETTERS
            .iter()
            .find(|(b, _, _)| *b == self.letter)
            .map(|(_, lower, upper)| if self.capital { *upper } else { *lower })
            .unwrap_or(self.letter)
    }

    fn to_unicode(&self) -> String {
        let mut s = String::new();
        s.push(self.base_char());

        match self.length {
            Length::Short => s.push(BREVE),
            Length::Long => s.push(MACRON),
            Length::None => {}
        }
        match self.breathing {
            Breathing::Smooth => s.push(SMOOTH),
            Breathing::Rough => s.push(ROUGH),
            Breathing::None => {}
        }
        if self.diaeresis {
            s.push(DIAERESIS);
        }
        match self.accent {
            Accent::Acute => s.push(ACUTE),
            Accent::Grave => s.push(GRAVE),
            Accent::Circumflex => s.push(CIRCUMFLEX),
            Accent::None => {}
        }
        if self.iota_subscript {
            s.push(IOTA_SUBSCRIPT);
        }

        s.nfc().collect()
    }

    fn write_beta(&self, out: &mut String) {
        let mut marks = String::new();
        match self.breathing {
            Breathing::Smooth => marks.push(')'),
            Breathing::Rough => marks.push('('),
            Breathing::None => {}
        }
        if self.diaeresis {
            marks.push('+');
        }
        match self.accent {
            Accent::Acute => marks.push('/'),
            Accent::Grave => marks.push('\\'),
            Accent::Circumflex => marks.push('='),
            Accent::None => {}
        }

        if self.capital {
            out.push('*');
            out.push_str(&marks);
            out.push(self.letter);
        } else {
            out.push(self.letter);
        }

        if self.letter == 'S' {
            match self.sigma {
                SigmaForm::Contextual => {}
                SigmaForm::Medial => out.push('1'),
                SigmaForm::Final => out.push('2'),
                SigmaForm::Lunate => out.push('3'),
            }
        }

        if !self.capital {
            out.push_str(&marks);
        }
        if self.iota_subscript {
            out.push('|');
        }
        match self.length {
            Length::Short => out.push_str(Mark::Short.beta()),
            Length::Long => out.push_str(Mark::Long.beta()),
            Length::None => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Letter(BetaCodeToken),
    Elision,
    Raw(String),
}

fn push_raw(segments: &mut Vec<Segment>, s: &str) {
    if let Some(Segment::Raw(last)) = segments.last_mut() {
        last.push_str(s);
    } else {
        segments.push(Segment::Raw(s.to_string()));
    }
}

fn push_raw_char(segments: &mut Vec<Segment>, c: char) {
    let mut buf = [0u8; 4];
    push_raw(segments, c.encode_utf8(&mut buf));
}

/// A marker with nothing to attach to.
fn push_dangling(segments: &mut Vec<Segment>, mark: Mark) {
    if mark == Mark::Smooth {
        segments.push(Segment::Elision);
    } else {
        push_raw(segments, mark.beta());
    }
}

fn beta_letter(c: char) -> Option<char> {
    let upper = c.to_ascii_uppercase();
    LETTERS
        .iter()
        .any(|(b, _, _)| *b == upper)
        .then_some(upper)
}

fn sigma_digit(c: char) -> Option<SigmaForm> {
    match c {
        '1' => Some(SigmaForm::Medial),
        '2' => Some(SigmaForm::Final),
        '3' => Some(SigmaForm::Lunate),
        _ => None,
    }
}

/// Beta Code letter, capital flag and sigma form for a Unicode base letter.
fn greek_base(c: char) -> Option<(char, bool, SigmaForm)> {
    match c {
        'σ' => return Some(('S', false, SigmaForm::Medial)),
        'ς' => return Some(('S', false, SigmaForm::Final)),
        'ϲ' => return Some(('S', false, SigmaForm::Lunate)),
        'Ϲ' => return Some(('S', true, SigmaForm::Lunate)),
        _ => {}
    }

    LETTERS.iter().find_map(|(b, lower, upper)| {
        if c == *lower {
            Some((*b, false, SigmaForm::Contextual))
        } else if c == *upper {
            Some((*b, true, SigmaForm::Contextual))
        } else {
            None
        }
    })
}

/// Sigma digits and trailing markers after a letter. Returns the next index.
fn parse_suffix(cs: &[char], start: usize, token: &mut BetaCodeToken) -> usize {
    let mut i = start;

    if token.letter == 'S' {
        if let Some(form) = cs.get(i).copied().and_then(sigma_digit) {
            token.sigma = form;
            i += 1;
        }
    }

    while let Some((mark, width)) = mark_at(cs, i) {
        if !token.try_apply(mark) {
            break;
        }
        i += width;
    }

    i
}

/// Parse a capital whose asterisk ends just before `start`. `before_star`
/// holds markers written ahead of the asterisk.
fn parse_capital(cs: &[char], start: usize, before_star: Vec<Mark>, segments: &mut Vec<Segment>) -> usize {
    let mut j = start;
    let mut after_star = Vec::new();
    while let Some((mark, width)) = mark_at(cs, j) {
        after_star.push(mark);
        j += width;
    }

    match cs.get(j).copied().and_then(beta_letter) {
        Some(letter) => {
            let mut token = BetaCodeToken::new(letter, true);
            for mark in before_star.into_iter().chain(after_star) {
                if !token.try_apply(mark) {
                    push_dangling(segments, mark);
                }
            }
            let next = parse_suffix(cs, j + 1, &mut token);
            segments.push(Segment::Letter(token));
            next
        }
        None => {
            // A lone asterisk. The markers after it get read again as dangling.
            for mark in before_star {
                push_dangling(segments, mark);
            }
            push_raw_char(segments, '*');
            start
        }
    }
}

fn continues_word(segment: Option<&Segment>) -> bool {
    match segment {
        Some(Segment::Letter(_)) => true,
        Some(Segment::Raw(s)) => s.chars().next().is_some_and(|c| c.is_alphabetic()),
        Some(Segment::Elision) | None => false,
    }
}

/// Settle word-final context for every sigma, and drop explicit sigma forms
/// that say no more than the context does.
fn resolve_sigmas(segments: &mut [Segment]) {
    for idx in 0..segments.len() {
        let at_end = !continues_word(segments.get(idx + 1));

        if let Segment::Letter(token) = &mut segments[idx] {
            if token.letter != 'S' {
                continue;
            }
            token.at_word_end = at_end;

            if token.capital {
                if token.sigma != SigmaForm::Lunate {
                    token.sigma = SigmaForm::Contextual;
                }
                continue;
            }

            match token.sigma {
                SigmaForm::Medial if !at_end => token.sigma = SigmaForm::Contextual,
                SigmaForm::Final if at_end => token.sigma = SigmaForm::Contextual,
                _ => {}
            }
        }
    }
}

fn parse_beta(text: &str) -> Vec<Segment> {
    let cs: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < cs.len() {
        let c = cs[i];

        if c == '*' {
            i = parse_capital(&cs, i + 1, Vec::new(), &mut segments);
        } else if let Some((mark, width)) = mark_at(&cs, i) {
            // Markers ahead of a capital, as in "(/*H".
            let mut marks = vec![mark];
            let mut j = i + width;
            while let Some((m, w)) = mark_at(&cs, j) {
                marks.push(m);
                j += w;
            }

            if cs.get(j) == Some(&'*') {
                i = parse_capital(&cs, j + 1, marks, &mut segments);
            } else {
                push_dangling(&mut segments, mark);
                i += width;
            }
        } else if let Some(letter) = beta_letter(c) {
            let mut token = BetaCodeToken::new(letter, false);
            i = parse_suffix(&cs, i + 1, &mut token);
            segments.push(Segment::Letter(token));
        } else {
            push_raw_char(&mut segments, c);
            i += 1;
        }
    }

    resolve_sigmas(&mut segments);
    segments
}

fn parse_unicode(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut raw = String::new();
    let mut chars = text.nfd().peekable();

    fn flush(raw: &mut String, segments: &mut Vec<Segment>) {
        if !raw.is_empty() {
            let composed: String = raw.nfc().collect();
            push_raw(segments, &composed);
            raw.clear();
        }
    }

    while let Some(c) = chars.next() {
        if let Some((letter, capital, sigma)) = greek_base(c) {
            flush(&mut raw, &mut segments);

            let mut token = BetaCodeToken::new(letter, capital);
            token.sigma = sigma;

            while let Some(mark) = chars.peek().copied().and_then(Mark::from_combining) {
                if !token.try_apply(mark) {
                    break;
                }
                chars.next();
            }

            segments.push(Segment::Letter(token));
        } else if c == ELISION {
            flush(&mut raw, &mut segments);
            segments.push(Segment::Elision);
        } else {
            raw.push(c);
        }
    }
    flush(&mut raw, &mut segments);

    resolve_sigmas(&mut segments);
    segments
}

fn render_beta(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Letter(token) => token.write_beta(&mut out),
            Segment::Elision => out.push(')'),
            Segment::Raw(s) => out.push_str(s),
        }
    }
    out
}

/// Convert Beta Code to Unicode Greek.
pub fn to_unicode(beta_code: &str) -> String {
    let mut out = String::with_capacity(beta_code.len() * 2);
    for segment in parse_beta(beta_code) {
        match segment {
            Segment::Letter(token) => out.push_str(&token.to_unicode()),
            Segment::Elision => out.push(ELISION),
            Segment::Raw(s) => out.push_str(&s),
        }
    }
    out
}

/// Convert raw bytes of Beta Code, failing only when they are not UTF-8.
pub fn bytes_to_unicode(bytes: &[u8]) -> Result<String, TransliterationError> {
    let text = std::str::from_utf8(bytes).map_err(|e| TransliterationError::Encoding {
        position: e.valid_up_to(),
    })?;
    Ok(to_unicode(text))
}

/// Convert Unicode Greek to Beta Code, upper case, markers in canonical order.
pub fn to_beta_code(unicode: &str) -> String {
    render_beta(&parse_unicode(unicode))
}

/// Rewrite Beta Code with upper case letters and markers in canonical order.
///
/// `to_beta_code(&to_unicode(x)) == canonicalize(x)` for valid Beta Code.
pub fn canonicalize(beta_code: &str) -> String {
    render_beta(&parse_beta(beta_code))
}

/// Change every σ that ends a word into ς, e.g. "λογοσ" → "λογος".
pub fn fix_final_sigma(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    for (i, c) in chars.iter().enumerate() {
        if *c == 'σ' {
            // Skip over combining marks when looking for the next letter.
            let next = chars[i + 1..]
                .iter()
                .find(|n| !unicode_normalization::char::is_combining_mark(**n));
            let at_end = !next.is_some_and(|n| n.is_alphanumeric() || *n == '_');
            out.push(if at_end { 'ς' } else { 'σ' });
        } else {
            out.push(*c);
        }
    }

    out
}
