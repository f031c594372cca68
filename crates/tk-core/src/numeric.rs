/// Register word: every signal exchanged between blocks is one of these.
pub type Word = i64;

/// Q16 fixed point unity (height/weight 1.0).
pub const Q16_ONE: Word = 0x10000;

/// `a * b / d` with a 128-bit intermediate, truncating toward zero.
///
/// Returns 0 when `d` is zero; the result saturates at the `Word` range.
#[inline]
pub fn mul_div(a: Word, b: Word, d: Word) -> Word {
    mul_div_wide(i128::from(a), i128::from(b), i128::from(d))
}

/// [`mul_div`] over operands that already left the `Word` range, such as
/// differences of two registers.
#[inline]
pub fn mul_div_wide(a: i128, b: i128, d: i128) -> Word {
    if d == 0 {
        return 0;
    }
    saturate(a.saturating_mul(b) / d)
}

/// Clamp a wide intermediate into the register range.
#[inline]
pub fn saturate(v: i128) -> Word {
    v.clamp(i128::from(Word::MIN), i128::from(Word::MAX)) as Word
}

/// Boolean register values are exactly 0 or 1.
#[inline]
pub fn as_bool(v: Word) -> Option<bool> {
    match v {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

#[inline]
pub fn from_bool(b: bool) -> Word {
    Word::from(b)
}

/// Parse a decimal configuration literal with an optional sign.
pub fn parse_word(text: &str) -> Option<Word> {
    let t = text.trim();
    let digits = t.strip_prefix(['+', '-']).unwrap_or(t);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    t.parse().ok()
}
