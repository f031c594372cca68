//! Fixed-point fuzzy inference.
//!
//! Heights and masses are Q16 (`0x10000` = 1.0). Height functions map a
//! variable to a firing strength; the mass function folds one clause's
//! strength into a running centroid. Breakpoints may span the whole register
//! range, so differences are taken in 128 bits.

use tk_core::{mul_div_wide, saturate, Word, Q16_ONE};

/// `x - y` without leaving 128 bits.
#[inline]
fn diff(x: Word, y: Word) -> i128 {
    i128::from(x) - i128::from(y)
}

const ONE: i128 = Q16_ONE as i128;

/// Triangle: 0 at the edges, unity at `b`.
pub fn dh(a: Word, b: Word, c: Word, x: Word) -> Word {
    if !ordered(a, b, c) || x < a || x > c {
        return 0;
    }
    if x < b {
        mul_div_wide(ONE, diff(x, a), diff(b, a))
    } else if x == b {
        Q16_ONE
    } else {
        mul_div_wide(ONE, diff(c, x), diff(c, b))
    }
}

/// Rising edge from `a` to `b`; `c` only takes part in the order check.
pub fn sh(a: Word, b: Word, c: Word, x: Word) -> Word {
    if !ordered(a, b, c) || x <= a {
        0
    } else if x < b {
        mul_div_wide(ONE, diff(x, a), diff(b, a))
    } else {
        Q16_ONE
    }
}

/// Falling edge from `b` to `c`; `a` only takes part in the order check.
pub fn zh(a: Word, b: Word, c: Word, x: Word) -> Word {
    if !ordered(a, b, c) {
        0
    } else if x <= b {
        Q16_ONE
    } else if x < c {
        mul_div_wide(ONE, diff(c, x), diff(c, b))
    } else {
        0
    }
}

fn ordered(a: Word, b: Word, c: Word) -> bool {
    a <= b && b <= c
}

/// Running centroid accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuzzyResult {
    pub mass: Word,
    pub value: Word,
}

/// Centroid of the triangle `(a, b, c)` clipped at height `h`.
fn centroid(a: Word, b: Word, c: Word, h: Word) -> Word {
    let mid = (i128::from(a) + i128::from(c)) / 2;
    let skew = 2 * i128::from(b) - i128::from(c) - i128::from(a);
    saturate(mid + i128::from(mul_div_wide(i128::from(h), skew, 0x60000)))
}

/// Fold a triangular consequent fired at height `h` into `result`.
pub fn dm(a: Word, b: Word, c: Word, h: Word, result: &mut FuzzyResult) {
    let added_mass = mul_div_wide(i128::from(h), diff(c, a), 0x20000);
    let added_value = centroid(a, b, c, h);
    let total = result.mass.saturating_add(added_mass);
    if total != 0 {
        let shift = mul_div_wide(
            diff(added_value, result.value),
            i128::from(added_mass),
            i128::from(total),
        );
        result.value = result.value.saturating_add(shift);
    }
    result.mass = total;
}

/// Centroid and area (scaled by 0x100) of the triangle `(a, b, c)` clipped
/// at height `h`.
pub fn then_d(a: Word, b: Word, c: Word, h: Word) -> (Word, Word) {
    let area = diff(c, a)
        .saturating_mul(i128::from(h))
        .saturating_mul(0x20000 - i128::from(h));
    (centroid(a, b, c, h), saturate(area / 0x2000000))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Height {
    D,
    S,
    Z,
}

impl Height {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "D" => Some(Self::D),
            "S" => Some(Self::S),
            "Z" => Some(Self::Z),
            _ => None,
        }
    }

    pub fn eval(self, [a, b, c]: [Word; 3], x: Word) -> Word {
        match self {
            Self::D => dh(a, b, c, x),
            Self::S => sh(a, b, c, x),
            Self::Z => zh(a, b, c, x),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mass {
    D,
}

impl Mass {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "D" => Some(Self::D),
            _ => None,
        }
    }

    pub fn fold(self, [a, b, c]: [Word; 3], h: Word, result: &mut FuzzyResult) {
        match self {
            Self::D => dm(a, b, c, h, result),
        }
    }
}

/// One rule: `IF var IS height(a, b, c) THEN mass(a, b, c)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub var: usize,
    pub height: Height,
    pub when: [Word; 3],
    pub mass: Mass,
    pub then: [Word; 3],
}

/// Evaluate every clause in order and return the centroid.
///
/// A clause naming a variable past the end of `vars` reads 0.
pub fn process_fuzzy(clauses: &[Clause], vars: &[Word]) -> Word {
    let mut result = FuzzyResult::default();
    for clause in clauses {
        let x = vars.get(clause.var).copied().unwrap_or(0);
        let h = clause.height.eval(clause.when, x);
        clause.mass.fold(clause.then, h, &mut result);
    }
    result.value
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zh_boundaries_and_midpoint() {
        let z = |x| zh(-50, -50, -30, x);
        assert_eq!(z(-60), 0x10000);
        assert_eq!(z(-50), 0x10000);
        assert_eq!(z(-40), 0x8000);
        assert_eq!(z(-30), 0);
        assert_eq!(z(-20), 0);
    }

    #[test]
    fn sh_boundaries_and_midpoint() {
        let s = |x| sh(-50, -30, -30, x);
        assert_eq!(s(-60), 0);
        assert_eq!(s(-50), 0);
        assert_eq!(s(-40), 0x8000);
        assert_eq!(s(-30), 0x10000);
        assert_eq!(s(-20), 0x10000);
    }

    #[test]
    fn dh_peaks_at_b() {
        assert_eq!(dh(0, 10, 20, -1), 0);
        assert_eq!(dh(0, 10, 20, 0), 0);
        assert_eq!(dh(0, 10, 20, 5), 0x8000);
        assert_eq!(dh(0, 10, 20, 10), 0x10000);
        assert_eq!(dh(0, 10, 20, 15), 0x8000);
        assert_eq!(dh(0, 10, 20, 20), 0);
        assert_eq!(dh(0, 10, 20, 21), 0);
    }

    #[test]
    fn out_of_order_breakpoints_yield_zero() {
        assert_eq!(dh(10, 0, 20, 5), 0);
        assert_eq!(sh(10, 0, 20, 15), 0);
        assert_eq!(zh(0, 20, 10, 5), 0);
    }

    #[test]
    fn then_d_reference_points() {
        assert_eq!(then_d(100, 400, 700, 0), (400, 0));
        assert_eq!(then_d(100, 400, 700, 0x8000), (400, 900 * 0x40));
        assert_eq!(then_d(100, 400, 700, 0x10000), (400, 300 * 0x100));
    }

    #[test]
    fn dm_accumulates_centroid() {
        let mut r = FuzzyResult::default();
        dm(100, 400, 700, 0, &mut r);
        assert_eq!(r, FuzzyResult { mass: 0, value: 0 });

        dm(0, 100, 200, 0x10000, &mut r);
        assert_eq!(r, FuzzyResult { mass: 100, value: 100 });

        // equal mass at 300 moves the centroid half way
        dm(200, 300, 400, 0x10000, &mut r);
        assert_eq!(r, FuzzyResult { mass: 200, value: 200 });
    }

    #[test]
    fn extreme_breakpoints_do_not_overflow() {
        assert_eq!(dh(Word::MIN, 0, Word::MAX, 0), Q16_ONE);
        assert_eq!(dh(Word::MIN, 0, Word::MAX, 1), 0xFFFF);
        assert_eq!(sh(Word::MIN, Word::MAX, Word::MAX, 0), 0x8000);
        assert_eq!(zh(Word::MIN, Word::MIN, Word::MAX, 0), 0x7FFF);

        let (value, weight) = then_d(Word::MIN, 0, Word::MAX, Q16_ONE);
        assert_eq!(value, 0);
        assert!(weight > 0);

        let mut r = FuzzyResult::default();
        dm(Word::MIN, Word::MAX, Word::MAX, Q16_ONE, &mut r);
        dm(Word::MIN, Word::MIN, Word::MAX, Q16_ONE, &mut r);
        assert!(r.mass > 0);
    }

    #[test]
    fn process_fuzzy_blends_rules() {
        let clauses = vec![
            Clause {
                var: 0,
                height: Height::Z,
                when: [0, 0, 100],
                mass: Mass::D,
                then: [0, 100, 200],
            },
            Clause {
                var: 0,
                height: Height::S,
                when: [0, 100, 100],
                mass: Mass::D,
                then: [200, 300, 400],
            },
        ];
        assert_eq!(process_fuzzy(&clauses, &[0]), 100);
        assert_eq!(process_fuzzy(&clauses, &[100]), 300);
        assert_eq!(process_fuzzy(&clauses, &[50]), 200);
        assert_eq!(process_fuzzy(&[], &[50]), 0);
    }

    proptest! {
        #[test]
        fn heights_stay_in_unit_range(
            a in -10_000i64..10_000,
            db in 0i64..5_000,
            dc in 0i64..5_000,
            x in -20_000i64..20_000,
        ) {
            let (b, c) = (a + db, a + db + dc);
            for h in [dh(a, b, c, x), sh(a, b, c, x), zh(a, b, c, x)] {
                prop_assert!((0..=Q16_ONE).contains(&h));
            }
        }

        #[test]
        fn heights_stay_in_unit_range_across_the_register(
            points in prop::array::uniform3(any::<Word>()),
            x in any::<Word>(),
        ) {
            let mut points = points;
            points.sort_unstable();
            let [a, b, c] = points;
            for h in [dh(a, b, c, x), sh(a, b, c, x), zh(a, b, c, x)] {
                prop_assert!((0..=Q16_ONE).contains(&h));
            }
        }
    }
}
