use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A single result-set cell. Executors are responsible for mapping
/// backend-specific types onto these variants before comparison.
#[derive(Debug, Clone)]
pub enum CellValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Canonical bit pattern for float comparison: all NaNs collapse to one
/// value, -0.0 collapses to 0.0.
fn canonical_bits(x: f64) -> u64 {
    if x.is_nan() {
        f64::NAN.to_bits()
    } else if x == 0.0 {
        0.0f64.to_bits()
    } else {
        x.to_bits()
    }
}

/// Exact comparison of an i64 against an f64. Going through `i as f64`
/// would round integers beyond 2^53 and conflate distinct values, so the
/// float is decomposed instead: its truncation is exactly representable as
/// i64 whenever it is in range.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    // NaNs sort above every number, matching total_cmp on the canonical
    // positive NaN.
    if f.is_nan() {
        return Ordering::Less;
    }
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let truncated = f.trunc();
    match i.cmp(&(truncated as i64)) {
        Ordering::Equal if f > truncated => Ordering::Less,
        Ordering::Equal if f < truncated => Ordering::Greater,
        other => other,
    }
}

impl CellValue {
    // Sort group: Null < Boolean < numeric < Text
    fn group(&self) -> u8 {
        match self {
            CellValue::Null => 0,
            CellValue::Boolean(_) => 1,
            CellValue::Integer(_) | CellValue::Float(_) => 2,
            CellValue::Text(_) => 3,
        }
    }

    /// Rounds floats to the given number of decimal places; other variants
    /// pass through unchanged.
    pub fn rounded(&self, decimal_points: u32) -> CellValue {
        match self {
            CellValue::Float(f) => {
                let scale = 10f64.powi(decimal_points as i32);
                CellValue::Float((f * scale).round() / scale)
            }
            other => other.clone(),
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Boolean(a), CellValue::Boolean(b)) => a == b,
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Integer(a), CellValue::Integer(b)) => a == b,
            (CellValue::Integer(a), CellValue::Float(b)) => cmp_int_float(*a, *b).is_eq(),
            (CellValue::Float(a), CellValue::Integer(b)) => cmp_int_float(*b, *a).is_eq(),
            (CellValue::Float(a), CellValue::Float(b)) => canonical_bits(*a) == canonical_bits(*b),
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group().hash(state);
        match self {
            CellValue::Null => {}
            CellValue::Boolean(b) => b.hash(state),
            // An integer can only equal a float when it is exactly
            // representable as one; those hash through the float bits so the
            // equal pair collides, the rest hash their own value.
            CellValue::Integer(i) => {
                let f = *i as f64;
                if f as i64 == *i {
                    canonical_bits(f).hash(state)
                } else {
                    i.hash(state)
                }
            }
            CellValue::Float(f) => canonical_bits(*f).hash(state),
            CellValue::Text(s) => s.hash(state),
        }
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellValue::Boolean(a), CellValue::Boolean(b)) => a.cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (CellValue::Integer(a), CellValue::Integer(b)) => a.cmp(b),
            (CellValue::Integer(a), CellValue::Float(b)) => cmp_int_float(*a, *b),
            (CellValue::Float(a), CellValue::Integer(b)) => cmp_int_float(*b, *a).reverse(),
            (CellValue::Float(a), CellValue::Float(b)) => {
                f64::from_bits(canonical_bits(*a)).total_cmp(&f64::from_bits(canonical_bits(*b)))
            }
            _ => self.group().cmp(&other.group()),
        }
    }
}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
