//! Symbolic integer arithmetic for shape dimensions.
//!
//! A [`SymInt`] is an immutable polynomial over integer constants, named
//! unknowns and composite `floor`/`ceil` quotients, kept permanently in a
//! canonical normal form: an ordered sum of monomials with like terms merged
//! and zero coefficients dropped. Because the representation *is* the normal
//! form, two mathematically equal expressions (within the supported grammar)
//! are structurally equal, and [`SymInt::symbolic_equals`] reduces to `==`.
//!
//! Coefficients are `i64`. Construction-time arithmetic assumes the bounded
//! magnitudes of shape dimensions and does not check for overflow;
//! [`SymInt::eval`], which receives caller-supplied values, reports overflow
//! as [`SymIntError::Overflow`].
//!
//! Unknowns and composite quotients are minted through a [`Registry`], which
//! each [`Graph`](crate::graph::Graph) owns. The registry uses interior
//! mutability so shape inference can create expressions through a shared
//! graph reference; the design assumes single-threaded use and provides no
//! internal locking.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use thiserror::Error;

/// Errors raised by symbolic integer arithmetic.
#[derive(Debug, Clone, Error)]
pub enum SymIntError {
    /// Division by a statically-zero divisor.
    #[error("symbolic division by zero")]
    DivisionByZero,

    /// A subtraction produced a statically-provable negative dimension.
    #[error("symbolic expression '{expr}' is provably negative")]
    NegativeResult {
        /// Display form of the offending expression.
        expr: String,
    },

    /// Evaluation hit a symbol with no bound value.
    #[error("symbol s{id} has no bound value")]
    UnboundSymbol {
        /// The unbound symbol id.
        id: usize,
    },

    /// Evaluation overflowed the 64-bit integer range.
    #[error("symbolic evaluation overflowed the 64-bit range")]
    Overflow,
}

/// An irreducible factor of a monomial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Atom {
    /// A named unknown, identified by its registry id.
    Symbol(usize),
    /// `floor(a / b)` that could not be simplified away.
    Floor(Box<SymInt>, Box<SymInt>),
    /// `ceil(a / b)` that could not be simplified away.
    Ceil(Box<SymInt>, Box<SymInt>),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Symbol(id) => write!(f, "s{id}"),
            Atom::Floor(a, b) => write!(f, "floor({a}, {b})"),
            Atom::Ceil(a, b) => write!(f, "ceil({a}, {b})"),
        }
    }
}

/// A single product term: coefficient times powers of atoms.
///
/// `factors` is sorted by atom and contains no zero powers; an empty factor
/// list denotes the constant term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Monomial {
    factors: Vec<(Atom, u32)>,
    coefficient: i64,
}

impl Monomial {
    fn constant(coefficient: i64) -> Self {
        Self {
            factors: Vec::new(),
            coefficient,
        }
    }

    fn product(&self, other: &Self) -> Self {
        let mut factors = Vec::with_capacity(self.factors.len() + other.factors.len());
        let (mut i, mut j) = (0, 0);
        while i < self.factors.len() && j < other.factors.len() {
            match self.factors[i].0.cmp(&other.factors[j].0) {
                std::cmp::Ordering::Less => {
                    factors.push(self.factors[i].clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    factors.push(other.factors[j].clone());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    factors.push((
                        self.factors[i].0.clone(),
                        self.factors[i].1 + other.factors[j].1,
                    ));
                    i += 1;
                    j += 1;
                }
            }
        }
        factors.extend_from_slice(&self.factors[i..]);
        factors.extend_from_slice(&other.factors[j..]);
        Self {
            factors,
            coefficient: self.coefficient * other.coefficient,
        }
    }

    /// Attempts exact division by `divisor`; `None` when it does not divide.
    fn divide_by(&self, divisor: &Self) -> Option<Self> {
        if divisor.coefficient == 0 || self.coefficient % divisor.coefficient != 0 {
            return None;
        }
        let mut factors = self.factors.clone();
        for (atom, power) in &divisor.factors {
            let slot = factors.iter_mut().find(|(a, _)| a == atom)?;
            if slot.1 < *power {
                return None;
            }
            slot.1 -= power;
        }
        factors.retain(|(_, p)| *p > 0);
        Some(Self {
            factors,
            coefficient: self.coefficient / divisor.coefficient,
        })
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.factors.is_empty() {
            return write!(f, "{}", self.coefficient);
        }
        if self.coefficient == -1 {
            write!(f, "-")?;
        } else if self.coefficient != 1 {
            write!(f, "{}*", self.coefficient)?;
        }
        for (i, (atom, power)) in self.factors.iter().enumerate() {
            if i > 0 {
                write!(f, "*")?;
            }
            if *power == 1 {
                write!(f, "{atom}")?;
            } else {
                write!(f, "{atom}^{power}")?;
            }
        }
        Ok(())
    }
}

/// A symbolic integer in canonical polynomial form.
///
/// The derived `Ord` is the lexicographic order used for canonical term
/// ordering; it is *not* a numeric order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymInt {
    terms: Vec<Monomial>,
}

impl SymInt {
    /// The constant zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// The constant one.
    pub fn one() -> Self {
        Self::from(1)
    }

    fn from_terms(terms: Vec<Monomial>) -> Self {
        let mut terms = terms;
        terms.sort_by(|a, b| a.factors.cmp(&b.factors));
        let mut merged: Vec<Monomial> = Vec::with_capacity(terms.len());
        for term in terms {
            if let Some(last) = merged.last_mut() {
                if last.factors == term.factors {
                    last.coefficient += term.coefficient;
                    continue;
                }
            }
            merged.push(term);
        }
        merged.retain(|t| t.coefficient != 0);
        Self { terms: merged }
    }

    fn atom(atom: Atom) -> Self {
        Self {
            terms: vec![Monomial {
                factors: vec![(atom, 1)],
                coefficient: 1,
            }],
        }
    }

    /// Returns `true` when this expression is the constant zero.
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns `true` when this expression is the constant one.
    pub fn is_one(&self) -> bool {
        self.as_constant() == Some(1)
    }

    /// Returns the constant value when no unknowns appear.
    pub fn as_constant(&self) -> Option<i64> {
        match self.terms.as_slice() {
            [] => Some(0),
            [term] if term.factors.is_empty() => Some(term.coefficient),
            _ => None,
        }
    }

    /// Structural-after-normalization equality; identical to `==`.
    pub fn symbolic_equals(&self, other: &Self) -> bool {
        self == other
    }

    /// `true` when the expression is provably negative for any non-negative
    /// assignment of its unknowns: a negative constant, or a negative
    /// constant term with every monomial coefficient negative.
    pub fn is_provably_negative(&self) -> bool {
        if let Some(c) = self.as_constant() {
            return c < 0;
        }
        let constant = self
            .terms
            .iter()
            .find(|t| t.factors.is_empty())
            .map_or(0, |t| t.coefficient);
        constant < 0 && self.terms.iter().all(|t| t.coefficient < 0)
    }

    /// Subtraction that fails when the residual is provably negative.
    ///
    /// Plain `-` is total and keeps the best-effort symbolic residual; use
    /// this checked form for quantities that must denote dimensions.
    pub fn checked_sub(&self, other: &Self) -> Result<Self, SymIntError> {
        let residual = self.clone() - other.clone();
        if residual.is_provably_negative() {
            return Err(SymIntError::NegativeResult {
                expr: residual.to_string(),
            });
        }
        Ok(residual)
    }

    /// Attempts exact division, succeeding only when the quotient stays a
    /// polynomial: unit divisor, equal operands, constants, or a single
    /// monomial divisor dividing every term.
    pub fn div_exact(&self, divisor: &Self) -> Option<Self> {
        if divisor.is_one() {
            return Some(self.clone());
        }
        if self == divisor {
            return Some(Self::one());
        }
        if self.is_zero() {
            return Some(Self::zero());
        }
        match divisor.terms.as_slice() {
            [single] => {
                let quotient: Option<Vec<Monomial>> =
                    self.terms.iter().map(|t| t.divide_by(single)).collect();
                quotient.map(Self::from_terms)
            }
            _ => None,
        }
    }

    /// Substitutes concrete values for every symbol and folds the result.
    pub fn eval(&self, values: &HashMap<usize, i64>) -> Result<i64, SymIntError> {
        let mut total = 0i64;
        for term in &self.terms {
            let mut product = term.coefficient;
            for (atom, power) in &term.factors {
                let base = match atom {
                    Atom::Symbol(id) => *values
                        .get(id)
                        .ok_or(SymIntError::UnboundSymbol { id: *id })?,
                    Atom::Floor(a, b) => {
                        let divisor = b.eval(values)?;
                        if divisor == 0 {
                            return Err(SymIntError::DivisionByZero);
                        }
                        a.eval(values)?.div_euclid(divisor)
                    }
                    Atom::Ceil(a, b) => {
                        let divisor = b.eval(values)?;
                        if divisor == 0 {
                            return Err(SymIntError::DivisionByZero);
                        }
                        -(-a.eval(values)?).div_euclid(divisor)
                    }
                };
                let raised = base.checked_pow(*power).ok_or(SymIntError::Overflow)?;
                product = product.checked_mul(raised).ok_or(SymIntError::Overflow)?;
            }
            total = total.checked_add(product).ok_or(SymIntError::Overflow)?;
        }
        Ok(total)
    }
}

impl fmt::Display for SymInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                if term.coefficient < 0 {
                    let mut positive = term.clone();
                    positive.coefficient = -positive.coefficient;
                    write!(f, " - {positive}")?;
                    continue;
                }
                write!(f, " + ")?;
            }
            write!(f, "{term}")?;
        }
        Ok(())
    }
}

macro_rules! impl_symint_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SymInt {
                fn from(value: $t) -> Self {
                    let value = value as i64;
                    if value == 0 {
                        Self::zero()
                    } else {
                        Self { terms: vec![Monomial::constant(value)] }
                    }
                }
            }
        )*
    };
}

impl_symint_from!(i32, i64, u32, usize);

impl<T: Into<SymInt>> Add<T> for SymInt {
    type Output = SymInt;

    fn add(self, rhs: T) -> SymInt {
        let mut terms = self.terms;
        terms.extend(rhs.into().terms);
        SymInt::from_terms(terms)
    }
}

impl<T: Into<SymInt>> Sub<T> for SymInt {
    type Output = SymInt;

    fn sub(self, rhs: T) -> SymInt {
        self + (-rhs.into())
    }
}

impl<T: Into<SymInt>> Mul<T> for SymInt {
    type Output = SymInt;

    fn mul(self, rhs: T) -> SymInt {
        let rhs = rhs.into();
        let mut terms = Vec::with_capacity(self.terms.len() * rhs.terms.len());
        for a in &self.terms {
            for b in &rhs.terms {
                terms.push(a.product(b));
            }
        }
        SymInt::from_terms(terms)
    }
}

impl Neg for SymInt {
    type Output = SymInt;

    fn neg(mut self) -> SymInt {
        for term in &mut self.terms {
            term.coefficient = -term.coefficient;
        }
        self
    }
}

/// Allocates named unknowns and records composite `floor`/`ceil` forms.
///
/// Each graph owns one registry. The floor-type and ceil-type buckets
/// deduplicate structurally-equal composite quotients and are exposed
/// read-only for diagnostics, together with the running count of allocated
/// symbol ids.
#[derive(Debug, Default)]
pub struct Registry {
    next_symbol: Cell<usize>,
    floors: RefCell<Vec<(SymInt, SymInt)>>,
    ceils: RefCell<Vec<(SymInt, SymInt)>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh named unknown.
    pub fn new_symbol(&self) -> SymInt {
        let id = self.next_symbol.get();
        self.next_symbol.set(id + 1);
        SymInt::atom(Atom::Symbol(id))
    }

    /// Total number of symbol ids allocated so far.
    pub fn total_symbols(&self) -> usize {
        self.next_symbol.get()
    }

    /// Number of distinct composite floor quotients recorded.
    pub fn floor_entries(&self) -> usize {
        self.floors.borrow().len()
    }

    /// Number of distinct composite ceil quotients recorded.
    pub fn ceil_entries(&self) -> usize {
        self.ceils.borrow().len()
    }

    /// `floor(a / b)`, simplified where statically possible.
    pub fn floor(&self, a: &SymInt, b: &SymInt) -> Result<SymInt, SymIntError> {
        if b.is_zero() {
            return Err(SymIntError::DivisionByZero);
        }
        if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
            return Ok(SymInt::from(x.div_euclid(y)));
        }
        if let Some(exact) = a.div_exact(b) {
            return Ok(exact);
        }
        Self::record(&self.floors, a, b);
        Ok(SymInt::atom(Atom::Floor(
            Box::new(a.clone()),
            Box::new(b.clone()),
        )))
    }

    /// `ceil(a / b)`, simplified where statically possible.
    pub fn ceil(&self, a: &SymInt, b: &SymInt) -> Result<SymInt, SymIntError> {
        if b.is_zero() {
            return Err(SymIntError::DivisionByZero);
        }
        if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
            return Ok(SymInt::from(-(-x).div_euclid(y)));
        }
        if let Some(exact) = a.div_exact(b) {
            return Ok(exact);
        }
        Self::record(&self.ceils, a, b);
        Ok(SymInt::atom(Atom::Ceil(
            Box::new(a.clone()),
            Box::new(b.clone()),
        )))
    }

    fn record(bucket: &RefCell<Vec<(SymInt, SymInt)>>, a: &SymInt, b: &SymInt) {
        let mut bucket = bucket.borrow_mut();
        if !bucket.iter().any(|(x, y)| x == a && y == b) {
            bucket.push((a.clone(), b.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry_with_symbols(n: usize) -> (Registry, Vec<SymInt>) {
        let registry = Registry::new();
        let symbols = (0..n).map(|_| registry.new_symbol()).collect();
        (registry, symbols)
    }

    #[test]
    fn addition_is_commutative_and_merges_terms() {
        let (_, syms) = registry_with_symbols(2);
        let (a, b) = (syms[0].clone(), syms[1].clone());
        assert_eq!(a.clone() + b.clone(), b.clone() + a.clone());
        assert_eq!(a.clone() + a.clone(), a.clone() * 2);
    }

    #[test]
    fn multiplicative_identities_simplify() {
        let (_, syms) = registry_with_symbols(1);
        let a = syms[0].clone();
        assert_eq!(a.clone() * 1, a);
        assert_eq!(a.clone() * 0, SymInt::zero());
        assert_eq!(a.clone() + 0, a);
    }

    #[test]
    fn self_division_yields_one() {
        let (registry, syms) = registry_with_symbols(2);
        let product = syms[0].clone() * syms[1].clone() + syms[0].clone();
        assert_eq!(
            registry.floor(&product, &product).unwrap(),
            SymInt::one()
        );
        assert_eq!(registry.floor(&product, &SymInt::one()).unwrap(), product);
        assert_eq!(registry.floor_entries(), 0);
    }

    #[test]
    fn exact_monomial_division() {
        let (registry, syms) = registry_with_symbols(2);
        let (a, b) = (syms[0].clone(), syms[1].clone());
        let product = a.clone() * b.clone() * 6;
        assert_eq!(
            registry.floor(&product, &(b.clone() * 2)).unwrap(),
            a.clone() * 3
        );
        // A non-dividing quotient becomes a recorded composite.
        let composite = registry.floor(&(a.clone() + 1), &b).unwrap();
        assert_eq!(registry.floor_entries(), 1);
        // Requesting the same quotient again reuses the bucket entry.
        assert_eq!(registry.floor(&(a + 1), &b).unwrap(), composite);
        assert_eq!(registry.floor_entries(), 1);
    }

    #[test]
    fn constant_folding_uses_euclidean_semantics() {
        let registry = Registry::new();
        let seven = SymInt::from(7);
        let two = SymInt::from(2);
        assert_eq!(registry.floor(&seven, &two).unwrap(), SymInt::from(3));
        assert_eq!(registry.ceil(&seven, &two).unwrap(), SymInt::from(4));
        assert!(matches!(
            registry.floor(&seven, &SymInt::zero()),
            Err(SymIntError::DivisionByZero)
        ));
    }

    #[test]
    fn checked_sub_rejects_provable_negatives() {
        let (_, syms) = registry_with_symbols(1);
        let a = syms[0].clone();
        assert!(SymInt::from(2).checked_sub(&SymInt::from(5)).is_err());
        assert!((a.clone() * -1 - 1).is_provably_negative());
        // `a - 1` could still be non-negative for a >= 1.
        assert!(a.clone().checked_sub(&SymInt::one()).is_ok());
        assert_eq!(a.clone().checked_sub(&a).unwrap(), SymInt::zero());
    }

    #[test]
    fn eval_substitutes_symbols() {
        let (registry, syms) = registry_with_symbols(2);
        let (a, b) = (syms[0].clone(), syms[1].clone());
        let expr = a.clone() * a.clone() + b.clone() * 3 + 1;
        let values = HashMap::from([(0, 4i64), (1, 2i64)]);
        assert_eq!(expr.eval(&values).unwrap(), 23);
        let quotient = registry.floor(&(a + 1), &b).unwrap();
        assert_eq!(quotient.eval(&values).unwrap(), 2);
        assert!(matches!(
            syms[1].eval(&HashMap::new()),
            Err(SymIntError::UnboundSymbol { id: 1 })
        ));
    }

    #[test]
    fn eval_reports_overflow() {
        let (_, syms) = registry_with_symbols(1);
        let a = syms[0].clone();
        let cube = a.clone() * a.clone() * a;
        let values = HashMap::from([(0, i64::MAX)]);
        assert!(matches!(cube.eval(&values), Err(SymIntError::Overflow)));
    }

    #[test]
    fn display_renders_signs_and_powers() {
        let (_, syms) = registry_with_symbols(2);
        let expr = syms[0].clone() * syms[0].clone() * 2 - syms[1].clone() + 5;
        assert_eq!(expr.to_string(), "5 + 2*s0^2 - s1");
    }

    #[test]
    fn registry_counts_symbols() {
        let (registry, _) = registry_with_symbols(3);
        assert_eq!(registry.total_symbols(), 3);
    }

    proptest! {
        #[test]
        fn add_matches_integer_addition(x in -100i64..100, y in -100i64..100) {
            prop_assert_eq!(SymInt::from(x) + SymInt::from(y), SymInt::from(x + y));
        }

        #[test]
        fn mul_matches_integer_multiplication(x in -100i64..100, y in -100i64..100) {
            prop_assert_eq!(SymInt::from(x) * SymInt::from(y), SymInt::from(x * y));
        }

        #[test]
        fn polynomial_laws_hold(x in -20i64..20, y in -20i64..20, z in -20i64..20) {
            let (_, syms) = registry_with_symbols(3);
            let a = syms[0].clone() * x;
            let b = syms[1].clone() * y + 1;
            let c = syms[2].clone() * z;
            // Commutativity and associativity survive normalization.
            prop_assert_eq!(a.clone() + b.clone(), b.clone() + a.clone());
            prop_assert_eq!(a.clone() * b.clone(), b.clone() * a.clone());
            prop_assert_eq!(
                (a.clone() + b.clone()) + c.clone(),
                a.clone() + (b.clone() + c.clone())
            );
            // Distribution reaches the same normal form.
            prop_assert_eq!(
                a.clone() * (b.clone() + c.clone()),
                a.clone() * b + a * c
            );
        }
    }
}
