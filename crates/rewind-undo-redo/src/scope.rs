//! Scope tags and the scope registry
//!
//! A [`Scope`] is a bounded set over [`MAX_SCOPES`] bit positions plus a
//! distinguished universal member, [`Scope::All`]. [`Scopes`] translates
//! registered domain names to bit positions and back.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UndoRedoError};

/// Maximum number of user scopes a registry can hold
pub const MAX_SCOPES: usize = 28;

/// Reserved name of the wildcard scope
pub const ALL_SCOPE_NAME: &str = "all";

/// Tag identifying the logical undo domains a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Wildcard, matches every filter and every scope
    All,
    /// Explicit set of registered scope bits
    Set(u32),
}

impl Scope {
    /// All-ones value over the representable bit positions
    pub const ALL_FLAGS: u32 = (1u32 << MAX_SCOPES) - 1;

    /// Scope with no bits set
    pub const NONE: Scope = Scope::Set(0);

    /// Scope holding the single bit at `position`
    pub fn flag(position: usize) -> Result<Self> {
        if position >= MAX_SCOPES {
            return Err(UndoRedoError::TooManyScopes {
                count: position + 1,
                max: MAX_SCOPES,
            });
        }
        Ok(Scope::Set(1 << position))
    }

    /// Build a scope from raw flags; the all-ones value maps to [`Scope::All`]
    pub fn from_bits(bits: u32) -> Self {
        let bits = bits & Self::ALL_FLAGS;
        if bits == Self::ALL_FLAGS {
            Scope::All
        } else {
            Scope::Set(bits)
        }
    }

    /// Raw flags; [`Scope::All`] reports [`Scope::ALL_FLAGS`]
    pub fn bits(&self) -> u32 {
        match self {
            Scope::All => Self::ALL_FLAGS,
            Scope::Set(bits) => *bits,
        }
    }

    /// Whether this is the wildcard
    pub fn is_all(&self) -> bool {
        matches!(self, Scope::All)
    }

    /// Whether no bit is set (never true for the wildcard)
    pub fn is_empty(&self) -> bool {
        matches!(self, Scope::Set(0))
    }

    /// Set union; anything united with the wildcard is the wildcard
    pub fn union(self, other: Scope) -> Scope {
        match (self, other) {
            (Scope::All, _) | (_, Scope::All) => Scope::All,
            (Scope::Set(a), Scope::Set(b)) => Scope::Set(a | b),
        }
    }

    /// Treat `self` as a filter and test it against `scope`
    pub fn matches(&self, scope: Scope) -> bool {
        has_scope(*self, scope)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::All
    }
}

impl BitOr for Scope {
    type Output = Scope;

    fn bitor(self, rhs: Scope) -> Scope {
        self.union(rhs)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "{}", ALL_SCOPE_NAME),
            Scope::Set(bits) => write!(f, "{:#x}", bits),
        }
    }
}

/// True if `filter` selects `scope`
///
/// Either side being the wildcard matches; otherwise the two must share at
/// least one bit.
pub fn has_scope(filter: Scope, scope: Scope) -> bool {
    match (filter, scope) {
        (Scope::All, _) | (_, Scope::All) => true,
        (Scope::Set(f), Scope::Set(s)) => f & s != 0,
    }
}

/// Split free-form text on commas and whitespace
fn split_names(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
}

/// Registry mapping scope names to flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scopes {
    names: Vec<String>,
    flags_by_name: HashMap<String, u32>,
    names_by_flag: BTreeMap<u32, String>,
    mask: u32,
}

impl Scopes {
    /// Create a registry from an ordered list of names
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut scopes = Scopes::default();
        scopes.register(names)?;
        Ok(scopes)
    }

    /// Create a registry from comma and/or whitespace separated text
    pub fn from_string(text: &str) -> Result<Self> {
        Self::new(split_names(text))
    }

    /// Register names, each taking the next free bit
    ///
    /// The whole batch is validated before anything is assigned.
    pub fn register<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .collect();

        for (position, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(UndoRedoError::validation_error("scope name cannot be empty"));
            }
            if name == ALL_SCOPE_NAME {
                return Err(UndoRedoError::ReservedScopeName(name.clone()));
            }
            if self.flags_by_name.contains_key(name) || names[..position].contains(name) {
                return Err(UndoRedoError::DuplicateScope(name.clone()));
            }
        }

        let count = self.names.len() + names.len();
        if count > MAX_SCOPES {
            return Err(UndoRedoError::TooManyScopes {
                count,
                max: MAX_SCOPES,
            });
        }

        for name in names {
            let flag = 1u32 << self.names.len();
            self.flags_by_name.insert(name.clone(), flag);
            self.names_by_flag.insert(flag, name.clone());
            self.names.push(name);
            self.mask |= flag;
        }

        Ok(())
    }

    /// Flag assigned to `name`
    pub fn flags_for(&self, name: &str) -> Option<u32> {
        self.flags_by_name.get(name).copied()
    }

    /// Name registered for a single-bit `flag`
    pub fn name_for(&self, flag: u32) -> Option<&str> {
        self.names_by_flag.get(&flag).map(String::as_str)
    }

    /// Names of every registered bit carried by `scope`, in registration order
    pub fn names_for(&self, scope: Scope) -> Vec<&str> {
        if scope.is_all() {
            return vec![ALL_SCOPE_NAME];
        }
        self.names_by_flag
            .iter()
            .filter(|(flag, _)| scope.bits() & **flag != 0)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    /// Same rule as [`has_scope`]
    pub fn has_scope(&self, filter: Scope, scope: Scope) -> bool {
        has_scope(filter, scope)
    }

    /// Scope for a single registered name (or the wildcard)
    pub fn scope(&self, name: &str) -> Result<Scope> {
        self.scope_from_names([name])
    }

    /// OR together the flags of each name
    ///
    /// The wildcard name anywhere in the list yields [`Scope::All`]; any
    /// other unregistered name is a validation failure.
    pub fn scope_from_names<I, S>(&self, names: I) -> Result<Scope>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        if names.iter().any(|name| name.as_ref().trim() == ALL_SCOPE_NAME) {
            return Ok(Scope::All);
        }

        let mut bits = 0u32;
        for name in &names {
            let name = name.as_ref().trim();
            let flag = self
                .flags_for(name)
                .ok_or_else(|| UndoRedoError::unknown_scope(name))?;
            bits |= flag;
        }
        Ok(Scope::Set(bits))
    }

    /// Split `text` on commas/whitespace, then resolve like [`Scopes::scope_from_names`]
    pub fn scope_from_string(&self, text: &str) -> Result<Scope> {
        self.scope_from_names(split_names(text))
    }

    /// Reject scopes carrying bits nobody registered
    pub fn validate(&self, scope: Scope) -> Result<()> {
        match scope {
            Scope::All => Ok(()),
            Scope::Set(bits) if bits & !self.mask == 0 => Ok(()),
            Scope::Set(bits) => Err(UndoRedoError::validation_error(format!(
                "scope {:#x} carries unregistered flags {:#x}",
                bits,
                bits & !self.mask
            ))),
        }
    }

    /// Registered names in bit order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Union of all registered flags
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Number of registered scopes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromStr for Scopes {
    type Err = UndoRedoError;

    fn from_str(s: &str) -> Result<Self> {
        Scopes::from_string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brand_car() -> Scopes {
        Scopes::new(["brand", "car"]).unwrap()
    }

    #[test]
    fn test_sequential_flags() {
        let scopes = brand_car();
        assert_eq!(scopes.flags_for("brand"), Some(1));
        assert_eq!(scopes.flags_for("car"), Some(2));
        assert_eq!(scopes.mask(), 3);
        assert_eq!(scopes.name_for(2), Some("car"));
        assert_eq!(scopes.names(), &["brand".to_string(), "car".to_string()]);
    }

    #[test]
    fn test_scope_from_string_combines_flags() {
        let scopes = brand_car();
        assert_eq!(scopes.scope_from_string("brand,car").unwrap().bits(), 3);
        assert_eq!(scopes.scope_from_string(" car ").unwrap(), Scope::Set(2));
    }

    #[test]
    fn test_all_short_circuits() {
        let scopes = brand_car();
        assert_eq!(scopes.scope_from_string("all").unwrap(), Scope::All);
        assert_eq!(scopes.scope_from_string("brand, all").unwrap(), Scope::All);
        assert_eq!(scopes.scope_from_string("ghost all").unwrap(), Scope::All);
        assert_eq!(Scope::All.bits(), 0x0FFF_FFFF);
    }

    #[test]
    fn test_unknown_scope_is_validation_failure() {
        let scopes = brand_car();
        let err = scopes.scope_from_string("brand,wheel").unwrap_err();
        assert!(matches!(err, UndoRedoError::UnknownScope(ref name) if name == "wheel"));
        assert!(err.is_validation_failure());
    }

    #[test]
    fn test_reserved_name_rejected() {
        let err = Scopes::new(["brand", "all"]).unwrap_err();
        assert!(matches!(err, UndoRedoError::ReservedScopeName(_)));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = Scopes::new(["brand", "brand"]).unwrap_err();
        assert!(matches!(err, UndoRedoError::DuplicateScope(_)));

        let mut scopes = brand_car();
        assert!(scopes.register(["car"]).is_err());
        assert_eq!(scopes.len(), 2, "failed batch must not register anything");
    }

    #[test]
    fn test_overflow_rejected() {
        let names: Vec<String> = (0..=MAX_SCOPES).map(|i| format!("s{}", i)).collect();
        let err = Scopes::new(&names).unwrap_err();
        assert!(matches!(err, UndoRedoError::TooManyScopes { count: 29, max: 28 }));

        let fits = Scopes::new(&names[..MAX_SCOPES]).unwrap();
        assert_eq!(fits.mask(), Scope::ALL_FLAGS);
    }

    #[test]
    fn test_string_and_list_construction_agree() {
        let from_list = Scopes::new(["brand", "car", "owner"]).unwrap();
        let from_text: Scopes = "brand, car\towner".parse().unwrap();
        assert_eq!(from_list, from_text);
    }

    #[test]
    fn test_has_scope_rules() {
        let a = Scope::Set(0b001);
        let b = Scope::Set(0b010);
        let bc = Scope::Set(0b110);
        let abc = Scope::Set(0b111);

        assert!(has_scope(Scope::All, b));
        assert!(has_scope(abc, b));
        assert!(!has_scope(a, bc));
        assert!(has_scope(a, Scope::All));
        assert!(!has_scope(Scope::NONE, a));
    }

    #[test]
    fn test_names_for_scope() {
        let scopes = brand_car();
        assert_eq!(scopes.names_for(Scope::Set(3)), vec!["brand", "car"]);
        assert_eq!(scopes.names_for(Scope::All), vec!["all"]);
    }

    #[test]
    fn test_validate_rejects_unregistered_bits() {
        let scopes = brand_car();
        assert!(scopes.validate(Scope::Set(2)).is_ok());
        assert!(scopes.validate(Scope::All).is_ok());
        assert!(scopes.validate(Scope::Set(4)).is_err());
    }

    #[test]
    fn test_from_bits_maps_all_ones_to_wildcard() {
        assert_eq!(Scope::from_bits(0x0FFF_FFFF), Scope::All);
        assert_eq!(Scope::from_bits(u32::MAX), Scope::All);
        assert_eq!(Scope::from_bits(5), Scope::Set(5));
        assert_eq!(Scope::flag(3).unwrap(), Scope::Set(8));
        assert!(Scope::flag(MAX_SCOPES).is_err());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn scope_strategy() -> impl Strategy<Value = Scope> {
        prop_oneof![
            1 => Just(Scope::All),
            9 => (0u32..Scope::ALL_FLAGS).prop_map(Scope::Set),
        ]
    }

    proptest! {
        /// The wildcard filter selects every scope
        #[test]
        fn prop_all_filter_matches_everything(scope in scope_strategy()) {
            prop_assert!(has_scope(Scope::All, scope));
        }

        /// Matching is symmetric for explicit sets
        #[test]
        fn prop_matching_is_symmetric(a in scope_strategy(), b in scope_strategy()) {
            prop_assert_eq!(has_scope(a, b), has_scope(b, a));
        }

        /// A filter containing a scope's bit always selects it
        #[test]
        fn prop_superset_filter_matches(position in 0usize..MAX_SCOPES, extra in 0u32..Scope::ALL_FLAGS) {
            let scope = Scope::flag(position).unwrap();
            let filter = Scope::from_bits(scope.bits() | extra);
            prop_assert!(has_scope(filter, scope));
        }

        /// Registering n names assigns bits 0..n in order
        #[test]
        fn prop_registration_order_is_bit_order(count in 1usize..=MAX_SCOPES) {
            let names: Vec<String> = (0..count).map(|i| format!("scope{}", i)).collect();
            let scopes = Scopes::new(&names).unwrap();
            for (position, name) in names.iter().enumerate() {
                prop_assert_eq!(scopes.flags_for(name), Some(1u32 << position));
            }
            prop_assert_eq!(scopes.len(), count);
        }
    }
}
