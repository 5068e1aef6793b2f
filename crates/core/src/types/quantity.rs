//! Line quantity type.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantity was zero. Removing a line is a separate operation.
    #[error("quantity must be at least 1 (use remove to delete the item)")]
    Zero,
    /// Quantity was negative.
    #[error("quantity must be at least 1 (got {0})")]
    Negative(i64),
    /// Quantity does not fit in 32 bits.
    #[error("quantity {0} is too large")]
    TooLarge(i64),
}

/// A positive item quantity.
///
/// A cart line always has at least one unit, so the zero case is
/// unrepresentable.
///
/// ```
/// use bazaar_core::Quantity;
///
/// assert_eq!(Quantity::new(3).map(Quantity::get), Ok(3));
/// assert!(Quantity::new(0).is_err());
/// assert_eq!(Quantity::default().get(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Create a quantity from an unsigned count.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::Zero`] if `n` is 0.
    pub const fn new(n: u32) -> Result<Self, QuantityError> {
        match NonZeroU32::new(n) {
            Some(n) => Ok(Self(n)),
            None => Err(QuantityError::Zero),
        }
    }

    /// The number of units.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        if n < 0 {
            return Err(QuantityError::Negative(n));
        }
        let n = u32::try_from(n).map_err(|_| QuantityError::TooLarge(n))?;
        Self::new(n)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.get()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
