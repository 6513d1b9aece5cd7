use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Currency ticker normalized to lowercase.
///
/// Source rows and price snapshots disagree on casing (`SFL` vs `sfl`), so
/// every symbol is folded at construction and compared only in that form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CurrencySymbol(String);

impl CurrencySymbol {
    pub fn new(input: &str) -> Self {
        Self(input.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CurrencySymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for CurrencySymbol {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for CurrencySymbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<CurrencySymbol> for String {
    fn from(value: CurrencySymbol) -> Self {
        value.0
    }
}
