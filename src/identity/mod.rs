//! Stable vendor identities keyed by normalized name.

pub mod resolve;
pub mod roster;

pub use resolve::{resolve_identities, IdentityMap};
pub use roster::{import_roster, read_roster, RosterEntry, RosterSummary};

/// Field holding the vendor id in a `vendorNames` document.
pub const ID_FIELD: &str = "id";
/// Field holding the vendor's name in a `vendors` document.
pub const DISPLAY_NAME_FIELD: &str = "displayName";

/// Lowercase `name` and drop everything but ASCII letters and digits.
pub fn normalize_key(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spellings_collapse_to_one_key() {
        for name in ["Taco Truck", "taco-truck", "TACO TRUCK!"] {
            assert_eq!(normalize_key(name), "tacotruck");
        }
    }

    #[test]
    fn digits_survive_symbols_do_not() {
        assert_eq!(normalize_key("Pho 99 (Eatery) & Co."), "pho99eateryco");
        assert_eq!(normalize_key("!!!"), "");
    }
}
