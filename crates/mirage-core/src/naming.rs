//! Collision-free numbered names for new entities.
//!
//! Two rapid "new tab" clicks must not both propose "Tab 5": the
//! second click runs before the first round trip completes, so the
//! resolver is fed names from the *optimistic* state (confirmed plus
//! pending) and picks one past the highest number in use.
//!
//! Two patterns:
//!
//! - `"{base} {N}"` — fresh entities ("Tab 6")
//! - `"{base} ({n})"` — duplicates ("Sales (2)")

/// Next free name of the form `"{base} {N}"`.
///
/// Scans `names` for the pattern and returns one past the highest `N`
/// found, starting at 1. Names that do not match the pattern exactly
/// are ignored.
#[must_use]
pub fn next_numbered_name<'a, I>(base: &str, names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let max = names
        .into_iter()
        .filter_map(|name| numbered_suffix(base, name))
        .max()
        .unwrap_or(0);
    format!("{base} {}", max + 1)
}

/// Next free duplicate name of the form `"{base} ({n})"`.
///
/// `original` may itself carry a `(n)` suffix ("Sales (2)"); it is
/// stripped first so copies of copies share one numbering sequence.
#[must_use]
pub fn next_copy_name<'a, I>(original: &str, names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let base = strip_copy_suffix(original);
    let max = names
        .into_iter()
        .filter_map(|name| copy_suffix(base, name))
        .max()
        .unwrap_or(0);
    format!("{base} ({})", max + 1)
}

/// Parse `"{base} {N}"` and return `N`.
fn numbered_suffix(base: &str, name: &str) -> Option<u64> {
    let digits = name.strip_prefix(base)?.strip_prefix(' ')?;
    parse_number(digits)
}

/// Parse `"{base} ({n})"` and return `n`.
fn copy_suffix(base: &str, name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(base)?
        .strip_prefix(" (")?
        .strip_suffix(')')?;
    parse_number(digits)
}

/// Remove a trailing `" (n)"` if present.
fn strip_copy_suffix(name: &str) -> &str {
    let Some(open) = name.rfind(" (") else {
        return name;
    };
    let inner = &name[open + 2..];
    if inner.strip_suffix(')').is_some_and(|d| parse_number(d).is_some()) {
        &name[..open]
    } else {
        name
    }
}

fn parse_number(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_name_starts_at_one() {
        assert_eq!(next_numbered_name("Tab", []), "Tab 1");
    }

    #[test]
    fn skips_past_the_highest_number_in_use() {
        // Confirmed "Tab 1" and "Tab 4" plus a pending, unconfirmed
        // "Tab 5": the next proposal must be "Tab 6" — not "Tab 2"
        // (gap) and not "Tab 5" (still in flight).
        let names = ["Tab 1", "Tab 4", "Tab 5"];
        assert_eq!(next_numbered_name("Tab", names), "Tab 6");
    }

    #[test]
    fn ignores_names_outside_the_pattern() {
        let names = ["Tab 2", "Summary", "Tab", "Tab  3", "Tab x", "Tab 4x"];
        assert_eq!(next_numbered_name("Tab", names), "Tab 3");
    }

    #[test]
    fn base_with_special_characters_is_matched_literally() {
        let names = ["Q1 (draft) 2"];
        assert_eq!(next_numbered_name("Q1 (draft)", names), "Q1 (draft) 3");
    }

    #[test]
    fn first_copy_gets_paren_one() {
        assert_eq!(next_copy_name("Sales", ["Sales"]), "Sales (1)");
    }

    #[test]
    fn copy_numbers_past_existing_copies() {
        let names = ["Sales", "Sales (1)", "Sales (3)"];
        assert_eq!(next_copy_name("Sales", names), "Sales (4)");
    }

    #[test]
    fn copy_of_a_copy_shares_the_sequence() {
        let names = ["Sales", "Sales (1)", "Sales (2)"];
        assert_eq!(next_copy_name("Sales (2)", names), "Sales (3)");
    }

    #[test]
    fn paren_suffix_without_digits_is_not_stripped() {
        assert_eq!(next_copy_name("Sales (west)", []), "Sales (west) (1)");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn proposed_name_never_collides(
            numbers in proptest::collection::btree_set(0u64..50, 0..12)
        ) {
            let names: Vec<String> = numbers.iter().map(|n| format!("Tab {n}")).collect();
            let proposed = next_numbered_name("Tab", names.iter().map(String::as_str));
            prop_assert!(!names.contains(&proposed));
        }

        #[test]
        fn proposed_copy_name_never_collides(
            numbers in proptest::collection::btree_set(1u64..50, 0..12)
        ) {
            let mut names: Vec<String> =
                numbers.iter().map(|n| format!("Sales ({n})")).collect();
            names.push("Sales".into());
            let proposed = next_copy_name("Sales", names.iter().map(String::as_str));
            prop_assert!(!names.contains(&proposed));
        }
    }
}
