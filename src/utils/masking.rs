const MASK_PREFIX: &str = "****-****-****-";

/// Hides all but the last four characters of a card number.
pub fn mask_card_number(number: Option<&str>) -> String {
    let number = number.map(str::trim).unwrap_or_default();
    if number.is_empty() {
        return format!("{MASK_PREFIX}****");
    }

    let chars: Vec<char> = number.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{MASK_PREFIX}{tail}")
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::mask_card_number;

    #[test_case(None, "****-****-****-****" ; "missing number")]
    #[test_case(Some(""), "****-****-****-****" ; "empty number")]
    #[test_case(Some("4111111111111234"), "****-****-****-1234" ; "full card number")]
    #[test_case(Some("1234"), "****-****-****-1234" ; "exactly four digits")]
    #[test_case(Some("98"), "****-****-****-98" ; "shorter than four")]
    #[test_case(Some("5500 0000 0000 0004"), "****-****-****-0004" ; "spaced number")]
    fn masks_card_numbers(input: Option<&str>, expected: &str) {
        assert_eq!(mask_card_number(input), expected);
    }
}
