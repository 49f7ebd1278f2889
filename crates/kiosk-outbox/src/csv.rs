//! Minimal CSV field quoting.

/// Wrap a field in double quotes, doubling embedded quotes.
pub(crate) fn quote_field(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Quote a field only when it contains a delimiter, quote or line break.
pub(crate) fn escape_field(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        quote_field(field)
    } else {
        field.to_string()
    }
}

/// Split one CSV row into fields using standard quoting rules.
#[cfg(test)]
pub(crate) fn split_row(row: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = row.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', _) => in_quotes = !in_quotes,
            (',', false) => fields.push(std::mem::take(&mut current)),
            (c, _) => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_field_doubles_quotes() {
        assert_eq!(quote_field(r#"O"Neil, A"#), r#""O""Neil, A""#);
        assert_eq!(quote_field(""), r#""""#);
    }

    #[test]
    fn escape_field_leaves_plain_values_alone() {
        assert_eq!(escape_field("08001"), "08001");
        assert_eq!(escape_field("Gran Via, 1"), r#""Gran Via, 1""#);
    }

    #[test]
    fn split_row_recovers_quoted_fields() {
        let row = format!("{},{},{}", quote_field("a,b"), quote_field(r#"say "hi""#), "plain");
        assert_eq!(split_row(&row), vec!["a,b", r#"say "hi""#, "plain"]);
    }
}
