use std::borrow::Cow;

use conflux_error::{ConfluxResult, conflux_bail};

/// CSV dialect of the caller's external table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    delimiter: Option<char>,
    quote: char,
    escape: Option<char>,
    newline: String,
    null_value: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: Some(','),
            quote: '"',
            escape: Some('"'),
            newline: "\n".to_string(),
            null_value: String::new(),
        }
    }
}

/// `OFF` disables a character, an empty value keeps the current one.
fn parse_char(value: &str, name: &str, allow_off: bool) -> ConfluxResult<Option<Option<char>>> {
    if allow_off && value.eq_ignore_ascii_case("OFF") {
        return Ok(Some(None));
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(None),
        (Some(c), None) => Ok(Some(Some(c))),
        (Some(_), Some(_)) => conflux_bail!(
            "invalid {} character '{}'. Only single character is allowed for {}.",
            name,
            value,
            name
        ),
    }
}

impl CsvOptions {
    pub fn with_delimiter(mut self, delimiter: &str) -> ConfluxResult<Self> {
        if let Some(delimiter) = parse_char(delimiter, "DELIMITER", true)? {
            self.delimiter = delimiter;
        }
        Ok(self)
    }

    pub fn with_quote(mut self, quote: &str) -> ConfluxResult<Self> {
        if let Some(Some(quote)) = parse_char(quote, "QUOTE", false)? {
            self.quote = quote;
        }
        Ok(self)
    }

    pub fn with_escape(mut self, escape: &str) -> ConfluxResult<Self> {
        if let Some(escape) = parse_char(escape, "ESCAPE", true)? {
            self.escape = escape;
        }
        Ok(self)
    }

    /// Accepts `LF`, `CR` and `CRLF` in any case, or the literal sequences.
    pub fn with_newline(mut self, newline: &str) -> ConfluxResult<Self> {
        if newline.is_empty() {
            return Ok(self);
        }
        self.newline = match newline.to_ascii_lowercase().as_str() {
            "lf" | "\n" => "\n",
            "cr" | "\r" => "\r",
            "crlf" | "\r\n" => "\r\n",
            _ => conflux_bail!(
                "invalid newline character '{}'. Only LF, CR, or CRLF are supported for newline.",
                newline
            ),
        }
        .to_string();
        Ok(self)
    }

    pub fn with_null_value(mut self, null_value: impl Into<String>) -> Self {
        self.null_value = null_value.into();
        self
    }

    pub fn delimiter(&self) -> Option<char> {
        self.delimiter
    }

    pub fn quote(&self) -> char {
        self.quote
    }

    pub fn escape(&self) -> Option<char> {
        self.escape
    }

    pub fn newline(&self) -> &str {
        &self.newline
    }

    /// Text written for a null value.
    pub fn null_value(&self) -> &str {
        &self.null_value
    }

    /// The delimiter as a string, empty when delimiters are off.
    pub fn delimiter_str(&self) -> String {
        self.delimiter.map(String::from).unwrap_or_default()
    }

    /// Renders `value` as a CSV field.
    ///
    /// Quote characters are preceded by the escape character, when there is one. With
    /// `skip_if_not_needed` a value without quote, delimiter or newline is returned untouched.
    pub fn to_csv_field<'a>(
        &self,
        value: &'a str,
        prepend_quote: bool,
        append_quote: bool,
        skip_if_not_needed: bool,
    ) -> Cow<'a, str> {
        let quotes = if self.escape.is_some() {
            value.matches(self.quote).count()
        } else {
            0
        };
        let special = self.delimiter.is_some_and(|d| value.contains(d))
            || (!self.newline.is_empty() && value.contains(self.newline.as_str()));

        if (!prepend_quote && !append_quote && quotes == 0)
            || (skip_if_not_needed && quotes == 0 && !special)
        {
            return Cow::Borrowed(value);
        }

        let mut field = String::with_capacity(value.len() + quotes + 2);
        if prepend_quote {
            field.push(self.quote);
        }
        for c in value.chars() {
            if let Some(escape) = self.escape {
                if c == self.quote {
                    field.push(escape);
                }
            }
            field.push(c);
        }
        if append_quote {
            field.push(self.quote);
        }
        Cow::Owned(field)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", true, true, true, "")]
    #[case("abc", true, true, true, "abc")]
    #[case("abc", true, true, false, "\"abc\"")]
    #[case("abc", false, false, false, "abc")]
    #[case("va\"lue", true, true, true, "\"va\"\"lue\"")]
    #[case("va\"lue", false, false, false, "va\"\"lue")]
    #[case("a,b", true, true, true, "\"a,b\"")]
    #[case("a\nb", true, true, true, "\"a\nb\"")]
    #[case("a\tb", true, true, true, "a\tb")]
    #[case("\"", true, false, false, "\"\"\"")]
    fn default_dialect(
        #[case] value: &str,
        #[case] prepend: bool,
        #[case] append: bool,
        #[case] skip: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(
            CsvOptions::default().to_csv_field(value, prepend, append, skip),
            expected
        );
    }

    #[test]
    fn custom_escape_and_delimiter() {
        let csv = CsvOptions::default()
            .with_delimiter("|")
            .unwrap()
            .with_escape("\\")
            .unwrap();
        assert_eq!(csv.to_csv_field("a|b\"c", true, true, true), "\"a|b\\\"c\"");
        assert_eq!(csv.to_csv_field("a,b", true, true, true), "a,b");
    }

    #[test]
    fn escape_off_never_escapes_quotes() {
        let csv = CsvOptions::default().with_escape("off").unwrap();
        assert_eq!(csv.escape(), None);
        assert_eq!(csv.to_csv_field("a\"b", true, true, true), "a\"b");
        assert_eq!(csv.to_csv_field("a\"b,c", true, true, true), "\"a\"b,c\"");
    }

    #[test]
    fn delimiter_off() {
        let csv = CsvOptions::default().with_delimiter("OFF").unwrap();
        assert_eq!(csv.delimiter(), None);
        assert_eq!(csv.delimiter_str(), "");
        assert_eq!(csv.to_csv_field("a,b", true, true, true), "a,b");
    }

    #[test]
    fn crlf_newline_detection() {
        let csv = CsvOptions::default().with_newline("CRLF").unwrap();
        assert_eq!(csv.newline(), "\r\n");
        assert_eq!(csv.to_csv_field("a\nb", true, true, true), "a\nb");
        assert_eq!(csv.to_csv_field("a\r\nb", true, true, true), "\"a\r\nb\"");
    }

    #[rstest]
    #[case("lf", "\n")]
    #[case("CR", "\r")]
    #[case("\r\n", "\r\n")]
    #[case("", "\n")]
    fn accepted_newlines(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(
            CsvOptions::default().with_newline(value).unwrap().newline(),
            expected
        );
    }

    #[test]
    fn rejects_invalid_characters() {
        let err = CsvOptions::default().with_delimiter("::").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid DELIMITER character '::'. Only single character is allowed for DELIMITER."
        );
        assert!(CsvOptions::default().with_quote("''").is_err());
        assert!(CsvOptions::default().with_quote("OFF").is_err());
        assert!(CsvOptions::default().with_escape("ab").is_err());
        assert!(CsvOptions::default().with_newline("\t").is_err());
    }
}
