//! Splitting of the argument-value list
//!
//! Fields are separated by commas. A field that starts with `"` is quoted: it
//! may contain commas, and `""` inside it stands for one literal quote.
//! Whitespace is significant and never trimmed.

use sqlsampler_core::{Result, SamplerError};

const DELIMITER: char = ',';
const QUOTE: char = '"';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// At the start of a field
    Initial,
    /// Inside an unquoted field
    Plain,
    /// Inside a quoted field
    Quoted,
    /// Just saw a quote inside a quoted field
    EmbeddedQuote,
}

/// Split a comma-separated value list, honouring CSV quoting
pub(crate) fn split_csv(input: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut state = State::Initial;

    for (offset, ch) in input.char_indices() {
        state = match (state, ch) {
            (State::Initial | State::Plain, DELIMITER) => {
                fields.push(std::mem::take(&mut field));
                State::Initial
            }
            (State::Initial, QUOTE) => State::Quoted,
            (State::Plain, QUOTE) => {
                return Err(SamplerError::ArgumentSyntax(format!(
                    "unexpected quote at offset {} in unquoted field",
                    offset
                )));
            }
            (State::Initial | State::Plain, _) => {
                field.push(ch);
                State::Plain
            }
            (State::Quoted, QUOTE) => State::EmbeddedQuote,
            (State::Quoted, _) => {
                field.push(ch);
                State::Quoted
            }
            (State::EmbeddedQuote, QUOTE) => {
                field.push(QUOTE);
                State::Quoted
            }
            (State::EmbeddedQuote, DELIMITER) => {
                fields.push(std::mem::take(&mut field));
                State::Initial
            }
            (State::EmbeddedQuote, _) => {
                return Err(SamplerError::ArgumentSyntax(format!(
                    "unexpected character '{}' at offset {} after closing quote",
                    ch, offset
                )));
            }
        };
    }

    if state == State::Quoted {
        return Err(SamplerError::ArgumentSyntax("missing closing quote".to_string()));
    }
    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_fields() {
        assert_eq!(split_csv("1,abc, x ").unwrap(), vec!["1", "abc", " x "]);
        assert_eq!(split_csv("a,,b,").unwrap(), vec!["a", "", "b", ""]);
        assert_eq!(split_csv("").unwrap(), vec![""]);
    }

    #[test]
    fn test_quoted_fields() {
        assert_eq!(split_csv(r#""a,b",c"#).unwrap(), vec!["a,b", "c"]);
        assert_eq!(
            split_csv(r#""say ""hi""","""#).unwrap(),
            vec![r#"say "hi""#, ""]
        );
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            split_csv(r#"ab"c"#),
            Err(SamplerError::ArgumentSyntax(_))
        ));
        assert!(matches!(
            split_csv(r#""abc"d"#),
            Err(SamplerError::ArgumentSyntax(_))
        ));
        assert!(matches!(
            split_csv(r#""abc"#),
            Err(SamplerError::ArgumentSyntax(_))
        ));
    }
}
