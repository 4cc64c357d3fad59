//! Cache key templates.
//!
//! Templates use `{}` for the next positional argument and `{name}` for a
//! named one. Literal braces are written `{{` and `}}`. Positional arguments
//! take precedence: when any are given, the template is rendered against them
//! alone and named arguments are ignored. Each positional argument must fill
//! a placeholder.

use crate::error::FormatError;
use crate::value::Args;

/// Prefix of keys derived from a computation name.
pub const DEFAULT_KEY_PREFIX: &str = "<cache>/";

/// Renders key templates against call arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFormatter;

enum Piece<'t> {
    Literal(char),
    Positional,
    Named(&'t str),
}

impl KeyFormatter {
    /// Create a formatter.
    pub fn new() -> Self {
        Self
    }

    /// Key used when a wrapper has no explicit template.
    pub fn default_template(name: &str) -> String {
        format!("{DEFAULT_KEY_PREFIX}{name}")
    }

    /// Render `template` with `args`.
    ///
    /// Every positional argument must fill a placeholder, so a template
    /// without placeholders rejects positional arguments instead of mapping
    /// different calls to one key. Named arguments the template does not
    /// mention are ignored.
    pub fn format(&self, template: &str, args: &Args) -> Result<String, FormatError> {
        let pieces = parse(template)?;
        let mut key = String::with_capacity(template.len());

        if args.has_positional() {
            let values = args.positional_values();
            let mut used = 0;
            for piece in &pieces {
                match piece {
                    Piece::Literal(c) => key.push(*c),
                    Piece::Positional => {
                        let value = values.get(used).ok_or_else(|| {
                            FormatError::NotEnoughArguments {
                                template: template.to_string(),
                                given: values.len(),
                            }
                        })?;
                        key.push_str(&value.to_string());
                        used += 1;
                    }
                    Piece::Named(name) => {
                        return Err(FormatError::NamedPlaceholder {
                            template: template.to_string(),
                            name: (*name).to_string(),
                        })
                    }
                }
            }
            if used < values.len() {
                return Err(FormatError::TooManyArguments {
                    template: template.to_string(),
                    used,
                    given: values.len(),
                });
            }
        } else {
            for piece in &pieces {
                match piece {
                    Piece::Literal(c) => key.push(*c),
                    Piece::Positional => {
                        return Err(FormatError::PositionalPlaceholder {
                            template: template.to_string(),
                        })
                    }
                    Piece::Named(name) => {
                        let value =
                            args.named(name)
                                .ok_or_else(|| FormatError::MissingArgument {
                                    template: template.to_string(),
                                    name: (*name).to_string(),
                                })?;
                        key.push_str(&value.to_string());
                    }
                }
            }
        }

        Ok(key)
    }
}

fn parse(template: &str) -> Result<Vec<Piece<'_>>, FormatError> {
    let unbalanced = |position| FormatError::UnbalancedBrace {
        template: template.to_string(),
        position,
    };

    let mut pieces = Vec::new();
    let mut chars = template.char_indices().peekable();
    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                pieces.push(Piece::Literal('{'));
            }
            '{' => {
                let start = pos + 1;
                let end = loop {
                    match chars.next() {
                        Some((end, '}')) => break end,
                        Some((_, '{')) | None => return Err(unbalanced(pos)),
                        Some(_) => {}
                    }
                };
                let name = template[start..end].trim();
                pieces.push(if name.is_empty() {
                    Piece::Positional
                } else {
                    Piece::Named(name)
                });
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                pieces.push(Piece::Literal('}'));
            }
            '}' => return Err(unbalanced(pos)),
            other => pieces.push(Piece::Literal(other)),
        }
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    #[test]
    fn test_positional() {
        let args = Args::positional(["alice", "1981-10-10"]);
        let key = KeyFormatter::new()
            .format("user:{}:{}", &args)
            .unwrap();
        assert_eq!(key, "user:alice:1981-10-10");
    }

    #[test]
    fn test_named() {
        let args = Args::new()
            .kwarg("name", "bob")
            .kwarg("born", NaiveDate::from_ymd_opt(1988, 9, 9).unwrap());
        let key = KeyFormatter::new()
            .format("user:{name}:{born}", &args)
            .unwrap();
        assert_eq!(key, "user:bob:1988-09-09");
    }

    #[test]
    fn test_literal_template_rejects_positional_args() {
        let fmt = KeyFormatter::new();
        assert!(matches!(
            fmt.format("static-key", &Args::positional([1, 2])),
            Err(FormatError::TooManyArguments { used: 0, given: 2, .. })
        ));
        assert_eq!(fmt.format("static-key", &Args::new()).unwrap(), "static-key");
        assert_eq!(
            fmt.format("static-key", &Args::new().kwarg("id", 1)).unwrap(),
            "static-key"
        );
    }

    #[test]
    fn test_escaped_braces() {
        let args = Args::positional([7]);
        let key = KeyFormatter::new().format("{{id}}:{}", &args).unwrap();
        assert_eq!(key, "{id}:7");
    }

    #[test]
    fn test_positional_wins_over_named() {
        let args = Args::new().arg(1).kwarg("id", 2);
        let key = KeyFormatter::new().format("item:{}", &args).unwrap();
        assert_eq!(key, "item:1");
    }

    #[test]
    fn test_mismatches() {
        let fmt = KeyFormatter::new();

        assert!(matches!(
            fmt.format("a:{}:{}", &Args::positional([1])),
            Err(FormatError::NotEnoughArguments { given: 1, .. })
        ));
        assert!(matches!(
            fmt.format("a:{}", &Args::positional([1, 2])),
            Err(FormatError::TooManyArguments { used: 1, given: 2, .. })
        ));
        assert!(matches!(
            fmt.format("a:{id}", &Args::positional([1])),
            Err(FormatError::NamedPlaceholder { .. })
        ));
        assert!(matches!(
            fmt.format("a:{}", &Args::new().kwarg("id", 1)),
            Err(FormatError::PositionalPlaceholder { .. })
        ));
        assert!(matches!(
            fmt.format("a:{id}", &Args::new()),
            Err(FormatError::MissingArgument { .. })
        ));
        assert!(matches!(
            fmt.format("a:{id", &Args::new()),
            Err(FormatError::UnbalancedBrace { position: 2, .. })
        ));
        assert!(matches!(
            fmt.format("a}", &Args::new()),
            Err(FormatError::UnbalancedBrace { position: 1, .. })
        ));
    }

    #[test]
    fn test_default_template() {
        assert_eq!(
            KeyFormatter::default_template("some_method_name"),
            "<cache>/some_method_name"
        );
    }

    proptest! {
        #[test]
        fn prop_same_args_same_key(a in any::<i64>(), b in "[a-z]{0,12}") {
            let fmt = KeyFormatter::new();
            let args = Args::new().arg(a).arg(b.clone());
            let first = fmt.format("k:{}:{}", &args).unwrap();
            let second = fmt.format("k:{}:{}", &Args::new().arg(a).arg(b)).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_literal_templates_pass_through(template in "[a-z:/_<>]{0,24}") {
            let key = KeyFormatter::new().format(&template, &Args::new()).unwrap();
            prop_assert_eq!(key, template);
        }

        #[test]
        fn prop_different_args_different_keys(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            let fmt = KeyFormatter::new();
            let first = fmt.format("k:{}", &Args::positional([a])).unwrap();
            let second = fmt.format("k:{}", &Args::positional([b])).unwrap();
            prop_assert_ne!(first, second);
        }
    }
}
