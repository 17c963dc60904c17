use crate::contacts::ContactRow;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

/// Fields a template may reference.
pub const PLACEHOLDERS: [&str; 4] = ["Name", "Alias", "Nominal", "Saving"];

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Reminder text file not found: '{path}'")]
    Missing { path: String },

    #[error("Failed to read template file '{path}': {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    #[error("Unknown placeholder '{{{0}}}'")]
    UnknownField(String),

    #[error("Format specs are not supported in '{{{0}}}'")]
    UnsupportedFormatting(String),

    #[error("Single '{0}' encountered in template")]
    UnmatchedBrace(char),
}

/// Reminder text with `{Field}` placeholders; `{{` and `}}` are literal braces.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    text: String,
}

impl MessageTemplate {
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let path_str = path.to_string_lossy().to_string();
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self { text }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(TemplateError::Missing { path: path_str })
            }
            Err(e) => Err(TemplateError::ReadError {
                path: path_str,
                source: e,
            }),
        }
    }

    pub fn from_content(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Substitutes each placeholder with the contact's value.
    pub fn render(&self, contact: &ContactRow) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.text.len());
        let mut chars = self.text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => return Err(TemplateError::UnmatchedBrace('{')),
                            Some(ch) => field.push(ch),
                        }
                    }
                    if field.contains([':', '!']) {
                        return Err(TemplateError::UnsupportedFormatting(field));
                    }
                    let value = PLACEHOLDERS
                        .contains(&field.as_str())
                        .then(|| contact.field(&field))
                        .flatten()
                        .ok_or(TemplateError::UnknownField(field))?;
                    out.push_str(value);
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '}' => return Err(TemplateError::UnmatchedBrace('}')),
                _ => out.push(c),
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budi() -> ContactRow {
        ContactRow {
            name: "Budi".into(),
            phone: "+6281234567890".into(),
            alias: "Pak Budi".into(),
            nominal: "200000".into(),
            saving: "1500000".into(),
        }
    }

    #[test]
    fn substitutes_all_placeholders() {
        let template = MessageTemplate::from_content(
            "Halo {Alias} ({Name}), setoran {Nominal}. Saldo tabungan: {Saving}. {Name}!",
        );

        assert_eq!(
            template.render(&budi()).unwrap(),
            "Halo Pak Budi (Budi), setoran 200000. Saldo tabungan: 1500000. Budi!"
        );
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let text = "Reminder: payment is due this Friday.\nThank you.";
        let template = MessageTemplate::from_content(text);

        assert_eq!(template.render(&budi()).unwrap(), text);
        assert_eq!(template.render(&ContactRow::default()).unwrap(), text);
    }

    #[test]
    fn doubled_braces_are_literal() {
        let template = MessageTemplate::from_content("{{Name}} is {Name} }}");
        assert_eq!(template.render(&budi()).unwrap(), "{Name} is Budi }");
    }

    #[test]
    fn phone_is_not_a_placeholder() {
        let template = MessageTemplate::from_content("Call {Phone}");
        let err = template.render(&budi()).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownField(ref f) if f == "Phone"));
        assert_eq!(err.to_string(), "Unknown placeholder '{Phone}'");
    }

    #[test]
    fn malformed_templates_fail() {
        let cases = ["Hi {Name", "Hi Name}", "Hi {}", "Hi {Name:>10}", "Hi {Name!r}", "{{Name}"];
        for text in cases {
            assert!(
                MessageTemplate::from_content(text).render(&budi()).is_err(),
                "expected failure for {text:?}"
            );
        }
    }

    #[test]
    fn load_distinguishes_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let err = MessageTemplate::load(&dir.path().join("reminder_text.txt")).unwrap_err();
        assert!(matches!(err, TemplateError::Missing { .. }));
        assert!(err.to_string().starts_with("Reminder text file not found: '"));

        let path = dir.path().join("reminder.txt");
        fs::write(&path, "Hi {Name}, balance {Saving}").unwrap();
        let template = MessageTemplate::load(&path).unwrap();
        assert_eq!(template.text(), "Hi {Name}, balance {Saving}");
    }
}
