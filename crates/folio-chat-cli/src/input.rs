//! Parsing of input lines into commands.

use folio_chat_client::Persona;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Blank line.
    Empty,
    /// `/quit` or `/exit`.
    Quit,
    /// `/clear`: start a fresh conversation.
    Clear,
    /// `/health`: query service health.
    Health,
    /// `/contact`: show contact details.
    Contact,
    /// `/persona <name|any>`: change the persona hint for following messages.
    Persona(Option<Persona>),
    /// `/help`.
    Help,
    /// A message for the assistant.
    Say(String),
    /// Unrecognised command or bad argument.
    Invalid(String),
}

pub const HELP: &str = "commands: /persona <engineer|researcher|speaker|educator|any>, /clear, /health, /contact, /quit";

/// Parse one input line.
pub fn parse(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Say(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    match (name, arg) {
        ("quit" | "exit", None) => Input::Quit,
        ("clear", None) => Input::Clear,
        ("health", None) => Input::Health,
        ("contact", None) => Input::Contact,
        ("help", None) => Input::Help,
        ("persona", Some("any" | "none")) => Input::Persona(None),
        ("persona", Some(name)) => match name.parse() {
            Ok(persona) => Input::Persona(Some(persona)),
            Err(e) => Input::Invalid(e.to_string()),
        },
        _ => Input::Invalid(format!("unknown command: /{command}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse("  hi there "), Input::Say("hi there".to_string()));
        assert_eq!(parse("   "), Input::Empty);
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse("/quit"), Input::Quit);
        assert_eq!(parse("/exit"), Input::Quit);
        assert_eq!(parse("/clear"), Input::Clear);
        assert_eq!(parse("/health"), Input::Health);
        assert_eq!(parse("/contact"), Input::Contact);
        assert_eq!(parse("/help"), Input::Help);
    }

    #[test]
    fn parses_persona() {
        assert_eq!(
            parse("/persona researcher"),
            Input::Persona(Some(Persona::Researcher))
        );
        assert_eq!(parse("/persona any"), Input::Persona(None));
        match parse("/persona pirate") {
            Input::Invalid(_) => {}
            other => panic!("Expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_commands() {
        match parse("/dance now") {
            Input::Invalid(msg) => assert!(msg.contains("/dance now")),
            other => panic!("Expected Invalid, got {other:?}"),
        }
        assert!(matches!(parse("/quit now"), Input::Invalid(_)));
    }
}
