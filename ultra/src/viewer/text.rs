//! Plain-text form of the log shown in the viewer's editor.
//!
//! Each message is a `ROLE: content` block and blocks are separated by a
//! blank line. When parsing, a block starts at a role label on the first line
//! or right after a blank line. Label-like lines inside a message stay part of
//! its content unless a blank line precedes them.

use crate::models::{Message, MessageRole};

const ROLES: [MessageRole; 3] = [MessageRole::User, MessageRole::Assistant, MessageRole::System];

pub fn render_text(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Parse edited text back into messages. Text before the first label is
/// dropped.
pub fn parse_text(text: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut current: Option<(MessageRole, String)> = None;
    let mut at_block_start = true;

    for line in text.lines() {
        let label = if at_block_start { split_label(line) } else { None };
        at_block_start = line.trim().is_empty();

        if let Some((role, rest)) = label {
            if let Some((role, content)) = current.take() {
                messages.push(Message::new(role, content.trim()));
            }
            current = Some((role, rest.to_string()));
        } else if let Some((_, content)) = current.as_mut() {
            content.push('\n');
            content.push_str(line);
        }
    }
    if let Some((role, content)) = current {
        messages.push(Message::new(role, content.trim()));
    }

    messages
}

fn split_label(line: &str) -> Option<(MessageRole, &str)> {
    ROLES.into_iter().find_map(|role| {
        line.strip_prefix(role.label())
            .and_then(|rest| rest.strip_prefix(':'))
            .map(|rest| (role, rest))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_blocks() {
        let text = render_text(&[Message::user("hi"), Message::assistant("hello\nworld")]);
        assert_eq!(text, "USER: hi\n\nASSISTANT: hello\nworld");
        assert_eq!(render_text(&[]), "");
    }

    #[test]
    fn test_parse_rendered_text() {
        let messages = vec![
            Message::system("be brief"),
            Message::user("two\nlines"),
            Message::assistant("ok"),
        ];
        assert_eq!(parse_text(&render_text(&messages)), messages);
    }

    #[test]
    fn test_parse_trims_and_drops_preamble() {
        let text = "notes before\n\nUSER:   spaced out  \n\n\nASSISTANT:\n  reply body\n";
        assert_eq!(
            parse_text(text),
            vec![Message::user("spaced out"), Message::assistant("reply body")]
        );
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        let text = "USER: question\nuser: still the question";
        assert_eq!(
            parse_text(text),
            vec![Message::user("question\nuser: still the question")]
        );
    }

    #[test]
    fn test_parse_handles_crlf() {
        assert_eq!(
            parse_text("USER: a\r\n\r\nASSISTANT: b\r\n"),
            vec![Message::user("a"), Message::assistant("b")]
        );
    }

    #[test]
    fn test_quoted_labels_stay_in_content() {
        let messages = vec![
            Message::user("Format this transcript"),
            Message::assistant("Here it is:\nUSER: hello\nSYSTEM: note"),
        ];
        assert_eq!(parse_text(&render_text(&messages)), messages);
    }

    #[test]
    fn test_label_without_blank_line_continues_block() {
        assert_eq!(
            parse_text("USER: a\nASSISTANT: b"),
            vec![Message::user("a\nASSISTANT: b")]
        );
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_text("").is_empty());
        assert!(parse_text("no labels here").is_empty());
    }
}
