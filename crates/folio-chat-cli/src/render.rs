//! Incremental transcript rendering for a line-mode terminal.
//!
//! Each snapshot is compared with what has already been written; only new
//! messages and newly revealed text are printed.

use std::collections::HashMap;
use std::io::{self, Write};

use crossterm::style::{Color, Stylize};
use folio_chat_client::{ChatSnapshot, ConnectionStatus, Message, MessageId, Persona};

#[derive(Debug, Clone, Copy)]
struct Progress {
    /// Bytes of content already written.
    written: usize,
    finished: bool,
}

/// Writes transcript updates to `out`.
pub struct Renderer<W: Write> {
    out: W,
    color: bool,
    progress: HashMap<MessageId, Progress>,
    /// Message whose line is currently open.
    open_line: Option<MessageId>,
    status: ConnectionStatus,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            progress: HashMap::new(),
            open_line: None,
            status: ConnectionStatus::Disconnected,
        }
    }

    /// Write whatever changed since the previous snapshot.
    pub fn render(&mut self, snapshot: &ChatSnapshot) -> io::Result<()> {
        if snapshot.status != self.status {
            self.status = snapshot.status;
            let text = match snapshot.status {
                ConnectionStatus::Connected => "connected",
                ConnectionStatus::Connecting => "connecting...",
                ConnectionStatus::Disconnected => "disconnected",
            };
            self.notice(text)?;
        }

        // The transcript only grows, so a different first message means it was cleared.
        let cleared = match snapshot.messages.first() {
            Some(first) => !self.progress.is_empty() && !self.progress.contains_key(&first.id),
            None => !self.progress.is_empty(),
        };
        if cleared {
            self.progress.clear();
            self.close_line()?;
        }

        for message in &snapshot.messages {
            self.render_message(message)?;
        }
        self.out.flush()
    }

    /// Write an informational line.
    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        self.close_line()?;
        let line = format!("* {text}");
        if self.color {
            writeln!(self.out, "{}", line.dark_grey())?;
        } else {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()
    }

    fn render_message(&mut self, message: &Message) -> io::Result<()> {
        if message.is_user() {
            // Already on screen as typed input.
            self.progress.entry(message.id).or_insert(Progress {
                written: message.content.len(),
                finished: true,
            });
            return Ok(());
        }

        let progress = self.progress.get(&message.id).copied().unwrap_or(Progress {
            written: 0,
            finished: false,
        });
        if progress.finished {
            return Ok(());
        }

        // A header is written with the first visible text, never for an empty reply.
        let delta = message.content.get(progress.written..).unwrap_or_default();
        if !delta.is_empty() && self.open_line != Some(message.id) {
            self.close_line()?;
            self.header(message.persona)?;
            self.open_line = Some(message.id);
        }
        write!(self.out, "{delta}")?;

        let finished = !message.is_streaming;
        if finished && self.open_line == Some(message.id) {
            writeln!(self.out)?;
            self.open_line = None;
        }
        self.progress.insert(
            message.id,
            Progress {
                written: message.content.len(),
                finished,
            },
        );
        Ok(())
    }

    fn header(&mut self, persona: Option<Persona>) -> io::Result<()> {
        let title = persona.as_ref().map_or("Assistant", Persona::title);
        match persona.and_then(|p| hex_color(p.color())).filter(|_| self.color) {
            Some(color) => write!(self.out, "{} ", format!("{title}:").with(color).bold()),
            None => write!(self.out, "{title}: "),
        }
    }

    fn close_line(&mut self) -> io::Result<()> {
        if self.open_line.take().is_some() {
            writeln!(self.out)?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// Parse a `#rrggbb` colour.
fn hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

#[cfg(test)]
mod tests {
    use folio_chat_client::{ChatTarget, DecodeStats};

    use super::*;

    fn snapshot(messages: Vec<Message>) -> ChatSnapshot {
        ChatSnapshot {
            messages,
            typing: Vec::new(),
            status: ConnectionStatus::Disconnected,
            session_id: None,
            target: ChatTarget::General,
            decode_stats: DecodeStats::default(),
        }
    }

    fn output(renderer: Renderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn streams_text_incrementally() {
        let mut renderer = Renderer::new(Vec::new(), false);
        let mut message = Message::streaming(Some(Persona::Engineer));

        renderer.render(&snapshot(vec![message.clone()])).unwrap();
        message.content.push_str("Hel");
        renderer.render(&snapshot(vec![message.clone()])).unwrap();
        message.content.push_str("lo");
        message.is_streaming = false;
        renderer.render(&snapshot(vec![message.clone()])).unwrap();
        renderer.render(&snapshot(vec![message])).unwrap();

        assert_eq!(output(renderer), "AI Engineer: Hello\n");
    }

    #[test]
    fn user_messages_are_not_echoed() {
        let mut renderer = Renderer::new(Vec::new(), false);
        let user = Message::user("hi");
        let reply = Message::assistant("Welcome", None);

        renderer.render(&snapshot(vec![user, reply])).unwrap();
        assert_eq!(output(renderer), "Assistant: Welcome\n");
    }

    #[test]
    fn interleaved_streams_reopen_lines() {
        let mut renderer = Renderer::new(Vec::new(), false);
        let mut eng = Message::streaming(Some(Persona::Engineer));
        let mut spk = Message::streaming(Some(Persona::Speaker));

        eng.content.push_str("ab");
        renderer.render(&snapshot(vec![eng.clone(), spk.clone()])).unwrap();
        spk.content.push_str("cd");
        renderer.render(&snapshot(vec![eng.clone(), spk.clone()])).unwrap();
        eng.content.push_str("ef");
        eng.is_streaming = false;
        spk.is_streaming = false;
        renderer.render(&snapshot(vec![eng, spk])).unwrap();

        assert_eq!(
            output(renderer),
            "AI Engineer: ab\nTech Speaker: cd\nAI Engineer: ef\n"
        );
    }

    #[test]
    fn empty_replies_print_nothing() {
        let mut renderer = Renderer::new(Vec::new(), false);
        let mut spk = Message::streaming(Some(Persona::Speaker));
        let eng = Message::assistant("done", Some(Persona::Engineer));

        renderer.render(&snapshot(vec![spk.clone()])).unwrap();
        renderer.render(&snapshot(vec![spk.clone(), eng.clone()])).unwrap();
        spk.is_streaming = false;
        renderer.render(&snapshot(vec![spk, eng])).unwrap();

        assert_eq!(output(renderer), "AI Engineer: done\n");
    }

    #[test]
    fn status_changes_are_noticed() {
        let mut renderer = Renderer::new(Vec::new(), false);
        let mut snap = snapshot(Vec::new());
        snap.status = ConnectionStatus::Connected;
        renderer.render(&snap).unwrap();
        renderer.render(&snap).unwrap();

        assert_eq!(output(renderer), "* connected\n");
    }

    #[test]
    fn cleared_transcript_starts_over() {
        let mut renderer = Renderer::new(Vec::new(), false);
        let first = Message::assistant("one", None);
        renderer.render(&snapshot(vec![first])).unwrap();
        renderer.render(&snapshot(Vec::new())).unwrap();
        renderer
            .render(&snapshot(vec![Message::assistant("two", None)]))
            .unwrap();

        assert_eq!(output(renderer), "Assistant: one\nAssistant: two\n");
    }

    #[test]
    fn parses_hex_colors() {
        assert!(matches!(
            hex_color("#22d3ee"),
            Some(Color::Rgb {
                r: 0x22,
                g: 0xd3,
                b: 0xee
            })
        ));
        assert!(hex_color("22d3ee").is_none());
        assert!(hex_color("#xyzxyz").is_none());
        for persona in Persona::ALL {
            assert!(hex_color(persona.color()).is_some());
        }
    }
}
