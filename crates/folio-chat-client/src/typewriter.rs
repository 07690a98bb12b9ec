//! Typewriter buffer.
//!
//! Decouples the rate at which reply text arrives from the rate at which it is
//! shown. Chunks are queued as they arrive and drained a fixed number of
//! characters per tick, so replies appear to be typed at a constant pace no
//! matter how the service chunks them.

use std::collections::{HashMap, VecDeque};

use folio_chat_core::Persona;

/// One queued chunk of text awaiting display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferItem {
    /// Text still to be shown.
    pub content: String,
    /// Persona whose streaming message the text belongs to.
    pub persona: Option<Persona>,
}

impl BufferItem {
    /// Create a buffer item.
    #[must_use]
    pub fn new(content: impl Into<String>, persona: Option<Persona>) -> Self {
        Self {
            content: content.into(),
            persona,
        }
    }
}

/// FIFO queue of [`BufferItem`]s, drained by character budget.
#[derive(Debug, Default)]
pub struct TypewriterBuffer {
    queue: VecDeque<BufferItem>,
    /// Number of queued items per persona.
    pending: HashMap<Option<Persona>, usize>,
}

impl TypewriterBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `content` for `persona`. Empty content is ignored.
    pub fn append(&mut self, content: impl Into<String>, persona: Option<Persona>) {
        let content = content.into();
        if content.is_empty() {
            return;
        }
        *self.pending.entry(persona).or_insert(0) += 1;
        self.queue.push_back(BufferItem { content, persona });
    }

    /// Remove up to `budget` characters from the head of the queue.
    ///
    /// A head item shorter than the remaining budget is taken whole and the
    /// next item is started; a longer one is split and its remainder stays at
    /// the head. Adjacent slices for the same persona are merged, so the result
    /// holds at most one entry per persona switch.
    pub fn drain(&mut self, budget: usize) -> Vec<BufferItem> {
        let mut out: Vec<BufferItem> = Vec::new();
        let mut remaining = budget;

        while remaining > 0 {
            let Some(head) = self.queue.front_mut() else {
                break;
            };

            let head_chars = head.content.chars().count();
            let (slice, persona) = if head_chars <= remaining {
                remaining -= head_chars;
                let persona = head.persona;
                let item = self.queue.pop_front().map(|item| item.content).unwrap_or_default();
                self.release(persona);
                (item, persona)
            } else {
                let split_at = head
                    .content
                    .char_indices()
                    .nth(remaining)
                    .map_or(head.content.len(), |(idx, _)| idx);
                let rest = head.content.split_off(split_at);
                let slice = std::mem::replace(&mut head.content, rest);
                remaining = 0;
                (slice, head.persona)
            };

            match out.last_mut() {
                Some(last) if last.persona == persona => last.content.push_str(&slice),
                _ => out.push(BufferItem {
                    content: slice,
                    persona,
                }),
            }
        }

        out
    }

    /// Whether any queued item belongs to `persona`.
    #[must_use]
    pub fn has_pending(&self, persona: Option<Persona>) -> bool {
        self.pending.get(&persona).is_some_and(|n| *n > 0)
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Total number of characters still queued.
    #[must_use]
    pub fn pending_chars(&self) -> usize {
        self.queue.iter().map(|item| item.content.chars().count()).sum()
    }

    /// Remove every queued item for `persona` and return its text in order.
    ///
    /// Items for other personas keep their relative order.
    pub fn take_persona(&mut self, persona: Option<Persona>) -> String {
        if self.pending.remove(&persona).is_none() {
            return String::new();
        }
        let mut taken = String::new();
        self.queue.retain(|item| {
            if item.persona == persona {
                taken.push_str(&item.content);
                false
            } else {
                true
            }
        });
        taken
    }

    /// Drop everything queued.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending.clear();
    }

    fn release(&mut self, persona: Option<Persona>) {
        if let Some(count) = self.pending.get_mut(&persona) {
            *count -= 1;
            if *count == 0 {
                self.pending.remove(&persona);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENG: Option<Persona> = Some(Persona::Engineer);
    const RES: Option<Persona> = Some(Persona::Researcher);

    fn drain_all(buffer: &mut TypewriterBuffer, budget: usize) -> Vec<BufferItem> {
        let mut all = Vec::new();
        while !buffer.is_empty() {
            all.extend(buffer.drain(budget));
        }
        all
    }

    fn text_for(items: &[BufferItem], persona: Option<Persona>) -> String {
        items
            .iter()
            .filter(|item| item.persona == persona)
            .map(|item| item.content.as_str())
            .collect()
    }

    #[test]
    fn drains_two_chars_per_tick() {
        let mut buffer = TypewriterBuffer::new();
        buffer.append("Hello", ENG);

        assert_eq!(buffer.drain(2), vec![BufferItem::new("He", ENG)]);
        assert_eq!(buffer.drain(2), vec![BufferItem::new("ll", ENG)]);
        assert_eq!(buffer.drain(2), vec![BufferItem::new("o", ENG)]);
        assert!(buffer.drain(2).is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn take_persona_removes_only_that_persona() {
        let mut buffer = TypewriterBuffer::new();
        buffer.append("Hel", ENG);
        buffer.append("other", RES);
        buffer.append("lo", ENG);
        buffer.drain(1);

        assert_eq!(buffer.take_persona(ENG), "ello");
        assert!(!buffer.has_pending(ENG));
        assert!(buffer.has_pending(RES));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.take_persona(ENG), "");
        assert_eq!(drain_all(&mut buffer, 2), vec![
            BufferItem::new("ot", RES),
            BufferItem::new("he", RES),
            BufferItem::new("r", RES),
        ]);
    }

    #[test]
    fn short_head_is_taken_whole_then_next_item_started() {
        let mut buffer = TypewriterBuffer::new();
        buffer.append("a", ENG);
        buffer.append("bcd", ENG);

        assert_eq!(buffer.drain(2), vec![BufferItem::new("ab", ENG)]);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.drain(2), vec![BufferItem::new("cd", ENG)]);
    }

    #[test]
    fn slices_for_different_personas_stay_separate() {
        let mut buffer = TypewriterBuffer::new();
        buffer.append("x", ENG);
        buffer.append("yz", RES);

        assert_eq!(
            buffer.drain(2),
            vec![BufferItem::new("x", ENG), BufferItem::new("y", RES)]
        );
        assert!(!buffer.has_pending(ENG));
        assert!(buffer.has_pending(RES));
    }

    #[test]
    fn splits_on_char_boundaries() {
        let mut buffer = TypewriterBuffer::new();
        buffer.append("çğü🎤ş", None);

        let items = drain_all(&mut buffer, 2);
        let shown: Vec<&str> = items.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(shown, vec!["çğ", "ü🎤", "ş"]);
    }

    #[test]
    fn has_pending_tracks_per_persona() {
        let mut buffer = TypewriterBuffer::new();
        buffer.append("ab", ENG);
        buffer.append("cd", ENG);
        buffer.append("ef", None);

        assert!(buffer.has_pending(ENG));
        assert!(buffer.has_pending(None));
        assert!(!buffer.has_pending(RES));

        buffer.drain(4);
        assert!(!buffer.has_pending(ENG));
        assert!(buffer.has_pending(None));
    }

    #[test]
    fn empty_content_is_not_queued() {
        let mut buffer = TypewriterBuffer::new();
        buffer.append("", ENG);
        assert!(buffer.is_empty());
        assert!(!buffer.has_pending(ENG));
    }

    #[test]
    fn clear_drops_everything() {
        let mut buffer = TypewriterBuffer::new();
        buffer.append("pending", ENG);
        buffer.append("more", RES);
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.pending_chars(), 0);
        assert!(!buffer.has_pending(ENG));
        assert!(!buffer.has_pending(RES));
    }

    #[test]
    fn zero_budget_drains_nothing() {
        let mut buffer = TypewriterBuffer::new();
        buffer.append("abc", ENG);
        assert!(buffer.drain(0).is_empty());
        assert_eq!(buffer.pending_chars(), 3);
    }

    #[test]
    fn drain_conserves_text_for_any_chunking_and_budget() {
        let text = "Hello, portfolio visitor!";
        let chars: Vec<char> = text.chars().collect();

        for split in 0..=chars.len() {
            for budget in 1..=7 {
                let mut buffer = TypewriterBuffer::new();
                let (head, tail): (String, String) = (
                    chars[..split].iter().collect(),
                    chars[split..].iter().collect(),
                );
                buffer.append(head, ENG);
                buffer.append("interleaved", RES);
                buffer.append(tail, ENG);

                let items = drain_all(&mut buffer, budget);
                assert_eq!(text_for(&items, ENG), text, "split={split} budget={budget}");
                assert_eq!(text_for(&items, RES), "interleaved");
            }
        }
    }
}
