use askdoc_core::{Conversation, InteractionController};
use ratatui::layout::Rect;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Question input
    pub query_input: String,
    pub query_cursor: usize, // cursor position in query_input, in chars

    // Chat view, rebuilt from the controller's snapshots
    pub conversation: Conversation,
    pub query_scroll: u16,
    pub query_chat_height: u16, // Height of chat area for scroll calculations
    pub query_chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_area: Option<Rect>, // For mouse hit-testing (updated during render)
    pub follow_newest: bool,     // Keep the newest turn in view on every redraw

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub endpoint_label: String,

    controller: InteractionController,
    updates: watch::Receiver<Conversation>,
}

impl App {
    pub fn new(controller: InteractionController, endpoint_label: impl Into<String>) -> Self {
        let mut updates = controller.subscribe();
        let conversation = updates.borrow_and_update().clone();

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            query_input: String::new(),
            query_cursor: 0,

            conversation,
            query_scroll: 0,
            query_chat_height: 0,
            query_chat_width: 0,
            chat_area: None,
            follow_newest: true,

            animation_frame: 0,

            endpoint_label: endpoint_label.into(),

            controller,
            updates,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.conversation.is_pending()
    }

    /// Whether Enter would send the current input.
    pub fn can_send(&self) -> bool {
        self.conversation.can_submit(&self.query_input)
    }

    /// Hand the input to the controller. The input is only cleared when the
    /// controller accepts it.
    pub fn submit_query(&mut self) -> Option<JoinHandle<()>> {
        let handle = self.controller.submit(&self.query_input)?;

        self.query_input.clear();
        self.query_cursor = 0;
        self.sync_conversation();
        Some(handle)
    }

    /// Pull the latest snapshot if the controller published one since the last
    /// call. Every new snapshot pins the view to the newest turn.
    pub fn sync_conversation(&mut self) -> bool {
        if !self.updates.has_changed().unwrap_or(false) {
            return false;
        }

        self.conversation = self.updates.borrow_and_update().clone();
        if !self.conversation.is_pending() {
            self.animation_frame = 0;
        }
        self.scroll_query_to_bottom();
        true
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Rows the chat transcript occupies once ratatui word-wraps it.
    pub fn chat_line_count(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.query_chat_width > 0 {
            self.query_chat_width
        } else {
            50
        };

        let rows = ui::chat_paragraph(self).line_count(wrap_width);
        u16::try_from(rows).unwrap_or(u16::MAX)
    }

    fn visible_height(&self) -> u16 {
        if self.query_chat_height > 0 {
            self.query_chat_height
        } else {
            20
        }
    }

    pub fn max_scroll(&self) -> u16 {
        self.chat_line_count().saturating_sub(self.visible_height())
    }

    /// Scroll chat to bottom so the newest turn (or "Thinking...") is visible
    pub fn scroll_query_to_bottom(&mut self) {
        self.query_scroll = self.max_scroll();
        self.follow_newest = true;
    }

    pub fn scroll_query_to_top(&mut self) {
        self.query_scroll = 0;
        self.follow_newest = self.max_scroll() == 0;
    }

    pub fn scroll_query_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.query_scroll = self.query_scroll.saturating_add(lines).min(max);
        self.follow_newest = self.query_scroll == max;
    }

    pub fn scroll_query_up(&mut self, lines: u16) {
        self.query_scroll = self.query_scroll.saturating_sub(lines);
        self.follow_newest = self.query_scroll == self.max_scroll();
    }

    pub fn half_page(&self) -> u16 {
        (self.visible_height() / 2).max(1)
    }
}

/// One line per citation under an answer.
pub fn citation_label(citation: &askdoc_core::Citation) -> String {
    match (citation.source.is_empty(), citation.question.is_empty()) {
        (false, false) => format!("  - {}: {}", citation.source, citation.question),
        (false, true) => format!("  - {}", citation.source),
        (true, false) => format!("  - {}", citation.question),
        (true, true) => "  - unknown source".to_string(),
    }
}
