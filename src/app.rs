use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::LazyLock;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap};
use regex::Regex;

use crate::model::card::{CardButton, Intent};
use crate::model::page::{
    ComparisonRow, FeatureCell, GridItem, Page, PluginDescriptor, TabKind,
};
use crate::model::storage::StateStore;
use crate::msg::Msg;
use crate::ops::{OpAction, OpOutcome, OpRequest};

/// How long a freshly revealed panel stays dimmed. The tick thread keeps
/// redraws coming until the deadline passes.
const REVEAL_FADE: Duration = Duration::from_millis(160);

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*[^*]+\*\*").expect("valid bold regex"));
static ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*[^*\s][^*]*\*").expect("valid italic regex"));
static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`]+`").expect("valid inline code regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]\([^\)]+\)").expect("valid link regex"));

pub struct App {
    pub page: Page,
    storage: StateStore,
    active_tab: usize,
    cards: HashMap<String, CardButton>,
    card_selected: usize,
    scroll: u16,
    notice_visible: bool,
    nonce: String,
    ops_tx: mpsc::Sender<OpRequest>,
    pub notifications: VecDeque<String>,
    reveal_until: Option<Instant>,
    pub should_quit: bool,
}

impl App {
    /// Build the client state for a page. `facts` supplies the two
    /// installed/active booleans per slug from which card buttons are
    /// derived. The persisted tab selection is resolved here: a stale or
    /// absent value falls back to the first tab without writing back.
    pub fn new(
        page: Page,
        facts: impl Fn(&str) -> (bool, bool),
        storage: StateStore,
        nonce: &str,
        ops_tx: mpsc::Sender<OpRequest>,
    ) -> Self {
        let cards = page
            .plugin_slugs()
            .into_iter()
            .map(|slug| {
                let (installed, active) = facts(&slug);
                (slug.clone(), CardButton::derive(&slug, installed, active))
            })
            .collect();

        let active_tab = storage
            .active_tab()
            .and_then(|id| page.tab_index(&id))
            .unwrap_or(0);

        let notice_visible = page.notice.is_some() && !storage.notice_dismissed();

        Self {
            page,
            storage,
            active_tab,
            cards,
            card_selected: 0,
            scroll: 0,
            notice_visible,
            nonce: nonce.to_string(),
            ops_tx,
            notifications: VecDeque::new(),
            reveal_until: Some(Instant::now() + REVEAL_FADE),
            should_quit: false,
        }
    }

    pub fn active_tab_id(&self) -> Option<&str> {
        self.page.tabs.get(self.active_tab).map(|tab| tab.id.as_str())
    }

    #[cfg(test)]
    fn card(&self, slug: &str) -> Option<&CardButton> {
        self.cards.get(slug)
    }

    // ── MVU: Update ──────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::OpResponse(outcome) => self.apply_outcome(outcome),
            Msg::Tick => self.handle_tick(),
            Msg::Resize(_, _) => {}
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.select_relative(1),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => self.select_relative(-1),
            KeyCode::Char(ch @ '1'..='9') => {
                let idx = ch as usize - '1' as usize;
                if let Some(tab) = self.page.tabs.get(idx) {
                    let id = tab.id.clone();
                    self.select_tab(&id);
                }
            }
            KeyCode::Down | KeyCode::Char('j') => self.move_within_panel(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_within_panel(-1),
            KeyCode::Enter => self.press_card_button(),
            KeyCode::Char('x') => self.dismiss_notice(),
            _ => {}
        }
    }

    fn handle_tick(&mut self) {
        if let Some(deadline) = self.reveal_until
            && Instant::now() >= deadline
        {
            self.reveal_until = None;
        }
    }

    /// Switch to the tab with the given id. Idempotent: the active id is a
    /// no-op with no storage write. Unknown ids are silently ignored — they
    /// indicate a page/markup mismatch, not a runtime fault.
    pub fn select_tab(&mut self, tab_id: &str) {
        if self.active_tab_id() == Some(tab_id) {
            return;
        }

        let Some(index) = self.page.tab_index(tab_id) else {
            return;
        };

        self.active_tab = index;
        self.card_selected = 0;
        self.scroll = 0;
        self.reveal_until = Some(Instant::now() + REVEAL_FADE);
        self.storage.set_active_tab(tab_id);
    }

    fn select_relative(&mut self, delta: isize) {
        let count = self.page.tabs.len();
        if count < 2 {
            return;
        }

        let target = (self.active_tab as isize + delta).rem_euclid(count as isize) as usize;
        let id = self.page.tabs[target].id.clone();
        self.select_tab(&id);
    }

    fn move_within_panel(&mut self, delta: isize) {
        match self.page.tabs.get(self.active_tab).map(|tab| &tab.kind) {
            Some(TabKind::Plugin { items }) => {
                if items.is_empty() {
                    return;
                }
                let last = items.len() - 1;
                self.card_selected = self
                    .card_selected
                    .saturating_add_signed(delta)
                    .min(last);
            }
            Some(_) => {
                self.scroll = self.scroll.saturating_add_signed(delta as i16);
            }
            None => {}
        }
    }

    fn selected_card_slug(&self) -> Option<String> {
        match self.page.tabs.get(self.active_tab).map(|tab| &tab.kind) {
            Some(TabKind::Plugin { items }) => {
                items.get(self.card_selected).map(|item| item.slug.clone())
            }
            _ => None,
        }
    }

    /// Dispatch the selected card's action by its current intent. Terminal
    /// or in-flight buttons and empty slugs issue no request at all.
    fn press_card_button(&mut self) {
        let Some(slug) = self.selected_card_slug() else {
            return;
        };
        let Some(card) = self.cards.get_mut(&slug) else {
            return;
        };

        let intent = card.intent;
        if !card.begin_request() {
            return;
        }

        let action = match intent {
            Intent::Install => OpAction::Install,
            Intent::Activate => OpAction::Activate,
            // begin_request rejects terminal buttons.
            Intent::Disabled => return,
        };

        let request = OpRequest {
            action,
            slug: slug.clone(),
            nonce: self.nonce.clone(),
        };

        if self.ops_tx.send(request).is_err() {
            card.in_flight = false;
            self.push_notification("plugin service is not available".to_string());
        }
    }

    /// Reconcile one completed request with its card. The outcome is
    /// matched to the originating card by the echoed slug; the message is
    /// surfaced through the notification channel either way.
    fn apply_outcome(&mut self, outcome: OpOutcome) {
        if let Some(card) = self.cards.get_mut(&outcome.slug) {
            match outcome.action {
                OpAction::Install => card.apply_install(outcome.success),
                OpAction::Activate => card.apply_activate(outcome.success),
            }
        }

        if !outcome.success {
            tracing::warn!("{:?} {} failed: {}", outcome.action, outcome.slug, outcome.message);
        }

        self.push_notification(outcome.message);
    }

    fn dismiss_notice(&mut self) {
        if self.notice_visible {
            self.notice_visible = false;
            self.storage.dismiss_notice();
        }
    }

    fn push_notification(&mut self, message: String) {
        self.notifications.push_back(message);
        while self.notifications.len() > 8 {
            self.notifications.pop_front();
        }
    }

    // ── MVU: View ────────────────────────────────────────────────

    pub fn view(&self, frame: &mut Frame) {
        let notice_height = if self.notice_visible { 1 } else { 0 };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(notice_height),
                Constraint::Length(4), // header
                Constraint::Length(1), // tab nav
                Constraint::Min(1),    // body
                Constraint::Length(1), // status bar
            ])
            .split(frame.area());

        if self.notice_visible {
            self.render_notice(frame, chunks[0]);
        }
        self.render_header(frame, chunks[1]);
        self.render_tab_nav(frame, chunks[2]);

        if self.page.sidebar.is_empty() {
            self.render_active_panel(frame, chunks[3]);
        } else {
            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(1), Constraint::Percentage(30)])
                .split(chunks[3]);

            self.render_active_panel(frame, body[0]);
            self.render_sidebar(frame, body[1]);
        }

        self.render_status_bar(frame, chunks[4]);
    }

    fn panel_dimmed(&self) -> bool {
        self.reveal_until
            .is_some_and(|deadline| Instant::now() < deadline)
    }

    fn render_notice(&self, frame: &mut Frame, area: Rect) {
        let Some(message) = self.page.notice.as_deref() else {
            return;
        };

        let line = Line::from(vec![
            Span::styled(
                format!(" {message} "),
                Style::default().fg(Color::Black).bg(Color::Green),
            ),
            Span::styled(
                " x: dismiss ",
                Style::default().fg(Color::DarkGray).bg(Color::Rgb(20, 30, 20)),
            ),
        ]);
        frame.render_widget(
            Paragraph::new(line).style(Style::default().bg(Color::Rgb(20, 30, 20))),
            area,
        );
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let mut lines = vec![
            Line::from(Span::styled(
                self.page.title.clone(),
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                self.page.subtitle.clone(),
                Style::default().fg(Color::Gray),
            )),
        ];

        if !self.page.quick_links.is_empty() {
            let mut spans = Vec::new();
            for link in &self.page.quick_links {
                spans.push(Span::styled(
                    format!("[{}]", link.text),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::UNDERLINED),
                ));
                spans.push(Span::styled(
                    format!(" {}  ", link.url),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            lines.push(Line::from(spans));
        }

        frame.render_widget(Paragraph::new(lines), area);
    }

    fn render_tab_nav(&self, frame: &mut Frame, area: Rect) {
        let mut spans = Vec::new();

        for (idx, tab) in self.page.tabs.iter().enumerate() {
            let label = format!(" {} ", tab.title);
            let style = if idx == self.active_tab {
                Style::default()
                    .bg(Color::Rgb(30, 30, 45))
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().bg(Color::Rgb(18, 18, 28)).fg(Color::Gray)
            };
            spans.push(Span::styled(label, style));
        }

        spans.push(Span::styled(
            "  Tab/h/l: Switch  1-9: Jump  j/k: Move  Enter: Install/Activate  q: Quit ",
            Style::default()
                .bg(Color::Rgb(20, 20, 30))
                .fg(Color::DarkGray),
        ));

        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(20, 20, 30))),
            area,
        );
    }

    fn render_active_panel(&self, frame: &mut Frame, area: Rect) {
        let Some(tab) = self.page.tabs.get(self.active_tab) else {
            return;
        };

        let pre: Vec<String> = self
            .page
            .before_tab_hooks
            .iter()
            .flat_map(|hook| hook(tab))
            .collect();
        let post: Vec<String> = self
            .page
            .after_tab_hooks
            .iter()
            .flat_map(|hook| hook(tab))
            .collect();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(pre.len() as u16),
                Constraint::Min(1),
                Constraint::Length(post.len() as u16),
            ])
            .split(area);

        let dim = self.panel_dimmed();

        if !pre.is_empty() {
            frame.render_widget(hook_paragraph(&pre, dim), chunks[0]);
        }

        match &tab.kind {
            TabKind::Content { body } => self.render_content(frame, chunks[1], body, dim),
            TabKind::Custom { renderer } => {
                let lines: Vec<Line> = renderer
                    .render()
                    .into_iter()
                    .map(|text| Line::from(Span::styled(text, panel_style(dim))))
                    .collect();
                frame.render_widget(
                    Paragraph::new(lines)
                        .wrap(Wrap { trim: false })
                        .scroll((self.scroll, 0)),
                    chunks[1],
                );
            }
            TabKind::Grid { items, columns } => {
                self.render_grid(frame, chunks[1], items, *columns, dim)
            }
            TabKind::Plugin { items } => self.render_plugin_cards(frame, chunks[1], items, dim),
            TabKind::Comparison {
                rows,
                headings,
                upgrade,
            } => {
                let upgrade_line = upgrade
                    .as_ref()
                    .map(|u| format!("[{}] → {}", u.text, u.url));
                self.render_comparison(
                    frame,
                    chunks[1],
                    rows,
                    (&headings.free, &headings.pro),
                    upgrade_line,
                    dim,
                );
            }
        }

        if !post.is_empty() {
            frame.render_widget(hook_paragraph(&post, dim), chunks[2]);
        }
    }

    fn render_content(&self, frame: &mut Frame, area: Rect, body: &str, dim: bool) {
        let lines: Vec<Line> = body
            .lines()
            .map(|text| render_inline(text, content_base_style(text, dim)))
            .collect();

        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .scroll((self.scroll, 0)),
            area,
        );
    }

    fn render_grid(
        &self,
        frame: &mut Frame,
        area: Rect,
        items: &[GridItem],
        columns: usize,
        dim: bool,
    ) {
        let columns = columns.max(1);
        let row_count = items.len().div_ceil(columns);
        if row_count == 0 {
            return;
        }

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(5); row_count])
            .split(area);

        for (row_idx, row_area) in rows.iter().enumerate() {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![
                    Constraint::Ratio(1, columns as u32);
                    columns
                ])
                .split(*row_area);

            for col_idx in 0..columns {
                let Some(item) = items.get(row_idx * columns + col_idx) else {
                    continue;
                };

                let mut lines = vec![Line::from(Span::styled(
                    item.title.clone(),
                    panel_style(dim).add_modifier(Modifier::BOLD),
                ))];
                lines.push(render_inline(&item.description, panel_style(dim)));
                if let Some(button) = &item.button {
                    lines.push(Line::from(Span::styled(
                        format!("[{}] {}", button.text, button.url),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::UNDERLINED),
                    )));
                }

                frame.render_widget(
                    Paragraph::new(lines)
                        .wrap(Wrap { trim: false })
                        .block(Block::default().borders(Borders::ALL).style(panel_style(dim))),
                    cells[col_idx],
                );
            }
        }
    }

    fn render_plugin_cards(
        &self,
        frame: &mut Frame,
        area: Rect,
        items: &[PluginDescriptor],
        dim: bool,
    ) {
        let columns = 2;
        let row_count = items.len().div_ceil(columns);
        if row_count == 0 {
            return;
        }

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(6); row_count])
            .split(area);

        for (row_idx, row_area) in rows.iter().enumerate() {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
                .split(*row_area);

            for col_idx in 0..columns {
                let item_idx = row_idx * columns + col_idx;
                let Some(item) = items.get(item_idx) else {
                    continue;
                };

                let selected = item_idx == self.card_selected;
                let border_style = if selected {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default().fg(Color::Rgb(60, 60, 80))
                };

                let mut lines = vec![Line::from(Span::styled(
                    item.name.clone(),
                    panel_style(dim).add_modifier(Modifier::BOLD),
                ))];
                lines.push(Line::from(Span::styled(
                    item.description.clone(),
                    panel_style(dim),
                )));
                lines.push(self.card_button_line(&item.slug, dim));

                frame.render_widget(
                    Paragraph::new(lines)
                        .wrap(Wrap { trim: false })
                        .block(Block::default().borders(Borders::ALL).border_style(border_style)),
                    cells[col_idx],
                );
            }
        }
    }

    fn card_button_line(&self, slug: &str, dim: bool) -> Line<'static> {
        let Some(card) = self.cards.get(slug) else {
            return Line::from("");
        };

        // The in-flight marker is a style change only; the label keeps its
        // pre-request text until the outcome arrives.
        let style = if card.in_flight {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::DIM)
        } else {
            match card.intent {
                Intent::Install => Style::default().fg(Color::Black).bg(Color::Green),
                Intent::Activate => Style::default().fg(Color::Black).bg(Color::Cyan),
                Intent::Disabled => Style::default().fg(Color::DarkGray).bg(Color::Rgb(30, 30, 40)),
            }
        };

        let style = if dim { style.add_modifier(Modifier::DIM) } else { style };

        Line::from(vec![
            Span::styled(format!(" {} ", card.label), style),
            Span::styled(
                "  View Details",
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::UNDERLINED),
            ),
        ])
    }

    fn render_comparison(
        &self,
        frame: &mut Frame,
        area: Rect,
        rows: &[ComparisonRow],
        headings: (&str, &str),
        upgrade_line: Option<String>,
        dim: bool,
    ) {
        let header = Row::new(vec![
            Cell::from(""),
            Cell::from(Span::styled(
                headings.0.to_string(),
                panel_style(dim).add_modifier(Modifier::BOLD),
            )),
            Cell::from(Span::styled(
                headings.1.to_string(),
                panel_style(dim).add_modifier(Modifier::BOLD),
            )),
        ]);

        let mut table_rows: Vec<Row> = rows
            .iter()
            .map(|row| {
                let feature = ratatui::text::Text::from(vec![
                    Line::from(Span::styled(
                        row.title.clone(),
                        panel_style(dim).add_modifier(Modifier::BOLD),
                    )),
                    Line::from(Span::styled(row.description.clone(), panel_style(dim))),
                ]);

                Row::new(vec![
                    Cell::from(feature),
                    feature_cell(&row.free, dim),
                    feature_cell(&row.pro, dim),
                ])
                .height(2)
            })
            .collect();

        if let Some(text) = upgrade_line {
            table_rows.push(
                Row::new(vec![
                    Cell::from(""),
                    Cell::from(Span::styled(
                        text,
                        Style::default()
                            .fg(Color::Black)
                            .bg(Color::Magenta)
                            .add_modifier(Modifier::BOLD),
                    )),
                    Cell::from(""),
                ])
                .height(1),
            );
        }

        let table = Table::new(
            table_rows,
            [
                Constraint::Percentage(60),
                Constraint::Percentage(20),
                Constraint::Percentage(20),
            ],
        )
        .header(header);

        frame.render_widget(table, area);
    }

    fn render_sidebar(&self, frame: &mut Frame, area: Rect) {
        let box_count = self.page.sidebar.len();
        if box_count == 0 {
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(6); box_count])
            .split(area);

        for (sidebar_box, chunk) in self.page.sidebar.iter().zip(chunks.iter()) {
            let mut lines = Vec::new();

            let body_lines: Vec<String> = match &sidebar_box.body {
                crate::model::page::SidebarBody::Content(text) => {
                    text.lines().map(str::to_string).collect()
                }
                crate::model::page::SidebarBody::Custom(renderer) => renderer.render(),
            };
            for text in body_lines {
                lines.push(render_inline(&text, Style::default().fg(Color::Gray)));
            }

            if let Some(button) = &sidebar_box.button {
                lines.push(Line::from(Span::styled(
                    format!("[{}] {}", button.text, button.url),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::UNDERLINED),
                )));
            }

            frame.render_widget(
                Paragraph::new(lines).wrap(Wrap { trim: false }).block(
                    Block::default()
                        .title(format!(" {} ", sidebar_box.title))
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Rgb(60, 60, 80))),
                ),
                *chunk,
            );
        }
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let product = Span::styled(
            format!(
                " {} {} ",
                self.page.product_name, self.page.product_version
            ),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        );

        let note = self
            .notifications
            .back()
            .map(|n| format!(" {n} "))
            .unwrap_or_default();

        let info = Span::styled(
            note,
            Style::default().fg(Color::Gray).bg(Color::DarkGray),
        );

        frame.render_widget(
            Paragraph::new(Line::from(vec![product, info]))
                .style(Style::default().bg(Color::DarkGray)),
            area,
        );
    }
}

fn panel_style(dim: bool) -> Style {
    let style = Style::default().fg(Color::Gray);
    if dim {
        style.add_modifier(Modifier::DIM)
    } else {
        style
    }
}

fn content_base_style(text: &str, dim: bool) -> Style {
    let trimmed = text.trim_start();

    let style = if trimmed.starts_with("- ") || trimmed.starts_with("* ") {
        Style::default().fg(Color::LightCyan)
    } else {
        Style::default().fg(Color::Gray)
    };

    if dim {
        style.add_modifier(Modifier::DIM)
    } else {
        style
    }
}

fn hook_paragraph(lines: &[String], dim: bool) -> Paragraph<'static> {
    let styled: Vec<Line> = lines
        .iter()
        .map(|text| {
            Line::from(Span::styled(
                text.clone(),
                panel_style(dim).add_modifier(Modifier::ITALIC),
            ))
        })
        .collect();
    Paragraph::new(styled)
}

fn feature_cell(cell: &FeatureCell, dim: bool) -> Cell<'static> {
    match cell {
        FeatureCell::Yes => Cell::from(Span::styled(
            "✓",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        FeatureCell::No => Cell::from(Span::styled(
            "✗",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        FeatureCell::Text(text) => Cell::from(Span::styled(text.clone(), panel_style(dim))),
    }
}

#[derive(Debug, Clone, Copy)]
enum TokenKind {
    Bold,
    Italic,
    InlineCode,
    Link,
}

fn next_inline_token(text: &str, start_at: usize) -> Option<(usize, usize, TokenKind)> {
    let candidates = [
        (
            INLINE_CODE_RE
                .find_at(text, start_at)
                .map(|m| (m.start(), m.end(), TokenKind::InlineCode)),
            0,
        ),
        (
            LINK_RE
                .find_at(text, start_at)
                .map(|m| (m.start(), m.end(), TokenKind::Link)),
            1,
        ),
        (
            BOLD_RE
                .find_at(text, start_at)
                .map(|m| (m.start(), m.end(), TokenKind::Bold)),
            2,
        ),
        (
            ITALIC_RE
                .find_at(text, start_at)
                .map(|m| (m.start(), m.end(), TokenKind::Italic)),
            3,
        ),
    ];

    candidates
        .into_iter()
        .filter_map(|(hit, priority)| hit.map(|h| (h, priority)))
        .min_by(|((sa, _, _), pa), ((sb, _, _), pb)| sa.cmp(sb).then(pa.cmp(pb)))
        .map(|(h, _)| h)
}

/// Style inline emphasis markers within one line of panel text.
fn render_inline(text: &str, base_style: Style) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut cursor = 0;

    while cursor < text.len() {
        let next = next_inline_token(text, cursor);

        let Some((start, end, kind)) = next else {
            if cursor < text.len() {
                spans.push(Span::styled(text[cursor..].to_string(), base_style));
            }
            break;
        };

        if start > cursor {
            spans.push(Span::styled(text[cursor..start].to_string(), base_style));
        }

        let token_style = match kind {
            TokenKind::Bold => base_style.add_modifier(Modifier::BOLD),
            TokenKind::Italic => base_style.add_modifier(Modifier::ITALIC),
            TokenKind::InlineCode => base_style
                .fg(Color::Rgb(220, 220, 220))
                .bg(Color::Rgb(32, 32, 48)),
            TokenKind::Link => base_style
                .fg(Color::Rgb(255, 102, 0))
                .add_modifier(Modifier::UNDERLINED),
        };

        spans.push(Span::styled(text[start..end].to_string(), token_style));
        cursor = end;
    }

    if spans.is_empty() {
        Line::from(Span::styled(text.to_string(), base_style))
    } else {
        Line::from(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::page::PluginDescriptor;
    use std::sync::mpsc::Receiver;

    fn two_tab_page() -> Page {
        Page::new("Demo", "1.0.0", "demo")
            .add_tab("general", "General", TabKind::Content { body: "hello".to_string() })
            .add_tab("advanced", "Advanced", TabKind::Content { body: "world".to_string() })
    }

    fn plugin_page(slug: &str) -> Page {
        Page::new("Demo", "1.0.0", "demo").add_tab(
            "plugins",
            "Plugins",
            TabKind::Plugin {
                items: vec![PluginDescriptor {
                    slug: slug.to_string(),
                    name: "Akismet".to_string(),
                    description: "Spam protection.".to_string(),
                }],
            },
        )
    }

    fn app_with(
        page: Page,
        storage: StateStore,
        facts: impl Fn(&str) -> (bool, bool),
    ) -> (App, Receiver<OpRequest>) {
        let (tx, rx) = mpsc::channel();
        (App::new(page, facts, storage, "nonce-1", tx), rx)
    }

    fn press_enter(app: &mut App) {
        app.update(Msg::Key(KeyEvent::from(KeyCode::Enter))).unwrap();
    }

    #[test]
    fn initialize_defaults_to_first_tab() {
        let (app, _rx) = app_with(two_tab_page(), StateStore::disabled("demo"), |_| (false, false));
        assert_eq!(app.active_tab_id(), Some("general"));
    }

    #[test]
    fn initialize_restores_persisted_selection() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = StateStore::open(Some(tmp.path().to_path_buf()), "demo");
        store.set_active_tab("advanced");

        let (app, _rx) = app_with(two_tab_page(), store, |_| (false, false));
        assert_eq!(app.active_tab_id(), Some("advanced"));
    }

    #[test]
    fn initialize_falls_back_on_stale_selection_without_writing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = StateStore::open(Some(tmp.path().to_path_buf()), "demo");
        store.set_active_tab("missing-id");

        let (app, _rx) = app_with(two_tab_page(), store, |_| (false, false));
        assert_eq!(app.active_tab_id(), Some("general"));

        // The fallback must not overwrite the stored value.
        let reread = StateStore::open(Some(tmp.path().to_path_buf()), "demo");
        assert_eq!(reread.active_tab(), Some("missing-id".to_string()));
    }

    #[test]
    fn select_tab_persists_explicit_switches() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = StateStore::open(Some(tmp.path().to_path_buf()), "demo");

        let (mut app, _rx) = app_with(two_tab_page(), store, |_| (false, false));
        app.select_tab("advanced");

        assert_eq!(app.active_tab_id(), Some("advanced"));
        let reread = StateStore::open(Some(tmp.path().to_path_buf()), "demo");
        assert_eq!(reread.active_tab(), Some("advanced".to_string()));
    }

    #[test]
    fn select_tab_is_idempotent_and_skips_the_storage_write() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = StateStore::open(Some(tmp.path().to_path_buf()), "demo");

        let (mut app, _rx) = app_with(two_tab_page(), store, |_| (false, false));
        app.select_tab("advanced");

        // Plant a different persisted value behind the controller's back;
        // re-selecting the active tab must not write it back.
        let side = StateStore::open(Some(tmp.path().to_path_buf()), "demo");
        side.set_active_tab("general");

        app.select_tab("advanced");
        assert_eq!(app.active_tab_id(), Some("advanced"));
        assert_eq!(side.active_tab(), Some("general".to_string()));
    }

    #[test]
    fn select_tab_ignores_unknown_ids() {
        let (mut app, _rx) = app_with(two_tab_page(), StateStore::disabled("demo"), |_| (false, false));
        app.select_tab("missing-id");
        assert_eq!(app.active_tab_id(), Some("general"));
    }

    #[test]
    fn pressing_install_sends_one_request_with_the_session_nonce() {
        let (mut app, rx) =
            app_with(plugin_page("akismet"), StateStore::disabled("demo"), |_| (false, false));

        press_enter(&mut app);

        let request = rx.try_recv().unwrap();
        assert_eq!(request.action, OpAction::Install);
        assert_eq!(request.slug, "akismet");
        assert_eq!(request.nonce, "nonce-1");

        // In flight: a second press issues nothing.
        press_enter(&mut app);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn terminal_card_issues_zero_requests() {
        let (mut app, rx) =
            app_with(plugin_page("akismet"), StateStore::disabled("demo"), |_| (true, true));

        press_enter(&mut app);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn empty_slug_issues_zero_requests() {
        let (mut app, rx) =
            app_with(plugin_page(""), StateStore::disabled("demo"), |_| (false, false));

        press_enter(&mut app);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn install_success_outcome_relabels_the_card() {
        let (mut app, _rx) =
            app_with(plugin_page("akismet"), StateStore::disabled("demo"), |_| (false, false));

        press_enter(&mut app);
        app.update(Msg::OpResponse(OpOutcome {
            action: OpAction::Install,
            slug: "akismet".to_string(),
            success: true,
            plugin: Some("Akismet".to_string()),
            message: "Akismet successfully installed.".to_string(),
        }))
        .unwrap();

        let card = app.card("akismet").unwrap();
        assert_eq!(card.intent, Intent::Activate);
        assert_eq!(card.label, "Activate");
        assert!(!card.in_flight);

        // A follow-up press now dispatches an activate request.
        let (tx, rx) = mpsc::channel();
        app.ops_tx = tx;
        press_enter(&mut app);
        assert_eq!(rx.try_recv().unwrap().action, OpAction::Activate);
    }

    #[test]
    fn activate_failure_outcome_reverts_and_clears_in_flight() {
        let (mut app, _rx) =
            app_with(plugin_page("akismet"), StateStore::disabled("demo"), |_| (true, false));

        press_enter(&mut app);
        app.update(Msg::OpResponse(OpOutcome {
            action: OpAction::Activate,
            slug: "akismet".to_string(),
            success: false,
            plugin: None,
            message: "nonce verification failed".to_string(),
        }))
        .unwrap();

        let card = app.card("akismet").unwrap();
        assert_eq!(card.intent, Intent::Activate);
        assert_eq!(card.label, "Activate");
        assert!(!card.in_flight);
        assert_eq!(
            app.notifications.back().map(String::as_str),
            Some("nonce verification failed")
        );
    }

    #[test]
    fn outcome_for_unknown_slug_only_notifies() {
        let (mut app, _rx) =
            app_with(plugin_page("akismet"), StateStore::disabled("demo"), |_| (false, false));

        app.update(Msg::OpResponse(OpOutcome {
            action: OpAction::Install,
            slug: "someone-else".to_string(),
            success: true,
            plugin: None,
            message: "done".to_string(),
        }))
        .unwrap();

        let card = app.card("akismet").unwrap();
        assert_eq!(card.intent, Intent::Install);
    }
}
