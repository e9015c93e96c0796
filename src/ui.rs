pub mod charting;
pub mod keyboard;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::classifier::classify;
use crate::profile::snippet;
use crate::session::{Snapshot, State};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Everything one frame needs: the engine snapshot plus screen-local state.
pub struct View<'a> {
    pub snapshot: Snapshot<'a>,
    pub cursor: usize,
    pub status: Option<&'a str>,
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

fn italic() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

impl Widget for &View<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(area);

        match self.snapshot.state {
            State::Menu => render_menu(&self.snapshot, chunks[0], buf),
            State::ParagraphSelect => {
                let rows = self
                    .snapshot
                    .passages
                    .iter()
                    .enumerate()
                    .map(|(i, p)| format!("{}. {}", i + 1, snippet(p.text())))
                    .collect::<Vec<_>>();
                render_list("Select Paragraph", &rows, self.cursor, None, chunks[0], buf);
            }
            State::UserSelect => {
                let rows = self
                    .snapshot
                    .users
                    .iter()
                    .map(|u| u.to_string())
                    .collect::<Vec<_>>();
                render_list(
                    "Select User",
                    &rows,
                    self.cursor,
                    Some("No users found. Press (n) to create one!"),
                    chunks[0],
                    buf,
                );
            }
            State::CreateUser => render_create_user(&self.snapshot, chunks[0], buf),
            State::Countdown => render_countdown(&self.snapshot, chunks[0], buf),
            State::Typing => render_typing(&self.snapshot, chunks[0], buf),
            State::Results => render_results(&self.snapshot, chunks[0], buf),
        }

        if let Some(status) = self.status {
            Paragraph::new(Span::styled(
                status.to_string(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            ))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
        }
    }
}

fn render_menu(snap: &Snapshot, area: Rect, buf: &mut Buffer) {
    let user_line = match (snap.current_user, snap.profile) {
        (Some(name), Some(profile)) => format!(
            "User: {}   High: {} wpm   Low: {}",
            name,
            profile.high_wpm.round(),
            profile.low_wpm_label()
        ),
        _ => "Playing as guest (results are not saved)".to_string(),
    };

    let lines = vec![
        Line::from(Span::styled(
            "Typing Speed Master",
            bold().fg(Color::Cyan),
        )),
        Line::default(),
        Line::from(user_line),
        Line::default(),
        Line::from(Span::styled(
            format!(
                "Passage {}: {}",
                snap.selected_passage + 1,
                snippet(snap.passage.text())
            ),
            italic(),
        )),
        Line::default(),
        Line::from(Span::styled(
            "(s)tart / (p)aragraphs / (u)sers / (q)uit",
            dim_bold(),
        )),
    ];

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(centered(area, 7), buf);
}

fn render_list(
    title: &str,
    rows: &[String],
    cursor: usize,
    empty: Option<&str>,
    area: Rect,
    buf: &mut Buffer,
) {
    let mut lines = vec![
        Line::from(Span::styled(title.to_string(), bold().fg(Color::Cyan))),
        Line::default(),
    ];

    if rows.is_empty() {
        if let Some(msg) = empty {
            lines.push(Line::from(Span::styled(msg.to_string(), italic())));
        }
    }

    // keep the cursor row on screen
    let visible = area.height.saturating_sub(4).max(1) as usize;
    let skip = cursor.saturating_sub(visible - 1);
    for (i, row) in rows.iter().enumerate().skip(skip).take(visible) {
        let line = if i == cursor {
            Line::from(Span::styled(format!("> {row}"), bold().fg(Color::Magenta)))
        } else {
            Line::from(Span::raw(format!("  {row}")))
        };
        lines.push(line);
    }

    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        if title == "Select User" {
            "(enter) select / (n)ew user / (b)ack"
        } else {
            "(enter) select / (b)ack"
        },
        dim_bold(),
    )));

    Paragraph::new(lines).render(area, buf);
}

fn render_create_user(snap: &Snapshot, area: Rect, buf: &mut Buffer) {
    let lines = vec![
        Line::from(Span::styled("Create New User", bold().fg(Color::Cyan))),
        Line::default(),
        Line::from(vec![
            Span::raw("Username: "),
            Span::styled(snap.name_draft.to_string(), bold()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
        Line::default(),
        Line::from(Span::styled("(enter) create / (esc) back", dim_bold())),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(centered(area, 5), buf);
}

fn render_countdown(snap: &Snapshot, area: Rect, buf: &mut Buffer) {
    let label = snap.countdown.max(1).to_string();
    Paragraph::new(vec![
        Line::from(Span::styled("Get ready", italic())),
        Line::from(Span::styled(label, bold().fg(Color::Yellow))),
    ])
    .alignment(Alignment::Center)
    .render(centered(area, 2), buf);
}

/// Passage spans colored by positional outcome, followed by any overflow.
pub fn passage_spans(snap: &Snapshot) -> Vec<Span<'static>> {
    let passage = snap.passage.chars();
    let green = bold().fg(Color::Green);
    let red = bold().fg(Color::Red);

    let mut spans: Vec<Span> = snap
        .input
        .iter()
        .enumerate()
        .map(|(idx, &typed)| {
            if classify(typed, idx, passage).is_error() {
                let shown = match typed {
                    ' ' => '·',
                    c => c,
                };
                Span::styled(shown.to_string(), red)
            } else {
                Span::styled(typed.to_string(), green)
            }
        })
        .collect();

    let typed = snap.input.len();
    if typed < passage.len() {
        spans.push(Span::styled(
            passage[typed].to_string(),
            dim_bold().add_modifier(Modifier::UNDERLINED),
        ));
        spans.push(Span::styled(
            passage[typed + 1..].iter().collect::<String>(),
            dim_bold(),
        ));
    }
    spans
}

fn render_typing(snap: &Snapshot, area: Rect, buf: &mut Buffer) {
    let max_chars_per_line = area.width.max(1) as usize;
    let prompt_lines = (snap.passage.text().width() / max_chars_per_line + 1) as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(prompt_lines + 1),
            Constraint::Length(1),
            Constraint::Min(5),
        ])
        .split(area);

    let stats = format!(
        "{:.0} wpm   {:.1}% acc   {:.1}s   {} errors",
        snap.live.wpm,
        snap.live.accuracy,
        snap.live.elapsed_secs(),
        snap.live.errors
    );
    Paragraph::new(Span::styled(stats, dim_bold()))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    Paragraph::new(Line::from(passage_spans(snap)))
        .alignment(if prompt_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: false })
        .render(chunks[2], buf);

    Paragraph::new(Span::styled("(enter) submit / (esc) abandon", italic()))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    Paragraph::new(keyboard::keyboard_lines(&snap.heatmap))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);
}

fn render_results(snap: &Snapshot, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // stats
            Constraint::Length(1), // breakdown
            Constraint::Length(1), // saved note
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let coords = snap.history.coords();
    let (overall_duration, highest_wpm) = charting::compute_chart_params(&coords);
    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(Style::default().fg(Color::Magenta))
        .graph_type(GraphType::Line)
        .data(&coords)];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("seconds")
                .bounds([0.0, overall_duration])
                .labels(vec![
                    Span::styled("0", bold()),
                    Span::styled(charting::format_label(overall_duration), bold()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", bold()),
                    Span::styled(charting::format_label(highest_wpm), bold()),
                ]),
        )
        .render(chunks[0], buf);

    let Some(done) = snap.completion else {
        return;
    };

    Paragraph::new(Span::styled(
        format!(
            "{:.0} wpm   {:.1}% acc   {:.1}s   {} errors   {:.2} sd",
            done.metrics.wpm,
            done.metrics.accuracy,
            done.metrics.elapsed_secs(),
            done.metrics.errors,
            done.consistency
        ),
        bold(),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        format!(
            "substitutions {}   insertions {}   omissions {}",
            done.breakdown.substitutions, done.breakdown.insertions, done.breakdown.omissions
        ),
        Style::default().fg(Color::Cyan),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let saved = match (done.recorded, done.saved, snap.current_user) {
        (true, true, Some(user)) => format!("saved to {user}'s history"),
        (true, false, Some(user)) => format!("added to {user}'s history, but writing it failed"),
        _ => "guest session, not saved".to_string(),
    };
    Paragraph::new(Span::styled(saved, italic()))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    Paragraph::new(Span::styled("(r)estart / (b)ack / (q)uit", italic()))
        .render(chunks[5], buf);
}

/// A band of `height` rows vertically centered in `area`.
fn centered(area: Rect, height: u16) -> Rect {
    let height = height.min(area.height);
    Rect {
        y: area.y + (area.height - height) / 2,
        height,
        ..area
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PassageCatalog;
    use crate::profile::{MemoryProfileBackend, UserProfileStore};
    use crate::session::{Intent, Keystroke, SessionMachine};

    fn machine() -> SessionMachine<MemoryProfileBackend> {
        SessionMachine::new(
            PassageCatalog::parse("hello world\nsecond passage").unwrap(),
            UserProfileStore::open(MemoryProfileBackend::new()),
        )
    }

    fn render(m: &SessionMachine<MemoryProfileBackend>, status: Option<&str>) -> String {
        let view = View {
            snapshot: m.snapshot(),
            cursor: 0,
            status,
        };
        let area = Rect::new(0, 0, 100, 30);
        let mut buffer = Buffer::empty(area);
        (&view).render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn menu_shows_guest_and_passage() {
        let m = machine();
        let out = render(&m, None);
        assert!(out.contains("Typing Speed Master"));
        assert!(out.contains("guest"));
        assert!(out.contains("hello world"));
    }

    #[test]
    fn status_line_is_rendered() {
        let m = machine();
        let out = render(&m, Some("user 'x' not found"));
        assert!(out.contains("user 'x' not found"));
    }

    #[test]
    fn empty_user_list_hint() {
        let mut m = machine();
        m.dispatch(Intent::OpenUserSelect, 0).unwrap();
        assert!(render(&m, None).contains("No users found"));
    }

    #[test]
    fn typing_and_results_render() {
        let mut m = machine();
        m.dispatch(Intent::StartSession, 0).unwrap();
        m.tick(3000);
        for c in "hellx".chars() {
            m.dispatch(Intent::Key(Keystroke::Char(c)), 3100).unwrap();
        }
        m.tick(4500);
        let out = render(&m, None);
        assert!(out.contains("errors"));
        assert!(out.contains("space"));

        m.dispatch(Intent::Key(Keystroke::Submit), 6000).unwrap();
        let out = render(&m, None);
        assert!(out.contains("substitutions 1"));
        assert!(out.contains("omissions 6"));
        assert!(out.contains("not saved"));
    }

    #[test]
    fn results_report_a_failed_save() {
        let mut m = machine();
        m.create_user("ann").unwrap();
        m.store_mut().backend_mut().fail_writes = true;
        m.dispatch(Intent::StartSession, 0).unwrap();
        m.tick(3000);
        for c in "hello".chars() {
            m.dispatch(Intent::Key(Keystroke::Char(c)), 3100).unwrap();
        }
        assert!(m.dispatch(Intent::Key(Keystroke::Submit), 6000).is_err());

        let out = render(&m, None);
        assert!(out.contains("writing it failed"));
        assert!(!out.contains("saved to ann"));
    }

    #[test]
    fn passage_spans_mark_errors() {
        let mut m = machine();
        m.dispatch(Intent::StartSession, 0).unwrap();
        m.tick(3000);
        for c in "hx".chars() {
            m.dispatch(Intent::Key(Keystroke::Char(c)), 3100).unwrap();
        }
        let snap = m.snapshot();
        let spans = passage_spans(&snap);
        assert_eq!(spans[0].style.fg, Some(Color::Green));
        assert_eq!(spans[1].style.fg, Some(Color::Red));
        assert_eq!(spans[2].content, "l");
        assert!(spans[2].style.add_modifier.contains(Modifier::UNDERLINED));
    }
}
