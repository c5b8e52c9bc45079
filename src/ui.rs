use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
};
use crate::app::{
    App, ChatRole, GenerateField, GenerationOutput, InputMode, Tab, TextInput,
    TEMPERATURE_MAX_STEPS,
};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, tab bar, body, footer
    let [header_area, tabs_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    app.body_area = Some(body_area);

    render_header(app, frame, header_area);
    render_tabs(app, frame, tabs_area);

    match app.tab {
        Tab::Chat => render_chat_screen(app, frame, body_area),
        Tab::Generate => render_generate_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    } else if app.is_loading() {
        render_loading_overlay(app, frame, body_area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" Ollama Panel ", Style::default().fg(Color::Cyan).bold()),
        Span::styled("Model: ", Style::default().fg(Color::White)),
        Span::styled(
            app.model_name_label().to_string(),
            Style::default().fg(Color::Yellow).bold(),
        ),
    ];
    if let Some(size) = app.model_size_label() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(size, Style::default().fg(Color::Gray)));
    }
    if let Some(version) = &app.server_version {
        spans.push(Span::styled(
            format!("  server {}", version),
            Style::default().fg(Color::Gray),
        ));
    }
    spans.push(Span::styled(
        format!("  {}", app.client.base_url()),
        Style::default().fg(Color::Gray),
    ));

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_tabs(app: &mut App, frame: &mut Frame, area: Rect) {
    let mut spans = Vec::new();
    let mut tab_areas = Vec::new();
    let mut x = area.x;

    for (i, tab) in Tab::ALL.iter().enumerate() {
        let label = format!(" {} {} ", i + 1, tab.title());
        let width = label.chars().count() as u16;
        let style = if app.is_active(*tab) {
            Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };

        let clipped = width.min((area.x + area.width).saturating_sub(x));
        tab_areas.push((*tab, Rect::new(x, area.y, clipped, 1)));
        x = x.saturating_add(width + 1);

        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
    }

    app.tab_areas = tab_areas;
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = if app.show_model_picker {
        vec![("j/k", "nav"), ("Enter", "select"), ("Esc", "cancel")]
    } else {
        match (app.tab, app.input_mode) {
            (Tab::Chat, InputMode::Normal) => vec![
                ("i", "type"),
                ("j/k", "scroll"),
                ("Tab", "switch"),
                ("M", "model"),
                ("r", "refresh"),
                ("q", "quit"),
            ],
            (Tab::Generate, InputMode::Normal) => vec![
                ("i", "prompt"),
                ("n", "max tokens"),
                ("←/→", "temperature"),
                ("g", "generate"),
                ("Tab", "switch"),
                ("M", "model"),
                ("q", "quit"),
            ],
            (Tab::Chat, InputMode::Editing) => vec![
                ("Enter", "send"),
                ("S-Enter", "newline"),
                ("Esc", "stop typing"),
            ],
            (Tab::Generate, InputMode::Editing) => vec![
                ("Enter", "generate"),
                ("Tab", "field"),
                ("Esc", "stop typing"),
            ],
        }
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    for (key, label) in pairs {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Chat: {} ", app.request_model()));

    let chat_text = if app.chat_messages.is_empty() {
        Text::from(Span::styled(
            "Send a message to start chatting...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &app.chat_messages {
            let (label, color) = match msg.role {
                ChatRole::User => ("You:", Color::Cyan),
                ChatRole::Assistant => ("AI:", Color::Yellow),
                ChatRole::System => ("System:", Color::Red),
            };
            lines.push(Line::from(Span::styled(
                label,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));
            match msg.role {
                ChatRole::Assistant => {
                    lines.extend(msg.content.lines().map(parse_markdown_line));
                }
                ChatRole::System => {
                    lines.push(Line::from(Span::styled(
                        msg.content.clone(),
                        Style::default().fg(Color::Red),
                    )));
                }
                ChatRole::User => {
                    lines.extend(msg.content.lines().map(|l| Line::from(l.to_string())));
                }
            }
            lines.push(Line::default());
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    let editing = app.input_mode == InputMode::Editing;
    render_input(frame, input_area, &app.chat_input, " Message ", editing);
}

fn render_generate_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [prompt_area, controls_area, output_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let editing = app.input_mode == InputMode::Editing;
    render_input(
        frame,
        prompt_area,
        &app.prompt_input,
        " Prompt ",
        editing && app.generate_focus == GenerateField::Prompt,
    );

    let [temperature_area, max_tokens_area] = Layout::horizontal([
        Constraint::Percentage(60),
        Constraint::Percentage(40),
    ])
    .areas(controls_area);

    let temperature = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Temperature (←/→) "),
        )
        .gauge_style(Style::default().fg(Color::Magenta).bg(Color::Black))
        .ratio(app.temperature_steps as f64 / TEMPERATURE_MAX_STEPS as f64)
        .label(app.temperature_label());
    frame.render_widget(temperature, temperature_area);

    render_input(
        frame,
        max_tokens_area,
        &app.max_tokens_input,
        " Max tokens ",
        editing && app.generate_focus == GenerateField::MaxTokens,
    );

    let output_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Output: {} ", app.request_model()));

    let output_text = match &app.generation {
        GenerationOutput::Empty => Text::from(Span::styled(
            "Generated text will appear here...",
            Style::default().fg(Color::DarkGray),
        )),
        GenerationOutput::Text(text) => Text::from(text.clone()),
        GenerationOutput::Error(message) => Text::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::ITALIC),
        )),
    };

    let output = Paragraph::new(output_text)
        .block(output_block)
        .wrap(Wrap { trim: false })
        .scroll((app.output_scroll, 0));
    frame.render_widget(output, output_area);
}

fn render_input(frame: &mut Frame, area: Rect, input: &TextInput, title: &str, editing: bool) {
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title.to_string());

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor();

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Newlines are shown as a single glyph so the cursor column stays aligned
    let visible_text: String = input
        .value()
        .chars()
        .map(|c| if c == '\n' { '↵' } else { c })
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn render_loading_overlay(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(24, 3, area);
    frame.render_widget(Clear, popup_area);

    // Animated ellipsis: cycles through ".", "..", "..."
    let dots = ".".repeat((app.animation_frame as usize) + 1);
    let pending = if app.in_flight > 1 {
        format!(" ({})", app.in_flight)
    } else {
        String::new()
    };

    let overlay = Paragraph::new(Line::from(Span::styled(
        format!("Thinking{}{}", dots, pending),
        Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    frame.render_widget(overlay, popup_area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_height = (app.available_models.len() as u16).saturating_add(2);
    let popup_area = centered_rect(50, popup_height, area);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let current = app.request_model();
    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model.name == current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} {} ", model.name, model.size_label())).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}
