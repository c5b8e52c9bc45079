use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use log::{info, warn};

use crate::app::{App, GenerateField, InputMode, Tab};
use crate::config::Config;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::ChatReply(result) => app.finish_chat(result),
        AppEvent::Generated(result) => app.finish_generate(result),
        AppEvent::Models(result) => app.apply_models(result),
        AppEvent::Version(result) => app.apply_version(result),
    }
}

/// Fetch the model list; the current model is kept if listed, else the first entry is shown.
pub fn load_model_info(app: &mut App) {
    app.begin_model_refresh();
    let client = app.client.clone();
    let tx = app.events.clone();
    tokio::spawn(async move {
        let _ = tx.send(AppEvent::Models(client.list_models().await));
    });
}

pub fn load_server_version(app: &App) {
    let client = app.client.clone();
    let tx = app.events.clone();
    tokio::spawn(async move {
        let _ = tx.send(AppEvent::Version(client.version().await));
    });
}

// Requests are not serialized: a second submit while one is pending starts
// another request, and replies are applied in arrival order.
fn send_chat(app: &mut App) {
    let Some(pending) = app.begin_chat() else {
        return;
    };
    let client = app.client.clone();
    let tx = app.events.clone();
    tokio::spawn(async move {
        let result = client.chat(&pending.model, &pending.messages).await;
        let _ = tx.send(AppEvent::ChatReply(result));
    });
}

fn generate_text(app: &mut App) {
    let Some(pending) = app.begin_generate() else {
        return;
    };
    let client = app.client.clone();
    let tx = app.events.clone();
    tokio::spawn(async move {
        let result = client
            .generate(&pending.model, &pending.prompt, pending.options)
            .await;
        let _ = tx.send(AppEvent::Generated(result));
    });
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => {
            if let Some(name) = app.select_model() {
                info!("Selected model {}", name);
                if let Some(path) = &app.config_path {
                    if let Err(e) = Config::save_default_model(path, &name) {
                        warn!("Could not save default model: {}", e);
                    }
                }
            }
        }
        KeyCode::Esc | KeyCode::Char('q') => app.show_model_picker = false,
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Tabs
        KeyCode::Tab | KeyCode::BackTab => app.switch_tab(app.tab.next()),
        KeyCode::Char('1') => app.switch_tab(Tab::Chat),
        KeyCode::Char('2') => app.switch_tab(Tab::Generate),

        // Editing
        KeyCode::Char('i') | KeyCode::Enter => {
            if app.tab == Tab::Generate {
                app.generate_focus = GenerateField::Prompt;
            }
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('n') if app.tab == Tab::Generate => {
            app.generate_focus = GenerateField::MaxTokens;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('g') if app.tab == Tab::Generate => generate_text(app),

        // Temperature slider
        KeyCode::Left | KeyCode::Char('-') if app.tab == Tab::Generate => app.temperature_down(),
        KeyCode::Right | KeyCode::Char('+') | KeyCode::Char('=') if app.tab == Tab::Generate => {
            app.temperature_up()
        }

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::PageDown => app.scroll_page_down(),
        KeyCode::PageUp => app.scroll_page_up(),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => app.scroll_page_down(),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => app.scroll_page_up(),

        // Models
        KeyCode::Char('M') => app.open_model_picker(),
        KeyCode::Char('r') => load_model_info(app),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let editing_max_tokens =
        app.tab == Tab::Generate && app.generate_focus == GenerateField::MaxTokens;

    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) && !editing_max_tokens => {
            app.active_input().insert('\n');
        }
        KeyCode::Enter => match app.tab {
            Tab::Chat => send_chat(app),
            Tab::Generate if editing_max_tokens => app.generate_focus = GenerateField::Prompt,
            Tab::Generate => generate_text(app),
        },
        KeyCode::Tab if app.tab == Tab::Generate => {
            app.generate_focus = match app.generate_focus {
                GenerateField::Prompt => GenerateField::MaxTokens,
                GenerateField::MaxTokens => GenerateField::Prompt,
            };
        }
        KeyCode::Backspace => app.active_input().backspace(),
        KeyCode::Delete => app.active_input().delete(),
        KeyCode::Left => app.active_input().left(),
        KeyCode::Right => app.active_input().right(),
        KeyCode::Home => app.active_input().home(),
        KeyCode::End => app.active_input().end(),
        KeyCode::Char(c) => {
            if !editing_max_tokens || c.is_ascii_digit() {
                app.active_input().insert(c);
            }
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_area(app.body_area, mouse.column, mouse.row) {
                app.scroll_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_area(app.body_area, mouse.column, mouse.row) {
                app.scroll_up();
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            let clicked = app
                .tab_areas
                .iter()
                .find(|(_, area)| in_area(Some(*area), mouse.column, mouse.row))
                .map(|(tab, _)| *tab);
            if let Some(tab) = clicked {
                app.switch_tab(tab);
            }
        }
        _ => {}
    }
}

fn in_area(area: Option<ratatui::layout::Rect>, x: u16, y: u16) -> bool {
    area.is_some_and(|a| x >= a.x && x < a.x + a.width && y >= a.y && y < a.y + a.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{test_app, test_settings};
    use crate::app::{ChatRole, GenerationOutput, TextInput};
    use crate::config::Settings;
    use crossterm::event::KeyEventState;
    use ratatui::layout::Rect;
    use tokio::sync::mpsc;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c)));
        }
    }

    /// App pointed at a port nobody listens on, with the event receiver kept.
    async fn offline_app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, rx) = mpsc::unbounded_channel();
        let settings = Settings {
            base_url: format!("http://{}", addr),
            ..test_settings()
        };
        (App::new(&settings, tx), rx)
    }

    #[test]
    fn test_number_keys_switch_tabs() {
        let mut app = test_app();
        handle_event(&mut app, key(KeyCode::Char('2')));
        assert_eq!(app.tab, Tab::Generate);
        handle_event(&mut app, key(KeyCode::Tab));
        assert_eq!(app.tab, Tab::Chat);
    }

    #[test]
    fn test_resize_leaves_state_untouched() {
        let mut app = test_app();
        app.switch_tab(Tab::Generate);
        app.chat_scroll = 3;
        handle_event(&mut app, AppEvent::Resize);
        assert_eq!(app.tab, Tab::Generate);
        assert_eq!(app.chat_scroll, 3);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_click_on_tab_label_switches_tab() {
        let mut app = test_app();
        app.tab_areas = vec![(Tab::Chat, Rect::new(0, 1, 8, 1)), (Tab::Generate, Rect::new(8, 1, 12, 1))];

        handle_event(
            &mut app,
            AppEvent::Mouse(MouseEvent {
                kind: MouseEventKind::Down(MouseButton::Left),
                column: 10,
                row: 1,
                modifiers: KeyModifiers::NONE,
            }),
        );
        assert_eq!(app.tab, Tab::Generate);
    }

    #[test]
    fn test_arrow_keys_move_temperature_on_generate_tab() {
        let mut app = test_app();
        handle_event(&mut app, key(KeyCode::Right));
        assert_eq!(app.temperature_label(), "0.7");

        app.switch_tab(Tab::Generate);
        handle_event(&mut app, key(KeyCode::Right));
        handle_event(&mut app, key(KeyCode::Right));
        assert_eq!(app.temperature_label(), "0.9");
        handle_event(&mut app, key(KeyCode::Char('-')));
        assert_eq!(app.temperature_label(), "0.8");
    }

    #[test]
    fn test_max_tokens_field_accepts_digits_only() {
        let mut app = test_app();
        app.switch_tab(Tab::Generate);
        app.max_tokens_input = TextInput::default();
        handle_event(&mut app, key(KeyCode::Char('n')));
        assert_eq!(app.input_mode, InputMode::Editing);

        type_text(&mut app, "2x56");
        assert_eq!(app.max_tokens_input.value(), "256");
        assert_eq!(app.prompt_input.value(), "");
    }

    #[test]
    fn test_shift_enter_inserts_newline() {
        let mut app = test_app();
        handle_event(&mut app, key(KeyCode::Char('i')));
        type_text(&mut app, "a");
        handle_event(&mut app, AppEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT)));
        type_text(&mut app, "b");
        assert_eq!(app.chat_input.value(), "a\nb");
        assert!(app.chat_messages.is_empty());
    }

    #[tokio::test]
    async fn test_enter_on_empty_chat_sends_nothing() {
        let (mut app, mut rx) = offline_app().await;
        handle_event(&mut app, key(KeyCode::Char('i')));
        type_text(&mut app, "  ");
        handle_event(&mut app, key(KeyCode::Enter));

        assert!(app.chat_messages.is_empty());
        assert!(!app.is_loading());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_chat_reports_through_event_channel() {
        let (mut app, mut rx) = offline_app().await;
        handle_event(&mut app, key(KeyCode::Char('i')));
        type_text(&mut app, "hello");
        handle_event(&mut app, key(KeyCode::Enter));

        assert_eq!(app.chat_messages.len(), 1);
        assert!(app.is_loading());

        let reply = rx.recv().await.unwrap();
        assert!(matches!(reply, AppEvent::ChatReply(Err(_))));
        handle_event(&mut app, reply);

        let roles: Vec<ChatRole> = app.chat_messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::System]);
        assert!(app.chat_messages[1].content.starts_with("Error: "));
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn test_failed_generate_reports_through_event_channel() {
        let (mut app, mut rx) = offline_app().await;
        app.switch_tab(Tab::Generate);
        handle_event(&mut app, key(KeyCode::Char('i')));
        type_text(&mut app, "story");
        handle_event(&mut app, key(KeyCode::Enter));
        assert!(app.is_loading());

        let reply = rx.recv().await.unwrap();
        handle_event(&mut app, reply);

        assert!(matches!(app.generation, GenerationOutput::Error(_)));
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn test_model_refresh_failure() {
        let (mut app, mut rx) = offline_app().await;
        load_model_info(&mut app);
        assert_eq!(app.model_name_label(), "Loading...");

        let reply = rx.recv().await.unwrap();
        handle_event(&mut app, reply);
        assert_eq!(app.model_name_label(), "Error loading model info");
    }

    #[test]
    fn test_model_picker_swallows_keys() {
        let mut app = test_app();
        app.apply_models(Ok(vec![crate::ollama::ModelDescriptor {
            name: "llama3".to_string(),
            size: 0,
        }]));
        handle_event(&mut app, key(KeyCode::Char('M')));
        assert!(app.show_model_picker);

        handle_event(&mut app, key(KeyCode::Char('2')));
        assert_eq!(app.tab, Tab::Chat);

        handle_event(&mut app, key(KeyCode::Esc));
        assert!(!app.show_model_picker);
    }

    #[test]
    fn test_ctrl_c_quits_while_editing() {
        let mut app = test_app();
        handle_event(&mut app, key(KeyCode::Char('i')));
        handle_event(
            &mut app,
            AppEvent::Key(KeyEvent {
                code: KeyCode::Char('c'),
                modifiers: KeyModifiers::CONTROL,
                kind: crossterm::event::KeyEventKind::Press,
                state: KeyEventState::NONE,
            }),
        );
        assert!(app.should_quit);
    }
}
