use std::path::PathBuf;

use log::warn;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::Settings;
use crate::ollama::{ApiResult, GenerateOptions, ModelDescriptor, OllamaClient};
use crate::tui::AppEvent;

pub const TEMPERATURE_MAX_STEPS: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Chat,
    Generate,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Chat, Tab::Generate];

    /// Stable identifier of the tab's pane.
    pub fn id(&self) -> &'static str {
        match self {
            Tab::Chat => "chat",
            Tab::Generate => "generate",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Chat => "Chat",
            Tab::Generate => "Generate",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Tab::Chat => Tab::Generate,
            Tab::Generate => Tab::Chat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerateField {
    #[default]
    Prompt,
    MaxTokens,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelInfo {
    Loading,
    Loaded(ModelDescriptor),
    NoModels,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GenerationOutput {
    #[default]
    Empty,
    Text(String),
    Error(String),
}

/// A chat request ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChat {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// A generate request ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingGenerate {
    pub model: String,
    pub prompt: String,
    pub options: GenerateOptions,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line text field with a character cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    pub fn with_value(value: &str) -> Self {
        Self {
            value: value.to_string(),
            cursor: value.chars().count(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub tab: Tab,
    pub input_mode: InputMode,

    // Chat tab
    pub chat_input: TextInput,
    pub chat_messages: Vec<ChatMessage>,
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub send_history: bool,

    // Generate tab
    pub generate_focus: GenerateField,
    pub prompt_input: TextInput,
    pub max_tokens_input: TextInput,
    pub temperature_steps: u8,
    pub generation: GenerationOutput,
    pub output_scroll: u16,

    // Model metadata
    pub model_info: ModelInfo,
    pub available_models: Vec<ModelDescriptor>,
    pub server_version: Option<String>,
    pub fallback_model: String,
    pub show_model_picker: bool,
    pub model_picker_state: ListState,

    // Loading indicator
    pub in_flight: usize,
    pub animation_frame: u8,

    // Areas for mouse hit-testing (updated during render)
    pub tab_areas: Vec<(Tab, Rect)>,
    pub body_area: Option<Rect>,

    /// Where a model picked in the UI is remembered; `None` disables saving.
    pub config_path: Option<PathBuf>,
    pub client: OllamaClient,
    pub events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(settings: &Settings, events: UnboundedSender<AppEvent>) -> Self {
        let temperature_steps = (settings.temperature * 10.0)
            .round()
            .clamp(0.0, TEMPERATURE_MAX_STEPS as f32) as u8;

        Self {
            should_quit: false,
            tab: Tab::Chat,
            input_mode: InputMode::Normal,

            chat_input: TextInput::default(),
            chat_messages: Vec::new(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            send_history: settings.send_history,

            generate_focus: GenerateField::default(),
            prompt_input: TextInput::default(),
            max_tokens_input: TextInput::with_value(&settings.max_tokens.to_string()),
            temperature_steps,
            generation: GenerationOutput::Empty,
            output_scroll: 0,

            model_info: ModelInfo::Loading,
            available_models: Vec::new(),
            server_version: None,
            fallback_model: settings.model.clone(),
            show_model_picker: false,
            model_picker_state: ListState::default(),

            in_flight: 0,
            animation_frame: 0,

            tab_areas: Vec::new(),
            body_area: None,

            config_path: None,
            client: OllamaClient::new(&settings.base_url),
            events,
        }
    }

    // Tabs

    /// Activate the pane matching `tab`; every other pane becomes inactive.
    pub fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.input_mode = InputMode::Normal;
    }

    pub fn switch_tab_by_id(&mut self, id: &str) -> bool {
        match Tab::from_id(id) {
            Some(tab) => {
                self.switch_tab(tab);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, tab: Tab) -> bool {
        self.tab == tab
    }

    // Temperature slider

    pub fn temperature(&self) -> f32 {
        self.temperature_steps as f32 / 10.0
    }

    pub fn temperature_label(&self) -> String {
        format!("{:.1}", self.temperature())
    }

    pub fn temperature_up(&mut self) {
        self.temperature_steps = (self.temperature_steps + 1).min(TEMPERATURE_MAX_STEPS);
    }

    pub fn temperature_down(&mut self) {
        self.temperature_steps = self.temperature_steps.saturating_sub(1);
    }

    // Loading indicator

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    fn start_loading(&mut self) {
        self.in_flight += 1;
    }

    fn stop_loading(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight == 0 {
            self.animation_frame = 0;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Model info

    /// Model name sent with requests: the displayed model, or the configured default.
    pub fn request_model(&self) -> String {
        match &self.model_info {
            ModelInfo::Loaded(model) => model.name.clone(),
            _ => self.fallback_model.clone(),
        }
    }

    pub fn model_name_label(&self) -> &str {
        match &self.model_info {
            ModelInfo::Loading => "Loading...",
            ModelInfo::Loaded(model) => &model.name,
            ModelInfo::NoModels => "No models available",
            ModelInfo::Failed => "Error loading model info",
        }
    }

    pub fn model_size_label(&self) -> Option<String> {
        match &self.model_info {
            ModelInfo::Loaded(model) => Some(model.size_label()),
            _ => None,
        }
    }

    pub fn begin_model_refresh(&mut self) {
        self.model_info = ModelInfo::Loading;
    }

    pub fn apply_models(&mut self, result: ApiResult<Vec<ModelDescriptor>>) {
        match result {
            Ok(models) => {
                // The configured or picked model wins when the server has it.
                let preferred = models
                    .iter()
                    .find(|m| m.name == self.fallback_model)
                    .or_else(|| models.first());
                self.model_info = match preferred {
                    Some(model) => ModelInfo::Loaded(model.clone()),
                    None => ModelInfo::NoModels,
                };
                self.available_models = models;
            }
            Err(e) => {
                warn!("Error loading model info: {}", e);
                self.model_info = ModelInfo::Failed;
                self.available_models.clear();
            }
        }
    }

    pub fn apply_version(&mut self, result: ApiResult<String>) {
        match result {
            Ok(version) => self.server_version = Some(version),
            Err(e) => warn!("Could not read server version: {}", e),
        }
    }

    // Model picker

    pub fn open_model_picker(&mut self) {
        if self.available_models.is_empty() {
            return;
        }
        let current = self.request_model();
        let selected = self
            .available_models
            .iter()
            .position(|m| m.name == current)
            .unwrap_or(0);
        self.model_picker_state.select(Some(selected));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len == 0 {
            return;
        }
        let i = self.model_picker_state.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.model_picker_state.select(Some(i));
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.model_picker_state.select(Some(i));
    }

    /// Make the highlighted model current. Returns its name.
    pub fn select_model(&mut self) -> Option<String> {
        let model = self
            .model_picker_state
            .selected()
            .and_then(|i| self.available_models.get(i))
            .cloned()?;
        self.show_model_picker = false;
        let name = model.name.clone();
        self.fallback_model = name.clone();
        self.model_info = ModelInfo::Loaded(model);
        Some(name)
    }

    // Chat

    fn push_chat(&mut self, role: ChatRole, content: String) {
        self.chat_messages.push(ChatMessage { role, content });
        self.scroll_chat_to_bottom();
    }

    /// Validate the chat input and record the user's message.
    ///
    /// Returns `None` without touching any state when the trimmed input is empty.
    pub fn begin_chat(&mut self) -> Option<PendingChat> {
        let message = self.chat_input.value().trim().to_string();
        if message.is_empty() {
            return None;
        }

        self.push_chat(ChatRole::User, message.clone());
        self.chat_input.clear();
        self.start_loading();

        let messages = if self.send_history {
            self.chat_messages
                .iter()
                .filter(|m| m.role != ChatRole::System)
                .cloned()
                .collect()
        } else {
            vec![ChatMessage {
                role: ChatRole::User,
                content: message,
            }]
        };

        Some(PendingChat {
            model: self.request_model(),
            messages,
        })
    }

    pub fn finish_chat(&mut self, result: ApiResult<String>) {
        match result {
            Ok(content) => self.push_chat(ChatRole::Assistant, content),
            Err(e) => {
                warn!("Error sending chat message: {}", e);
                self.push_chat(ChatRole::System, format!("Error: {}", e));
            }
        }
        self.stop_loading();
    }

    /// Scroll chat to bottom so the newest entry is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in &self.chat_messages {
            total_lines = total_lines.saturating_add(1); // Role line
            for line in msg.content.lines() {
                let char_count = line.chars().count();
                let wrapped = if char_count == 0 { 1 } else { char_count.div_ceil(wrap_width) };
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    // Generate

    /// Validate the prompt, clear the previous output and build the request.
    ///
    /// Returns `None` without touching any state when the trimmed prompt is empty.
    pub fn begin_generate(&mut self) -> Option<PendingGenerate> {
        let prompt = self.prompt_input.value().trim().to_string();
        if prompt.is_empty() {
            return None;
        }

        self.start_loading();
        self.generation = GenerationOutput::Empty;
        self.output_scroll = 0;

        Some(PendingGenerate {
            model: self.request_model(),
            prompt,
            options: GenerateOptions {
                temperature: self.temperature(),
                num_predict: self.max_tokens_input.value().trim().parse().ok(),
            },
        })
    }

    pub fn finish_generate(&mut self, result: ApiResult<String>) {
        self.generation = match result {
            Ok(text) => GenerationOutput::Text(text),
            Err(e) => {
                warn!("Error generating text: {}", e);
                GenerationOutput::Error(format!("Error: {}", e))
            }
        };
        self.stop_loading();
    }

    // Focused text field for the current tab
    pub fn active_input(&mut self) -> &mut TextInput {
        match (self.tab, self.generate_focus) {
            (Tab::Chat, _) => &mut self.chat_input,
            (Tab::Generate, GenerateField::Prompt) => &mut self.prompt_input,
            (Tab::Generate, GenerateField::MaxTokens) => &mut self.max_tokens_input,
        }
    }

    pub fn scroll_down(&mut self) {
        match self.tab {
            Tab::Chat => self.chat_scroll = self.chat_scroll.saturating_add(1),
            Tab::Generate => self.output_scroll = self.output_scroll.saturating_add(1),
        }
    }

    pub fn scroll_up(&mut self) {
        match self.tab {
            Tab::Chat => self.chat_scroll = self.chat_scroll.saturating_sub(1),
            Tab::Generate => self.output_scroll = self.output_scroll.saturating_sub(1),
        }
    }

    pub fn scroll_page_down(&mut self) {
        let page = self.chat_height.max(1) / 2;
        for _ in 0..page.max(1) {
            self.scroll_down();
        }
    }

    pub fn scroll_page_up(&mut self) {
        let page = self.chat_height.max(1) / 2;
        for _ in 0..page.max(1) {
            self.scroll_up();
        }
    }
}
