use anyhow::{Context, Result};
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use log::{info, warn};
use opener::open;
use pet_nudge::character::{Glyph, GlyphRole, PetCharacter};
use pet_nudge::clock::SystemClock;
use pet_nudge::config::{Preferences, ensure_sample_preferences};
use pet_nudge::engine::{EngineConfig, EngineEvent, SchedulerEngine};
use pet_nudge::indicator::{IndicatorCommand, VisualStateMachine, spawn_indicator_driver};
use pet_nudge::notification::default_dispatcher;
use pet_nudge::paths::{default_preferences_path, default_reminders_path};
use pet_nudge::reminder::ReminderId;
use pet_nudge::store::FileReminderStore;
use std::sync::Arc;
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use tokio::sync::mpsc::UnboundedSender;
use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

#[derive(Debug, Clone)]
enum UserEvent {
    Menu(MenuEvent),
    Hotkey(GlobalHotKeyEvent),
    Glyph(Glyph),
    Fired {
        reminder_id: ReminderId,
        title: String,
    },
    Status(String),
}

struct AppState {
    engine: Arc<SchedulerEngine>,
    indicator_tx: UnboundedSender<IndicatorCommand>,
    character: PetCharacter,
    last_fired: Option<(ReminderId, String)>,
}

impl AppState {
    fn send(&self, cmd: IndicatorCommand) {
        let _ = self.indicator_tx.send(cmd);
    }
}

fn main() -> Result<()> {
    let preferences_path = default_preferences_path();
    if let Err(err) = ensure_sample_preferences(&preferences_path) {
        eprintln!("could not write sample preferences: {err:#}");
    }
    let preferences = Preferences::load(&preferences_path)?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&preferences.log_level),
    )
    .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let reminders_path = default_reminders_path();
    let store = FileReminderStore::open(&reminders_path)
        .with_context(|| format!("failed to open reminders {}", reminders_path.display()))?;

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    let proxy = event_loop.create_proxy();

    let proxy_for_menu = proxy.clone();
    MenuEvent::set_event_handler(Some(move |event| {
        let _ = proxy_for_menu.send_event(UserEvent::Menu(event));
    }));

    let (engine_tx, mut engine_rx) = tokio::sync::mpsc::unbounded_channel::<EngineEvent>();
    let engine = Arc::new(SchedulerEngine::new(
        Arc::new(store),
        Arc::new(SystemClock),
        default_dispatcher(),
        EngineConfig::from(&preferences),
        Some(engine_tx),
    ));

    let (indicator_event_tx, indicator_event_rx) = tokio::sync::mpsc::unbounded_channel();
    let (indicator_tx, indicator_command_rx) = tokio::sync::mpsc::unbounded_channel();
    {
        let _guard = runtime.enter();
        let proxy_for_glyph = proxy.clone();
        spawn_indicator_driver(
            VisualStateMachine::new(preferences.character, preferences.animation_enabled),
            indicator_event_rx,
            indicator_command_rx,
            move |glyph| {
                let _ = proxy_for_glyph.send_event(UserEvent::Glyph(glyph));
            },
        );

        let proxy_for_engine = proxy.clone();
        runtime.spawn(async move {
            while let Some(event) = engine_rx.recv().await {
                forward_engine_event(&proxy_for_engine, &event);
                if indicator_event_tx.send(event).is_err() {
                    break;
                }
            }
        });
    }

    let mut app = AppState {
        engine,
        indicator_tx,
        character: preferences.character,
        last_fired: None,
    };

    let hotkey_manager = match GlobalHotKeyManager::new() {
        Ok(manager) => Some(manager),
        Err(err) => {
            warn!("global hotkey init failed: {err}");
            None
        }
    };
    let mut hotkey_id = None;
    if let Some(manager) = hotkey_manager.as_ref() {
        let snooze_hotkey = HotKey::new(Some(Modifiers::ALT), Code::KeyZ);
        let id = snooze_hotkey.id();
        match manager.register(snooze_hotkey) {
            Ok(()) => hotkey_id = Some(id),
            Err(err) => warn!("failed to register hotkey Option+Z: {err}"),
        }
    }
    let proxy_for_hotkey = proxy.clone();
    GlobalHotKeyEvent::set_event_handler(Some(move |event| {
        let _ = proxy_for_hotkey.send_event(UserEvent::Hotkey(event));
    }));

    let status_item = MenuItem::new("Status: Starting...", false, None);
    let last_fired_item = MenuItem::new("No reminder has fired yet", false, None);
    let snooze_item = MenuItem::new("Snooze last reminder (Option+Z)", false, None);
    let dismiss_item = MenuItem::new("Dismiss nudge", true, None);
    let pause_item = MenuItem::new("Pause reminders", true, None);
    let resume_item = MenuItem::new("Resume reminders", false, None);
    let character_item = MenuItem::new(character_label(app.character), true, None);
    let open_preferences_item = MenuItem::new("Open preferences...", true, None);
    let open_reminders_item = MenuItem::new("Open reminders file...", true, None);
    let quit_item = MenuItem::new("Quit", true, None);

    let menu = Menu::new();
    menu.append(&status_item)?;
    menu.append(&last_fired_item)?;
    menu.append(&snooze_item)?;
    menu.append(&dismiss_item)?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&pause_item)?;
    menu.append(&resume_item)?;
    menu.append(&character_item)?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&open_preferences_item)?;
    menu.append(&open_reminders_item)?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&quit_item)?;

    let icons = IconSet::new();
    let mut tray_icon: Option<TrayIcon> = None;

    event_loop.run(move |event, _target, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::NewEvents(StartCause::Init) => {
                if tray_icon.is_none() {
                    let built = TrayIconBuilder::new()
                        .with_menu(Box::new(menu.clone()))
                        .with_tooltip("PetNudge")
                        .with_title(app.character.emoji())
                        .with_icon(icons.icon(GlyphRole::Idle))
                        .build();

                    match built {
                        Ok(icon) => tray_icon = Some(icon),
                        Err(err) => {
                            warn!("failed to init tray icon: {err}");
                            status_item.set_text("Status: Failed to init tray icon");
                        }
                    }
                }

                let _guard = runtime.enter();
                match app.engine.start() {
                    Ok(()) => status_item.set_text("Status: Watching reminders"),
                    Err(err) => status_item.set_text(format!("Status: {err}")),
                }
            }
            Event::UserEvent(UserEvent::Glyph(glyph)) => {
                if let Some(icon) = tray_icon.as_ref() {
                    if let Err(err) = icon.set_icon(Some(icons.icon(glyph.role))) {
                        warn!("failed to update tray icon for {:?}: {err}", glyph.role);
                    }
                    icon.set_title(Some(glyph.character.emoji()));
                }
            }
            Event::UserEvent(UserEvent::Fired { reminder_id, title }) => {
                last_fired_item.set_text(format!("Last: {title}"));
                snooze_item.set_enabled(true);
                app.last_fired = Some((reminder_id, title));
            }
            Event::UserEvent(UserEvent::Status(text)) => {
                status_item.set_text(format!("Status: {text}"));
            }
            Event::UserEvent(UserEvent::Hotkey(hotkey_event)) => {
                let matches = hotkey_id.as_ref().is_some_and(|id| hotkey_event.id == *id);
                if matches && hotkey_event.state == HotKeyState::Pressed {
                    snooze_last(&mut app, &status_item, &snooze_item);
                }
            }
            Event::UserEvent(UserEvent::Menu(menu_event)) => {
                if menu_event.id == snooze_item.id() {
                    snooze_last(&mut app, &status_item, &snooze_item);
                } else if menu_event.id == dismiss_item.id() {
                    app.send(IndicatorCommand::Dismiss);
                } else if menu_event.id == pause_item.id() {
                    app.engine.stop();
                    app.send(IndicatorCommand::Dismiss);
                    status_item.set_text("Status: Paused");
                    pause_item.set_enabled(false);
                    resume_item.set_enabled(true);
                } else if menu_event.id == resume_item.id() {
                    let _guard = runtime.enter();
                    match app.engine.start() {
                        Ok(()) => {
                            status_item.set_text("Status: Watching reminders");
                            pause_item.set_enabled(true);
                            resume_item.set_enabled(false);
                        }
                        Err(err) => status_item.set_text(format!("Status: {err}")),
                    }
                } else if menu_event.id == character_item.id() {
                    app.character = app.character.next();
                    app.engine.set_character(app.character);
                    app.send(IndicatorCommand::SetCharacter(app.character));
                    character_item.set_text(character_label(app.character));
                    info!("switched character to {}", app.character);
                } else if menu_event.id == open_preferences_item.id() {
                    if let Err(err) = open(&preferences_path) {
                        status_item.set_text(format!("Status: Failed to open preferences: {err}"));
                    }
                } else if menu_event.id == open_reminders_item.id() {
                    if let Err(err) = open(&reminders_path) {
                        status_item.set_text(format!("Status: Failed to open reminders: {err}"));
                    }
                } else if menu_event.id == quit_item.id() {
                    app.engine.stop();
                    tray_icon.take();
                    *control_flow = ControlFlow::Exit;
                }
            }
            _ => {}
        }
    });
}

fn forward_engine_event(proxy: &EventLoopProxy<UserEvent>, event: &EngineEvent) {
    match event {
        EngineEvent::Tick(outcome) => {
            if let Some(fire) = outcome.fired.last() {
                let _ = proxy.send_event(UserEvent::Fired {
                    reminder_id: fire.reminder.id(),
                    title: format!(
                        "{} {}",
                        fire.reminder.category().glyph(),
                        fire.reminder.display_title()
                    ),
                });
            }
        }
        EngineEvent::TickSkipped { reason } => {
            let _ = proxy.send_event(UserEvent::Status(format!("Check skipped: {reason}")));
        }
        EngineEvent::NotificationFailed { message, .. } => {
            let _ = proxy.send_event(UserEvent::Status(format!("Notification failed: {message}")));
        }
        EngineEvent::Started | EngineEvent::Stopped => {}
    }
}

fn snooze_last(app: &mut AppState, status_item: &MenuItem, snooze_item: &MenuItem) {
    let Some((id, title)) = app.last_fired.take() else {
        return;
    };
    app.send(IndicatorCommand::Dismiss);
    snooze_item.set_enabled(false);
    match app.engine.snooze_reminder_default(id) {
        Ok(_) => status_item.set_text(format!(
            "Status: Snoozed {title} for {}",
            humantime::format_duration(app.engine.config().default_snooze)
        )),
        Err(err) => status_item.set_text(format!("Status: Snooze failed: {err}")),
    }
}

fn character_label(character: PetCharacter) -> String {
    format!(
        "Character: {} {} (next: {})",
        character.emoji(),
        character.display_name(),
        character.next().display_name()
    )
}

struct IconSet {
    idle: Icon,
    watching: Icon,
    nudge_first: Icon,
    nudge_second: Icon,
}

impl IconSet {
    fn new() -> Self {
        Self {
            idle: build_state_icon([160, 160, 160]),
            watching: build_state_icon([255, 179, 0]),
            nudge_first: build_state_icon([46, 204, 113]),
            nudge_second: build_state_icon([231, 76, 60]),
        }
    }

    fn icon(&self, role: GlyphRole) -> Icon {
        match role {
            GlyphRole::Idle => self.idle.clone(),
            GlyphRole::Watching => self.watching.clone(),
            GlyphRole::NudgeFirst => self.nudge_first.clone(),
            GlyphRole::NudgeSecond => self.nudge_second.clone(),
        }
    }
}

fn build_state_icon(fill_rgb: [u8; 3]) -> Icon {
    let (width, height) = (18, 18);
    let mut rgba = Vec::with_capacity(width * height * 4);
    let border = [40, 40, 40, 255];
    let fill = [fill_rgb[0], fill_rgb[1], fill_rgb[2], 255];
    let background = [0, 0, 0, 0];

    for y in 0..height {
        for x in 0..width {
            let is_border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
            let is_center = (x > 4 && x < 13) && (y > 4 && y < 13);
            let pixel = if is_border {
                border
            } else if is_center {
                fill
            } else {
                background
            };
            rgba.extend_from_slice(&pixel);
        }
    }

    Icon::from_rgba(rgba, width as u32, height as u32).expect("valid tray icon")
}
