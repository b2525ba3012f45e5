use glutin::config::ConfigTemplateBuilder;
use glutin::context::{ContextApi, ContextAttributesBuilder, NotCurrentContext, Version};
use glutin::display::GetGlDisplay;
use glutin::prelude::*;
use glutin::surface::{SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;

use raw_window_handle::HasRawWindowHandle;

use std::collections::BTreeSet;
use std::ffi::CString;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};

use shadedit_engine::assets::{read_to_string_result, AssetsRoot};
use shadedit_engine::backend::GlowBackend;
use shadedit_engine::config::{self, ConfigMode, EditorConfig};
use shadedit_engine::loader::{load_and_register_shader, load_libs, FsLoader};
use shadedit_engine::persist::{LocalFsTransport, PersistenceBridge, SaveTarget};
use shadedit_engine::protocol::Message;
use shadedit_engine::strategy::{CompileStrategy, DefaultStrategy};
use shadedit_engine::validate;
use shadedit_engine::{loge, logi, logw};
use shadedit_engine::{logging, Engine, EngineEvent, ShaderOptions};

mod hotreload;
mod presenter;

use hotreload::NotifyWatch;
use presenter::Presenter;

struct Args {
    log_file: Option<PathBuf>,
    assets: Option<PathBuf>,
    mode: ConfigMode,
}

fn parse_args() -> Args {
    let mut args = Args { log_file: None, assets: None, mode: ConfigMode::Lenient };

    let mut it = std::env::args().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--log-file" => args.log_file = it.next().map(PathBuf::from),
            "--assets" => args.assets = it.next().map(PathBuf::from),
            "--strict" => args.mode = ConfigMode::Strict,
            other => eprintln!("ignoring unknown argument: {other}"),
        }
    }

    if args.log_file.is_none() {
        if let Ok(p) = std::env::var("SHADEDIT_LOG_FILE") {
            if !p.trim().is_empty() {
                args.log_file = Some(PathBuf::from(p));
            }
        }
    }
    args
}

/// Register every configured library group and shader. Failures are logged per
/// entry so one bad file doesn't keep the rest from loading.
fn load_project(engine: &mut Engine<GlowBackend>, loader: &FsLoader, cfg: &EditorConfig) {
    for g in &cfg.libraries {
        match load_libs(engine, loader, &g.group, &g.libs, g.readonly) {
            Ok(()) => logi!("LIBS", "group '{}' loaded ({} libraries)", g.group, g.libs.len()),
            Err(e) => loge!("LIBS", "group '{}': {} ({e})", g.group, e.code()),
        }
    }

    for s in &cfg.shaders {
        let strategy: Box<dyn CompileStrategy<GlowBackend>> = if s.preprocess {
            Box::new(DefaultStrategy::new())
        } else {
            Box::new(DefaultStrategy::without_preprocessor())
        };
        let options = ShaderOptions::default()
            .readonly(s.readonly)
            .compile_on_register(s.compile_on_register);
        if let Err(e) = load_and_register_shader(engine, loader, &s.key, s.paths.clone(), strategy, options) {
            loge!("SHADER", "'{}': {} ({e})", s.key, e.code());
        }
    }
}

fn first_active(engine: &Engine<GlowBackend>, cfg: &EditorConfig) -> Option<String> {
    cfg.active
        .as_deref()
        .filter(|k| engine.shader(k).is_some())
        .map(str::to_string)
        .or_else(|| engine.shader_keys().next().map(str::to_string))
}

fn title_for(engine: &Engine<GlowBackend>, active: Option<&str>, note: &str) -> String {
    let Some(key) = active else {
        return "shadedit - no shader".to_string();
    };
    let state = engine
        .shader(key)
        .map(|r| r.state().to_string())
        .unwrap_or_else(|| "missing".to_string());
    if note.is_empty() {
        format!("shadedit - {key} [{state}] (Tab=next, Ctrl+S=save, Ctrl+R=revert, F5=reload)")
    } else {
        format!("shadedit - {key} [{state}] {note}")
    }
}

fn main() {
    let args = parse_args();
    let run_id = logging::init(args.log_file.clone());
    logi!("INIT", "run_id={run_id}");
    if let Some(p) = &args.log_file {
        logi!("INIT", "log_file={}", p.display());
    }

    let assets = match &args.assets {
        Some(dir) => AssetsRoot::at(dir),
        None => AssetsRoot::discover(&PathBuf::from(env!("CARGO_MANIFEST_DIR"))),
    }
    .unwrap_or_else(|e| {
        eprintln!("{} ({})", e, e.code());
        std::process::exit(1);
    });
    logi!("ASSETS", "base: {}", assets.path().display());

    let cfg = config::load_editor_config_with_mode(&assets, args.mode).unwrap_or_else(|e| {
        eprintln!("{} ({})", e, e.code());
        std::process::exit(1);
    });
    match &cfg.source {
        Some(p) => logi!("CONFIG", "loaded {}", p.display()),
        None => logi!("CONFIG", "no editor.json, using shaders/default.vert + default.frag"),
    }

    let issues = validate::validate_editor_config(&cfg);
    validate::emit_issues("CONFIG", &issues);
    validate::emit_summary("CONFIG", "editor.json", &issues);
    if args.mode == ConfigMode::Strict && validate::has_errors(&issues) {
        eprintln!("editor.json has errors (strict mode)");
        std::process::exit(1);
    }

    let (watcher, file_rx) = NotifyWatch::new().unwrap_or_else(|e| {
        eprintln!("failed to start file watcher: {e}");
        std::process::exit(1);
    });

    let event_loop = EventLoop::new().expect("EventLoop::new failed");
    let window_builder = winit::window::WindowBuilder::new()
        .with_title("shadedit")
        .with_inner_size(PhysicalSize::new(1280, 720));

    let template = ConfigTemplateBuilder::new().with_alpha_size(8).with_depth_size(0);
    let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

    let (window, gl_config) = display_builder
        .build(&event_loop, template, |configs| {
            configs
                .reduce(|a, b| if a.num_samples() > b.num_samples() { a } else { b })
                .unwrap()
        })
        .expect("Failed to build display");

    let window = window.expect("No window created");

    let raw_window_handle = window.raw_window_handle();
    let gl_display = gl_config.display();

    let context_attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
        .build(Some(raw_window_handle));

    let not_current_gl_context: NotCurrentContext = unsafe {
        gl_display
            .create_context(&gl_config, &context_attributes)
            .expect("create_context failed")
    };

    let size = window.inner_size();
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        window.raw_window_handle(),
        NonZeroU32::new(size.width.max(1)).unwrap(),
        NonZeroU32::new(size.height.max(1)).unwrap(),
    );

    let gl_surface = unsafe {
        gl_display
            .create_window_surface(&gl_config, &attrs)
            .expect("create_window_surface failed")
    };

    let gl_context = not_current_gl_context
        .make_current(&gl_surface)
        .expect("make_current failed");

    gl_surface
        .set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::new(1).unwrap()))
        .ok();

    let gl = Rc::new(unsafe {
        glow::Context::from_loader_function(|s| {
            gl_display.get_proc_address(&CString::new(s).unwrap()) as *const _
        })
    });

    let presenter = Presenter::new(&gl).expect("create_vertex_array failed");

    let mut engine = Engine::new(GlowBackend::new(Rc::clone(&gl)), Box::new(watcher), cfg.settings.clone());
    let loader = FsLoader::new(assets.clone());
    load_project(&mut engine, &loader, &cfg);

    let mut saver = PersistenceBridge::new(LocalFsTransport::new(assets.path()));
    let mut active = first_active(&engine, &cfg);
    let mut modifiers = ModifiersState::empty();
    let mut note = String::new();

    window.set_title(&title_for(&engine, active.as_deref(), &note));

    event_loop
        .run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        engine.reset();
                        presenter.destroy(&gl);
                        target.exit();
                    }

                    WindowEvent::ModifiersChanged(m) => modifiers = m.state(),

                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state.is_pressed() && !event.repeat {
                            if let PhysicalKey::Code(code) = event.physical_key {
                                let now = Instant::now();
                                match code {
                                    KeyCode::KeyS if modifiers.control_key() => {
                                        note = match saver.save(SaveTarget::All, &engine) {
                                            Ok(n) => format!("saved {n} files"),
                                            Err(e) => format!("save failed: {}", e.code()),
                                        };
                                    }
                                    KeyCode::KeyR if modifiers.control_key() => {
                                        if let Some(key) = active.as_deref() {
                                            match engine.revert_shader(key, now) {
                                                Ok(true) => note = "reverted".to_string(),
                                                Ok(false) => {}
                                                Err(e) => logw!("EDIT", "revert '{key}': {e}"),
                                            }
                                        }
                                    }
                                    KeyCode::Tab => {
                                        let keys: Vec<String> = engine.shader_keys().map(str::to_string).collect();
                                        if !keys.is_empty() {
                                            let next = active
                                                .as_ref()
                                                .and_then(|k| keys.iter().position(|x| x == k))
                                                .map(|i| (i + 1) % keys.len())
                                                .unwrap_or(0);
                                            active = Some(keys[next].clone());
                                            note.clear();
                                            logi!("SHADER", "active -> {}", keys[next]);
                                        }
                                    }
                                    KeyCode::F5 => {
                                        logi!("SHADER", "reloading project");
                                        engine.reset();
                                        load_project(&mut engine, &loader, &cfg);
                                        active = active
                                            .take()
                                            .filter(|k| engine.shader(k).is_some())
                                            .or_else(|| first_active(&engine, &cfg));
                                        note = "reloaded".to_string();
                                    }
                                    _ => {}
                                }
                                window.set_title(&title_for(&engine, active.as_deref(), &note));
                            }
                        }
                    }

                    WindowEvent::Resized(new_size) => {
                        if let (Some(w), Some(h)) =
                            (NonZeroU32::new(new_size.width), NonZeroU32::new(new_size.height))
                        {
                            gl_surface.resize(&gl_context, w, h);
                        }
                    }

                    WindowEvent::RedrawRequested => {
                        let now = Instant::now();

                        // Editors often fire several events per save; read each file once.
                        let changed: BTreeSet<PathBuf> = file_rx.try_iter().collect();
                        for path in changed {
                            let content = match read_to_string_result(&path) {
                                Ok(s) => s,
                                Err(e) => {
                                    logw!("WATCH", "{e}");
                                    continue;
                                }
                            };
                            let msg = Message::UpdateFile { file: path, content };
                            if let Err(e) = engine.handle_message(msg, now) {
                                logw!("WATCH", "{e}");
                            }
                        }

                        let recompiled = engine.tick(now);
                        let events = engine.drain_events();
                        if !recompiled.is_empty() || !events.is_empty() {
                            for ev in events {
                                match ev {
                                    EngineEvent::ShaderCompileOk { key } if active.as_deref() == Some(key.as_str()) => {
                                        note.clear();
                                    }
                                    EngineEvent::ShaderCompileErr { key, errors } if active.as_deref() == Some(key.as_str()) => {
                                        let first = errors.summary().lines().next().unwrap_or_default().to_string();
                                        note = format!("error: {first}");
                                    }
                                    EngineEvent::StrategyFailed { key, .. } if active.as_deref() == Some(key.as_str()) => {
                                        note = "compile strategy failed (see log)".to_string();
                                    }
                                    _ => {}
                                }
                            }
                            window.set_title(&title_for(&engine, active.as_deref(), &note));
                        }

                        let size = window.inner_size();
                        let program = active.as_deref().and_then(|k| engine.program(k));
                        presenter.draw(&gl, program, size.width as i32, size.height as i32);

                        gl_surface.swap_buffers(&gl_context).expect("swap_buffers failed");
                    }

                    _ => {}
                },

                Event::AboutToWait => {
                    window.request_redraw();
                }

                _ => {}
            }
        })
        .expect("Event loop failed");
}
