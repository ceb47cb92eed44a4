// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host window setup and event loop.

use egui_wgpu::wgpu;
use flowgraph_editor_graph::{
    create_flow_registry, EditorConfig, EditorEvent, EditorSession, Graph, GraphCanvas, RonGraphStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const DEFAULT_CONFIG_PATH: &str = "flowgraph_editor.ron";
const WINDOW_TITLE: &str = "Flow Graph Editor";

/// Host errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Window creation failed
    #[error("Failed to create window: {0}")]
    WindowCreation(#[from] winit::error::OsError),

    /// Renderer initialization failed
    #[error("Failed to initialize renderer: {0}")]
    RendererInit(String),

    /// Event loop error
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// Result type for host operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Command-line options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Graph asset to open or create
    pub graph_path: Option<PathBuf>,
    /// Editor configuration file
    pub config_path: PathBuf,
}

impl LaunchOptions {
    /// Parse `[GRAPH.ron] [--config CONFIG.ron]`
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = Self {
            graph_path: None,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--config" {
                match args.next() {
                    Some(path) => options.config_path = PathBuf::from(path),
                    None => tracing::warn!("--config expects a path"),
                }
            } else if options.graph_path.is_none() {
                options.graph_path = Some(PathBuf::from(arg));
            } else {
                tracing::warn!("Ignoring extra argument {arg}");
            }
        }
        options
    }
}

/// Load the editor configuration, falling back to defaults
fn load_config(path: &Path) -> EditorConfig {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return EditorConfig::default();
    }
    match EditorConfig::load(path) {
        Ok(config) => {
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            tracing::warn!("Failed to load config {}: {e}, using defaults", path.display());
            EditorConfig::default()
        }
    }
}

/// Open the requested graph, or start a fresh one
fn open_session(store: &RonGraphStore, path: Option<&Path>, config: EditorConfig) -> EditorSession {
    if let Some(path) = path.filter(|p| p.exists()) {
        match EditorSession::open(store, path, config.clone(), create_flow_registry()) {
            Ok(session) => {
                tracing::info!("Opened {}", path.display());
                return session;
            }
            Err(e) => tracing::warn!("Failed to load {}: {e}", path.display()),
        }
    }
    let name = path
        .and_then(Path::file_stem)
        .map_or_else(|| "Untitled".to_string(), |s| s.to_string_lossy().into_owned());
    EditorSession::new(Graph::with_entry_nodes(name), config, create_flow_registry())
}

/// Graphics state for wgpu rendering
struct GraphicsState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    egui_renderer: egui_wgpu::Renderer,
}

impl GraphicsState {
    fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| AppError::RendererInit(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| AppError::RendererInit("No suitable GPU adapter".to_string()))?;

        tracing::info!("Using GPU: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Flow Graph Editor Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            },
            None,
        ))
        .map_err(|e| AppError::RendererInit(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(wgpu::TextureFormat::is_srgb)
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| AppError::RendererInit("Surface reports no formats".to_string()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            egui_renderer,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn render(
        &mut self,
        egui_ctx: &egui::Context,
        full_output: egui::FullOutput,
        window: &Window,
    ) -> std::result::Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Editor Encoder"),
        });

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        let [r, g, b, a] = egui::Rgba::from(egui_ctx.style().visuals.panel_fill).to_array();
        let clear = wgpu::Color { r: r.into(), g: g.into(), b: b.into(), a: a.into() };

        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Editor Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(clear),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();

            self.egui_renderer.render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        Ok(())
    }
}

/// Editor state shown inside the window
struct EditorInner {
    session: EditorSession,
    canvas: GraphCanvas,
    store: RonGraphStore,
    /// Where a graph that was never saved will be written
    save_path: PathBuf,
    status: Option<String>,
    show_unsaved_warning: bool,
    request_exit: bool,
}

impl EditorInner {
    fn new(options: &LaunchOptions) -> Self {
        let store = RonGraphStore::new();
        let config = load_config(&options.config_path);
        let mut session = open_session(&store, options.graph_path.as_deref(), config);
        session.subscribe(|event| match event {
            EditorEvent::GraphRepaired(report) => {
                tracing::info!("Graph repaired: {} issues fixed", report.total());
            }
            EditorEvent::UndoRedoPerformed { label, redo } => {
                tracing::info!("{} {label}", if *redo { "Redo" } else { "Undo" });
            }
            EditorEvent::GraphOpened { title, .. } => tracing::info!("Opened graph {title}"),
            EditorEvent::GraphSaved(path) => tracing::info!("Saved {}", path.display()),
            _ => {}
        });

        let save_path = options
            .graph_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("untitled.ron"));

        Self {
            session,
            canvas: GraphCanvas::new(),
            store,
            save_path,
            status: None,
            show_unsaved_warning: false,
            request_exit: false,
        }
    }

    fn title(&self) -> String {
        let dirty = if self.session.is_dirty() { "*" } else { "" };
        format!("{WINDOW_TITLE} - {}{dirty}", self.session.root().name)
    }

    fn save(&mut self) -> bool {
        let result = if self.session.asset_path().is_some() {
            self.session.save_with(&self.store)
        } else {
            self.session.save_as(&self.store, self.save_path.clone())
        };
        match result {
            Ok(()) => {
                self.status = None;
                true
            }
            Err(e) => {
                tracing::warn!("Save failed: {e}");
                self.status = Some(format!("Save failed: {e}"));
                false
            }
        }
    }

    fn update(&mut self, ctx: &egui::Context) {
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::S)) {
            self.save();
        }

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                self.file_menu(ui);
                self.edit_menu(ui);
            });
        });

        egui::TopBottomPanel::top("tab_bar").show(ctx, |ui| self.tab_bar(ui));

        if let Some(status) = &self.status {
            egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
                ui.colored_label(egui::Color32::from_rgb(220, 120, 120), status);
            });
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.canvas.ui(ui, &mut self.session));

        if self.show_unsaved_warning {
            self.show_unsaved_warning_dialog(ctx);
        }
    }

    fn file_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("File", |ui| {
            if ui.button("Save").clicked() {
                self.save();
                ui.close_menu();
            }
            if ui.button("Quit").clicked() {
                self.request_close();
                ui.close_menu();
            }
        });
    }

    fn edit_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("Edit", |ui| {
            let undo = self
                .session
                .history()
                .undo_label()
                .map_or_else(|| "Undo".to_string(), |l| format!("Undo {l}"));
            if ui.add_enabled(self.session.can_undo(), egui::Button::new(undo)).clicked() {
                self.session.undo();
                ui.close_menu();
            }
            let redo = self
                .session
                .history()
                .redo_label()
                .map_or_else(|| "Redo".to_string(), |l| format!("Redo {l}"));
            if ui.add_enabled(self.session.can_redo(), egui::Button::new(redo)).clicked() {
                self.session.redo();
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Copy").clicked() {
                self.session.copy_selection();
                ui.close_menu();
            }
            if ui
                .add_enabled(!self.session.clipboard().is_empty(), egui::Button::new("Paste"))
                .clicked()
            {
                let at = self.session.grid_at(self.session.pointer());
                self.session.paste_at(at);
                ui.close_menu();
            }
            if ui.button("Delete").clicked() {
                self.session.delete_selection();
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Select all").clicked() {
                self.session.select_all();
                ui.close_menu();
            }
            if ui.button("Frame all").clicked() {
                self.session.frame_nodes(&[]);
                ui.close_menu();
            }
        });
    }

    /// Breadcrumb of open graph tabs, root first
    fn tab_bar(&mut self, ui: &mut egui::Ui) {
        let active = self.session.tabs().active_index();
        let titles: Vec<String> = self.session.tabs().tabs().iter().map(|t| t.title.clone()).collect();
        let mut navigate = None;
        let mut close = None;

        ui.horizontal(|ui| {
            for (index, title) in titles.iter().enumerate() {
                if index > 0 {
                    ui.label(">");
                }
                if ui.selectable_label(index == active, title).clicked() {
                    navigate = Some(index);
                }
                if index > 0 && ui.small_button("x").on_hover_text("Close tab").clicked() {
                    close = Some(index);
                }
            }
        });

        if let Some(index) = close {
            self.session.close_tab(index);
        } else if let Some(index) = navigate {
            self.session.navigate_to(index);
        }
    }

    fn request_close(&mut self) {
        if self.session.is_dirty() {
            self.show_unsaved_warning = true;
        } else {
            self.request_exit = true;
        }
    }

    fn show_unsaved_warning_dialog(&mut self, ctx: &egui::Context) {
        egui::Window::new("Unsaved Changes")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label("The graph has unsaved changes.");
                ui.horizontal(|ui| {
                    if ui.button("Save and quit").clicked() && self.save() {
                        self.show_unsaved_warning = false;
                        self.request_exit = true;
                    }
                    if ui.button("Quit without saving").clicked() {
                        self.show_unsaved_warning = false;
                        self.request_exit = true;
                    }
                    if ui.button("Cancel").clicked() {
                        self.show_unsaved_warning = false;
                    }
                });
            });
    }
}

/// Running state of the editor
struct EditorRunning {
    window: Arc<Window>,
    graphics: GraphicsState,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    editor: EditorInner,
    title: String,
}

/// Main editor application
pub struct EditorApp {
    running: Option<EditorRunning>,
    options: LaunchOptions,
}

impl EditorApp {
    /// Create an application for the given launch options
    pub fn new(options: LaunchOptions) -> Self {
        Self { running: None, options }
    }

    /// Run the event loop until the window closes
    pub fn run(options: LaunchOptions) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = EditorApp::new(options);
        event_loop.run_app(&mut app)?;
        Ok(())
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> Result<EditorRunning> {
        let window_attrs = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(1400, 900))
            .with_min_inner_size(winit::dpi::LogicalSize::new(640, 480));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        tracing::info!("Initializing graphics...");
        let graphics = GraphicsState::new(window.clone())?;

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &window,
            Some(window.scale_factor() as f32),
            None,
            Some(2 * 1024),
        );

        let editor = EditorInner::new(&self.options);
        let title = editor.title();
        window.set_title(&title);

        tracing::info!("Editor initialized, window size {:?}", window.inner_size());

        Ok(EditorRunning {
            window,
            graphics,
            egui_ctx,
            egui_state,
            editor,
            title,
        })
    }
}

impl ApplicationHandler for EditorApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => self.running = Some(running),
            Err(e) => {
                tracing::error!("{e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(running) = &mut self.running else {
            return;
        };

        let response = running.egui_state.on_window_event(&running.window, &event);
        if response.consumed {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                running.editor.request_close();
                if running.editor.request_exit {
                    tracing::info!("Close requested, exiting...");
                    event_loop.exit();
                } else {
                    running.window.request_redraw();
                }
            }
            WindowEvent::Resized(new_size) => {
                tracing::debug!("Window resized to {:?}", new_size);
                running.graphics.resize(new_size);
                running.window.request_redraw();
            }
            WindowEvent::RedrawRequested => {
                let raw_input = running.egui_state.take_egui_input(&running.window);
                let full_output = running.egui_ctx.run(raw_input, |ctx| running.editor.update(ctx));

                if running.editor.request_exit {
                    event_loop.exit();
                    return;
                }

                let title = running.editor.title();
                if title != running.title {
                    running.window.set_title(&title);
                    running.title = title;
                }

                running
                    .egui_state
                    .handle_platform_output(&running.window, full_output.platform_output.clone());
                match running.graphics.render(&running.egui_ctx, full_output, &running.window) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = running.window.inner_size();
                        running.graphics.resize(size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        tracing::error!("Out of GPU memory!");
                        event_loop.exit();
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        tracing::warn!("Surface timeout");
                    }
                }

                running.window.request_redraw();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_launch_options_defaults() {
        let options = LaunchOptions::from_args(Vec::new());
        assert_eq!(options.graph_path, None);
        assert_eq!(options.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_launch_options_graph_and_config() {
        let options = LaunchOptions::from_args(args(&["--config", "cfg.ron", "flow.ron"]));
        assert_eq!(options.graph_path, Some(PathBuf::from("flow.ron")));
        assert_eq!(options.config_path, PathBuf::from("cfg.ron"));
    }

    #[test]
    fn test_missing_graph_starts_fresh() {
        let path = std::env::temp_dir().join("flowgraph_editor_missing_graph_test.ron");
        let session = open_session(&RonGraphStore::new(), Some(&path), EditorConfig::default());
        assert_eq!(session.root().name, "flowgraph_editor_missing_graph_test");
        assert_eq!(session.graph().node_count(), 1);
        assert!(session.asset_path().is_none());
    }

    #[test]
    fn test_missing_config_falls_back() {
        let config = load_config(Path::new("definitely/not/here.ron"));
        assert_eq!(config, EditorConfig::default());
    }
}
