//! Main application for the ytgrab GUI

use std::{path::PathBuf, sync::Arc, time::Duration};

// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
use egui::{Color32, Visuals};
use log::{error, info, warn};
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use tokio::{
    runtime::Runtime,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};

use ytgrab::{FetchError, JobState, OutputKind, Settings, Shell, WorkerEvent, logging, run_job};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging and runtime, then launches the window
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env();
    logging::initialize(settings.log_destination);
    info!(
        "yt-dlp: {:?}, ffmpeg: {:?}, output: {}",
        settings.ytdlp,
        settings.ffmpeg,
        settings.default_output_dir.display()
    );

    let rt = Arc::new(Runtime::new()?);
    if RUNTIME.set(rt).is_err() {
        return Err("runtime already initialized".into());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([500.0, 400.0])
            .with_title("ytgrab"),
        ..Default::default()
    };
    eframe::run_native(
        "ytgrab",
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(GrabApp::new(settings))
        }),
    )?;
    Ok(())
}

/// Application state for the GUI
struct GrabApp {
    settings: Settings,
    shell: Shell,
    events_tx: UnboundedSender<WorkerEvent>,
    events_rx: UnboundedReceiver<WorkerEvent>,
}

impl GrabApp {
    fn new(settings: Settings) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            shell: Shell::new(&settings.default_output_dir),
            settings,
            events_tx,
            events_rx,
        }
    }

    fn start_download(&mut self) {
        let (job_id, request) = match self.shell.submit() {
            Ok(job) => job,
            Err(err) => {
                warn!("not starting: {err}");
                return;
            }
        };

        let Some(rt) = RUNTIME.get() else {
            error!("runtime missing, cannot start job {job_id}");
            self.shell.fail_current(FetchError::Fetch {
                message: "background runtime is not available".into(),
            });
            return;
        };

        // yt-dlp is checked here so a missing tool fails like any other job
        let tools = match self.settings.toolchain() {
            Ok(tools) => tools,
            Err(error) => {
                self.shell.fail_current(error);
                return;
            }
        };

        rt.spawn(run_job(
            job_id,
            request,
            tools,
            self.settings.job_options(),
            self.events_tx.clone(),
        ));
    }

    fn error_window(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.shell.error().cloned() else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.colored_label(Color32::LIGHT_RED, &notice.message);
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.shell.dismiss_error();
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for GrabApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // Poll worker events
        while let Ok(event) = self.events_rx.try_recv() {
            self.shell.apply(event);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Video Downloader");
            ui.add_space(8.0);

            ui.label("Paste a video URL:");
            ui.text_edit_singleline(&mut self.shell.url_input);
            ui.add_space(8.0);

            ui.horizontal(|ui| {
                ui.label("Save to:");
                ui.text_edit_singleline(&mut self.shell.output_dir);
                if ui.button("Browse…").clicked() {
                    let start = existing_dir_or_cwd(self.shell.output_path());
                    if let Some(folder) = FileDialog::new().set_directory(&start).pick_folder() {
                        self.shell.set_output_dir(folder);
                    }
                }
            });
            ui.add_space(8.0);

            ui.label("Download as:");
            for kind in OutputKind::ALL {
                ui.radio_value(&mut self.shell.kind, kind, kind.description());
            }
            ui.add_space(8.0);

            let busy = self.shell.is_busy();
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!busy, egui::Button::new("Download"))
                    .clicked()
                {
                    self.start_download();
                }
                if matches!(self.shell.job(), JobState::Done(_)) && ui.button("Open folder").clicked() {
                    open_folder(self.shell.output_path());
                }
            });
            ui.add_space(8.0);

            let fraction = f32::from(self.shell.progress()) / 100.0;
            ui.add(egui::ProgressBar::new(fraction).show_percentage());
            ui.label(self.shell.status());
        });

        self.error_window(ctx);

        // Keep polling while a worker may be sending events
        if self.shell.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

fn existing_dir_or_cwd(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        return path;
    }
    std::env::current_dir().unwrap_or(path)
}

/// Opens `folder` in the platform file manager without blocking the UI.
fn open_folder(folder: PathBuf) {
    std::thread::spawn(move || {
        #[cfg(target_os = "windows")]
        let opener = "explorer";
        #[cfg(target_os = "macos")]
        let opener = "open";
        #[cfg(all(unix, not(target_os = "macos")))]
        let opener = "xdg-open";

        if let Err(err) = std::process::Command::new(opener).arg(&folder).spawn() {
            warn!("could not open {}: {err}", folder.display());
        }
    });
}
