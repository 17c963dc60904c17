use crate::batch::{BatchController, RunContext, RunReport, RunState, StatusSink};
use crate::config::AppConfig;
use crate::contacts::XlsxLoader;
use crate::message::WhatsAppWeb;
use anyhow::Context as _;
use eframe::egui;
use egui::{Align2, Color32, Margin, RichText, Vec2};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;

// Everything the background threads hand back to the UI thread
enum Message {
    ConfigLoaded(Result<AppConfig, String>),
    Status(String),
    Confirm(String, oneshot::Sender<bool>),
    Finished(RunReport),
}

struct PendingConfirm {
    prompt: String,
    reply: oneshot::Sender<bool>,
}

struct Notice {
    title: &'static str,
    body: String,
    is_error: bool,
}

/// Forwards controller callbacks to the UI thread over the message channel.
struct ChannelSink {
    sender: mpsc::Sender<Message>,
    ctx: egui::Context,
}

impl StatusSink for ChannelSink {
    fn report(&self, text: &str) {
        self.sender.send(Message::Status(text.to_string())).ok();
        self.ctx.request_repaint();
    }

    fn confirm(&self, prompt: &str) -> bool {
        let (reply, answer) = oneshot::channel();
        if self
            .sender
            .send(Message::Confirm(prompt.to_string(), reply))
            .is_err()
        {
            return false;
        }
        self.ctx.request_repaint();
        // A dropped reply (window closed) counts as "no"
        answer.blocking_recv().unwrap_or(false)
    }
}

fn pick_spreadsheet() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Select Excel File")
        .add_filter("Excel Files", &["xlsx"])
        .add_filter("All Files", &["*"])
        .pick_file()
}

pub struct ReminderApp {
    config: Option<AppConfig>,
    light_mode: bool,
    status_message: String,

    active_run: Option<RunContext>,
    pending_confirm: Option<PendingConfirm>,
    notices: VecDeque<Notice>,

    // Background Communication
    tokio_rt: Option<Runtime>,
    receiver: mpsc::Receiver<Message>,
    sender: mpsc::Sender<Message>,
}

impl Default for ReminderApp {
    fn default() -> Self {
        let (sender, receiver) = mpsc::channel();

        let initial_sender = sender.clone();
        thread::spawn(move || {
            let loaded = AppConfig::load().map_err(|e| format!("Failed to load config: {}", e));
            initial_sender.send(Message::ConfigLoaded(loaded)).ok();
        });

        Self {
            config: None,
            light_mode: false,
            status_message: "Loading configuration...".to_string(),
            active_run: None,
            pending_confirm: None,
            notices: VecDeque::new(),
            tokio_rt: None,
            receiver,
            sender,
        }
    }
}

impl ReminderApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.all_styles_mut(|style| {
            style.visuals.window_corner_radius = 10_u8.into();
            style.visuals.button_frame = true;
            style.spacing.button_padding = Vec2::new(14.0, 6.0);
        });
        cc.egui_ctx.set_theme(egui::Theme::Dark);
        Self::default()
    }

    fn ensure_runtime(&mut self) -> anyhow::Result<&Runtime> {
        if self.tokio_rt.is_none() {
            self.tokio_rt = Some(Runtime::new().context("Failed to create Tokio runtime")?);
        }
        self.tokio_rt.as_ref().context("Tokio runtime unavailable")
    }

    fn apply_theme(&self, ctx: &egui::Context) {
        if self.light_mode {
            ctx.set_theme(egui::Theme::Light);
        } else {
            ctx.set_theme(egui::Theme::Dark);
        }
    }

    fn handle_select_and_send(&mut self, ctx: &egui::Context) {
        if self.active_run.is_some() {
            self.status_message = "A run is already in progress".to_string();
            return;
        }
        if let Err(e) = self.start_run(ctx) {
            log::error!("Failed to start run: {:#}", e);
            self.status_message = "Error occurred during process".to_string();
            self.notices.push_back(Notice {
                title: "Error",
                body: format!("An error occurred: {:#}", e),
                is_error: true,
            });
        }
    }

    /// Everything that can fail before the chooser opens. The runtime comes
    /// first so a run log is only created once the run can actually start.
    fn prepare_run(&mut self) -> anyhow::Result<(AppConfig, Handle, RunContext)> {
        let config = self.config.clone().context("Configuration is not loaded")?;
        let rt = self.ensure_runtime()?.handle().clone();
        let run = RunContext::start(&config.logging.dir).context("Failed to create activity log")?;
        Ok((config, rt, run))
    }

    fn start_run(&mut self, ctx: &egui::Context) -> anyhow::Result<()> {
        let (config, rt, run) = self.prepare_run()?;
        let file = pick_spreadsheet();

        let worker_run = run.clone();
        let sink = ChannelSink {
            sender: self.sender.clone(),
            ctx: ctx.clone(),
        };

        rt.spawn_blocking(move || {
            let mut controller = BatchController::new(
                XlsxLoader,
                WhatsAppWeb::new(config.dispatch),
                config.template.path,
            );
            let report = controller.run(file.as_deref(), &worker_run, &sink);
            log::debug!("Worker finished in state {:?}", controller.state());
            sink.sender.send(Message::Finished(report)).ok();
            sink.ctx.request_repaint();
        });

        self.status_message = "Loading contacts...".to_string();
        self.active_run = Some(run);
        Ok(())
    }

    fn handle_cancel(&mut self) {
        match &self.active_run {
            Some(run) => {
                run.cancel_flag().cancel();
                run.log().info("User requested process cancellation");
                self.status_message = "Cancelling process...".to_string();
            }
            None => self.status_message = "No process is running".to_string(),
        }
    }

    fn finish_run(&mut self, report: RunReport) {
        self.active_run = None;
        self.pending_confirm = None;

        match report.state {
            RunState::Completed => self.notices.push_back(Notice {
                title: "Success",
                body: "All messages have been processed!".to_string(),
                is_error: false,
            }),
            RunState::Failed => {
                let reason = report
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                self.notices.push_back(Notice {
                    title: "Error",
                    body: format!("An error occurred: {}", reason),
                    is_error: true,
                });
            }
            _ => {}
        }

        if report.state != RunState::Idle {
            let tally = report.tally;
            self.status_message = format!(
                "{} (Sent: {}, Skipped: {}, Failed: {})",
                self.status_message, tally.sent, tally.skipped, tally.failed
            );
        }

        self.notices.push_back(Notice {
            title: "Log Saved",
            body: format!(
                "Activity log has been saved to '{}'",
                report.log_path.display()
            ),
            is_error: false,
        });
    }

    fn process_messages(&mut self, ctx: &egui::Context) {
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                Message::ConfigLoaded(Ok(config)) => {
                    self.light_mode = !config.ui.dark_mode;
                    self.apply_theme(ctx);
                    self.config = Some(config);
                    self.status_message = String::new();
                }
                Message::ConfigLoaded(Err(e)) => {
                    log::error!("{}", e);
                    self.status_message = format!("ERROR: {}", e);
                }
                Message::Status(text) => self.status_message = text,
                Message::Confirm(prompt, reply) => {
                    self.pending_confirm = Some(PendingConfirm { prompt, reply });
                }
                Message::Finished(report) => self.finish_run(report),
            }
        }
    }

    fn ui_confirm_dialog(&mut self, ctx: &egui::Context) {
        let Some(pending) = &self.pending_confirm else {
            return;
        };

        let mut answer = None;
        egui::Window::new("Confirmation")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(&pending.prompt);
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        answer = Some(true);
                    }
                    if ui.button("No").clicked() {
                        answer = Some(false);
                    }
                });
            });

        if let Some(answer) = answer {
            if let Some(pending) = self.pending_confirm.take() {
                pending.reply.send(answer).ok();
            }
        }
    }

    fn ui_notice(&mut self, ctx: &egui::Context) {
        // Confirmation takes precedence over queued notices
        if self.pending_confirm.is_some() {
            return;
        }
        let Some(notice) = self.notices.front() else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new(notice.title)
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, Vec2::ZERO)
            .show(ctx, |ui| {
                let body = RichText::new(&notice.body);
                if notice.is_error {
                    ui.label(body.color(Color32::from_rgb(0xCC, 0x2B, 0x52)));
                } else {
                    ui.label(body);
                }
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });

        if dismissed {
            self.notices.pop_front();
        }
    }
}

impl Drop for ReminderApp {
    fn drop(&mut self) {
        if let Some(run) = &self.active_run {
            run.cancel_flag().cancel();
            run.log().info("Application closed during run");
        }
        self.pending_confirm = None;
        if let Some(rt) = self.tokio_rt.take() {
            rt.shutdown_background();
        }
    }
}

impl eframe::App for ReminderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_messages(ctx);

        // Appearance switch at the bottom
        egui::TopBottomPanel::bottom("mode_panel")
            .frame(egui::Frame::new().inner_margin(Margin::symmetric(10, 8)))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    let label = if self.light_mode { "Dark Mode" } else { "Light Mode" };
                    if ui.checkbox(&mut self.light_mode, label).changed() {
                        self.apply_theme(ctx);
                    }
                });
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::new().inner_margin(Margin::same(15)))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading(RichText::new("WhatsApp Reminder System").size(20.0));
                });
                ui.add_space(10.0);

                egui::Frame::group(ui.style())
                    .corner_radius(10_u8)
                    .inner_margin(Margin::same(12))
                    .show(ui, |ui| {
                        ui.set_width(ui.available_width());
                        ui.vertical_centered(|ui| {
                            ui.label("Select an Excel file to send reminders:");
                            ui.add_space(10.0);

                            let running = self.active_run.is_some();
                            let enabled = self.config.is_some() && !running;
                            if ui
                                .add_enabled(enabled, egui::Button::new("Select File & Send"))
                                .clicked()
                            {
                                self.handle_select_and_send(ctx);
                            }
                            ui.add_space(10.0);

                            let cancel = egui::Button::new(
                                RichText::new("Cancel").color(Color32::WHITE),
                            )
                            .fill(Color32::from_rgb(0xCC, 0x2B, 0x52));
                            if ui.add(cancel).clicked() {
                                self.handle_cancel();
                            }
                            ui.add_space(20.0);

                            ui.horizontal(|ui| {
                                if running {
                                    ui.add(egui::Spinner::new().size(12.0));
                                }
                                ui.label(RichText::new(&self.status_message).italics());
                            });
                        });
                    });
            });

        self.ui_confirm_dialog(ctx);
        self.ui_notice(ctx);

        if self.active_run.is_some() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_with_log_dir(dir: PathBuf) -> ReminderApp {
        let mut app = ReminderApp::default();
        let mut config = AppConfig::load().unwrap();
        config.logging.dir = dir;
        app.config = Some(config);
        app
    }

    #[test]
    fn prepare_run_needs_config() {
        let mut app = ReminderApp::default();
        app.config = None;

        let err = app.prepare_run().unwrap_err();
        assert_eq!(err.to_string(), "Configuration is not loaded");
        assert!(app.tokio_rt.is_none());
    }

    #[test]
    fn runtime_exists_before_run_log_is_created() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where the log directory should go
        let blocked = dir.path().join("logs");
        std::fs::write(&blocked, b"").unwrap();
        let mut app = app_with_log_dir(blocked.clone());

        let err = app.prepare_run().unwrap_err();
        assert!(format!("{:#}", err).starts_with("Failed to create activity log"));
        assert!(app.tokio_rt.is_some());
        assert!(blocked.is_file());
    }

    #[test]
    fn prepare_run_creates_one_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let mut app = app_with_log_dir(log_dir.clone());

        let (_, _, run) = app.prepare_run().unwrap();

        assert!(run.log().path().starts_with(&log_dir));
        assert_eq!(std::fs::read_dir(&log_dir).unwrap().count(), 1);
        assert!(!run.cancel_flag().is_cancelled());
    }
}
