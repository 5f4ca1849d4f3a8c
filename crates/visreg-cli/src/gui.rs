//! Desktop window
//!
//! The run executes on a worker thread; the window polls a channel each frame
//! and keeps the Run button disabled until the worker reports back.

use crate::error::{CliError, CliResult};
use crate::form::{decode_preview, DataSource, RunForm, PREVIEWS_PER_ROW};
use eframe::egui::{self, Color32, ComboBox, Context, TextureHandle};
use eframe::{App, Frame, NativeOptions};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;
use visreg::report::COLUMNS;
use visreg::{AppConfig, Pipeline, ReportRow, RunSummary, Scenario, Status, TestData};

enum WorkerMessage {
    Finished(Box<RunSummary>),
}

struct Preview {
    label: String,
    texture: TextureHandle,
    size: egui::Vec2,
}

/// Window state
pub struct VisregApp {
    config: AppConfig,
    test_data: TestData,
    form: RunForm,
    show_custom: bool,
    running: bool,
    status: String,
    rows: Vec<ReportRow>,
    previews: Vec<Preview>,
    rx: Option<Receiver<WorkerMessage>>,
}

impl std::fmt::Debug for VisregApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisregApp")
            .field("form", &self.form)
            .field("running", &self.running)
            .field("rows", &self.rows.len())
            .field("previews", &self.previews.len())
            .finish_non_exhaustive()
    }
}

impl VisregApp {
    /// Create the window state
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let test_data = TestData::load(&config.test_data_path);
        Self {
            config,
            test_data,
            form: RunForm::default(),
            show_custom: false,
            running: false,
            status: "Idle".to_string(),
            rows: Vec::new(),
            previews: Vec::new(),
            rx: None,
        }
    }

    fn start(&mut self, ctx: &Context) {
        if self.running {
            return;
        }
        self.running = true;
        self.status = format!("Running {}...", self.form.scenario);
        self.rows.clear();
        self.previews.clear();

        let (tx, rx) = mpsc::channel();
        self.rx = Some(rx);
        let config = self.config.clone().with_previews(true);
        let run = self.form.to_run_configuration();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let summary = Pipeline::new(config).run(&run);
            let _ = tx.send(WorkerMessage::Finished(Box::new(summary)));
            ctx.request_repaint();
        });
    }

    fn poll(&mut self, ctx: &Context) {
        let Some(rx) = &self.rx else {
            return;
        };
        let received = rx.try_recv();
        match received {
            Ok(WorkerMessage::Finished(summary)) => {
                self.finish(ctx, &summary);
                self.rx = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.running = false;
                self.status = "Run stopped unexpectedly".to_string();
                self.rx = None;
            }
        }
    }

    fn finish(&mut self, ctx: &Context, summary: &RunSummary) {
        self.running = false;
        self.rows = summary.report.rows().to_vec();
        self.previews = summary
            .previews
            .iter()
            .filter_map(|capture| {
                let decoded = decode_preview(&capture.png)?;
                let image = egui::ColorImage::from_rgba_unmultiplied(decoded.size, &decoded.rgba);
                let label = capture
                    .record
                    .file_path
                    .file_name()
                    .map_or_else(|| capture.record.description.clone(), |n| n.to_string_lossy().into_owned());
                let texture = ctx.load_texture(label.clone(), image, egui::TextureOptions::default());
                Some(Preview {
                    label,
                    texture,
                    size: egui::Vec2::from(decoded.display_size()),
                })
            })
            .collect();
        self.status = format!(
            "Done: {} passed, {} failed in {:.1}s",
            summary.report.success_count(),
            summary.report.failure_count(),
            summary.elapsed.as_secs_f64()
        );
    }

    fn ui_form(&mut self, ui: &mut egui::Ui) {
        let before = (self.form.scenario, self.form.source);

        egui::Grid::new("run_form").num_columns(2).show(ui, |ui| {
            ui.label("Scenario");
            ComboBox::from_id_salt("scenario")
                .selected_text(self.form.scenario.as_str())
                .show_ui(ui, |ui| {
                    for scenario in Scenario::ALL {
                        ui.selectable_value(&mut self.form.scenario, scenario, scenario.as_str());
                    }
                });
            ui.end_row();

            ui.label("Website");
            ui.text_edit_singleline(&mut self.form.website);
            ui.end_row();

            ui.label("Email");
            ui.text_edit_singleline(&mut self.form.email);
            ui.end_row();

            ui.label("Data");
            ui.horizontal(|ui| {
                ui.radio_value(&mut self.form.source, DataSource::TestData, "Default data");
                ui.add_enabled_ui(self.form.accepts_custom_data(), |ui| {
                    ui.radio_value(&mut self.form.source, DataSource::Custom, "Custom data");
                });
            });
            ui.end_row();
        });

        if !self.form.accepts_custom_data() {
            self.form.source = DataSource::TestData;
        }
        if (self.form.scenario, self.form.source) != before && self.form.source == DataSource::Custom {
            self.form.prefill(&self.test_data);
            self.show_custom = true;
        }

        ui.horizontal(|ui| {
            let run_clicked = ui
                .add_enabled(!self.running, egui::Button::new("Run"))
                .clicked();
            if self.form.source == DataSource::Custom && ui.button("Edit data").clicked() {
                self.show_custom = true;
            }
            if self.running {
                ui.spinner();
            }
            ui.label(&self.status);
            if run_clicked {
                self.start(ui.ctx());
            }
        });
    }

    fn ui_custom_data(&mut self, ctx: &Context) {
        if !self.show_custom {
            return;
        }
        let mut open = true;
        let mut saved = false;
        egui::Window::new("Custom Data")
            .open(&mut open)
            .show(ctx, |ui| {
                egui::Grid::new("custom_fields").num_columns(2).show(ui, |ui| {
                    for field in self.form.scenario.custom_fields() {
                        ui.label(*field);
                        let value = self.form.custom.entry((*field).to_string()).or_default();
                        ui.text_edit_singleline(value);
                        ui.end_row();
                    }
                });
                saved = ui.button("Save").clicked();
            });
        self.show_custom = open && !saved;
    }

    fn ui_report(&self, ui: &mut egui::Ui) {
        if self.rows.is_empty() {
            return;
        }
        ui.heading("Report");
        egui::Grid::new("report").striped(true).show(ui, |ui| {
            for header in COLUMNS {
                ui.strong(header);
            }
            ui.end_row();
            for row in &self.rows {
                for (i, cell) in row.cells().iter().enumerate() {
                    if i == 1 {
                        let color = match row.status {
                            Status::Success => Color32::from_rgb(0, 150, 0),
                            Status::Failure => Color32::from_rgb(200, 0, 0),
                        };
                        ui.colored_label(color, *cell);
                    } else {
                        ui.label(*cell);
                    }
                }
                ui.end_row();
            }
        });
    }

    fn ui_previews(&self, ui: &mut egui::Ui) {
        if self.previews.is_empty() {
            return;
        }
        ui.heading("Screenshots");
        for chunk in self.previews.chunks(PREVIEWS_PER_ROW) {
            ui.horizontal(|ui| {
                for preview in chunk {
                    ui.vertical(|ui| {
                        ui.label(&preview.label);
                        let texture =
                            egui::load::SizedTexture::new(preview.texture.id(), preview.size);
                        ui.add(egui::Image::new(texture).fit_to_exact_size(preview.size));
                    });
                }
            });
        }
    }
}

impl App for VisregApp {
    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        self.poll(ctx);
        self.ui_custom_data(ctx);
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    ui.heading("Visreg");
                    ui.separator();
                    self.ui_form(ui);
                    ui.separator();
                    self.ui_report(ui);
                    self.ui_previews(ui);
                });
        });
        if self.running {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}

/// Open the window and block until it closes
pub fn launch(config: AppConfig) -> CliResult<()> {
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1300.0, 900.0])
            .with_title("Visreg"),
        ..Default::default()
    };
    eframe::run_native(
        "Visreg",
        options,
        Box::new(move |_cc| Ok(Box::new(VisregApp::new(config)))),
    )
    .map_err(|e| CliError::gui(e.to_string()))
}
