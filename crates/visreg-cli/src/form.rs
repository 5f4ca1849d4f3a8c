//! Run form state shared by the desktop window
//!
//! Kept free of egui so the form logic can be tested without a display.

use visreg::{FormData, RunConfiguration, Scenario, TestData};

/// Preview width in the screenshot grid
pub const PREVIEW_WIDTH: f32 = 600.0;

/// Previews per grid row
pub const PREVIEWS_PER_ROW: usize = 2;

/// Where form values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSource {
    /// The test data file
    #[default]
    TestData,
    /// Values typed into the custom data dialog
    Custom,
}

/// What the user has entered so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunForm {
    /// Selected scenario
    pub scenario: Scenario,
    /// Website entry point
    pub website: String,
    /// Report recipient
    pub email: String,
    /// Data source
    pub source: DataSource,
    /// Custom values for the selected scenario
    pub custom: FormData,
}

impl Default for RunForm {
    fn default() -> Self {
        Self {
            scenario: Scenario::Register,
            website: String::new(),
            email: String::new(),
            source: DataSource::TestData,
            custom: FormData::new(),
        }
    }
}

impl RunForm {
    /// Reset the custom values to the scenario's fields, filled from test data
    pub fn prefill(&mut self, data: &TestData) {
        let known = data.for_scenario(self.scenario);
        self.custom = self
            .scenario
            .custom_fields()
            .iter()
            .map(|field| {
                let value = known.get(*field).cloned().unwrap_or_default();
                ((*field).to_string(), value)
            })
            .collect();
    }

    /// Check if the scenario takes custom values at all
    #[must_use]
    pub fn accepts_custom_data(&self) -> bool {
        !self.scenario.custom_fields().is_empty()
    }

    /// Run configuration for the current form
    #[must_use]
    pub fn to_run_configuration(&self) -> RunConfiguration {
        let run = RunConfiguration::new(self.scenario, self.website.trim(), self.email.trim());
        match self.source {
            DataSource::Custom => run.with_custom_data(self.custom.clone()),
            DataSource::TestData => run,
        }
    }
}

/// Decoded RGBA preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPreview {
    /// Width and height in pixels
    pub size: [usize; 2],
    /// Row-major RGBA bytes
    pub rgba: Vec<u8>,
}

impl DecodedPreview {
    /// Display size at [`PREVIEW_WIDTH`], keeping the aspect ratio
    #[must_use]
    pub fn display_size(&self) -> [f32; 2] {
        let [w, h] = self.size;
        if w == 0 {
            return [PREVIEW_WIDTH, 0.0];
        }
        [PREVIEW_WIDTH, PREVIEW_WIDTH * h as f32 / w as f32]
    }
}

/// Decode PNG bytes for display; `None` with a warning when unreadable
#[must_use]
pub fn decode_preview(png: &[u8]) -> Option<DecodedPreview> {
    match image::load_from_memory(png) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            Some(DecodedPreview {
                size: [w as usize, h as usize],
                rgba: rgba.into_raw(),
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot decode preview");
            None
        }
    }
}
