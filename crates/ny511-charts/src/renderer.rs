//! Chart renderer trait and the error-state image.

use crate::style::{ChartStyle, FONT_FAMILY};
use async_trait::async_trait;
use ny511_common::{truncate_label, Result};
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

/// A chart that can be written to an image file.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// The series this chart draws.
    type Data: Send + Sync;

    /// Render `data` as a PNG at `path`.
    async fn render_to_file(&self, data: &Self::Data, path: &Path) -> Result<()>;

    /// Short identifier, also used as the output file stem.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;
}

/// Placeholder image shown in place of a chart whose data could not be fetched.
#[derive(Debug, Clone)]
pub struct ErrorChart {
    style: ChartStyle,
    title: String,
}

impl ErrorChart {
    pub fn new(style: ChartStyle, title: impl Into<String>) -> Self {
        Self {
            style,
            title: title.into(),
        }
    }

    fn draw(&self, message: &str, path: &Path) -> Result<()> {
        let root = BitMapBackend::new(path, self.style.size()).into_drawing_area();
        root.fill(&self.style.background)?;

        let caption = (FONT_FAMILY, self.style.caption_size())
            .into_font()
            .color(&self.style.foreground);
        let body = (FONT_FAMILY, self.style.label_size())
            .into_font()
            .color(&RGBColor(229, 83, 75));

        let x = (self.style.width / 20) as i32;
        let y = (self.style.height / 3) as i32;
        root.draw(&Text::new(self.title.clone(), (x, y), caption))?;
        root.draw(&Text::new(
            format!("Data unavailable: {}", truncate_label(message, 160)),
            (x, y + 2 * self.style.caption_size() as i32),
            body,
        ))?;

        root.present()?;
        info!("Rendered error chart to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl ChartRenderer for ErrorChart {
    /// The error message to show.
    type Data = String;

    async fn render_to_file(&self, data: &Self::Data, path: &Path) -> Result<()> {
        self.draw(data, path)
    }

    fn name(&self) -> &'static str {
        "error"
    }

    fn description(&self) -> &'static str {
        "Error state for a view whose data could not be fetched"
    }
}
