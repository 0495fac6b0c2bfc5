//! Bar chart of the busiest event types.

use crate::renderer::ChartRenderer;
use crate::style::{ChartStyle, FONT_FAMILY};
use async_trait::async_trait;
use ny511_common::{truncate_label, CategoryCount, Result};
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

const MAX_LABEL_CHARS: usize = 24;

/// Top of the value axis, leaving headroom above the tallest bar.
pub fn value_axis_max(counts: &[CategoryCount]) -> u64 {
    let busiest = counts.iter().map(|c| c.count).max().unwrap_or(0);
    busiest + busiest / 10 + 1
}

/// Vertical bars in the order given.
#[derive(Debug, Clone)]
pub struct CategoryBarChart {
    style: ChartStyle,
    title: String,
}

impl CategoryBarChart {
    pub fn new(style: ChartStyle) -> Self {
        Self {
            style,
            title: "Top event types".to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    fn draw(&self, counts: &[CategoryCount], path: &Path) -> Result<()> {
        let labels: Vec<String> = counts
            .iter()
            .map(|c| truncate_label(&c.event_type, MAX_LABEL_CHARS))
            .collect();
        let slots = counts.len().max(1) as u32;

        let fg = self.style.foreground;
        let root = BitMapBackend::new(path, self.style.size()).into_drawing_area();
        root.fill(&self.style.background)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                &self.title,
                (FONT_FAMILY, self.style.caption_size()).into_font().color(&fg),
            )
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d((0u32..slots).into_segmented(), 0u64..value_axis_max(counts))?;

        let category_label = |value: &SegmentValue<u32>| match value {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        };

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(slots as usize)
            .x_label_formatter(&category_label)
            .y_desc("Events")
            .axis_style(&fg)
            .bold_line_style(&fg.mix(0.15))
            .light_line_style(&fg.mix(0.05))
            .label_style((FONT_FAMILY, self.style.label_size()).into_font().color(&fg))
            .axis_desc_style((FONT_FAMILY, self.style.label_size()).into_font().color(&fg))
            .draw()?;

        chart.draw_series(
            Histogram::vertical(&chart)
                .style(self.style.bar.filled())
                .margin(12)
                .data(counts.iter().enumerate().map(|(i, c)| (i as u32, c.count))),
        )?;

        root.present()?;
        info!("Rendered {} categories to {}", counts.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl ChartRenderer for CategoryBarChart {
    type Data = Vec<CategoryCount>;

    async fn render_to_file(&self, data: &Self::Data, path: &Path) -> Result<()> {
        self.draw(data, path)
    }

    fn name(&self) -> &'static str {
        "categories"
    }

    fn description(&self) -> &'static str {
        "Most frequent event types in the selected range"
    }
}
