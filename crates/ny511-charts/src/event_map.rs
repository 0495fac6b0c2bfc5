//! Scatter map of event locations.

use crate::renderer::ChartRenderer;
use crate::style::{ChartStyle, FONT_FAMILY};
use async_trait::async_trait;
use ny511_common::{MapPoint, Result};
use plotters::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Padding added around the points, as a share of each span.
const PADDING_RATIO: f64 = 0.05;
/// Smallest padding in degrees, so a single point still gets a visible area.
const MIN_PADDING_DEG: f64 = 0.05;

/// Longitude/latitude window of the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// New York State, shown when there is nothing to plot.
pub const NEW_YORK_BOUNDS: MapBounds = MapBounds {
    min_lon: -79.8,
    max_lon: -71.8,
    min_lat: 40.4,
    max_lat: 45.1,
};

impl MapBounds {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.min_lon..=self.max_lon).contains(&lon) && (self.min_lat..=self.max_lat).contains(&lat)
    }
}

/// Window covering every plottable point with some padding.
pub fn map_bounds(points: &[MapPoint]) -> MapBounds {
    let mut positions = points.iter().filter_map(MapPoint::plot_position);
    let Some((lon, lat)) = positions.next() else {
        return NEW_YORK_BOUNDS;
    };

    let mut bounds = MapBounds {
        min_lon: lon,
        max_lon: lon,
        min_lat: lat,
        max_lat: lat,
    };
    for (lon, lat) in positions {
        bounds.min_lon = bounds.min_lon.min(lon);
        bounds.max_lon = bounds.max_lon.max(lon);
        bounds.min_lat = bounds.min_lat.min(lat);
        bounds.max_lat = bounds.max_lat.max(lat);
    }

    let pad_lon = ((bounds.max_lon - bounds.min_lon) * PADDING_RATIO).max(MIN_PADDING_DEG);
    let pad_lat = ((bounds.max_lat - bounds.min_lat) * PADDING_RATIO).max(MIN_PADDING_DEG);
    MapBounds {
        min_lon: (bounds.min_lon - pad_lon).max(-180.0),
        max_lon: (bounds.max_lon + pad_lon).min(180.0),
        min_lat: (bounds.min_lat - pad_lat).max(-90.0),
        max_lat: (bounds.max_lat + pad_lat).min(90.0),
    }
}

/// Half-opaque points over a dark background, one per event.
#[derive(Debug, Clone)]
pub struct EventMapChart {
    style: ChartStyle,
    title: String,
}

impl EventMapChart {
    pub fn new(style: ChartStyle) -> Self {
        Self {
            style,
            title: "Events".to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    fn draw(&self, points: &[MapPoint], path: &Path) -> Result<()> {
        let bounds = map_bounds(points);
        let positions: Vec<(f64, f64)> = points.iter().filter_map(MapPoint::plot_position).collect();
        let skipped = points.len() - positions.len();
        if skipped > 0 {
            debug!("{} events have no usable coordinates", skipped);
        }

        let fg = self.style.foreground;
        let root = BitMapBackend::new(path, self.style.size()).into_drawing_area();
        root.fill(&self.style.background)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                &self.title,
                (FONT_FAMILY, self.style.caption_size()).into_font().color(&fg),
            )
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(bounds.min_lon..bounds.max_lon, bounds.min_lat..bounds.max_lat)?;

        chart
            .configure_mesh()
            .x_desc("Longitude")
            .y_desc("Latitude")
            .axis_style(&fg)
            .bold_line_style(&fg.mix(0.15))
            .light_line_style(&fg.mix(0.05))
            .label_style((FONT_FAMILY, self.style.label_size()).into_font().color(&fg))
            .axis_desc_style((FONT_FAMILY, self.style.label_size()).into_font().color(&fg))
            .draw()?;

        let color = self.style.point.mix(self.style.point_opacity);
        let size = self.style.point_size as i32;
        chart.draw_series(
            positions
                .iter()
                .map(|&position| Circle::new(position, size, color.filled())),
        )?;

        root.present()?;
        info!(
            "Rendered {} events on map to {}",
            positions.len(),
            path.display()
        );
        Ok(())
    }
}

#[async_trait]
impl ChartRenderer for EventMapChart {
    type Data = Vec<MapPoint>;

    async fn render_to_file(&self, data: &Self::Data, path: &Path) -> Result<()> {
        self.draw(data, path)
    }

    fn name(&self) -> &'static str {
        "map"
    }

    fn description(&self) -> &'static str {
        "Event locations over longitude and latitude"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: Option<f64>, lon: Option<f64>) -> MapPoint {
        MapPoint {
            lat,
            lon,
            event_type: Some("accident".to_string()),
            organization_name: None,
            responding_org_id: None,
            location: None,
        }
    }

    #[test]
    fn test_empty_points_fall_back_to_new_york() {
        assert_eq!(map_bounds(&[]), NEW_YORK_BOUNDS);
        assert_eq!(map_bounds(&[point(None, Some(-73.9))]), NEW_YORK_BOUNDS);
    }

    #[test]
    fn test_bounds_cover_points_with_padding() {
        let points = vec![
            point(Some(40.7), Some(-74.0)),
            point(Some(42.7), Some(-73.8)),
            point(Some(f64::NAN), Some(-10.0)),
        ];
        let bounds = map_bounds(&points);
        assert!(bounds.contains(-74.0, 40.7));
        assert!(bounds.contains(-73.8, 42.7));
        assert!(bounds.min_lat < 40.7 && bounds.max_lat > 42.7);
        assert!(!bounds.contains(-10.0, 41.0));
    }

    #[test]
    fn test_single_point_gets_minimum_padding() {
        let bounds = map_bounds(&[point(Some(43.0), Some(-76.1))]);
        assert!((bounds.max_lon - bounds.min_lon - 2.0 * MIN_PADDING_DEG).abs() < 1e-9);
        assert!((bounds.max_lat - bounds.min_lat - 2.0 * MIN_PADDING_DEG).abs() < 1e-9);
    }

    #[test]
    fn test_renderer_metadata() {
        let chart = EventMapChart::new(ChartStyle::default()).with_title("January 1, 2020");
        assert_eq!(chart.name(), "map");
        assert_eq!(chart.title, "January 1, 2020");
    }
}
