//! Content-height measurement.
//!
//! The surface's canonical height comes from DOM metrics of its content root
//! (`document.body`). A [`LayoutProbe`] exposes those metrics; a
//! [`HeightStrategy`] turns them into one pixel height.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasureError {
    #[error("content root is not attached")]
    NoContentRoot,

    #[error("layout traversal failed: {0}")]
    Traversal(String),
}

/// Metrics of the content root element, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RootMetrics {
    pub scroll_height: f64,
    pub offset_height: f64,
    pub padding_top: f64,
    pub padding_bottom: f64,
}

/// Bounding box of a descendant, relative to the content root's top edge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElementBox {
    pub top: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementBox {
    /// Boxes with no extent (`display:none`, empty inline elements) carry no layout.
    pub fn has_layout(&self) -> bool {
        self.width > 0.0 || self.height > 0.0
    }
}

/// Read access to the surface's layout.
pub trait LayoutProbe {
    fn content_root(&self) -> Result<RootMetrics, MeasureError>;
    fn descendants(&self) -> Result<Vec<ElementBox>, MeasureError>;
}

/// Turns layout metrics into a single content height.
pub trait HeightStrategy {
    fn measure(&self, probe: &dyn LayoutProbe) -> Result<u32, MeasureError>;
}

/// Max of scrollHeight, offsetHeight and the lowest descendant's bottom edge.
///
/// Survives collapsed margins and absolutely positioned content, which
/// scrollHeight alone under-reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiMetric;

impl HeightStrategy for MultiMetric {
    fn measure(&self, probe: &dyn LayoutProbe) -> Result<u32, MeasureError> {
        let root = probe.content_root()?;
        // Descendant boxes are measured from the root's border edge, which
        // already includes padding-top; only the bottom padding is missing.
        let lowest = probe
            .descendants()?
            .iter()
            .filter(|b| b.has_layout())
            .map(|b| b.bottom)
            .fold(0.0_f64, f64::max);
        let content_bottom = if lowest > 0.0 {
            lowest + root.padding_bottom
        } else {
            0.0
        };
        let height = root
            .scroll_height
            .max(root.offset_height)
            .max(content_bottom);
        Ok(to_pixels(height))
    }
}

/// `scrollHeight` of the content root, nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollHeightOnly;

impl HeightStrategy for ScrollHeightOnly {
    fn measure(&self, probe: &dyn LayoutProbe) -> Result<u32, MeasureError> {
        Ok(to_pixels(probe.content_root()?.scroll_height))
    }
}

/// Strategy selector used by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    #[default]
    MultiMetric,
    ScrollOnly,
}

impl StrategyKind {
    pub fn strategy(&self) -> Box<dyn HeightStrategy> {
        match self {
            StrategyKind::MultiMetric => Box::new(MultiMetric),
            StrategyKind::ScrollOnly => Box::new(ScrollHeightOnly),
        }
    }
}

fn to_pixels(height: f64) -> u32 {
    if !height.is_finite() || height <= 0.0 {
        return 0;
    }
    height.ceil().min(f64::from(u32::MAX)) as u32
}
