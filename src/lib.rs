//! # Live HTML preview surfaces
//!
//! Renders a fenced block of raw HTML/CSS/script as a live preview inside a
//! sandboxed iframe that reports its content height back to the host, so the
//! host can size the frame to fit.
//!
//! ## Pieces
//! - [`document`] builds the surface's `srcdoc` document: reset styles, the
//!   user's markup, the measurement bootstrap, then the user's scripts
//! - [`reporter`] is the embedded height-reporting state machine (debounce,
//!   noise threshold, attempt bound, safety poll), host-driven and
//!   deterministically clocked
//! - [`measure`] holds the pluggable height strategies
//! - [`coordinator`] applies `resize-iframe` messages to the container of the
//!   surface that sent them
//! - [`host`] and [`page`] glue the above into iframe elements and a
//!   standalone page
//!
//! ## Example
//! ```ignore
//! use live_html::{HostView, PreviewConfig};
//!
//! let mut view = HostView::new(PreviewConfig::default())?;
//! let block = view.render_block("<div style='height:500px'></div>")?;
//! // insert `block.iframe_html` into the page, then feed posted messages:
//! view.dispatch(block.id, &serde_json::json!({"type": "resize-iframe", "height": 520}));
//! ```

pub mod config;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod host;
pub mod markup;
pub mod measure;
pub mod message;
pub mod page;
pub mod reporter;
pub mod sandbox;

pub use config::{PreviewConfig, RendererConfig};
pub use coordinator::{
    Container, ContainerPhase, ContainerStyle, Coordinator, Dispatch, HeightPolicy, Overflow,
    SurfaceId, CONTAINER_CLASS,
};
pub use document::{srcdoc_attribute, SurfaceDocument};
pub use error::{LiveHtmlError, LiveHtmlResult};
pub use host::{host_listener_script, HostView, RenderedBlock};
pub use markup::{extract_scripts, ExtractedMarkup, UserScript};
pub use measure::{
    ElementBox, HeightStrategy, LayoutProbe, MeasureError, MultiMetric, RootMetrics,
    ScrollHeightOnly, StrategyKind,
};
pub use message::{parse_message, HeightUpdate, MESSAGE_TYPE};
pub use page::render_markdown_page;
pub use reporter::{HeightReporter, ImageId, MutationKind, ReporterStats, SurfacePhase, Trigger};
pub use sandbox::{DialogPolicy, SandboxPolicy, SandboxToken};
