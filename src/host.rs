//! Host view: mounts one surface per rendered block and routes messages to
//! the coordinator.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PreviewConfig;
use crate::coordinator::{Coordinator, Dispatch, HeightPolicy, SurfaceId, CONTAINER_CLASS};
use crate::document::{escape_html, srcdoc_attribute, SurfaceDocument};
use crate::error::{LiveHtmlError, LiveHtmlResult};

/// Viewport height assumed until the host reports one.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 900;

/// One rendered block.
#[derive(Debug, Clone)]
pub struct RenderedBlock {
    pub id: SurfaceId,
    pub document: SurfaceDocument,
    /// The `<iframe>` element carrying the document as `srcdoc`.
    pub iframe_html: String,
}

pub struct HostView {
    config: PreviewConfig,
    coordinator: Coordinator,
    closed: bool,
}

impl HostView {
    pub fn new(config: PreviewConfig) -> LiveHtmlResult<Self> {
        Self::with_viewport(config, DEFAULT_VIEWPORT_HEIGHT)
    }

    pub fn with_viewport(config: PreviewConfig, viewport_height: u32) -> LiveHtmlResult<Self> {
        config.validate()?;
        let coordinator = Coordinator::new(
            config.host.clone(),
            viewport_height,
            config.renderer.initial_height_px,
        );
        Ok(Self {
            config,
            coordinator,
            closed: false,
        })
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut Coordinator {
        &mut self.coordinator
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Render a markup fragment into a new surface. Fails once the view has
    /// been closed.
    pub fn render_block(&mut self, markup: &str) -> LiveHtmlResult<RenderedBlock> {
        if self.closed {
            warn!("render requested on a closed view");
            return Err(LiveHtmlError::ViewClosed);
        }
        let dialogs = self.config.sandbox.effective_dialogs(self.config.dialogs);
        let document = SurfaceDocument::new(markup, &self.config.renderer, dialogs);
        let srcdoc = srcdoc_attribute(&document.render()?);
        let id = self.coordinator.mount();
        let iframe_html = format!(
            "<iframe class=\"{}\" data-surface-id=\"{}\" sandbox=\"{}\" scrolling=\"no\" \
style=\"{}\" srcdoc=\"{}\"></iframe>",
            CONTAINER_CLASS,
            id.get(),
            escape_html(&self.config.sandbox.attribute_value()),
            escape_html(&self.initial_style()),
            srcdoc,
        );
        debug!(
            surface = id.get(),
            scripts = document.scripts().len(),
            "rendered live block"
        );
        Ok(RenderedBlock {
            id,
            document,
            iframe_html,
        })
    }

    pub fn dispatch(&mut self, source: SurfaceId, data: &Value) -> Dispatch {
        self.coordinator.handle(source, data)
    }

    /// Dispose the view: detach the listener and the containers.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.coordinator.detach();
        let ids: Vec<SurfaceId> = self.coordinator.containers().map(|c| c.id).collect();
        for id in ids {
            self.coordinator.unmount(id);
        }
        self.coordinator.prune();
    }

    fn initial_style(&self) -> String {
        format!(
            "width:100%;height:{}px;border:1px solid var(--background-modifier-border, #ddd);\
border-radius:4px;background-color:white;overflow:hidden;transition:{};",
            self.config.renderer.initial_height_px,
            self.config.host.transition_css(),
        )
    }
}

impl Drop for HostView {
    fn drop(&mut self) {
        self.close();
    }
}

const HOST_LISTENER_TEMPLATE: &str = r#"(function () {
  var MARGIN = __MARGIN__, MAX_FRACTION = __MAX_FRACTION__;
  function frames() {
    return document.querySelectorAll("iframe.__CONTAINER_CLASS__");
  }
  function applyPolicy(frame) {
    var height = Number(frame.dataset.requested) + MARGIN;
    var overflow = "hidden";
    if (MAX_FRACTION !== null) {
      var cap = Math.floor(window.innerHeight * MAX_FRACTION);
      if (height > cap) {
        height = cap;
        overflow = "auto";
      }
    }
    var next = height + "px";
    if (frame.style.height !== next) frame.style.height = next;
    if (frame.style.overflow !== overflow) {
      frame.style.overflow = overflow;
      frame.setAttribute("scrolling", overflow === "auto" ? "yes" : "no");
    }
  }
  function onMessage(event) {
    var data = event.data;
    if (!data || data.type !== "__MESSAGE_TYPE__") return;
    var requested = data.height;
    if (typeof requested !== "number" || !isFinite(requested) || requested < 0) return;
    var all = frames();
    for (var i = 0; i < all.length; i++) {
      if (all[i].contentWindow !== event.source) continue;
      all[i].dataset.requested = String(Math.round(requested));
      applyPolicy(all[i]);
      return;
    }
  }
  function onResize() {
    var all = frames();
    for (var i = 0; i < all.length; i++) {
      if (all[i].dataset.requested !== undefined) applyPolicy(all[i]);
    }
  }
  function dispose() {
    window.removeEventListener("message", onMessage);
    window.removeEventListener("resize", onResize);
  }
  window.addEventListener("message", onMessage);
  window.addEventListener("resize", onResize);
  (window.__liveHtmlDisposers = window.__liveHtmlDisposers || []).push(dispose);
  return dispose;
})();"#;

/// Host-side listener script implementing `policy`. The script evaluates to
/// its dispose function, which removes the message and resize listeners; it
/// is also pushed onto `window.__liveHtmlDisposers` so several views on one
/// page can each be torn down.
pub fn host_listener_script(policy: &HeightPolicy) -> String {
    let fraction = policy
        .max_viewport_fraction
        .map(|f| f.to_string())
        .unwrap_or_else(|| "null".to_string());
    HOST_LISTENER_TEMPLATE
        .replace("__MARGIN__", &policy.margin_px.to_string())
        .replace("__MAX_FRACTION__", &fraction)
        .replace("__MESSAGE_TYPE__", crate::message::MESSAGE_TYPE)
        .replace("__CONTAINER_CLASS__", CONTAINER_CLASS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_iframe_carries_marker_and_sandbox() {
        let mut view = HostView::new(PreviewConfig::default()).unwrap();
        let block = view.render_block("<p>hello</p>").unwrap();
        assert!(block.iframe_html.starts_with("<iframe class=\"live-html-iframe\""));
        assert!(block
            .iframe_html
            .contains("sandbox=\"allow-scripts allow-same-origin allow-forms allow-popups\""));
        assert!(block.iframe_html.contains("scrolling=\"no\""));
        assert!(block.iframe_html.contains("height:200px;"));
        assert!(block.iframe_html.contains("&lt;p&gt;hello&lt;/p&gt;"));
    }

    #[test]
    fn test_close_detaches_listener() {
        let mut view = HostView::new(PreviewConfig::default()).unwrap();
        let block = view.render_block("<p>x</p>").unwrap();
        view.close();
        assert!(view.is_closed());
        assert!(!view.coordinator().is_listening());
        assert_eq!(
            view.dispatch(block.id, &json!({"type": "resize-iframe", "height": 300})),
            Dispatch::Detached
        );
        // Closing twice is harmless.
        view.close();
    }

    #[test]
    fn test_render_after_close_fails_without_mounting() {
        let mut view = HostView::new(PreviewConfig::default()).unwrap();
        view.close();
        assert_eq!(
            view.render_block("<p>late</p>").unwrap_err(),
            LiveHtmlError::ViewClosed
        );
        assert_eq!(view.coordinator().containers().count(), 0);
        assert!(!view.coordinator().is_listening());
    }

    #[test]
    fn test_listener_script_embeds_policy() {
        let script = host_listener_script(&HeightPolicy {
            margin_px: 15,
            max_viewport_fraction: Some(0.8),
            transition_ms: 300,
        });
        assert!(script.contains("var MARGIN = 15, MAX_FRACTION = 0.8;"));
        assert!(script.contains("iframe.live-html-iframe"));
        assert!(script.contains("removeEventListener(\"message\", onMessage)"));
        assert!(script.contains("window.addEventListener(\"resize\", onResize)"));
        assert!(script.contains("removeEventListener(\"resize\", onResize)"));
        assert!(script.contains("window.__liveHtmlDisposers || []).push(dispose);"));
        assert!(script.contains("return dispose;"));
        assert!(!script.contains("window.__liveHtmlDispose ="));

        let unclamped = host_listener_script(&HeightPolicy::unclamped());
        assert!(unclamped.contains("MAX_FRACTION = null;"));
    }
}
