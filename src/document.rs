//! Builds the complete HTML document assigned to a surface's `srcdoc`.
//!
//! Order inside the document: reset styles (and dialog stubs) in the head,
//! then the user's markup, the measurement bootstrap, the user's scripts, and
//! a final re-measure once those scripts have run.

use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;

use crate::config::RendererConfig;
use crate::error::LiveHtmlResult;
use crate::markup::{extract_scripts, ExtractedMarkup, UserScript};
use crate::measure::StrategyKind;
use crate::reporter::HeightReporter;
use crate::sandbox::DialogPolicy;

const RESET_STYLES: &str = "*,*::before,*::after{box-sizing:border-box;}\
html,body{margin:0;width:100%;height:auto;}\
body{padding:__PADDING__px;\
font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;line-height:1.6;\
scrollbar-width:none;-ms-overflow-style:none;}\
html::-webkit-scrollbar,body::-webkit-scrollbar{display:none;}\
img,video{max-width:100%;height:auto;}\
canvas{display:block;max-width:100%;}\
input,textarea,select,button{max-width:100%;}";

/// Content sized in viewport units grows with the frame it is measured in.
const VIEWPORT_NEUTRALIZE_STYLES: &str = "\
html,body{height:auto!important;min-height:0!important;}\
[style*=\"vh\"]{min-height:0!important;}";

const DIALOG_STUBS: &str = r#"(function () {
  window.alert = function (message) { console.log("[alert]", message); };
  window.confirm = function (message) { console.log("[confirm]", message); return false; };
  window.prompt = function (message) { console.log("[prompt]", message); return null; };
})();"#;

/// Measurement bootstrap. Mirrors `HeightReporter`.
const BOOTSTRAP_TEMPLATE: &str = r#"(function () {
  var THRESHOLD = __THRESHOLD__, DEBOUNCE = __DEBOUNCE__, POLL = __POLL__;
  var MAX_ATTEMPTS = __MAX_ATTEMPTS__, FALLBACK = __FALLBACK__, MULTI = __MULTI__;
  var state = {
    attempts: 0, burst: false, lastSent: null, lastMeasured: null,
    flush: null, poll: null, disposed: false
  };

  function measure() {
    var root = document.body;
    if (!root) throw new Error("content root is not attached");
    var height = root.scrollHeight;
    if (!MULTI) return Math.ceil(height);
    height = Math.max(height, root.offsetHeight);
    var top = root.getBoundingClientRect().top;
    var lowest = 0;
    var nodes = root.querySelectorAll("*");
    for (var i = 0; i < nodes.length; i++) {
      var rect = nodes[i].getBoundingClientRect();
      if (rect.width === 0 && rect.height === 0) continue;
      if (rect.bottom - top > lowest) lowest = rect.bottom - top;
    }
    if (lowest > 0) {
      var padding = parseFloat(getComputedStyle(root).paddingBottom) || 0;
      height = Math.max(height, lowest + padding);
    }
    return Math.ceil(height);
  }

  function report() {
    if (state.disposed) return;
    var height;
    try {
      height = measure();
      state.lastMeasured = height;
    } catch (e) {
      height = state.lastMeasured !== null ? state.lastMeasured : FALLBACK;
    }
    if (state.lastSent !== null && Math.abs(height - state.lastSent) <= THRESHOLD) return;
    state.lastSent = height;
    window.parent.postMessage({ type: "__MESSAGE_TYPE__", height: height }, "*");
  }

  function schedule() {
    if (state.disposed) return;
    if (state.flush !== null) clearTimeout(state.flush);
    state.flush = setTimeout(function () {
      state.flush = null;
      state.burst = false;
      if (state.attempts >= MAX_ATTEMPTS) return;
      state.attempts++;
      report();
    }, DEBOUNCE);
  }

  function ready() {
    if (state.poll === null && !state.disposed) state.poll = setInterval(report, POLL);
    schedule();
  }

  function dispose() {
    state.disposed = true;
    observer.disconnect();
    if (state.flush !== null) clearTimeout(state.flush);
    if (state.poll !== null) clearInterval(state.poll);
    state.flush = null;
    state.burst = false;
    state.poll = null;
  }

  var observer = new MutationObserver(function (records) {
    var relevant = records.some(function (r) {
      return r.type === "childList" || r.attributeName === "style" || r.attributeName === "class";
    });
    if (!relevant) return;
    if (!state.burst) {
      state.burst = true;
      state.attempts = 0;
    }
    schedule();
  });
  observer.observe(document.body, {
    childList: true,
    subtree: true,
    attributes: true,
    attributeFilter: ["style", "class"]
  });

  var images = Array.prototype.slice.call(document.images);
  var pendingImages = images.length;
  images.forEach(function (img) {
    var settled = false;
    function settle() {
      if (settled) return;
      settled = true;
      pendingImages--;
      if (pendingImages === 0) schedule();
    }
    if (img.complete) {
      settle();
    } else {
      img.addEventListener("load", settle);
      img.addEventListener("error", settle);
    }
  });

  if (document.readyState === "complete") {
    ready();
  } else {
    window.addEventListener("load", ready);
  }
  window.addEventListener("resize", schedule);
  document.addEventListener("click", function () {
    state.attempts = 0;
    schedule();
  });
  window.addEventListener("pagehide", dispose);
  window.addEventListener("unload", dispose);
  window.__liveHtmlSchedule = schedule;
})();"#;

const POST_SCRIPT_REMEASURE: &str =
    "if (window.__liveHtmlSchedule) { window.__liveHtmlSchedule(); }";

/// A surface document for one markup fragment.
#[derive(Debug, Clone)]
pub struct SurfaceDocument {
    markup: ExtractedMarkup,
    renderer: RendererConfig,
    dialogs: DialogPolicy,
}

impl SurfaceDocument {
    /// `dialogs` should already be the effective policy for the surface's
    /// sandbox (see [`crate::SandboxPolicy::effective_dialogs`]).
    pub fn new(source: &str, renderer: &RendererConfig, dialogs: DialogPolicy) -> Self {
        Self {
            markup: extract_scripts(source),
            renderer: renderer.clone(),
            dialogs,
        }
    }

    /// User markup with scripts removed.
    pub fn body(&self) -> &str {
        &self.markup.body
    }

    pub fn scripts(&self) -> &[UserScript] {
        &self.markup.scripts
    }

    /// Number of `<img>` elements present in the static markup.
    pub fn image_count(&self) -> usize {
        static IMG_REGEX: OnceLock<Regex> = OnceLock::new();
        IMG_REGEX
            .get_or_init(|| Regex::new(r"(?i)<img\b").unwrap())
            .find_iter(&self.markup.body)
            .count()
    }

    /// A reporter configured like this document's bootstrap.
    pub fn reporter(&self) -> HeightReporter {
        HeightReporter::new(&self.renderer).with_images(self.image_count())
    }

    pub fn render(&self) -> LiveHtmlResult<String> {
        let padding = self.renderer.body_padding_px.to_string();
        let mut styles = RESET_STYLES.replace("__PADDING__", &padding);
        if self.renderer.neutralize_viewport_units {
            styles.push_str(VIEWPORT_NEUTRALIZE_STYLES);
        }

        let head_scripts = match self.dialogs {
            DialogPolicy::Suppressed => format!("<script>{}</script>\n", DIALOG_STUBS),
            DialogPolicy::Passthrough => String::new(),
        };

        let user_scripts: String = self
            .markup
            .scripts
            .iter()
            .map(UserScript::to_html)
            .collect::<Vec<_>>()
            .join("\n");

        let mut html = String::new();
        write!(
            html,
            r#"<!DOCTYPE html>
<html lang="{}">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Live Preview</title>
<style>{}</style>
{}</head>
<body>
{}
<script>{}</script>
{}
<script>{}</script>
</body>
</html>
"#,
            self.renderer.language,
            styles,
            head_scripts,
            self.markup.body,
            self.bootstrap(),
            user_scripts,
            POST_SCRIPT_REMEASURE,
        )?;
        Ok(html)
    }

    fn bootstrap(&self) -> String {
        let r = &self.renderer;
        BOOTSTRAP_TEMPLATE
            .replace("__THRESHOLD__", &r.noise_threshold_px.to_string())
            .replace("__DEBOUNCE__", &r.debounce_ms.to_string())
            .replace("__POLL__", &r.poll_interval_ms.to_string())
            .replace("__MAX_ATTEMPTS__", &r.max_attempts.to_string())
            .replace("__FALLBACK__", &r.fallback_height_px.to_string())
            .replace(
                "__MULTI__",
                if r.strategy == StrategyKind::MultiMetric { "true" } else { "false" },
            )
            .replace("__MESSAGE_TYPE__", crate::message::MESSAGE_TYPE)
    }
}

/// Escape a document for use as a double-quoted attribute value.
pub fn srcdoc_attribute(html: &str) -> String {
    escape_html(html)
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str, config: &RendererConfig, dialogs: DialogPolicy) -> String {
        SurfaceDocument::new(source, config, dialogs).render().unwrap()
    }

    #[test]
    fn test_sections_are_in_execution_order() {
        let html = render(
            "<p id='a'>hi</p><script>userCode()</script>",
            &RendererConfig::default(),
            DialogPolicy::Suppressed,
        );
        let reset = html.find("box-sizing:border-box").unwrap();
        let stubs = html.find("window.alert").unwrap();
        let markup = html.find("<p id='a'>hi</p>").unwrap();
        let bootstrap = html.find("new MutationObserver").unwrap();
        let user = html.find("userCode()").unwrap();
        let remeasure = html.find("window.__liveHtmlSchedule()").unwrap();
        assert!(reset < stubs && stubs < markup);
        assert!(markup < bootstrap && bootstrap < user && user < remeasure);
    }

    #[test]
    fn test_bootstrap_uses_config_constants() {
        let config = RendererConfig {
            noise_threshold_px: 7,
            debounce_ms: 60,
            poll_interval_ms: 2000,
            max_attempts: 6,
            strategy: StrategyKind::ScrollOnly,
            ..RendererConfig::default()
        };
        let html = render("<div></div>", &config, DialogPolicy::Suppressed);
        assert!(html.contains("var THRESHOLD = 7, DEBOUNCE = 60, POLL = 2000;"));
        assert!(html.contains("var MAX_ATTEMPTS = 6, FALLBACK = 150, MULTI = false;"));
        assert!(html.contains("if (!state.burst) {"));
        assert!(html.contains(r#"type: "resize-iframe""#));
        let placeholder = Regex::new(r"__[A-Z_]+__").unwrap();
        assert!(!placeholder.is_match(&html), "unreplaced placeholder");
    }

    #[test]
    fn test_passthrough_omits_dialog_stubs() {
        let html = render("<div></div>", &RendererConfig::default(), DialogPolicy::Passthrough);
        assert!(!html.contains("window.alert ="));
    }

    #[test]
    fn test_viewport_neutralization_is_optional() {
        let on = render("<div></div>", &RendererConfig::default(), DialogPolicy::Suppressed);
        assert!(on.contains("[style*=\"vh\"]"));
        let config = RendererConfig {
            neutralize_viewport_units: false,
            ..RendererConfig::default()
        };
        let off = render("<div></div>", &config, DialogPolicy::Suppressed);
        assert!(!off.contains("[style*=\"vh\"]"));
    }

    #[test]
    fn test_body_padding_and_language() {
        let config = RendererConfig {
            body_padding_px: 4,
            language: "ko".to_string(),
            ..RendererConfig::default()
        };
        let html = render("", &config, DialogPolicy::Suppressed);
        assert!(html.contains("<html lang=\"ko\">"));
        assert!(html.contains("body{padding:4px;"));
    }

    #[test]
    fn test_counts_static_images() {
        let doc = SurfaceDocument::new(
            "<img src=\"a.png\"><IMG src='b.png'><image-card></image-card>",
            &RendererConfig::default(),
            DialogPolicy::Suppressed,
        );
        // `<image-card` is not an img element.
        assert_eq!(doc.image_count(), 2);
        assert!(!doc.reporter().images_complete());
    }

    #[test]
    fn test_srcdoc_attribute_escapes_quotes() {
        assert_eq!(
            srcdoc_attribute(r#"<a href="x">&</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
    }
}
