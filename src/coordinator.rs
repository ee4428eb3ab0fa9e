//! Host-side resize coordination.
//!
//! The coordinator owns the containers of every live surface in a view and
//! applies incoming height updates to the one whose surface sent them.
//! Matching is by sender identity only: two blocks with identical markup are
//! still two surfaces and resize independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::invalid;
use crate::error::LiveHtmlResult;
use crate::message::HeightUpdate;

/// Marker class on every container this subsystem manages.
pub const CONTAINER_CLASS: &str = "live-html-iframe";

/// Identity of an embedded surface's message endpoint.
///
/// Allocated once per mount and never reused, so a message from a removed
/// surface cannot land on a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl SurfaceId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    #[default]
    Hidden,
    Auto,
}

impl Overflow {
    pub fn as_css(&self) -> &'static str {
        match self {
            Overflow::Hidden => "hidden",
            Overflow::Auto => "auto",
        }
    }
}

/// Presentation state of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStyle {
    pub height_px: u32,
    pub overflow: Overflow,
    /// CSS `transition` value, e.g. `height 0.25s ease`.
    pub transition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerPhase {
    AwaitingFirstHeight,
    Settled(u32),
}

#[derive(Debug, Clone)]
pub struct Container {
    pub id: SurfaceId,
    pub classes: Vec<String>,
    pub attached: bool,
    pub style: ContainerStyle,
    pub phase: ContainerPhase,
    /// Height last requested by the surface, before margin and clamping.
    requested: Option<u32>,
}

impl Container {
    /// Attached and carrying the marker class.
    pub fn is_candidate(&self) -> bool {
        self.attached && self.classes.iter().any(|c| c == CONTAINER_CLASS)
    }
}

/// How a requested height becomes a container height.
///
/// The applied height is `requested + margin_px`. With a viewport fraction
/// set, it is capped at `fraction * viewport_height` and the container
/// becomes scrollable while capped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeightPolicy {
    pub margin_px: u32,
    pub max_viewport_fraction: Option<f64>,
    pub transition_ms: u64,
}

impl Default for HeightPolicy {
    fn default() -> Self {
        Self {
            margin_px: 0,
            max_viewport_fraction: Some(0.85),
            transition_ms: 250,
        }
    }
}

impl HeightPolicy {
    /// No cap at all: the container always grows to fit.
    pub fn unclamped() -> Self {
        Self {
            max_viewport_fraction: None,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> LiveHtmlResult<()> {
        if let Some(fraction) = self.max_viewport_fraction {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(invalid(
                    "host.maxViewportFraction",
                    format!("{} is outside (0, 1]", fraction),
                ));
            }
        }
        Ok(())
    }

    pub fn transition_css(&self) -> String {
        format!("height {}s ease", self.transition_ms as f64 / 1000.0)
    }

    /// Height and overflow mode for a requested height.
    pub fn resolve(&self, requested: u32, viewport_height: u32) -> (u32, Overflow) {
        let wanted = requested.saturating_add(self.margin_px);
        match self.max_viewport_fraction {
            Some(fraction) => {
                let cap = (f64::from(viewport_height) * fraction).floor() as u32;
                if wanted > cap {
                    (cap, Overflow::Auto)
                } else {
                    (wanted, Overflow::Hidden)
                }
            }
            None => (wanted, Overflow::Hidden),
        }
    }
}

/// Outcome of handling one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The container's style changed.
    Applied { id: SurfaceId, height: u32 },
    /// Matched, but the style already matched the request.
    Unchanged(SurfaceId),
    /// A height update no live container claims.
    Unmatched,
    /// Not a height update.
    Ignored,
    /// The listener has been removed.
    Detached,
}

pub struct Coordinator {
    policy: HeightPolicy,
    viewport_height: u32,
    initial_height: u32,
    containers: Vec<Container>,
    next_id: u64,
    listening: bool,
}

impl Coordinator {
    pub fn new(policy: HeightPolicy, viewport_height: u32, initial_height: u32) -> Self {
        Self {
            policy,
            viewport_height,
            initial_height,
            containers: Vec::new(),
            next_id: 1,
            listening: true,
        }
    }

    pub fn policy(&self) -> &HeightPolicy {
        &self.policy
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Create and attach a container for a new surface.
    pub fn mount(&mut self) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.containers.push(Container {
            id,
            classes: vec![CONTAINER_CLASS.to_string()],
            attached: true,
            style: ContainerStyle {
                height_px: self.initial_height,
                overflow: Overflow::Hidden,
                transition: self.policy.transition_css(),
            },
            phase: ContainerPhase::AwaitingFirstHeight,
            requested: None,
        });
        id
    }

    /// Detach a container from the document. Its surface may keep posting;
    /// those messages no longer match.
    pub fn unmount(&mut self, id: SurfaceId) -> bool {
        match self.containers.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                c.attached = false;
                true
            }
            None => false,
        }
    }

    /// Drop detached containers.
    pub fn prune(&mut self) {
        self.containers.retain(|c| c.attached);
    }

    pub fn container(&self, id: SurfaceId) -> Option<&Container> {
        self.containers.iter().find(|c| c.id == id)
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.iter()
    }

    /// Handle a message posted by `source`.
    pub fn handle(&mut self, source: SurfaceId, data: &Value) -> Dispatch {
        if !self.listening {
            return Dispatch::Detached;
        }
        let Some(update) = HeightUpdate::from_value(data) else {
            return Dispatch::Ignored;
        };
        self.apply(source, update)
    }

    pub fn apply(&mut self, source: SurfaceId, update: HeightUpdate) -> Dispatch {
        if !self.listening {
            return Dispatch::Detached;
        }
        let viewport = self.viewport_height;
        let policy = &self.policy;
        let Some(container) = self
            .containers
            .iter_mut()
            .find(|c| c.is_candidate() && c.id == source)
        else {
            trace!(source = source.get(), "height update from unknown surface");
            return Dispatch::Unmatched;
        };

        container.requested = Some(update.height);
        let (height, overflow) = policy.resolve(update.height, viewport);
        let changed = set_style(container, height, overflow);
        container.phase = ContainerPhase::Settled(height);
        if changed {
            debug!(
                source = source.get(),
                requested = update.height,
                height,
                "resized container"
            );
            Dispatch::Applied { id: source, height }
        } else {
            Dispatch::Unchanged(source)
        }
    }

    /// The host viewport changed; caps are re-evaluated for settled containers.
    pub fn set_viewport_height(&mut self, viewport_height: u32) {
        self.viewport_height = viewport_height;
        for container in self.containers.iter_mut().filter(|c| c.attached) {
            if let Some(requested) = container.requested {
                let (height, overflow) = self.policy.resolve(requested, viewport_height);
                if set_style(container, height, overflow) {
                    container.phase = ContainerPhase::Settled(height);
                }
            }
        }
    }

    /// Remove the message listener. Later messages are dropped without touching
    /// any container.
    pub fn detach(&mut self) {
        if self.listening {
            debug!(containers = self.containers.len(), "detaching resize listener");
        }
        self.listening = false;
    }
}

fn set_style(container: &mut Container, height: u32, overflow: Overflow) -> bool {
    if container.style.height_px == height && container.style.overflow == overflow {
        return false;
    }
    container.style.height_px = height;
    container.style.overflow = overflow;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(height: u32) -> Value {
        json!({"type": "resize-iframe", "height": height})
    }

    #[test]
    fn test_new_container_awaits_first_height() {
        let mut coord = Coordinator::new(HeightPolicy::default(), 1000, 200);
        let id = coord.mount();
        let c = coord.container(id).unwrap();
        assert_eq!(c.phase, ContainerPhase::AwaitingFirstHeight);
        assert_eq!(c.style.height_px, 200);
        assert_eq!(c.style.transition, "height 0.25s ease");
        assert!(c.is_candidate());
    }

    #[test]
    fn test_applies_height_with_margin() {
        let policy = HeightPolicy {
            margin_px: 15,
            ..HeightPolicy::unclamped()
        };
        let mut coord = Coordinator::new(policy, 1000, 200);
        let id = coord.mount();
        assert_eq!(coord.handle(id, &msg(500)), Dispatch::Applied { id, height: 515 });
        assert_eq!(coord.container(id).unwrap().phase, ContainerPhase::Settled(515));
    }

    #[test]
    fn test_clamps_to_viewport_fraction() {
        let mut coord = Coordinator::new(HeightPolicy::default(), 1000, 200);
        let id = coord.mount();
        assert_eq!(coord.handle(id, &msg(2000)), Dispatch::Applied { id, height: 850 });
        assert_eq!(coord.container(id).unwrap().style.overflow, Overflow::Auto);

        assert_eq!(coord.handle(id, &msg(300)), Dispatch::Applied { id, height: 300 });
        assert_eq!(coord.container(id).unwrap().style.overflow, Overflow::Hidden);
    }

    #[test]
    fn test_viewport_growth_releases_clamp() {
        let mut coord = Coordinator::new(HeightPolicy::default(), 1000, 200);
        let id = coord.mount();
        coord.handle(id, &msg(1200));
        coord.set_viewport_height(2000);
        let c = coord.container(id).unwrap();
        assert_eq!(c.style.height_px, 1200);
        assert_eq!(c.style.overflow, Overflow::Hidden);
    }

    #[test]
    fn test_same_height_twice_is_unchanged() {
        let mut coord = Coordinator::new(HeightPolicy::default(), 1000, 200);
        let id = coord.mount();
        assert!(matches!(coord.handle(id, &msg(320)), Dispatch::Applied { .. }));
        assert_eq!(coord.handle(id, &msg(320)), Dispatch::Unchanged(id));
    }

    #[test]
    fn test_non_height_messages_are_ignored() {
        let mut coord = Coordinator::new(HeightPolicy::default(), 1000, 200);
        let id = coord.mount();
        assert_eq!(coord.handle(id, &json!({"type": "ping"})), Dispatch::Ignored);
        assert_eq!(coord.container(id).unwrap().style.height_px, 200);
    }

    #[test]
    fn test_unmounted_container_no_longer_matches() {
        let mut coord = Coordinator::new(HeightPolicy::default(), 1000, 200);
        let id = coord.mount();
        assert!(coord.unmount(id));
        assert_eq!(coord.handle(id, &msg(400)), Dispatch::Unmatched);
        coord.prune();
        assert!(coord.container(id).is_none());
        assert!(!coord.unmount(id));
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut coord = Coordinator::new(HeightPolicy::default(), 1000, 200);
        let a = coord.mount();
        coord.unmount(a);
        coord.prune();
        let b = coord.mount();
        assert_ne!(a, b);
        assert_eq!(coord.handle(a, &msg(400)), Dispatch::Unmatched);
    }

    #[test]
    fn test_policy_validation() {
        let bad = HeightPolicy {
            max_viewport_fraction: Some(1.5),
            ..HeightPolicy::default()
        };
        assert!(bad.validate().is_err());
        assert!(HeightPolicy::unclamped().validate().is_ok());
    }
}
