//! # Animation Types
//!
//! Wire shape of the entries carried by an `Animate` operation, plus the
//! easing curves the host applies while stepping them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::Path;

/// Easing curve for a tween
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Ease {
    #[default]
    Linear,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
}

impl Ease {
    /// Map linear progress `t` in `[0, 1]` onto the curve
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::EaseInQuad => t * t,
            Ease::EaseOutQuad => t * (2.0 - t),
            Ease::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Ease::EaseInCubic => t * t * t,
            Ease::EaseOutCubic => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Ease::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = 2.0 * t - 2.0;
                    0.5 * u * u * u + 1.0
                }
            }
        }
    }
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

/// One tween: drive the value at `path` towards `to` over `duration` seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub path: Path,

    /// Target value: a number or an array of numbers
    pub to: Value,

    /// Length of the tween in seconds
    pub duration: f64,

    /// Seconds to wait before starting
    #[serde(default, skip_serializing_if = "is_zero")]
    pub delay: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ease: Option<Ease>,

    /// Callback notified with the final value once the tween completes
    #[serde(default, rename = "callbackID", skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
}

impl Animation {
    pub fn new(path: Path, to: Value, duration: f64) -> Self {
        Self {
            path,
            to,
            duration,
            delay: 0.0,
            ease: None,
            callback_id: None,
        }
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_ease(mut self, ease: Ease) -> Self {
        self.ease = Some(ease);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_hit_endpoints() {
        for ease in [
            Ease::Linear,
            Ease::EaseInQuad,
            Ease::EaseOutQuad,
            Ease::EaseInOutQuad,
            Ease::EaseInCubic,
            Ease::EaseOutCubic,
            Ease::EaseInOutCubic,
        ] {
            assert!(ease.apply(0.0).abs() < 1e-9, "{ease:?}");
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-9, "{ease:?}");
        }
        assert_eq!(Ease::Linear.apply(2.0), 1.0);
    }

    #[test]
    fn animation_wire_shape() {
        let anim = Animation::new(Path::parse("position/0").unwrap(), serde_json::json!(4), 0.5)
            .with_ease(Ease::EaseOutQuad);
        let json = serde_json::to_string(&anim).unwrap();
        assert_eq!(
            json,
            r#"{"path":"position/0","to":4,"duration":0.5,"ease":"easeOutQuad"}"#
        );
    }
}
