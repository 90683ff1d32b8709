//! # Animation
//!
//! Time-driven tweens started by `Animate` operations. The host advances them
//! from its own frame loop via [`Animator::advance`].

use bridge_shared::expression::number;
use bridge_shared::{Animation, CallbackId, Ease, ObjectId, Path};
use log::{debug, warn};
use serde_json::Value;

use crate::object::Node;
use crate::property::conversion::into_value;
use crate::property::{resolve_get, resolve_set, ResolutionError, ResolveContext};

struct Tween {
    object_id: ObjectId,
    path: Path,
    /// Captured when the delay has elapsed
    from: Option<Value>,
    to: Value,
    duration: f64,
    delay: f64,
    elapsed: f64,
    ease: Ease,
    callback_id: Option<CallbackId>,
}

/// A tween that reached its target
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub object_id: ObjectId,
    pub callback_id: Option<CallbackId>,
    pub value: Value,
}

/// Interpolate between two numbers or two equally long numeric arrays
pub fn lerp(from: &Value, to: &Value, t: f64) -> Result<Value, ResolutionError> {
    let mismatch = || ResolutionError::TypeMismatch {
        expected: "number or numeric array",
        found: format!("{from} -> {to}"),
    };
    match (from, to) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().ok_or_else(mismatch)?, b.as_f64().ok_or_else(mismatch)?);
            Ok(number(a + (b - a) * t))
        }
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => a
            .iter()
            .zip(b)
            .map(|(a, b)| match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => Ok(number(a + (b - a) * t)),
                _ => Err(mismatch()),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => Err(mismatch()),
    }
}

#[derive(Default)]
pub struct Animator {
    tweens: Vec<Tween>,
}

impl Animator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, object_id: &str, animation: Animation, default_ease: Ease) {
        debug!(
            "Animating {} on {} over {}s",
            animation.path, object_id, animation.duration
        );
        self.tweens.push(Tween {
            object_id: object_id.to_string(),
            path: animation.path,
            from: None,
            to: animation.to,
            duration: animation.duration.max(0.0),
            delay: animation.delay.max(0.0),
            elapsed: 0.0,
            ease: animation.ease.unwrap_or(default_ease),
            callback_id: animation.callback_id,
        });
    }

    /// Drop every tween on an object. Returns how many were running.
    pub fn cancel(&mut self, object_id: &str) -> usize {
        let before = self.tweens.len();
        self.tweens.retain(|tween| tween.object_id != object_id);
        before - self.tweens.len()
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    /// Step every tween by `dt` seconds and write the new values.
    ///
    /// Tweens whose object vanished or whose path stopped resolving are
    /// dropped with a warning.
    pub fn advance(&mut self, ctx: ResolveContext<'_>, dt: f64) -> Vec<Completed> {
        let mut completed = Vec::new();
        self.tweens.retain_mut(|tween| {
            tween.elapsed += dt;
            if tween.elapsed < tween.delay {
                return true;
            }
            match step(ctx, tween) {
                Ok(Some(done)) => {
                    completed.push(done);
                    false
                }
                Ok(None) => true,
                Err(err) => {
                    warn!(
                        "Dropping animation of {} on {}: {}",
                        tween.path, tween.object_id, err
                    );
                    false
                }
            }
        });
        completed
    }
}

fn step(ctx: ResolveContext<'_>, tween: &mut Tween) -> Result<Option<Completed>, ResolutionError> {
    let handle = ctx
        .store
        .get(&tween.object_id)
        .ok_or_else(|| ResolutionError::UnknownObjectId {
            id: tween.object_id.clone(),
        })?;
    let mut root = Node::Object(handle);

    let from = match &tween.from {
        Some(from) => from.clone(),
        None => {
            let start = into_value(resolve_get(ctx, &root, &tween.path)?)?;
            tween.from = Some(start.clone());
            start
        }
    };

    let progress = if tween.duration == 0.0 {
        1.0
    } else {
        ((tween.elapsed - tween.delay) / tween.duration).min(1.0)
    };

    // Land exactly on the target rather than on an interpolated approximation
    let value = if progress >= 1.0 {
        lerp(&from, &tween.to, 1.0)?;
        tween.to.clone()
    } else {
        lerp(&from, &tween.to, tween.ease.apply(progress))?
    };
    resolve_set(ctx, &mut root, &tween.path, Node::Value(value.clone()))?;

    if progress < 1.0 {
        return Ok(None);
    }
    Ok(Some(Completed {
        object_id: tween.object_id.clone(),
        callback_id: tween.callback_id.clone(),
        value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{handle, GameObject, ObjectStore};
    use crate::resource::MemoryResources;
    use serde_json::json;

    #[test]
    fn lerp_numbers_and_vectors() {
        assert_eq!(lerp(&json!(0), &json!(10), 0.25).unwrap(), json!(2.5));
        assert_eq!(lerp(&json!([0, 0, 0]), &json!([2, 4, 6]), 0.5).unwrap(), json!([1, 2, 3]));
        assert!(lerp(&json!([0, 0]), &json!([1, 2, 3]), 0.5).is_err());
        assert!(lerp(&json!("a"), &json!(1), 0.5).is_err());
    }

    #[test]
    fn tweens_reach_their_target_and_report() {
        let mut store = ObjectStore::new();
        let ball = handle(GameObject::new("Ball"));
        store.insert("Ball_0", ball.clone()).unwrap();
        let resources = MemoryResources::new();
        let ctx = ResolveContext::new(&store, &resources);

        let mut animator = Animator::new();
        let mut anim = Animation::new(Path::parse("position").unwrap(), json!([4, 0, 0]), 1.0)
            .with_delay(0.5);
        anim.callback_id = Some("Callback_3".to_string());
        animator.start("Ball_0", anim, Ease::Linear);

        assert!(animator.advance(ctx, 0.5).is_empty());
        assert!(animator.advance(ctx, 0.5).is_empty());
        assert_eq!(ball.borrow().get_member("position"), Some(Node::from(json!([2, 0, 0]))));

        let done = animator.advance(ctx, 0.75);
        assert_eq!(
            done,
            vec![Completed {
                object_id: "Ball_0".to_string(),
                callback_id: Some("Callback_3".to_string()),
                value: json!([4, 0, 0]),
            }]
        );
        assert!(animator.is_empty());
        assert_eq!(ball.borrow().get_member("position"), Some(Node::from(json!([4, 0, 0]))));
    }

    #[test]
    fn broken_tweens_are_dropped() {
        let store = ObjectStore::new();
        let resources = MemoryResources::new();
        let ctx = ResolveContext::new(&store, &resources);

        let mut animator = Animator::new();
        animator.start(
            "Gone_1",
            Animation::new(Path::parse("position/0").unwrap(), json!(1), 1.0),
            Ease::Linear,
        );
        animator.start(
            "Gone_1",
            Animation::new(Path::parse("scale/0").unwrap(), json!(1), 1.0),
            Ease::Linear,
        );
        assert_eq!(animator.len(), 2);
        assert!(animator.advance(ctx, 0.1).is_empty());
        assert!(animator.is_empty());

        animator.start(
            "Gone_1",
            Animation::new(Path::parse("position").unwrap(), json!(1), 1.0),
            Ease::Linear,
        );
        assert_eq!(animator.cancel("Gone_1"), 1);
    }
}
