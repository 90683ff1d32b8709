//! # Operation Handlers
//!
//! One method per inbound operation kind.

use std::collections::BTreeMap;
use std::rc::Rc;

use bridge_shared::constants::events;
use bridge_shared::{
    Animation, CodecError, CreateTemplate, Expression, InterestSpec, Path, QueryPayload,
    TemplateEvent,
};
use log::{debug, info, warn};
use serde_json::{Map, Value};

use super::{as_object, Host, HostError};
use crate::object::{handle, GameObject, Node, ObjectHandle};
use crate::property::{assign, node_to_json, resolve_get, resolve_query, ResolutionError};

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn deliver(object: &ObjectHandle, events: &[TemplateEvent]) -> Result<(), ResolutionError> {
    let mut object = object
        .try_borrow_mut()
        .map_err(|_| ResolutionError::ObjectBusy)?;
    for event in events {
        object.handle_event(&event.event, event.data.as_ref());
    }
    Ok(())
}

impl Host {
    /// Instantiate, register and configure an object from its template.
    ///
    /// Steps after registration fail independently: a bad parent or update
    /// path is logged and the object is still reported as `Created`.
    pub(super) fn create(&mut self, template: CreateTemplate) -> Result<(), HostError> {
        let id = template.id.as_str();
        if id.is_empty() {
            return Err(CodecError::MissingField {
                event: events::CREATE,
                field: "id",
            }
            .into());
        }
        if self.store.contains(id) {
            return Err(ResolutionError::DuplicateObjectId { id: id.to_string() }.into());
        }

        let object = match non_empty(&template.prefab) {
            Some(prefab) => self
                .classes
                .instantiate_prefab(prefab)
                .ok_or_else(|| HostError::UnknownPrefab(prefab.to_string()))?,
            None => {
                let kind = template.kind();
                let name = kind.rsplit('/').next().unwrap_or(kind);
                handle(GameObject::new(name))
            }
        };

        if let Some(component) = non_empty(&template.component) {
            let instance = self
                .classes
                .create_component(component)
                .ok_or_else(|| HostError::UnknownComponent(component.to_string()))?;
            object
                .try_borrow_mut()
                .map_err(|_| ResolutionError::ObjectBusy)?
                .add_component(instance)?;
        }

        self.store.insert(id, Rc::clone(&object))?;
        info!("Created {}", id);

        if let Err(err) = deliver(&object, &template.pre_events) {
            warn!("Pre-events for {} failed: {}", id, err);
        }

        let mut root = Node::Object(Rc::clone(&object));
        if let Some(parent) = non_empty(&template.parent) {
            let world_position_stays = template.world_position_stays.unwrap_or(true);
            if let Err(err) = self.attach(&root, parent, world_position_stays) {
                warn!("Could not attach {} to `{}`: {}", id, parent, err);
            }
        }

        let reported = self.apply_update(id, &mut root, &template.update);

        if let Some(entry) = self.store.entry_mut(id) {
            entry.interests = template.interests.clone();
        }

        if let Err(err) = deliver(&object, &template.post_events) {
            warn!("Post-events for {} failed: {}", id, err);
        }

        self.send_created(id)?;
        self.report_updates(id, reported)
    }

    fn attach(&self, child: &Node, parent: &str, world_position_stays: bool) -> Result<(), HostError> {
        let path = Path::parse(parent).map_err(ResolutionError::from)?;
        let parent_object = as_object(resolve_get(self.ctx(), child, &path)?, parent)?;
        let child_object = as_object(child.clone(), "child")?;
        if Rc::ptr_eq(&parent_object, &child_object) {
            return Err(ResolutionError::AttachToSelf {
                parent: parent.to_string(),
            }
            .into());
        }
        parent_object
            .try_borrow_mut()
            .map_err(|_| ResolutionError::ObjectBusy)?
            .add_child(child_object, world_position_stays)?;
        debug!("Attached to `{}`", parent);
        Ok(())
    }

    /// Apply each `path -> value` entry independently.
    ///
    /// Returns the values of entries flagged with `reportUpdate`, keyed by path.
    fn apply_update(&self, id: &str, root: &mut Node, update: &Map<String, Value>) -> Map<String, Value> {
        let ctx = self.ctx();
        let mut reported = Map::new();
        for (text, raw) in update {
            let outcome = Path::parse(text)
                .map_err(ResolutionError::from)
                .and_then(|path| {
                    let expr = Expression::from_value(raw.clone())?;
                    let written = assign(ctx, root, &path, &expr)?;
                    Ok((expr.report_update(), written))
                });
            match outcome {
                Ok((true, written)) => {
                    reported.insert(text.clone(), node_to_json(&self.store, &written));
                }
                Ok((false, _)) => {}
                Err(err) => warn!("Update of `{}` on {} failed: {}", text, id, err),
            }
        }
        reported
    }

    pub(super) fn update(&mut self, id: &str, data: Map<String, Value>) -> Result<(), HostError> {
        let mut root = Node::Object(self.require_object(id)?);
        let reported = self.apply_update(id, &mut root, &data);
        self.report_updates(id, reported)
    }

    pub(super) fn query(&mut self, id: &str, payload: QueryPayload) -> Result<(), HostError> {
        let root = Node::Object(self.require_object(id)?);
        let results = resolve_query(self.ctx(), &root, &payload.query);
        match payload.callback_id {
            Some(callback_id) => self.send_callback(&callback_id, Value::Object(results)),
            None => {
                warn!("Query on {} has no callbackID; result dropped", id);
                Ok(())
            }
        }
    }

    pub(super) fn animate(&mut self, id: &str, animations: Vec<Animation>) -> Result<(), HostError> {
        self.require_object(id)?;
        for animation in animations {
            self.animator
                .start(id, animation, self.config.default_animation_ease);
        }
        Ok(())
    }

    /// A `null` entry removes the interest for that event
    pub(super) fn update_interests(
        &mut self,
        id: &str,
        changes: BTreeMap<String, Option<InterestSpec>>,
    ) -> Result<(), HostError> {
        let entry = self
            .store
            .entry_mut(id)
            .ok_or_else(|| HostError::UnknownObjectId(id.to_string()))?;
        for (event, spec) in changes {
            match spec {
                Some(spec) => {
                    debug!("Interest in {} registered on {}", event, id);
                    entry.interests.insert(event, spec);
                }
                None => {
                    debug!("Interest in {} removed from {}", event, id);
                    entry.interests.remove(&event);
                }
            }
        }
        Ok(())
    }

    pub(super) fn destroy(&mut self, id: &str) -> Result<(), HostError> {
        self.require_object(id)?;
        // Resolve the interest while the object is still addressable
        let data = self.interest_data(id, events::DESTROYED);
        self.store.remove(id);
        let cancelled = self.animator.cancel(id);
        info!("Destroyed {} ({} animation(s) cancelled)", id, cancelled);
        self.send_destroyed(id, data)
    }

    pub(super) fn set_globals(&mut self, globals: Map<String, Value>) -> Result<(), HostError> {
        debug!("Setting {} global(s)", globals.len());
        self.globals.extend(globals);
        Ok(())
    }

    pub(super) fn log(&mut self, data: Map<String, Value>) -> Result<(), HostError> {
        let line = data
            .get("line")
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingField {
                event: events::LOG,
                field: "line",
            })?;
        info!("[bridge] {}", line);
        Ok(())
    }
}
