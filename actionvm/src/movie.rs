//! The display-list side of the player, seen through the capabilities the
//! legacy movie actions need. Every method has a do-nothing default.

use std::rc::Rc;

use crate::{ObjectId, Script, Value};

/// Names of the indexed movie properties used by `GetProperty` and
/// `SetProperty`. Hosts that do not handle an index get the named
/// property on the target instead.
pub const PROPERTY_NAMES: [&str; 22] = [
    "_x",
    "_y",
    "_xscale",
    "_yscale",
    "_currentframe",
    "_totalframes",
    "_alpha",
    "_visible",
    "_width",
    "_height",
    "_rotation",
    "_target",
    "_framesloaded",
    "_name",
    "_droptarget",
    "_url",
    "_highquality",
    "_focusrect",
    "_soundbuftime",
    "_quality",
    "_xmouse",
    "_ymouse",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragConstraint {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

pub trait MovieHost {
    /// Whether `id` is a display object (for `typeof`).
    fn is_movie(&self, id: ObjectId) -> bool {
        let _ = id;
        false
    }

    /// Resolves a target path the host knows about better than the
    /// property graph does.
    fn resolve_target(&mut self, from: ObjectId, path: &str) -> Option<ObjectId> {
        let _ = (from, path);
        None
    }

    fn target_path(&self, target: ObjectId) -> Option<String> {
        let _ = target;
        None
    }

    fn goto_frame(&mut self, target: ObjectId, frame: u32, play: bool) {
        let _ = (target, frame, play);
    }

    fn goto_label(&mut self, target: ObjectId, label: &str, play: bool) {
        let _ = (target, label, play);
    }

    fn next_frame(&mut self, target: ObjectId) {
        let _ = target;
    }

    fn previous_frame(&mut self, target: ObjectId) {
        let _ = target;
    }

    fn play(&mut self, target: ObjectId) {
        let _ = target;
    }

    fn stop(&mut self, target: ObjectId) {
        let _ = target;
    }

    fn toggle_quality(&mut self) {}

    fn stop_sounds(&mut self) {}

    fn frame_loaded(&mut self, target: ObjectId, frame: u32) -> bool {
        let _ = (target, frame);
        true
    }

    fn get_url(&mut self, url: &str, window: &str, method: u8) {
        let _ = (url, window, method);
    }

    fn get_property(&mut self, target: ObjectId, index: u32) -> Option<Value> {
        let _ = (target, index);
        None
    }

    /// Returns `false` when the host did not handle the property.
    fn set_property(&mut self, target: ObjectId, index: u32, value: Value) -> bool {
        let _ = (target, index, value);
        false
    }

    fn clone_sprite(&mut self, source: ObjectId, name: &str, depth: i32) {
        let _ = (source, name, depth);
    }

    fn remove_sprite(&mut self, target: ObjectId) {
        let _ = target;
    }

    fn start_drag(&mut self, target: ObjectId, lock_center: bool, constraint: Option<DragConstraint>) {
        let _ = (target, lock_center, constraint);
    }

    fn end_drag(&mut self) {}

    /// Actions of `frame` on `target`, run by the `Call` action.
    fn frame_script(&mut self, target: ObjectId, frame: &str) -> Option<Rc<Script>> {
        let _ = (target, frame);
        None
    }
}

/// A player without a display list.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMovie;

impl MovieHost for NullMovie {}
