use crate::{AgentId, ObjectHandle, ObjectState};

/// Read-only world access shared by every subsystem.
///
/// Navigation, cover and pipe execution define their own extension traits on
/// top of this one.
pub trait WorldView {
    type Agent: AgentId;

    /// Resolve a world-object handle. Stale handles resolve to `None`.
    fn object(&self, handle: ObjectHandle) -> Option<ObjectState>;
}
