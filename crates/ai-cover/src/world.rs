use ai_core::WorldView;

use crate::{CoverId, CoverSurface, RayQueryService};

pub trait CoverWorldMut: WorldView {
    fn rays(&mut self) -> &mut dyn RayQueryService;

    fn cover_surface(&self, id: CoverId) -> Option<CoverSurface>;
}
