use std::rc::Rc;

use ai_core::{AiConfig, ObjectHandle, ObjectState, TickContext, Vec3, WorldView};
use ai_cover::{
    CoverId, CoverSurface, CoverWorldMut, QueuedRayId, RayPriority, RayQueryService, RayReply,
    RayRequest,
};
use ai_nav::{
    BodyInfo, NavWorldMut, NavWorldView, NavigationService, PathPoll, PathRequest, PathRequestId,
    Stance,
};
use ai_pipe::{Agent, BranchKind, GoalOp, PipeBuilder, PipeLibrary, PipeSelection};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

struct NoServices;

impl NavigationService for NoServices {
    fn request_path(&mut self, _request: PathRequest) -> PathRequestId {
        PathRequestId(0)
    }

    fn poll_path(&mut self, _id: PathRequestId) -> PathPoll {
        PathPoll::NoPath
    }

    fn cancel_path(&mut self, _id: PathRequestId) {}
}

impl RayQueryService for NoServices {
    fn queue(&mut self, _priority: RayPriority, _request: RayRequest, _reply: RayReply) -> QueuedRayId {
        QueuedRayId(0)
    }

    fn cancel(&mut self, _id: QueuedRayId) {}
}

struct BenchWorld {
    services: NoServices,
}

impl WorldView for BenchWorld {
    type Agent = u64;

    fn object(&self, _handle: ObjectHandle) -> Option<ObjectState> {
        None
    }
}

impl NavWorldView for BenchWorld {
    fn position(&self, _agent: u64) -> Option<Vec3> {
        Some(Vec3::ZERO)
    }

    fn query_body_info(&self, _agent: u64, _stance: Option<Stance>) -> Option<BodyInfo> {
        None
    }
}

impl NavWorldMut for BenchWorld {
    fn navigation(&mut self) -> &mut dyn NavigationService {
        &mut self.services
    }
}

impl CoverWorldMut for BenchWorld {
    fn rays(&mut self) -> &mut dyn RayQueryService {
        &mut self.services
    }

    fn cover_surface(&self, _id: CoverId) -> Option<CoverSurface> {
        None
    }
}

fn bench_pipe_update(c: &mut Criterion) {
    // Branches that never fire, concurrent timeouts, and a looping tail.
    let mut builder = PipeBuilder::<BenchWorld>::new("patrol");
    for _ in 0..16 {
        builder = builder
            .branch(BranchKind::NoTarget, 1)
            .goal_concurrent(GoalOp::timeout(0.5, 1.5));
    }
    let mut library = PipeLibrary::new();
    library
        .register(builder.build().expect("pipe builds"))
        .expect("unique name");

    let mut world = BenchWorld {
        services: NoServices,
    };
    let mut agent = Agent::new(1u64, Rc::new(library));
    agent
        .select_pipe(&mut world, PipeSelection::replace("patrol"))
        .expect("pipe selected");
    let config = AiConfig::default();

    let mut tick: u64 = 0;
    c.bench_function("ai-pipe/update(instructions=32)", |b| {
        b.iter(|| {
            let ctx = TickContext::new(tick, 0.1, tick as f64 * 0.1, 0);
            agent.update(&ctx, &config, &mut world);
            black_box(agent.executor().active_goal_count());
            tick = tick.wrapping_add(1);
        })
    });
}

criterion_group!(benches, bench_pipe_update);
criterion_main!(benches);
