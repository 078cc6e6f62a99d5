use ai_core::{NavConfig, ObjectHandle, ObjectState, TickContext, Vec3, WorldView};
use ai_nav::{
    BodyInfo, NavContext, NavPath, NavWorldMut, NavWorldView, NavigationService, PathPoll,
    PathRequest, PathRequestId, PathState, Stance, TraceOp, TraceParams,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

struct NoNav;

impl NavigationService for NoNav {
    fn request_path(&mut self, _request: PathRequest) -> PathRequestId {
        PathRequestId(0)
    }

    fn poll_path(&mut self, _id: PathRequestId) -> PathPoll {
        PathPoll::NoPath
    }

    fn cancel_path(&mut self, _id: PathRequestId) {}
}

struct BenchWorld {
    pos: Vec3,
    nav: NoNav,
}

impl WorldView for BenchWorld {
    type Agent = u64;

    fn object(&self, _handle: ObjectHandle) -> Option<ObjectState> {
        None
    }
}

impl NavWorldView for BenchWorld {
    fn position(&self, _agent: u64) -> Option<Vec3> {
        Some(self.pos)
    }

    fn query_body_info(&self, _agent: u64, _stance: Option<Stance>) -> Option<BodyInfo> {
        Some(BodyInfo {
            eye_pos: self.pos,
            eye_dir: Vec3::UNIT_X,
            body_dir: Vec3::UNIT_X,
            move_dir: Vec3::UNIT_X,
            stance: Stance::Stand,
        })
    }
}

impl NavWorldMut for BenchWorld {
    fn navigation(&mut self) -> &mut dyn NavigationService {
        &mut self.nav
    }
}

fn zigzag(points: usize) -> NavPath {
    NavPath::new(
        (0..points)
            .map(|i| Vec3::new(i as f32 * 2.0, if i % 2 == 0 { 0.0 } else { 1.5 }, 0.0))
            .collect(),
    )
}

fn bench_trace(c: &mut Criterion) {
    let config = NavConfig::default();
    c.bench_function("trace/follow_64_points_500_ticks", |b| {
        b.iter(|| {
            let mut world = BenchWorld {
                pos: Vec3::ZERO,
                nav: NoNav,
            };
            let mut path = PathState::default();
            path.set_path(zigzag(64));
            let mut events = Vec::new();
            let mut op = TraceOp::new(TraceParams::default());
            for tick in 0..500u64 {
                let ctx = TickContext::new(tick, 0.05, tick as f64 * 0.05, 1);
                let mut cx = NavContext {
                    tick: &ctx,
                    config: &config,
                    agent: 0,
                    world: &mut world,
                    path: &mut path,
                    events: &mut events,
                };
                black_box(op.execute(&mut cx));
                world.pos += path.movement.move_dir * (path.movement.desired_speed * 0.05);
            }
        })
    });
}

criterion_group!(benches, bench_trace);
criterion_main!(benches);
