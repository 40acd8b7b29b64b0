use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use stagefx_core::compositor::merge;
use stagefx_core::{
    Contribution, EffectCategory, EffectEngine, EffectPhase, FrameOutput, Hsl, MixBus,
    TriggerConfig, Zone, ZoneOverride, ZoneState, STROBE_CEILING_HZ,
};
use std::collections::BTreeMap;
use std::hint::black_box;

fn baseline() -> BTreeMap<Zone, ZoneState> {
    Zone::standard()
        .iter()
        .map(|z| (z.clone(), ZoneState::lit(Hsl::new(30.0, 60.0, 50.0), 0.3)))
        .collect()
}

fn contributions(count: u64) -> Vec<Contribution> {
    (0..count)
        .map(|i| {
            let bus = match i % 4 {
                0 => MixBus::Global,
                1 => MixBus::Htp,
                2 => MixBus::Ambient,
                _ => MixBus::Accent,
            };
            let mut output = FrameOutput::new(i, EffectCategory::Physical, EffectPhase::Sustain);
            for (n, zone) in Zone::standard().iter().enumerate() {
                let hue = (i * 37 + n as u64 * 11) as f32 % 360.0;
                output = output.with_zone(
                    zone.clone(),
                    ZoneOverride::lit(Hsl::new(hue, 100.0, 50.0), (i % 10) as f32 / 10.0),
                );
            }
            Contribution {
                effect_id: i,
                priority: (i % 100) as u8,
                bus,
                trigger_seq: i,
                output,
            }
        })
        .collect()
}

fn bench_merge(c: &mut Criterion) {
    let base = baseline();
    let mut group = c.benchmark_group("merge");
    for count in [4u64, 16, 64] {
        let input = contributions(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            b.iter(|| black_box(merge(&base, input, STROBE_CEILING_HZ)));
        });
    }
    group.finish();
}

fn bench_engine_tick(c: &mut Criterion) {
    let base = baseline();
    c.benchmark_group("engine")
        .bench_function("tick_all_policies", |b| {
            let mut engine = EffectEngine::with_builtin();
            let ids: Vec<&'static str> = engine.registry().available().map(|m| m.id).collect();

            b.iter(|| {
                if engine.active_count() == 0 {
                    for id in &ids {
                        engine
                            .trigger(id, &TriggerConfig::new(1.0).with_timestamp(1_000))
                            .unwrap();
                    }
                }
                black_box(engine.tick(16.0, &base));
            });
        });
}

criterion_group!(benches, bench_merge, bench_engine_tick);
criterion_main!(benches);
