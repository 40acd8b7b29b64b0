use proptest::prelude::*;
use stagefx_core::{
    Effect, MixBus, MusicalContext, PolicyRegistry, TriggerConfig, STROBE_CEILING_HZ,
};

const TICK_MS: f32 = 1.0;

fn policy_ids() -> Vec<&'static str> {
    PolicyRegistry::with_builtin()
        .available()
        .map(|meta| meta.id)
        .collect()
}

fn triggered(id: &str, config: &TriggerConfig) -> Effect {
    let mut effect = PolicyRegistry::with_builtin().instantiate(id, 1).unwrap();
    effect.trigger(config);
    effect
}

fn is_lit(effect: &Effect) -> bool {
    match effect.output().unwrap() {
        Some(frame) => frame.resolved_overrides().values().any(|o| o.dimmer > 0.0),
        None => false,
    }
}

/// Start times of every dark-to-lit transition, sampled every millisecond
fn rising_edges(mut effect: Effect) -> Vec<f32> {
    let mut edges = Vec::new();
    let mut was_lit = false;
    while effect.is_active() {
        let lit = is_lit(&effect);
        if lit && !was_lit {
            edges.push(effect.elapsed_ms());
        }
        was_lit = lit;
        effect.update(TICK_MS);
    }
    edges
}

#[test]
fn test_binary_policies_stay_under_strobe_ceiling() {
    let registry = PolicyRegistry::with_builtin();
    let min_gap = 1000.0 / STROBE_CEILING_HZ - TICK_MS;

    for meta in registry.available().filter(|m| m.has_strobe) {
        let configs = [
            TriggerConfig::new(1.0),
            TriggerConfig::new(1.0).with_timestamp(1_700_000_000_123),
            TriggerConfig::new(1.0)
                .with_param("strobe_rate_hz", 60.0)
                .with_param("rate_hz", 60.0)
                .with_param("flash_count", 10.0)
                .with_param("chaos", 1.0),
        ];
        for config in &configs {
            let edges = rising_edges(triggered(meta.id, config));
            for pair in edges.windows(2) {
                let gap = pair[1] - pair[0];
                assert!(
                    gap >= min_gap,
                    "{} flashed again after {gap}ms (edges {:?})",
                    meta.id,
                    edges
                );
            }
        }
    }
}

#[test]
fn test_global_policies_hold_every_zone() {
    let registry = PolicyRegistry::with_builtin();
    for meta in registry.available().filter(|m| m.mix_bus == MixBus::Global) {
        let mut effect = triggered(meta.id, &TriggerConfig::new(1.0).with_timestamp(4_242));
        let mut dark_frames = 0;
        while effect.is_active() {
            let frame = effect.output().unwrap().unwrap();
            for zone in effect.zones() {
                let o = frame
                    .zone_overrides
                    .get(zone)
                    .unwrap_or_else(|| panic!("{} left {zone} unaddressed", meta.id));
                if o.dimmer == 0.0 {
                    dark_frames += 1;
                }
            }
            effect.update(5.0);
        }
        if meta.has_strobe {
            assert!(dark_frames > 0, "{} never went dark", meta.id);
        }
    }
}

#[test]
fn test_tempo_change_mid_flight_keeps_duration() {
    let mut sweep = triggered("arena_sweep", &TriggerConfig::new(1.0).with_bpm(128.0));
    let duration = sweep.duration_ms();
    sweep.update(1000.0);
    // Nothing an effect sees after trigger can change its length
    assert_eq!(sweep.duration_ms(), duration);
    assert_eq!(sweep.core().musical_context, Some(MusicalContext::with_bpm(128.0)));
}

proptest! {
    #[test]
    fn prop_duration_bound(
        policy in 0usize..10,
        bpm in prop::option::of(10.0f32..500.0),
        deltas in prop::collection::vec(0.5f32..120.0, 1..64),
    ) {
        let ids = policy_ids();
        let mut config = TriggerConfig::new(1.0);
        if let Some(bpm) = bpm {
            config = config.with_bpm(bpm);
        }
        let mut effect = triggered(ids[policy % ids.len()], &config);
        let duration = effect.duration_ms();
        prop_assert!(duration <= effect.meta().duration.ceiling_ms);

        let mut last_delta = 0.0;
        for delta in deltas.iter().cycle() {
            if !effect.is_active() {
                break;
            }
            effect.update(*delta);
            last_delta = *delta;
        }
        prop_assert!(effect.is_finished());
        prop_assert!(effect.elapsed_ms() >= duration);
        prop_assert!(effect.elapsed_ms() < duration + last_delta + 1e-3);
    }
}
