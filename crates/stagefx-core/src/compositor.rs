//! Bus-priority compositing
//!
//! Every frame, each active effect proposes per-zone overrides. The merge
//! works zone by zone against the upstream baseline:
//!
//! 1. If any global-bus effect claims the zone, the highest priority claim
//!    (most recent trigger on ties) replaces it outright. Everything else
//!    aimed at that zone is dropped.
//! 2. Otherwise the htp, ambient and accent contributions are layered in
//!    that order as a channel-wise maximum over the baseline. The zone's
//!    color comes from the loudest contributor.
//! 3. Zones nobody touches pass through unchanged.
//!
//! A broken frame from one effect is logged and skipped; it never costs
//! the other effects their frame.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::warn;

use crate::color::Hsl;
use crate::config::STROBE_CEILING_HZ;
use crate::effect::{Effect, EffectId, MixBus};
use crate::output::{BlendMode, FrameOutput, Movement, ZoneOverride};
use crate::timing::lerp;
use crate::zone::Zone;

/// Final lighting state of one zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneState {
    /// Color
    pub color: Hsl,
    /// Intensity `[0, 1]`
    pub dimmer: f32,
    /// White channel `[0, 1]`
    pub white: f32,
    /// Amber channel `[0, 1]`
    pub amber: f32,
    /// Absolute pan/tilt for moving heads
    pub movement: Option<Movement>,
    /// Strobe rate in Hz, if any contributor strobes
    pub strobe_rate: Option<f32>,
}

impl Default for ZoneState {
    fn default() -> Self {
        Self::dark()
    }
}

impl ZoneState {
    /// Unlit zone
    pub fn dark() -> Self {
        Self {
            color: Hsl::BLACK,
            dimmer: 0.0,
            white: 0.0,
            amber: 0.0,
            movement: None,
            strobe_rate: None,
        }
    }

    /// Zone lit with one color
    pub fn lit(color: Hsl, dimmer: f32) -> Self {
        Self {
            color,
            dimmer,
            ..Self::dark()
        }
    }

    /// Set the movement position
    pub fn with_movement(mut self, pan: f32, tilt: f32) -> Self {
        self.movement = Some(Movement::absolute(pan, tilt));
        self
    }

    fn apply_movement(&mut self, movement: &Movement) {
        let (pan, tilt) = if movement.is_absolute {
            (movement.pan, movement.tilt)
        } else {
            let base = self.movement.unwrap_or(Movement::absolute(0.0, 0.0));
            (base.pan + movement.pan, base.tilt + movement.tilt)
        };
        let mut next = Movement::absolute(pan.clamp(-1.0, 1.0), tilt.clamp(-1.0, 1.0));
        next.speed = movement.speed.or(self.movement.and_then(|m| m.speed));
        self.movement = Some(next);
    }

    /// Cross-fade toward `other`
    fn lerp(&self, other: &ZoneState, t: f32) -> ZoneState {
        let movement = match (self.movement, other.movement) {
            (Some(a), Some(b)) => {
                let mut m = Movement::absolute(lerp(a.pan, b.pan, t), lerp(a.tilt, b.tilt, t));
                m.speed = b.speed.or(a.speed);
                Some(m)
            }
            (a, b) => b.or(a),
        };
        ZoneState {
            color: self.color.lerp(&other.color, t),
            dimmer: lerp(self.dimmer, other.dimmer, t),
            white: lerp(self.white, other.white, t),
            amber: lerp(self.amber, other.amber, t),
            movement,
            strobe_rate: if t >= 0.5 {
                other.strobe_rate
            } else {
                self.strobe_rate
            },
        }
    }
}

/// One effect's frame, tagged with what the merge needs to rank it
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    /// Emitting effect
    pub effect_id: EffectId,
    /// Policy priority
    pub priority: u8,
    /// Arbitration lane
    pub bus: MixBus,
    /// Trigger order; higher is more recent
    pub trigger_seq: u64,
    /// The frame itself
    pub output: FrameOutput,
}

impl Contribution {
    fn rank(&self) -> (u8, u64) {
        (self.priority, self.trigger_seq)
    }
}

/// Result of one merge pass
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompositeFrame {
    /// Final state per zone
    pub zones: BTreeMap<Zone, ZoneState>,
    /// Global-bus effect that owns each dictated zone
    pub owners: BTreeMap<Zone, EffectId>,
    /// Effects whose frame was rejected this pass
    pub failed: Vec<EffectId>,
}

impl CompositeFrame {
    /// State of one zone
    pub fn zone(&self, zone: &Zone) -> Option<&ZoneState> {
        self.zones.get(zone)
    }
}

struct Prepared<'a> {
    contribution: &'a Contribution,
    overrides: BTreeMap<Zone, ZoneOverride>,
}

/// Merge contributions over `baseline`.
///
/// Contributions are validated first; invalid ones are dropped, reported in
/// [`CompositeFrame::failed`] and logged.
pub fn merge(
    baseline: &BTreeMap<Zone, ZoneState>,
    contributions: &[Contribution],
    strobe_ceiling_hz: f32,
) -> CompositeFrame {
    let mut failed = Vec::new();
    let mut prepared = Vec::with_capacity(contributions.len());
    for contribution in contributions {
        match contribution.output.validate() {
            Ok(()) => prepared.push(Prepared {
                contribution,
                overrides: contribution.output.resolved_overrides(),
            }),
            Err(reason) => {
                warn!(
                    "Dropping frame from effect {}: {}",
                    contribution.effect_id, reason
                );
                failed.push(contribution.effect_id);
            }
        }
    }

    let mut zones = baseline.clone();
    for p in &prepared {
        for zone in p.overrides.keys() {
            zones.entry(zone.clone()).or_default();
        }
    }

    let ceiling = strobe_ceiling_hz.clamp(0.0, STROBE_CEILING_HZ);
    let mut owners = BTreeMap::new();
    for (zone, state) in zones.iter_mut() {
        let base = baseline.get(zone).cloned().unwrap_or_default();
        let layered = layer_additive(&base, zone, &prepared);

        let dictator = prepared
            .iter()
            .filter(|p| p.contribution.bus == MixBus::Global)
            .filter_map(|p| p.overrides.get(zone).map(|o| (p, o)))
            .max_by_key(|(p, _)| p.contribution.rank());

        *state = match dictator {
            Some((p, zone_override)) => {
                owners.insert(zone.clone(), p.contribution.effect_id);
                let dictated = dictate(&base, zone_override, p.contribution.output.strobe_rate);
                let gc = p.contribution.output.composition();
                if gc >= 1.0 {
                    dictated
                } else {
                    layered.lerp(&dictated, gc)
                }
            }
            None => layered,
        };
        state.strobe_rate = state.strobe_rate.map(|rate| rate.min(ceiling));
    }

    CompositeFrame {
        zones,
        owners,
        failed,
    }
}

/// Global winner's override applied over the baseline
fn dictate(base: &ZoneState, zone_override: &ZoneOverride, strobe_rate: Option<f32>) -> ZoneState {
    let mut state = ZoneState {
        color: zone_override.color.unwrap_or(base.color),
        dimmer: zone_override.dimmer,
        white: zone_override.white.unwrap_or(0.0),
        amber: zone_override.amber.unwrap_or(0.0),
        movement: base.movement,
        strobe_rate,
    };
    if let Some(movement) = &zone_override.movement {
        state.apply_movement(movement);
    }
    state
}

/// Additive buses over the baseline
fn layer_additive(base: &ZoneState, zone: &Zone, prepared: &[Prepared<'_>]) -> ZoneState {
    let mut state = base.clone();
    let mut loudest = base.dimmer;
    // Loudest colored contributor, baseline excluded
    let mut peak = 0.0f32;
    let mut claims: Vec<((u8, u64), f32, Hsl)> = Vec::new();

    for bus in MixBus::ADDITIVE {
        let mut lane: Vec<(&Contribution, ZoneOverride)> = prepared
            .iter()
            .filter(|p| p.contribution.bus == bus)
            .filter_map(|p| {
                p.overrides.get(zone).map(|o| {
                    let scaled = o.clone().scaled(p.contribution.output.composition());
                    (p.contribution, scaled)
                })
            })
            .collect();
        if lane.is_empty() {
            continue;
        }

        // Highest rank first: on equal loudness the stronger claim keeps the color
        lane.sort_by_key(|(c, _)| Reverse(c.rank()));
        for (contribution, o) in &lane {
            state.dimmer = state.dimmer.max(o.dimmer);
            state.white = state.white.max(o.white.unwrap_or(0.0));
            state.amber = state.amber.max(o.amber.unwrap_or(0.0));
            if let Some(color) = o.color {
                peak = peak.max(o.dimmer);
                if o.dimmer > loudest {
                    loudest = o.dimmer;
                    state.color = color;
                }
                if o.blend_mode == BlendMode::Replace {
                    claims.push((contribution.rank(), o.dimmer, color));
                }
            }
            if let Some(rate) = contribution.output.strobe_rate {
                state.strobe_rate = Some(state.strobe_rate.map_or(rate, |r| r.max(rate)));
            }
        }

        // Lowest rank first so the strongest absolute position lands last
        for (_, o) in lane.iter().rev() {
            if let Some(movement) = &o.movement {
                state.apply_movement(movement);
            }
        }
    }

    // A claim never recolors light that is strictly louder than itself
    if let Some((_, _, color)) = claims
        .into_iter()
        .filter(|(_, dimmer, _)| *dimmer >= peak)
        .max_by_key(|(rank, _, _)| *rank)
    {
        state.color = color;
    }
    state
}

#[derive(Debug)]
struct Slot {
    effect: Effect,
    trigger_seq: u64,
}

/// Holds the active effects and merges their frames
#[derive(Debug)]
pub struct Compositor {
    slots: Vec<Slot>,
    strobe_ceiling_hz: f32,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    /// Create an empty compositor
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            strobe_ceiling_hz: STROBE_CEILING_HZ,
        }
    }

    /// Cap reported strobe rates below the global ceiling
    pub fn with_strobe_ceiling(mut self, hz: f32) -> Self {
        self.strobe_ceiling_hz = hz.clamp(0.0, STROBE_CEILING_HZ);
        self
    }

    /// Add a triggered effect. `trigger_seq` orders ties between equal priorities.
    pub fn add_effect(&mut self, effect: Effect, trigger_seq: u64) {
        self.slots.push(Slot {
            effect,
            trigger_seq,
        });
    }

    /// Remove an effect by id
    pub fn remove_effect(&mut self, id: EffectId) -> Option<Effect> {
        let index = self.slots.iter().position(|s| s.effect.id() == id)?;
        Some(self.slots.remove(index).effect)
    }

    /// Get an effect by id
    pub fn get_effect(&self, id: EffectId) -> Option<&Effect> {
        self.slots.iter().find(|s| s.effect.id() == id).map(|s| &s.effect)
    }

    /// Get a mutable effect by id
    pub fn get_effect_mut(&mut self, id: EffectId) -> Option<&mut Effect> {
        self.slots
            .iter_mut()
            .find(|s| s.effect.id() == id)
            .map(|s| &mut s.effect)
    }

    /// Mark an effect as freshly (re)triggered
    pub fn set_trigger_seq(&mut self, id: EffectId, trigger_seq: u64) -> bool {
        match self.slots.iter_mut().find(|s| s.effect.id() == id) {
            Some(slot) => {
                slot.trigger_seq = trigger_seq;
                true
            }
            None => false,
        }
    }

    /// All held effects, in insertion order
    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.slots.iter().map(|s| &s.effect)
    }

    /// Advance every held effect
    pub fn update(&mut self, delta_ms: f32) {
        for slot in &mut self.slots {
            slot.effect.update(delta_ms);
        }
    }

    /// Remove and return every finished effect
    pub fn reap_finished(&mut self) -> Vec<Effect> {
        let (finished, active): (Vec<Slot>, Vec<Slot>) = std::mem::take(&mut self.slots)
            .into_iter()
            .partition(|s| s.effect.is_finished());
        self.slots = active;
        finished.into_iter().map(|s| s.effect).collect()
    }

    /// Collect this frame's contributions.
    ///
    /// Effects whose output call fails are returned separately with the
    /// error text and contribute nothing.
    pub fn contributions(&self) -> (Vec<Contribution>, Vec<(EffectId, String)>) {
        let mut contributions = Vec::with_capacity(self.slots.len());
        let mut errors = Vec::new();
        for slot in &self.slots {
            match slot.effect.output() {
                Ok(Some(output)) => contributions.push(Contribution {
                    effect_id: slot.effect.id(),
                    priority: slot.effect.priority(),
                    bus: slot.effect.mix_bus(),
                    trigger_seq: slot.trigger_seq,
                    output,
                }),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Effect {} ({}) failed to render: {}",
                        slot.effect.id(),
                        slot.effect.policy_id(),
                        e
                    );
                    errors.push((slot.effect.id(), e.to_string()));
                }
            }
        }
        (contributions, errors)
    }

    /// Merge every active effect over `baseline`
    pub fn render(&self, baseline: &BTreeMap<Zone, ZoneState>) -> CompositeFrame {
        let (contributions, errors) = self.contributions();
        let mut frame = merge(baseline, &contributions, self.strobe_ceiling_hz);
        let mut failed: Vec<EffectId> = errors.into_iter().map(|(id, _)| id).collect();
        failed.append(&mut frame.failed);
        frame.failed = failed;
        frame
    }

    /// Number of held effects
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no effect is held
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Abort and drop every held effect
    pub fn clear(&mut self) -> Vec<Effect> {
        let mut drained: Vec<Effect> = self.slots.drain(..).map(|s| s.effect).collect();
        for effect in &mut drained {
            effect.abort();
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{EffectCategory, EffectPhase};

    fn contribution(id: EffectId, bus: MixBus, priority: u8, seq: u64) -> Contribution {
        Contribution {
            effect_id: id,
            priority,
            bus,
            trigger_seq: seq,
            output: FrameOutput::new(id, EffectCategory::Physical, EffectPhase::Sustain),
        }
    }

    fn with(mut c: Contribution, zone: Zone, o: ZoneOverride) -> Contribution {
        c.output = c.output.with_zone(zone, o);
        c
    }

    const RED: Hsl = Hsl::new(0.0, 100.0, 50.0);
    const BLUE: Hsl = Hsl::new(240.0, 100.0, 50.0);
    const GREEN: Hsl = Hsl::new(120.0, 100.0, 50.0);

    fn baseline() -> BTreeMap<Zone, ZoneState> {
        BTreeMap::from([
            (Zone::FRONT, ZoneState::lit(GREEN, 0.4)),
            (Zone::BACK, ZoneState::lit(GREEN, 0.4)),
        ])
    }

    #[test]
    fn test_untouched_zones_pass_through() {
        let frame = merge(&baseline(), &[], STROBE_CEILING_HZ);
        assert_eq!(frame.zones, baseline());
        assert!(frame.owners.is_empty());
    }

    #[test]
    fn test_global_tie_goes_to_most_recent() {
        let older = with(
            contribution(1, MixBus::Global, 90, 1),
            Zone::FRONT,
            ZoneOverride::lit(RED, 1.0),
        );
        let newer = with(
            contribution(2, MixBus::Global, 90, 2),
            Zone::FRONT,
            ZoneOverride::lit(BLUE, 0.5),
        );
        let frame = merge(&baseline(), &[newer, older], STROBE_CEILING_HZ);
        assert_eq!(frame.owners[&Zone::FRONT], 2);
        assert_eq!(frame.zones[&Zone::FRONT].color, BLUE);
        assert_eq!(frame.zones[&Zone::FRONT].dimmer, 0.5);
    }

    #[test]
    fn test_global_dark_paints_black() {
        let dark = with(
            contribution(1, MixBus::Global, 50, 1),
            Zone::FRONT,
            ZoneOverride::dark(),
        );
        let loud = with(
            contribution(2, MixBus::Htp, 99, 2),
            Zone::FRONT,
            ZoneOverride::lit(RED, 1.0),
        );
        let frame = merge(&baseline(), &[dark, loud], STROBE_CEILING_HZ);
        let front = &frame.zones[&Zone::FRONT];
        assert_eq!(front.dimmer, 0.0);
        // No color opinion keeps the underlying color
        assert_eq!(front.color, GREEN);
        // Back is not dictated, so nothing changes there
        assert_eq!(frame.zones[&Zone::BACK], baseline()[&Zone::BACK]);
    }

    #[test]
    fn test_loudest_color_wins_and_later_bus_needs_to_be_louder() {
        let htp = with(
            contribution(1, MixBus::Htp, 50, 1),
            Zone::FRONT,
            ZoneOverride::lit(RED, 0.8),
        );
        let accent = with(
            contribution(2, MixBus::Accent, 99, 2),
            Zone::FRONT,
            ZoneOverride::lit(BLUE, 0.8),
        );
        let frame = merge(&baseline(), &[accent, htp], STROBE_CEILING_HZ);
        assert_eq!(frame.zones[&Zone::FRONT].color, RED);
        assert_eq!(frame.zones[&Zone::FRONT].dimmer, 0.8);
    }

    #[test]
    fn test_quiet_contribution_keeps_baseline_color() {
        let htp = with(
            contribution(1, MixBus::Htp, 50, 1),
            Zone::FRONT,
            ZoneOverride::lit(RED, 0.2).with_white(0.6),
        );
        let frame = merge(&baseline(), &[htp], STROBE_CEILING_HZ);
        let front = &frame.zones[&Zone::FRONT];
        assert_eq!(front.color, GREEN);
        assert_eq!(front.dimmer, 0.4);
        assert_eq!(front.white, 0.6);
    }

    #[test]
    fn test_replace_claims_color_without_dimming() {
        let claim = with(
            contribution(1, MixBus::Ambient, 50, 1),
            Zone::FRONT,
            ZoneOverride::lit(BLUE, 0.1).with_blend(BlendMode::Replace),
        );
        let frame = merge(&baseline(), &[claim], STROBE_CEILING_HZ);
        let front = &frame.zones[&Zone::FRONT];
        assert_eq!(front.color, BLUE);
        assert_eq!(front.dimmer, 0.4);
    }

    #[test]
    fn test_replace_claim_yields_to_louder_light() {
        let strobe = with(
            contribution(1, MixBus::Htp, 90, 1),
            Zone::FRONT,
            ZoneOverride::lit(RED, 1.0),
        );
        let breath = with(
            contribution(2, MixBus::Ambient, 50, 2),
            Zone::FRONT,
            ZoneOverride::lit(BLUE, 0.5).with_blend(BlendMode::Replace),
        );
        let frame = merge(&baseline(), &[strobe.clone(), breath.clone()], STROBE_CEILING_HZ);
        assert_eq!(frame.zones[&Zone::FRONT].color, RED);
        assert_eq!(frame.zones[&Zone::FRONT].dimmer, 1.0);

        // As loud as the htp light, the claim takes the color back
        let breath = with(
            contribution(2, MixBus::Ambient, 50, 2),
            Zone::FRONT,
            ZoneOverride::lit(BLUE, 1.0).with_blend(BlendMode::Replace),
        );
        let frame = merge(&baseline(), &[strobe, breath], STROBE_CEILING_HZ);
        assert_eq!(frame.zones[&Zone::FRONT].color, BLUE);
    }

    #[test]
    fn test_partial_composition_crossfades() {
        let mut fading = with(
            contribution(1, MixBus::Global, 90, 1),
            Zone::FRONT,
            ZoneOverride::lit(GREEN, 1.0),
        );
        fading.output.global_composition = Some(0.5);
        let frame = merge(&baseline(), &[fading], STROBE_CEILING_HZ);
        assert!((frame.zones[&Zone::FRONT].dimmer - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_movement_relative_adds_absolute_replaces() {
        let mut base = baseline();
        base.insert(Zone::ALL_MOVERS, ZoneState::dark().with_movement(0.2, 0.0));

        let offset = with(
            contribution(1, MixBus::Htp, 50, 1),
            Zone::ALL_MOVERS,
            ZoneOverride::lit(RED, 0.5).with_movement(Movement::relative(0.9, -0.3)),
        );
        let frame = merge(&base, &[offset.clone()], STROBE_CEILING_HZ);
        let m = frame.zones[&Zone::ALL_MOVERS].movement.unwrap();
        assert_eq!(m.pan, 1.0);
        assert_eq!(m.tilt, -0.3);

        let pinned = with(
            contribution(2, MixBus::Htp, 60, 2),
            Zone::ALL_MOVERS,
            ZoneOverride::lit(RED, 0.5).with_movement(Movement::absolute(-0.5, 0.5)),
        );
        let frame = merge(&base, &[offset, pinned], STROBE_CEILING_HZ);
        let m = frame.zones[&Zone::ALL_MOVERS].movement.unwrap();
        assert_eq!(m.pan, -0.5);
        assert_eq!(m.tilt, 0.5);
    }

    #[test]
    fn test_invalid_frame_is_isolated() {
        let bad = with(
            contribution(1, MixBus::Global, 99, 1),
            Zone::FRONT,
            ZoneOverride::lit(RED, f32::NAN),
        );
        let good = with(
            contribution(2, MixBus::Htp, 50, 2),
            Zone::BACK,
            ZoneOverride::lit(BLUE, 0.9),
        );
        let frame = merge(&baseline(), &[bad, good], STROBE_CEILING_HZ);
        assert_eq!(frame.failed, vec![1]);
        assert_eq!(frame.zones[&Zone::FRONT], baseline()[&Zone::FRONT]);
        assert_eq!(frame.zones[&Zone::BACK].color, BLUE);
    }

    #[test]
    fn test_strobe_rate_capped() {
        let mut strobe = with(
            contribution(1, MixBus::Htp, 50, 1),
            Zone::FRONT,
            ZoneOverride::lit(RED, 1.0),
        );
        strobe.output.strobe_rate = Some(14.0);
        let frame = merge(&baseline(), &[strobe], 10.0);
        assert_eq!(frame.zones[&Zone::FRONT].strobe_rate, Some(10.0));
    }
}
