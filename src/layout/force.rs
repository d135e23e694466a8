// Force simulation for dots.
//
// Each step:
// - alpha cools toward alpha_target by alpha_decay
// - phase is picked from alpha: Organizing (alpha >= threshold) pulls each
//   dot toward its layout focus, Recoloring pulls it toward its colour focus
// - pairwise collision pushes dots apart until centres are collision_radius apart
// - velocities lose velocity_decay to friction and are integrated into positions
//
// The run length is fixed up front from alpha_decay and alpha_min; there is no
// early exit on convergence. Final coordinates are rounded to two decimals.
//
// Dots without a position start on a phyllotaxis spiral around the origin,
// so the whole run is deterministic for a given input.

use std::collections::HashMap;

use crate::parser::ChoiceId;
use super::spatial_grid::SpatialGrid;
use super::{round2, Colorless, Dot, Focus, SimulationConfig};

const INITIAL_RADIUS: f64 = 10.0;

/// Which attraction is active.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Settle around the layout question's answer.
    Organizing,
    /// Drift toward the colour question's answer.
    Recoloring,
}

impl Phase {
    pub fn for_alpha(alpha: f64, threshold: f64) -> Phase {
        if alpha >= threshold {
            Phase::Organizing
        } else {
            Phase::Recoloring
        }
    }
}

/// Progress report for one step.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tick {
    pub index: usize,
    pub total: usize,
    pub alpha: f64,
    pub phase: Phase,
}

/// Number of steps for alpha to decay from 1 below `alpha_min`:
/// `ceil(ln(alpha_min) / ln(1 - alpha_decay))`.
pub fn step_count(alpha_decay: f64, alpha_min: f64) -> usize {
    if !(alpha_decay > 0.0 && alpha_decay < 1.0) || !(alpha_min > 0.0 && alpha_min < 1.0) {
        return 0;
    }
    (alpha_min.ln() / (1.0 - alpha_decay).ln()).ceil() as usize
}

#[derive(Debug, Clone)]
struct Body {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    layout_target: Option<(f64, f64)>,
    color_target: Option<(f64, f64)>,
}

/// Deterministic jitter for coincident dots (32-bit LCG).
#[derive(Debug, Clone)]
struct Jiggle(u64);

impl Jiggle {
    fn next(&mut self) -> f64 {
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1 << 32;
        self.0 = (A * self.0 + C) % M;
        (self.0 as f64 / M as f64 - 0.5) * 1e-6
    }
}

/// A simulation run that can be advanced one step at a time.
#[derive(Debug, Clone)]
pub struct Simulation {
    dots: Vec<Dot>,
    bodies: Vec<Body>,
    cfg: SimulationConfig,
    alpha: f64,
    step: usize,
    total: usize,
    grid: SpatialGrid,
    jiggle: Jiggle,
}

fn focus_map(foci: &[Focus]) -> HashMap<ChoiceId, (f64, f64)> {
    foci.iter().map(|f| (f.id, (f.x as f64, f.y as f64))).collect()
}

impl Simulation {
    pub fn new(dots: Vec<Dot>, layout_foci: &[Focus], color_foci: &[Focus], cfg: &SimulationConfig) -> Self {
        let layout_map = focus_map(layout_foci);
        let color_map = focus_map(color_foci);
        let golden_angle = std::f64::consts::PI * (3.0 - 5f64.sqrt());

        let bodies = dots
            .iter()
            .enumerate()
            .map(|(i, dot)| {
                let (x, y) = dot.position().unwrap_or_else(|| {
                    let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
                    let angle = i as f64 * golden_angle;
                    (radius * angle.cos(), radius * angle.sin())
                });
                let color_target = dot
                    .color_focus
                    .and_then(|c| color_map.get(&c).copied())
                    .or(match cfg.colorless {
                        Colorless::OriginPull => Some((0.0, 0.0)),
                        Colorless::Hold => None,
                    });
                Body {
                    x,
                    y,
                    vx: dot.vx.unwrap_or(0.0),
                    vy: dot.vy.unwrap_or(0.0),
                    layout_target: layout_map.get(&dot.layout_focus).copied(),
                    color_target,
                }
            })
            .collect();

        let total = step_count(cfg.alpha_decay, cfg.alpha_min);
        tracing::debug!(dots = dots.len(), steps = total, "simulation created");

        Self {
            dots,
            bodies,
            cfg: cfg.clone(),
            alpha: 1.0,
            step: 0,
            total,
            grid: SpatialGrid::new(cfg.collision_radius),
            jiggle: Jiggle(1),
        }
    }

    pub fn total_steps(&self) -> usize {
        self.total
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.total
    }

    /// Fraction of the step budget done, in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.step as f64 / self.total as f64
        }
    }

    /// Advance one step. Returns None once the budget is spent.
    pub fn step(&mut self) -> Option<Tick> {
        if self.is_finished() {
            return None;
        }

        self.alpha += (self.cfg.alpha_target - self.alpha) * self.cfg.alpha_decay;
        let phase = Phase::for_alpha(self.alpha, self.cfg.phase_threshold);

        self.apply_attraction(phase);
        self.apply_collision();

        let friction = 1.0 - self.cfg.velocity_decay;
        for b in &mut self.bodies {
            b.vx *= friction;
            b.vy *= friction;
            b.x += b.vx;
            b.y += b.vy;
        }

        let tick = Tick { index: self.step, total: self.total, alpha: self.alpha, phase };
        self.step += 1;
        Some(tick)
    }

    /// Spend the rest of the budget, calling `on_tick(step, total)` before
    /// each step, and return the settled dots.
    pub fn run(mut self, mut on_tick: impl FnMut(usize, usize)) -> Vec<Dot> {
        while !self.is_finished() {
            on_tick(self.step, self.total);
            self.step();
        }
        self.finish()
    }

    /// Advance up to `max` steps. Returns true when the run is finished.
    pub fn step_batch(&mut self, max: usize) -> bool {
        for _ in 0..max {
            if self.step().is_none() {
                break;
            }
        }
        self.is_finished()
    }

    fn apply_attraction(&mut self, phase: Phase) {
        let k = self.cfg.foci_strength * self.alpha;
        for b in &mut self.bodies {
            let target = match phase {
                Phase::Organizing => b.layout_target,
                Phase::Recoloring => b.color_target,
            };
            if let Some((tx, ty)) = target {
                b.vx += (tx - b.x) * k;
                b.vy += (ty - b.y) * k;
            }
        }
    }

    fn apply_collision(&mut self) {
        let r = self.cfg.collision_radius;
        if r <= 0.0 || self.cfg.collision_strength == 0.0 {
            return;
        }
        let r2 = r * r;

        // Bucket predicted positions once per step
        self.grid.clear();
        for (i, b) in self.bodies.iter().enumerate() {
            self.grid.insert(i, b.x + b.vx, b.y + b.vy);
        }

        for i in 0..self.bodies.len() {
            let xi = self.bodies[i].x + self.bodies[i].vx;
            let yi = self.bodies[i].y + self.bodies[i].vy;

            for j in self.grid.neighbours(xi, yi) {
                if j <= i {
                    continue;
                }
                let bj = &self.bodies[j];
                let mut dx = xi - (bj.x + bj.vx);
                let mut dy = yi - (bj.y + bj.vy);
                let mut l = dx * dx + dy * dy;
                if l >= r2 {
                    continue;
                }
                if dx == 0.0 {
                    dx = self.jiggle.next();
                    l += dx * dx;
                }
                if dy == 0.0 {
                    dy = self.jiggle.next();
                    l += dy * dy;
                }
                let d = l.sqrt();
                let f = (r - d) / d * self.cfg.collision_strength;
                dx *= f * 0.5;
                dy *= f * 0.5;

                self.bodies[i].vx += dx;
                self.bodies[i].vy += dy;
                self.bodies[j].vx -= dx;
                self.bodies[j].vy -= dy;
            }
        }
    }

    /// Write final positions and velocities back into the dots, rounded to
    /// two decimals.
    pub fn finish(self) -> Vec<Dot> {
        let mut dots = self.dots;
        for (dot, b) in dots.iter_mut().zip(&self.bodies) {
            dot.x = Some(round2(b.x));
            dot.y = Some(round2(b.y));
            dot.vx = Some(round2(b.vx));
            dot.vy = Some(round2(b.vy));
        }
        dots
    }
}

/// Run the full step budget. `on_tick(step, total)` is called before each
/// step, in order.
pub fn simulate(
    dots: Vec<Dot>,
    layout_foci: &[Focus],
    color_foci: &[Focus],
    cfg: &SimulationConfig,
    on_tick: impl FnMut(usize, usize),
) -> Vec<Dot> {
    Simulation::new(dots, layout_foci, color_foci, cfg).run(on_tick)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(id: &str, layout_focus: ChoiceId, color_focus: Option<ChoiceId>) -> Dot {
        Dot {
            id: id.to_string(),
            resp_id: id.to_string(),
            layout_focus,
            color_focus,
            x: None,
            y: None,
            vx: None,
            vy: None,
        }
    }

    fn focus(id: ChoiceId, x: i32, y: i32) -> Focus {
        Focus { id, label: id.to_string(), x, y }
    }

    fn two_decimals(v: f64) -> bool {
        ((v * 100.0).round() - v * 100.0).abs() < 1e-6
    }

    #[test]
    fn test_step_count() {
        let expected = ((0.001f64).ln() / (0.98f64).ln()).ceil() as usize;
        assert_eq!(step_count(0.02, 0.001), expected);
        assert_eq!(expected, 342);
        assert_eq!(step_count(0.0, 0.001), 0);
        assert_eq!(step_count(0.02, 1.5), 0);
    }

    #[test]
    fn test_on_tick_called_once_per_step_in_order() {
        let cfg = SimulationConfig::default();
        let mut seen = Vec::new();
        let dots = vec![dot("a", 1, None), dot("b", 1, None)];
        simulate(dots, &[focus(1, 100, 100)], &[], &cfg, |step, total| seen.push((step, total)));

        let total = step_count(0.02, 0.001);
        assert_eq!(seen.len(), total);
        for (i, &(step, t)) in seen.iter().enumerate() {
            assert_eq!(step, i);
            assert_eq!(t, total);
        }
    }

    #[test]
    fn test_phase_switches_at_threshold() {
        assert_eq!(Phase::for_alpha(0.45, 0.45), Phase::Organizing);
        assert_eq!(Phase::for_alpha(0.4499, 0.45), Phase::Recoloring);

        let cfg = SimulationConfig::default();
        let mut sim = Simulation::new(vec![dot("a", 1, Some(2))], &[focus(1, 0, 0)], &[focus(2, 0, 0)], &cfg);
        let mut phases = Vec::new();
        while let Some(tick) = sim.step() {
            phases.push(tick.phase);
        }
        let switch = phases.iter().position(|&p| p == Phase::Recoloring).unwrap();
        assert!(phases[..switch].iter().all(|&p| p == Phase::Organizing));
        assert!(phases[switch..].iter().all(|&p| p == Phase::Recoloring));
        // 0.98^n < 0.45 first holds at n = 40
        assert_eq!(switch, 39);
    }

    #[test]
    fn test_dots_settle_near_color_focus() {
        let cfg = SimulationConfig::default();
        let dots = vec![dot("a", 1, Some(7))];
        let out = simulate(dots, &[focus(1, 100, 100)], &[focus(7, 400, 300)], &cfg, |_, _| {});
        let (x, y) = out[0].position().unwrap();
        assert!((x - 400.0).abs() < (x - 100.0).abs());
        assert!((y - 300.0).abs() < (y - 100.0).abs());
    }

    #[test]
    fn test_colorless_origin_pull_versus_hold() {
        let layout = [focus(1, 400, 400)];
        let origin = SimulationConfig::default();
        let hold = SimulationConfig { colorless: Colorless::Hold, ..SimulationConfig::default() };

        let pulled = simulate(vec![dot("a", 1, None)], &layout, &[], &origin, |_, _| {});
        let held = simulate(vec![dot("a", 1, None)], &layout, &[], &hold, |_, _| {});

        let (px, py) = pulled[0].position().unwrap();
        let (hx, hy) = held[0].position().unwrap();
        assert!(px.hypot(py) < hx.hypot(hy));
        assert!(hx > 200.0 && hy > 200.0);
    }

    #[test]
    fn test_collision_separates_coincident_dots() {
        let cfg = SimulationConfig::default();
        let dots: Vec<Dot> = (0..20).map(|i| dot(&format!("d{}", i), 1, Some(1))).collect();
        let foci = [focus(1, 200, 200)];
        let out = simulate(dots, &foci, &foci, &cfg, |_, _| {});

        let mut min_dist = f64::MAX;
        for (i, a) in out.iter().enumerate() {
            for b in &out[i + 1..] {
                let (ax, ay) = a.position().unwrap();
                let (bx, by) = b.position().unwrap();
                min_dist = min_dist.min((ax - bx).hypot(ay - by));
            }
        }
        assert!(min_dist > cfg.collision_radius * 0.5, "min distance {}", min_dist);
    }

    #[test]
    fn test_output_rounded_to_two_decimals() {
        let cfg = SimulationConfig::default();
        let dots = vec![dot("a", 1, Some(2)), dot("b", 2, None), dot("c", 1, Some(1))];
        let out = simulate(dots, &[focus(1, 133, 71), focus(2, 377, 71)], &[focus(1, 10, 10), focus(2, 90, 50)], &cfg, |_, _| {});
        for d in &out {
            for v in [d.x, d.y, d.vx, d.vy] {
                assert!(two_decimals(v.unwrap()), "{:?}", v);
            }
        }
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let cfg = SimulationConfig::default();
        let make = || (0..12).map(|i| dot(&format!("d{}", i), (i % 3) as ChoiceId, Some((i % 2) as ChoiceId))).collect::<Vec<_>>();
        let layout = [focus(0, 100, 100), focus(1, 200, 100), focus(2, 300, 100)];
        let color = [focus(0, 100, 300), focus(1, 300, 300)];
        let a = simulate(make(), &layout, &color, &cfg, |_, _| {});
        let b = simulate(make(), &layout, &color, &cfg, |_, _| {});
        assert_eq!(a, b);
    }

    #[test]
    fn test_step_batch_matches_full_run() {
        let cfg = SimulationConfig::default();
        let layout = [focus(1, 50, 50)];
        let dots = vec![dot("a", 1, None), dot("b", 1, None)];

        let full = simulate(dots.clone(), &layout, &[], &cfg, |_, _| {});

        let mut sim = Simulation::new(dots, &layout, &[], &cfg);
        while !sim.step_batch(25) {
            assert!(sim.progress() < 1.0);
        }
        assert_eq!(sim.progress(), 1.0);
        assert!(sim.step().is_none());
        assert_eq!(sim.finish(), full);
    }

    #[test]
    fn test_existing_positions_are_kept_as_start() {
        let cfg = SimulationConfig { alpha_decay: 0.5, alpha_min: 0.9, ..SimulationConfig::default() };
        let mut d = dot("a", 1, None);
        d.x = Some(500.0);
        d.y = Some(500.0);
        // One step with no foci: only friction on a zero velocity
        let out = simulate(vec![d], &[], &[], &SimulationConfig { colorless: Colorless::Hold, ..cfg }, |_, _| {});
        assert_eq!(out[0].position(), Some((500.0, 500.0)));
    }
}
