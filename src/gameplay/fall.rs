// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Falling-object simulation.
//!
//! Every beat gets one object that spawns `fall_duration` before the beat
//! and falls at constant speed, so it crosses the baseline exactly at the
//! beat's timestamp. Each object is a small state machine advanced once per
//! tick from the authoritative clock reading:
//!
//! ```text
//! Falling --(hit claims beat)--------------> Consumed (destroyed at once)
//! Falling --(crosses miss line unclaimed)--> PassiveMiss --(grace over)--> destroyed
//! ```

use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::sequencer::BeatSchedule;

/// Handle to a visual object owned by the scene collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u64);

/// Trait for the external scene subsystem.
pub trait SceneSink: Send {
    /// Create a visual object at height `position`. `None` if it could not be created.
    fn spawn_object(&mut self, position: f64) -> Option<ObjectHandle>;

    /// Move an existing object.
    fn set_position(&mut self, handle: ObjectHandle, position: f64);

    /// Remove an object. Unknown handles are ignored.
    fn destroy(&mut self, handle: ObjectHandle);
}

/// Vertical layout and speed of the playfield
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallGeometry {
    /// Height at which objects appear
    pub spawn_y: f64,
    /// Height at which an object's arrival coincides with its beat
    pub baseline_y: f64,
    /// Units per second, constant
    pub fall_speed: f64,
    /// Distance below the baseline at which an unclaimed object is missed
    pub hit_window_distance: f64,
}

impl FallGeometry {
    /// Geometry whose miss line sits `hit_window` seconds of travel below the baseline
    pub fn new(spawn_y: f64, baseline_y: f64, fall_speed: f64, hit_window: f64) -> Self {
        Self {
            spawn_y,
            baseline_y,
            fall_speed,
            hit_window_distance: hit_window * fall_speed,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.fall_speed.is_finite() || self.fall_speed <= 0.0 {
            return Err(EngineError::invalid(format!(
                "fall speed must be > 0, got {}",
                self.fall_speed
            )));
        }
        if !self.spawn_y.is_finite() || !self.baseline_y.is_finite() || self.spawn_y < self.baseline_y {
            return Err(EngineError::invalid(format!(
                "spawn height {} must be at or above baseline {}",
                self.spawn_y, self.baseline_y
            )));
        }
        if !self.hit_window_distance.is_finite() || self.hit_window_distance < 0.0 {
            return Err(EngineError::invalid(format!(
                "hit window distance must be >= 0, got {}",
                self.hit_window_distance
            )));
        }
        Ok(())
    }

    /// Seconds from spawn to baseline
    pub fn fall_duration(&self) -> f64 {
        (self.spawn_y - self.baseline_y) / self.fall_speed
    }

    /// When the object for a beat at `timestamp` must appear
    pub fn spawn_time(&self, timestamp: f64) -> f64 {
        timestamp - self.fall_duration()
    }

    /// Height below which an unclaimed object counts as missed; an object
    /// exactly on the line is still hittable
    pub fn miss_line(&self) -> f64 {
        self.baseline_y - self.hit_window_distance
    }

    /// Height of an object spawned at `spawn_time`, at time `now`
    pub fn position_at(&self, spawn_time: f64, now: f64) -> f64 {
        self.spawn_y - self.fall_speed * (now - spawn_time).max(0.0)
    }
}

impl Default for FallGeometry {
    fn default() -> Self {
        Self::new(10.0, 0.0, 5.0, 0.2)
    }
}

/// Lifecycle of a falling object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Still eligible for a hit
    Falling,
    /// Claimed by a perfect hit
    Consumed,
    /// Crossed the miss line unclaimed; finishing its grace fall
    PassiveMiss,
}

/// One falling object
#[derive(Debug, Clone, PartialEq)]
pub struct FallingObject {
    pub id: u64,
    /// Beat this object represents (looked up, not owned)
    pub beat_index: usize,
    /// Audio-clock time the object appeared (ideal, not the tick time)
    pub spawn_time: f64,
    /// Current height
    pub position: f64,
    pub state: ObjectState,
    /// Visual counterpart
    pub handle: Option<ObjectHandle>,
    /// Seconds spent falling after a passive miss
    pub grace_elapsed: f64,
}

/// Something that happened to an object during a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallEvent {
    Spawned { id: u64, beat_index: usize },
    /// The object crossed the miss line and its beat was claimed as missed
    PassiveMiss { id: u64, beat_index: usize },
    Destroyed { id: u64, beat_index: usize },
}

/// Drives every falling object of a run
pub struct FallSimulator {
    geometry: FallGeometry,
    /// Seconds a missed object keeps falling before removal
    extra_fall_time: f64,
    scene: Option<Box<dyn SceneSink>>,
    objects: Vec<FallingObject>,
    /// Next beat to spawn
    spawn_cursor: usize,
    next_id: u64,
    last_tick: Option<f64>,
    running: bool,
}

impl FallSimulator {
    pub fn new(geometry: FallGeometry, scene: Option<Box<dyn SceneSink>>) -> Self {
        Self {
            geometry,
            extra_fall_time: 2.0,
            scene,
            objects: Vec::new(),
            spawn_cursor: 0,
            next_id: 0,
            last_tick: None,
            running: false,
        }
    }

    pub fn geometry(&self) -> &FallGeometry {
        &self.geometry
    }

    /// Whether a scene collaborator is attached
    pub fn has_scene(&self) -> bool {
        self.scene.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Begin a fresh run at `now`
    pub fn start(&mut self, geometry: FallGeometry, extra_fall_time: f64, now: f64) {
        self.stop();
        self.geometry = geometry;
        self.extra_fall_time = extra_fall_time.max(0.0);
        self.last_tick = Some(now);
        self.running = true;
    }

    /// Destroy every live object and forget the run
    pub fn stop(&mut self) {
        if let Some(scene) = self.scene.as_mut() {
            for handle in self.objects.iter().filter_map(|o| o.handle) {
                scene.destroy(handle);
            }
        }
        self.objects.clear();
        self.spawn_cursor = 0;
        self.last_tick = None;
        self.running = false;
    }

    /// Live objects, including those finishing a grace fall
    pub fn objects(&self) -> &[FallingObject] {
        &self.objects
    }

    pub fn active_object_count(&self) -> usize {
        self.objects.len()
    }

    /// Whether a live object represents `beat_index`
    pub fn has_object_for(&self, beat_index: usize) -> bool {
        self.objects.iter().any(|o| o.beat_index == beat_index)
    }

    /// Whether every beat has been spawned (or skipped)
    pub fn spawning_done(&self, schedule: &BeatSchedule) -> bool {
        self.spawn_cursor >= schedule.len()
    }

    /// Terminate the falling object of a beat claimed by a hit.
    ///
    /// Returns false if no falling object represents that beat.
    pub fn claim(&mut self, beat_index: usize) -> bool {
        let Some(pos) = self
            .objects
            .iter()
            .position(|o| o.beat_index == beat_index && o.state == ObjectState::Falling)
        else {
            return false;
        };

        let mut object = self.objects.remove(pos);
        object.state = ObjectState::Consumed;
        if let (Some(scene), Some(handle)) = (self.scene.as_mut(), object.handle) {
            scene.destroy(handle);
        }
        debug!(id = object.id, beat = beat_index, "object consumed by hit");
        true
    }

    /// Advance the simulation to `now`
    pub fn tick(&mut self, schedule: &mut BeatSchedule, now: f64) -> Vec<FallEvent> {
        if !self.running {
            return Vec::new();
        }

        let delta = self.last_tick.map_or(0.0, |last| (now - last).max(0.0));
        self.last_tick = Some(now);

        let mut events = Vec::new();

        for object in &mut self.objects {
            object.position -= self.geometry.fall_speed * delta;
            if object.state == ObjectState::PassiveMiss {
                object.grace_elapsed += delta;
            }
        }

        self.spawn_due(schedule, now, &mut events);
        self.resolve_transitions(schedule, &mut events);

        if let Some(scene) = self.scene.as_mut() {
            for object in &self.objects {
                if let Some(handle) = object.handle {
                    scene.set_position(handle, object.position);
                }
            }
        }

        events
    }

    fn spawn_due(&mut self, schedule: &BeatSchedule, now: f64, events: &mut Vec<FallEvent>) {
        while let Some(beat) = schedule.get(self.spawn_cursor) {
            let spawn_time = self.geometry.spawn_time(beat.timestamp);
            if spawn_time > now {
                break;
            }
            self.spawn_cursor += 1;

            if beat.is_consumed() {
                continue;
            }

            let Some(scene) = self.scene.as_mut() else {
                continue;
            };

            // A late spawn starts lower so the object still meets its beat
            let position = self.geometry.position_at(spawn_time, now);
            let Some(handle) = scene.spawn_object(position) else {
                warn!(beat = beat.index, "scene refused object, beat has no visual");
                continue;
            };

            let id = self.next_id;
            self.next_id += 1;
            self.objects.push(FallingObject {
                id,
                beat_index: beat.index,
                spawn_time,
                position,
                state: ObjectState::Falling,
                handle: Some(handle),
                grace_elapsed: 0.0,
            });
            debug!(id, beat = beat.index, spawn_time, position, "object spawned");
            events.push(FallEvent::Spawned {
                id,
                beat_index: beat.index,
            });
        }
    }

    fn resolve_transitions(&mut self, schedule: &mut BeatSchedule, events: &mut Vec<FallEvent>) {
        let miss_line = self.geometry.miss_line();
        let extra_fall_time = self.extra_fall_time;

        for object in &mut self.objects {
            if object.state == ObjectState::Falling && object.position < miss_line {
                if schedule.try_consume(object.beat_index) {
                    object.state = ObjectState::PassiveMiss;
                    events.push(FallEvent::PassiveMiss {
                        id: object.id,
                        beat_index: object.beat_index,
                    });
                } else {
                    // Claimed elsewhere; nothing left to show
                    object.state = ObjectState::Consumed;
                }
            }
        }

        let scene = &mut self.scene;
        self.objects.retain(|object| {
            let done = match object.state {
                ObjectState::Falling => false,
                ObjectState::Consumed => true,
                ObjectState::PassiveMiss => object.grace_elapsed >= extra_fall_time,
            };
            if done {
                if let (Some(scene), Some(handle)) = (scene.as_mut(), object.handle) {
                    scene.destroy(handle);
                }
                events.push(FallEvent::Destroyed {
                    id: object.id,
                    beat_index: object.beat_index,
                });
            }
            !done
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Mock scene recording live objects
    #[derive(Clone, Default)]
    struct MockScene {
        live: Arc<Mutex<HashMap<u64, f64>>>,
        next: u64,
        refuse: bool,
    }

    impl SceneSink for MockScene {
        fn spawn_object(&mut self, position: f64) -> Option<ObjectHandle> {
            if self.refuse {
                return None;
            }
            self.next += 1;
            self.live.lock().unwrap().insert(self.next, position);
            Some(ObjectHandle(self.next))
        }

        fn set_position(&mut self, handle: ObjectHandle, position: f64) {
            if let Some(p) = self.live.lock().unwrap().get_mut(&handle.0) {
                *p = position;
            }
        }

        fn destroy(&mut self, handle: ObjectHandle) {
            self.live.lock().unwrap().remove(&handle.0);
        }
    }

    fn simulator(scene: &MockScene) -> FallSimulator {
        FallSimulator::new(FallGeometry::default(), Some(Box::new(scene.clone())))
    }

    #[test]
    fn test_fall_duration() {
        let geometry = FallGeometry::new(10.0, 0.0, 5.0, 0.2);
        assert_eq!(geometry.fall_duration(), 2.0);
        assert_eq!(geometry.spawn_time(5.0), 3.0);
        assert!((geometry.miss_line() + 1.0).abs() < 1e-12);
        assert!(geometry.validate().is_ok());
    }

    #[test]
    fn test_geometry_validation() {
        assert!(FallGeometry::new(10.0, 0.0, 0.0, 0.2).validate().is_err());
        assert!(FallGeometry::new(0.0, 10.0, 5.0, 0.2).validate().is_err());
        assert!(FallGeometry::new(10.0, 0.0, 5.0, -0.2).validate().is_err());
    }

    #[test]
    fn test_object_reaches_baseline_on_beat() {
        let scene = MockScene::default();
        let mut sim = simulator(&scene);
        let mut schedule = BeatSchedule::generate(3.0, 1.0, 1.0, 0.0).unwrap();
        let dt = 1.0 / 60.0;

        sim.start(FallGeometry::default(), 2.0, 0.0);
        let mut now = 0.0;
        let mut closest: Option<(f64, f64)> = None;
        while now < 3.1 {
            now += dt;
            sim.tick(&mut schedule, now);
            if let Some(object) = sim.objects().first() {
                let gap = (now - 3.0).abs();
                if closest.map_or(true, |(g, _)| gap < g) {
                    closest = Some((gap, object.position));
                }
            }
        }

        let (_, position) = closest.unwrap();
        assert!(position.abs() <= 5.0 * dt + 1e-9, "position at beat: {}", position);
    }

    #[test]
    fn test_late_spawn_catches_up() {
        let scene = MockScene::default();
        let mut sim = simulator(&scene);
        // Beat at 1.0, fall takes 2.0, so the object is a second late at t=0
        let mut schedule = BeatSchedule::generate(1.0, 1.0, 1.0, 0.0).unwrap();

        sim.start(FallGeometry::default(), 2.0, 0.0);
        let events = sim.tick(&mut schedule, 0.0);
        assert_eq!(events, vec![FallEvent::Spawned { id: 0, beat_index: 0 }]);
        assert!((sim.objects()[0].position - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_passive_miss_then_grace_fall() {
        let scene = MockScene::default();
        let mut sim = simulator(&scene);
        let mut schedule = BeatSchedule::generate(2.0, 1.0, 1.0, 0.0).unwrap();

        sim.start(FallGeometry::default(), 1.0, 0.0);
        sim.tick(&mut schedule, 0.0);
        assert_eq!(sim.active_object_count(), 1);

        assert!(sim.tick(&mut schedule, 2.1).is_empty());
        let events = sim.tick(&mut schedule, 2.25);
        assert_eq!(events, vec![FallEvent::PassiveMiss { id: 0, beat_index: 0 }]);
        assert!(schedule.is_consumed(0));
        assert_eq!(sim.objects()[0].state, ObjectState::PassiveMiss);

        // Still falling through the grace period
        assert!(sim.tick(&mut schedule, 3.0).is_empty());
        let events = sim.tick(&mut schedule, 3.3);
        assert_eq!(events, vec![FallEvent::Destroyed { id: 0, beat_index: 0 }]);
        assert_eq!(sim.active_object_count(), 0);
        assert!(scene.live.lock().unwrap().is_empty());
    }

    #[test]
    fn test_object_on_miss_line_is_still_falling() {
        let scene = MockScene::default();
        let geometry = FallGeometry::new(8.0, 0.0, 4.0, 0.25);
        let mut sim = FallSimulator::new(geometry, Some(Box::new(scene.clone())));
        let mut schedule = BeatSchedule::generate(3.0, 1.0, 1.0, 0.0).unwrap();

        sim.start(geometry, 2.0, 0.0);
        sim.tick(&mut schedule, 1.0);
        assert!(sim.tick(&mut schedule, 3.25).is_empty());
        assert_eq!(sim.objects()[0].position, geometry.miss_line());
        assert_eq!(sim.objects()[0].state, ObjectState::Falling);
        assert!(!schedule.is_consumed(0));

        let events = sim.tick(&mut schedule, 3.26);
        assert_eq!(events, vec![FallEvent::PassiveMiss { id: 0, beat_index: 0 }]);
    }

    #[test]
    fn test_claim_destroys_immediately() {
        let scene = MockScene::default();
        let mut sim = simulator(&scene);
        let mut schedule = BeatSchedule::generate(2.0, 0.5, 1.0, 0.0).unwrap();

        sim.start(FallGeometry::default(), 2.0, 0.0);
        sim.tick(&mut schedule, 0.5);
        assert_eq!(sim.active_object_count(), 2);

        assert!(schedule.try_consume(0));
        assert!(sim.claim(0));
        assert!(!sim.claim(0));
        assert_eq!(sim.active_object_count(), 1);
        assert!(sim.has_object_for(1));
        assert_eq!(scene.live.lock().unwrap().len(), 1);

        // The remaining object is unaffected and still misses on its own
        sim.tick(&mut schedule, 2.8);
        assert!(schedule.is_consumed(1));
    }

    #[test]
    fn test_consumed_beats_are_not_spawned() {
        let scene = MockScene::default();
        let mut sim = simulator(&scene);
        let mut schedule = BeatSchedule::generate(3.0, 1.0, 2.0, 0.0).unwrap();
        schedule.try_consume(0);

        sim.start(FallGeometry::default(), 2.0, 0.0);
        sim.tick(&mut schedule, 2.0);
        assert_eq!(sim.active_object_count(), 1);
        assert_eq!(sim.objects()[0].beat_index, 1);
    }

    #[test]
    fn test_refused_spawn_leaves_no_object() {
        let scene = MockScene {
            refuse: true,
            ..Default::default()
        };
        let mut sim = simulator(&scene);
        let mut schedule = BeatSchedule::generate(0.0, 1.0, 2.0, 0.0).unwrap();

        sim.start(FallGeometry::default(), 2.0, 0.0);
        sim.tick(&mut schedule, 1.0);
        assert_eq!(sim.active_object_count(), 0);
        assert!(sim.spawning_done(&schedule));
    }

    #[test]
    fn test_no_scene_tracks_nothing() {
        let mut sim = FallSimulator::new(FallGeometry::default(), None);
        let mut schedule = BeatSchedule::generate(0.0, 1.0, 2.0, 0.0).unwrap();

        sim.start(FallGeometry::default(), 2.0, 0.0);
        assert!(sim.tick(&mut schedule, 5.0).is_empty());
        assert!(!sim.has_scene());
        assert_eq!(sim.active_object_count(), 0);
    }

    #[test]
    fn test_stop_clears_everything() {
        let scene = MockScene::default();
        let mut sim = simulator(&scene);
        let mut schedule = BeatSchedule::generate(2.0, 0.25, 2.0, 0.0).unwrap();

        sim.start(FallGeometry::default(), 2.0, 0.0);
        sim.tick(&mut schedule, 1.0);
        assert!(sim.active_object_count() > 1);

        sim.stop();
        assert_eq!(sim.active_object_count(), 0);
        assert!(!sim.is_running());
        assert!(scene.live.lock().unwrap().is_empty());
        assert!(sim.tick(&mut schedule, 2.0).is_empty());
    }
}
