//! Builtin computed behaviors.
//!
//! One struct per computed type id. Each is a small state machine behind
//! [`ComputedBehavior`]; none of them knows about nodes, graphs, or
//! backends. Property names here must match the registry schemas in
//! `registry::builtin`.

use crate::computed::{BehaviorRequest, ComputedBehavior, ComputedEngine, Delta};
use crate::core::types::Value;
use crate::runtime::resources::AudioBuffer;
use rand::Rng;
use std::collections::HashMap;

/// Register every builtin behavior on an engine.
pub fn register_all(engine: &mut ComputedEngine) {
    engine.register_behavior("random", || Box::new(RandomBehavior::default()));
    engine.register_behavior("sequencer", || Box::new(SequencerBehavior::default()));
    engine.register_behavior("scale", || Box::new(ScaleBehavior::default()));
    engine.register_behavior("compare", || Box::new(CompareBehavior::default()));
    engine.register_behavior("route", || Box::new(RouteBehavior::default()));
    engine.register_behavior("display", || Box::new(DisplayBehavior));
    engine.register_behavior("sample-player", || Box::new(SamplePlayerBehavior::default()));
}

fn prop_f64(properties: &HashMap<String, Value>, name: &str, fallback: f64) -> f64 {
    properties.get(name).and_then(Value::as_f64).unwrap_or(fallback)
}

fn prop_bool(properties: &HashMap<String, Value>, name: &str, fallback: bool) -> bool {
    properties.get(name).and_then(Value::as_bool).unwrap_or(fallback)
}

// ============================================================================
// random
// ============================================================================

/// Periodic random-value source. Emits into `value` every `interval`
/// seconds of tick time.
pub struct RandomBehavior {
    min: f64,
    max: f64,
    interval: f64,
    accumulated: f64,
}

impl Default for RandomBehavior {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            interval: 0.5,
            accumulated: 0.0,
        }
    }
}

impl RandomBehavior {
    fn draw(&self) -> f64 {
        if self.max <= self.min {
            return self.min;
        }
        rand::rng().random_range(self.min..self.max)
    }
}

impl ComputedBehavior for RandomBehavior {
    fn initialize(&mut self, properties: &HashMap<String, Value>) -> Option<Delta> {
        self.min = prop_f64(properties, "min", self.min);
        self.max = prop_f64(properties, "max", self.max);
        self.interval = prop_f64(properties, "interval", self.interval).max(0.001);
        // Publish an initial value so new bridges have something to carry.
        Some(Delta::output("value", Value::Float(self.draw())))
    }

    fn handle_input(&mut self, _port: &str, _value: &Value) -> Option<Delta> {
        None
    }

    fn on_property_change(&mut self, name: &str, value: &Value) -> Option<Delta> {
        match (name, value.as_f64()) {
            ("min", Some(v)) => self.min = v,
            ("max", Some(v)) => self.max = v,
            ("interval", Some(v)) => self.interval = v.max(0.001),
            _ => return None,
        }
        None
    }

    fn tick(&mut self, elapsed: f64) -> Option<Delta> {
        self.accumulated += elapsed;
        if self.accumulated < self.interval {
            return None;
        }
        self.accumulated = 0.0;
        Some(Delta::output("value", Value::Float(self.draw())))
    }
}

// ============================================================================
// sequencer
// ============================================================================

/// Timed step sequencer over a value list. A rising edge on `reset`
/// rewinds to step zero.
pub struct SequencerBehavior {
    steps: Vec<Value>,
    rate: f64,
    looping: bool,
    position: usize,
    accumulated: f64,
    finished: bool,
}

impl Default for SequencerBehavior {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            rate: 0.25,
            looping: true,
            position: 0,
            accumulated: 0.0,
            finished: false,
        }
    }
}

impl SequencerBehavior {
    fn read_steps(value: &Value) -> Option<Vec<Value>> {
        value.as_list().map(|items| items.to_vec())
    }

    fn current(&self) -> Option<Delta> {
        self.steps
            .get(self.position)
            .map(|step| Delta::output("value", step.clone()))
    }

    fn advance(&mut self) -> Option<Delta> {
        if self.steps.is_empty() || self.finished {
            return None;
        }
        if self.position + 1 < self.steps.len() {
            self.position += 1;
        } else if self.looping {
            self.position = 0;
        } else {
            self.finished = true;
            return None;
        }
        self.current()
    }
}

impl ComputedBehavior for SequencerBehavior {
    fn initialize(&mut self, properties: &HashMap<String, Value>) -> Option<Delta> {
        if let Some(steps) = properties.get("steps").and_then(Self::read_steps) {
            self.steps = steps;
        }
        self.rate = prop_f64(properties, "rate", self.rate).max(0.001);
        self.looping = prop_bool(properties, "loop", self.looping);
        self.current()
    }

    fn handle_input(&mut self, _port: &str, _value: &Value) -> Option<Delta> {
        None
    }

    fn on_property_change(&mut self, name: &str, value: &Value) -> Option<Delta> {
        match name {
            "steps" => {
                if let Some(steps) = Self::read_steps(value) {
                    self.steps = steps;
                    self.position = 0;
                    self.finished = false;
                    return self.current();
                }
            }
            "rate" => {
                if let Some(v) = value.as_f64() {
                    self.rate = v.max(0.001);
                }
            }
            "loop" => {
                if let Some(v) = value.as_bool() {
                    self.looping = v;
                    self.finished = false;
                }
            }
            _ => {}
        }
        None
    }

    fn trigger(&mut self, _input: &str) -> Option<Delta> {
        self.position = 0;
        self.accumulated = 0.0;
        self.finished = false;
        self.current()
    }

    fn tick(&mut self, elapsed: f64) -> Option<Delta> {
        self.accumulated += elapsed;
        let mut last = None;
        while self.accumulated >= self.rate {
            self.accumulated -= self.rate;
            match self.advance() {
                Some(delta) => last = Some(delta),
                None => break,
            }
        }
        last
    }
}

// ============================================================================
// scale
// ============================================================================

/// Linear range mapping with optional clamping.
pub struct ScaleBehavior {
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
    clamp: bool,
    last_input: Option<f64>,
}

impl Default for ScaleBehavior {
    fn default() -> Self {
        Self {
            in_min: 0.0,
            in_max: 1.0,
            out_min: 0.0,
            out_max: 1.0,
            clamp: true,
            last_input: None,
        }
    }
}

impl ScaleBehavior {
    fn map(&self, input: f64) -> f64 {
        let span = self.in_max - self.in_min;
        let mut normalized = if span.abs() < f64::EPSILON {
            0.0
        } else {
            (input - self.in_min) / span
        };
        if self.clamp {
            normalized = normalized.clamp(0.0, 1.0);
        }
        self.out_min + normalized * (self.out_max - self.out_min)
    }

    fn emit(&self) -> Option<Delta> {
        self.last_input
            .map(|input| Delta::output("out", Value::Float(self.map(input))))
    }
}

impl ComputedBehavior for ScaleBehavior {
    fn initialize(&mut self, properties: &HashMap<String, Value>) -> Option<Delta> {
        self.in_min = prop_f64(properties, "in_min", self.in_min);
        self.in_max = prop_f64(properties, "in_max", self.in_max);
        self.out_min = prop_f64(properties, "out_min", self.out_min);
        self.out_max = prop_f64(properties, "out_max", self.out_max);
        self.clamp = prop_bool(properties, "clamp", self.clamp);
        None
    }

    fn handle_input(&mut self, port: &str, value: &Value) -> Option<Delta> {
        if port != "in" {
            return None;
        }
        self.last_input = value.as_f64();
        self.emit()
    }

    fn on_property_change(&mut self, name: &str, value: &Value) -> Option<Delta> {
        match (name, value.as_f64(), value.as_bool()) {
            ("in_min", Some(v), _) => self.in_min = v,
            ("in_max", Some(v), _) => self.in_max = v,
            ("out_min", Some(v), _) => self.out_min = v,
            ("out_max", Some(v), _) => self.out_max = v,
            ("clamp", _, Some(v)) => self.clamp = v,
            _ => return None,
        }
        // Re-map the held input so downstream tracks the new range.
        self.emit()
    }
}

// ============================================================================
// compare
// ============================================================================

/// Threshold comparison. Emits 1/0 into `result`, suppressing repeats so
/// a trigger bridge downstream only sees edges.
pub struct CompareBehavior {
    threshold: f64,
    mode: String,
    last_input: Option<f64>,
    last_result: Option<bool>,
}

impl Default for CompareBehavior {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            mode: "greater".to_string(),
            last_input: None,
            last_result: None,
        }
    }
}

impl CompareBehavior {
    fn evaluate(&self, input: f64) -> bool {
        match self.mode.as_str() {
            "less" => input < self.threshold,
            "equal" => (input - self.threshold).abs() < f64::EPSILON,
            _ => input > self.threshold,
        }
    }

    fn emit_if_changed(&mut self) -> Option<Delta> {
        let input = self.last_input?;
        let result = self.evaluate(input);
        if self.last_result == Some(result) {
            return None;
        }
        self.last_result = Some(result);
        let out = if result { 1.0 } else { 0.0 };
        Some(Delta::output("result", Value::Float(out)))
    }
}

impl ComputedBehavior for CompareBehavior {
    fn initialize(&mut self, properties: &HashMap<String, Value>) -> Option<Delta> {
        self.threshold = prop_f64(properties, "threshold", self.threshold);
        if let Some(Value::Text(mode)) = properties.get("mode") {
            self.mode = mode.clone();
        }
        None
    }

    fn handle_input(&mut self, port: &str, value: &Value) -> Option<Delta> {
        if port != "in" {
            return None;
        }
        self.last_input = value.as_f64();
        self.emit_if_changed()
    }

    fn on_property_change(&mut self, name: &str, value: &Value) -> Option<Delta> {
        match name {
            "threshold" => {
                if let Some(v) = value.as_f64() {
                    self.threshold = v;
                }
            }
            "mode" => {
                if let Some(mode) = value.as_text() {
                    self.mode = mode.to_string();
                }
            }
            _ => return None,
        }
        self.emit_if_changed()
    }
}

// ============================================================================
// route
// ============================================================================

/// N-way selector: forwards the input named by `index` (0 = a, 1 = b,
/// 2 = c) to `out`.
#[derive(Default)]
pub struct RouteBehavior {
    index: i64,
    held: HashMap<String, Value>,
}

impl RouteBehavior {
    const PORTS: [&'static str; 3] = ["a", "b", "c"];

    fn selected_port(&self) -> Option<&'static str> {
        Self::PORTS.get(self.index as usize).copied()
    }

    fn forward_selected(&self) -> Option<Delta> {
        let port = self.selected_port()?;
        self.held
            .get(port)
            .map(|value| Delta::output("out", value.clone()))
    }

    fn set_index(&mut self, value: &Value) -> Option<Delta> {
        let index = value.as_i64()?;
        if index == self.index {
            return None;
        }
        self.index = index;
        self.forward_selected()
    }
}

impl ComputedBehavior for RouteBehavior {
    fn initialize(&mut self, properties: &HashMap<String, Value>) -> Option<Delta> {
        if let Some(index) = properties.get("index").and_then(Value::as_i64) {
            self.index = index;
        }
        None
    }

    fn handle_input(&mut self, port: &str, value: &Value) -> Option<Delta> {
        if port == "index" {
            return self.set_index(value);
        }
        if !Self::PORTS.contains(&port) {
            return None;
        }
        self.held.insert(port.to_string(), value.clone());
        if self.selected_port() == Some(port) {
            Some(Delta::output("out", value.clone()))
        } else {
            None
        }
    }

    fn on_property_change(&mut self, name: &str, value: &Value) -> Option<Delta> {
        if name == "index" {
            return self.set_index(value);
        }
        None
    }
}

// ============================================================================
// display
// ============================================================================

/// Sink that mirrors its input into a readable output and the `last`
/// property.
pub struct DisplayBehavior;

impl ComputedBehavior for DisplayBehavior {
    fn initialize(&mut self, _properties: &HashMap<String, Value>) -> Option<Delta> {
        None
    }

    fn handle_input(&mut self, port: &str, value: &Value) -> Option<Delta> {
        if port != "in" {
            return None;
        }
        Some(
            Delta::output("value", value.clone()).with_property("last", value.clone()),
        )
    }

    fn on_property_change(&mut self, _name: &str, _value: &Value) -> Option<Delta> {
        None
    }
}

// ============================================================================
// sample-player
// ============================================================================

/// File-backed playback position tracker. The file is decoded at the
/// resource boundary; a rising edge on `trigger` (re)starts playback.
#[derive(Default)]
pub struct SamplePlayerBehavior {
    path: String,
    looping: bool,
    buffer: Option<AudioBuffer>,
    playing: bool,
    position: f64,
}

impl SamplePlayerBehavior {
    fn request_decode(&mut self) -> Option<Delta> {
        if self.path.is_empty() {
            return None;
        }
        self.buffer = None;
        self.playing = false;
        Some(
            Delta::output("loaded", Value::Float(0.0)).with_request(BehaviorRequest::Decode {
                path: self.path.clone(),
            }),
        )
    }
}

impl ComputedBehavior for SamplePlayerBehavior {
    fn initialize(&mut self, properties: &HashMap<String, Value>) -> Option<Delta> {
        if let Some(path) = properties.get("path").and_then(Value::as_text) {
            self.path = path.to_string();
        }
        self.looping = prop_bool(properties, "loop", false);
        let mut delta = Delta::output("position", Value::Float(0.0))
            .with_output("loaded", Value::Float(0.0));
        if !self.path.is_empty() {
            delta = delta.with_request(BehaviorRequest::Decode {
                path: self.path.clone(),
            });
        }
        Some(delta)
    }

    fn handle_input(&mut self, _port: &str, _value: &Value) -> Option<Delta> {
        None
    }

    fn on_property_change(&mut self, name: &str, value: &Value) -> Option<Delta> {
        match name {
            "path" => {
                if let Some(path) = value.as_text() {
                    self.path = path.to_string();
                    return self.request_decode();
                }
            }
            "loop" => {
                if let Some(v) = value.as_bool() {
                    self.looping = v;
                }
            }
            _ => {}
        }
        None
    }

    fn trigger(&mut self, _input: &str) -> Option<Delta> {
        if self.buffer.is_none() {
            return None;
        }
        self.playing = true;
        self.position = 0.0;
        Some(Delta::output("position", Value::Float(0.0)))
    }

    fn tick(&mut self, elapsed: f64) -> Option<Delta> {
        let buffer = self.buffer.as_ref()?;
        if !self.playing {
            return None;
        }
        let duration = buffer.duration_secs();
        self.position += elapsed;
        if self.position >= duration {
            if self.looping && duration > 0.0 {
                self.position %= duration;
            } else {
                self.position = duration;
                self.playing = false;
            }
        }
        Some(Delta::output("position", Value::Float(self.position)))
    }

    fn decode_complete(&mut self, result: Result<&AudioBuffer, &str>) -> Option<Delta> {
        match result {
            Ok(buffer) => {
                self.buffer = Some(buffer.clone());
                Some(Delta::output("loaded", Value::Float(1.0)))
            }
            Err(_) => {
                self.buffer = None;
                Some(Delta::output("loaded", Value::Float(0.0)))
            }
        }
    }
}
