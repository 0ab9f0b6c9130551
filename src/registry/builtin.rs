//! Builtin node type catalog.
//!
//! Native types describe opaque backend-executed processors; only their
//! schema lives here, their processing lives behind the [`BackendFactory`]
//! boundary. Computed types are fully modeled in the computed node engine
//! (`crate::computed::builtin`).
//!
//! [`BackendFactory`]: crate::runtime::backend::BackendFactory

use crate::core::port::{PortDefinition, PropertyDefinition};
use crate::registry::{Category, NodeDomain, NodeTypeMetadata, NodeTypeRegistry};

/// Register the complete builtin catalog.
pub fn register_all(registry: &mut NodeTypeRegistry) {
    // Native
    registry.register(oscillator());
    registry.register(noise());
    registry.register(lfo());
    registry.register(gain());
    registry.register(filter());
    registry.register(delay());
    registry.register(destination());
    registry.register(microphone());

    // Computed
    registry.register(random());
    registry.register(sequencer());
    registry.register(scale());
    registry.register(compare());
    registry.register(route());
    registry.register(display());
    registry.register(sample_player());
}

// ============================================================================
// Native types
// ============================================================================

fn oscillator() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("oscillator", "Oscillator")
        .category(Category::Source)
        .domain(NodeDomain::Native)
        .description("Periodic waveform generator")
        .input(PortDefinition::control("frequency"))
        .input(PortDefinition::control("detune"))
        .input(PortDefinition::trigger("restart"))
        .output(PortDefinition::signal("out"))
        .property(PropertyDefinition::new("frequency", 440.0).with_range(20.0, 20_000.0))
        .property(PropertyDefinition::new("detune", 0.0).with_range(-1_200.0, 1_200.0))
        .property(PropertyDefinition::new("waveform", "sine"))
        .single_shot()
        .stoppable()
        .build()
}

fn noise() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("noise", "Noise")
        .category(Category::Source)
        .domain(NodeDomain::Native)
        .description("Broadband noise generator")
        .input(PortDefinition::trigger("restart"))
        .output(PortDefinition::signal("out"))
        .property(PropertyDefinition::new("color", "white"))
        .single_shot()
        .stoppable()
        .build()
}

fn lfo() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("lfo", "LFO")
        .category(Category::Source)
        .domain(NodeDomain::Native)
        .description("Low-frequency oscillator for parameter modulation")
        .output(PortDefinition::signal("out"))
        .property(PropertyDefinition::new("frequency", 2.0).with_range(0.01, 40.0))
        .property(PropertyDefinition::new("depth", 10.0).with_range(0.0, 10_000.0))
        .single_shot()
        .stoppable()
        .baseline_modulator()
        .build()
}

fn gain() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("gain", "Gain")
        .category(Category::Effect)
        .domain(NodeDomain::Native)
        .description("Amplitude scaling")
        .input(PortDefinition::signal("in"))
        .input(PortDefinition::control("level"))
        .output(PortDefinition::signal("out"))
        .property(PropertyDefinition::new("level", 1.0).with_range(0.0, 4.0))
        .build()
}

fn filter() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("filter", "Filter")
        .category(Category::Effect)
        .domain(NodeDomain::Native)
        .description("Biquad filter")
        .input(PortDefinition::signal("in"))
        .input(PortDefinition::control("frequency"))
        .input(PortDefinition::control("q"))
        .output(PortDefinition::signal("out"))
        .property(PropertyDefinition::new("frequency", 1_000.0).with_range(20.0, 20_000.0))
        .property(PropertyDefinition::new("q", 1.0).with_range(0.05, 30.0))
        .property(PropertyDefinition::new("mode", "lowpass"))
        .build()
}

fn delay() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("delay", "Delay")
        .category(Category::Effect)
        .domain(NodeDomain::Native)
        .description("Signal delay line")
        .input(PortDefinition::signal("in"))
        .input(PortDefinition::control("time"))
        .output(PortDefinition::signal("out"))
        .property(PropertyDefinition::new("time", 0.25).with_range(0.0, 5.0))
        .build()
}

fn destination() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("destination", "Destination")
        .category(Category::Sink)
        .domain(NodeDomain::Native)
        .description("Terminal output to the audio device")
        .input(PortDefinition::signal("in"))
        .input(PortDefinition::control("volume"))
        .property(PropertyDefinition::new("volume", 1.0).with_range(0.0, 1.0))
        .build()
}

fn microphone() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("microphone", "Microphone")
        .category(Category::Input)
        .domain(NodeDomain::Native)
        .description("Input device capture; the stream is acquired asynchronously")
        .output(PortDefinition::signal("out"))
        .stoppable()
        .needs_device()
        .build()
}

// ============================================================================
// Computed types
// ============================================================================

fn random() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("random", "Random")
        .category(Category::Logic)
        .domain(NodeDomain::Computed)
        .description("Emits a random value at a fixed interval")
        .output(PortDefinition::control("value"))
        .property(PropertyDefinition::new("min", 0.0))
        .property(PropertyDefinition::new("max", 1.0))
        .property(PropertyDefinition::new("interval", 0.5).with_range(0.01, 60.0))
        .build()
}

fn sequencer() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("sequencer", "Sequencer")
        .category(Category::Logic)
        .domain(NodeDomain::Computed)
        .description("Steps through a list of values at a fixed rate")
        .input(PortDefinition::trigger("reset"))
        .output(PortDefinition::control("value"))
        .property(PropertyDefinition::new(
            "steps",
            crate::core::types::Value::List(vec![]),
        ))
        .property(PropertyDefinition::new("rate", 0.25).with_range(0.01, 60.0))
        .property(PropertyDefinition::new("loop", true))
        .build()
}

fn scale() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("scale", "Scale")
        .category(Category::Logic)
        .domain(NodeDomain::Computed)
        .description("Linear range mapping")
        .input(PortDefinition::control("in"))
        .output(PortDefinition::control("out"))
        .property(PropertyDefinition::new("in_min", 0.0))
        .property(PropertyDefinition::new("in_max", 1.0))
        .property(PropertyDefinition::new("out_min", 0.0))
        .property(PropertyDefinition::new("out_max", 100.0))
        .property(PropertyDefinition::new("clamp", true))
        .build()
}

fn compare() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("compare", "Compare")
        .category(Category::Logic)
        .domain(NodeDomain::Computed)
        .description("Threshold comparison emitting 0 or 1")
        .input(PortDefinition::control("in"))
        .output(PortDefinition::control("result"))
        .property(PropertyDefinition::new("threshold", 0.5))
        .property(PropertyDefinition::new("mode", "greater"))
        .build()
}

fn route() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("route", "Route")
        .category(Category::Logic)
        .domain(NodeDomain::Computed)
        .description("Forwards the input selected by index")
        .input(PortDefinition::control("a"))
        .input(PortDefinition::control("b"))
        .input(PortDefinition::control("c"))
        .input(PortDefinition::control("index"))
        .output(PortDefinition::control("out"))
        .property(PropertyDefinition::new("index", 0_i64).with_range(0.0, 2.0))
        .build()
}

fn display() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("display", "Display")
        .category(Category::Sink)
        .domain(NodeDomain::Computed)
        .description("Shows the most recent input value")
        .input(PortDefinition::control("in"))
        .output(PortDefinition::control("value"))
        .property(PropertyDefinition::new("last", crate::core::types::Value::None))
        .build()
}

fn sample_player() -> NodeTypeMetadata {
    NodeTypeMetadata::builder("sample-player", "Sample Player")
        .category(Category::Source)
        .domain(NodeDomain::Computed)
        .description("File-backed playback; the sample is decoded asynchronously")
        .input(PortDefinition::trigger("trigger"))
        .output(PortDefinition::control("position"))
        .output(PortDefinition::control("loaded"))
        .property(PropertyDefinition::new("path", ""))
        .property(PropertyDefinition::new("loop", false))
        .build()
}
