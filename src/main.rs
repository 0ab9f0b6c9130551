//! Naada CLI - Node-based Audio Patching
//!
//! This is a demonstration CLI for the Naada library. It runs against the
//! in-memory reference backend, so the demo exercises the full lifecycle
//! (instances, wiring, bridges, decode) without touching an audio device.

use anyhow::Result;
use naada::prelude::*;
use naada::runtime::resources::decode_file;

fn main() -> Result<()> {
    env_logger::init();

    println!("🎛  Naada - Node-based Audio Patching v{}", naada::VERSION);
    println!();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        return Ok(());
    }

    match args[1].as_str() {
        "list" => list_types(),
        "info" => {
            if args.len() < 3 {
                eprintln!("Error: Please specify a node type ID");
                return Ok(());
            }
            type_info(&args[2]);
        }
        "demo" => demo(args.get(2).map(String::as_str))?,
        "help" | "--help" | "-h" => print_usage(&args[0]),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage(&args[0]);
        }
    }
    Ok(())
}

fn print_usage(program: &str) {
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list              List all available node types");
    println!("  info <type>       Show detailed info about a node type");
    println!("  demo [sample]     Build and run a demo patch (optionally");
    println!("                    decoding an audio file for the sample player)");
    println!("  help              Show this help message");
}

fn list_types() {
    let registry = NodeTypeRegistry::with_builtins();
    let grouped = registry.grouped_by_category();

    println!("Available node types ({} total):", registry.len());
    println!();

    for (category, types) in grouped {
        println!("  📁 {}", category.display_name());
        for metadata in types {
            let domain = match metadata.domain {
                NodeDomain::Native => "native",
                NodeDomain::Computed => "computed",
            };
            println!("      • {} [{}] - {}", metadata.id, domain, metadata.description);
        }
        println!();
    }
}

fn type_info(type_id: &str) {
    let registry = NodeTypeRegistry::with_builtins();

    let Some(metadata) = registry.metadata(type_id) else {
        eprintln!("Node type not found: {}", type_id);
        eprintln!("Use 'list' to see available types.");
        return;
    };

    println!("Node type: {}", metadata.name);
    println!("ID: {}", metadata.id);
    println!("Category: {}", metadata.category.display_name());
    println!("Domain: {:?}", metadata.domain);
    if metadata.single_shot {
        println!("Single-shot: property changes rebuild the backend instance");
    }
    if metadata.needs_device {
        println!("Needs a device stream before producing output");
    }
    println!();
    println!("Description:");
    println!("  {}", metadata.description);
    println!();

    if !metadata.inputs.is_empty() {
        println!("Inputs:");
        for port in &metadata.inputs {
            println!("  • {} [{}]", port.name, port.port_type.display_name());
            if !port.description.is_empty() {
                println!("    {}", port.description);
            }
        }
        println!();
    }

    if !metadata.outputs.is_empty() {
        println!("Outputs:");
        for port in &metadata.outputs {
            println!("  • {} [{}]", port.name, port.port_type.display_name());
            if !port.description.is_empty() {
                println!("    {}", port.description);
            }
        }
        println!();
    }

    if !metadata.properties.is_empty() {
        println!("Properties:");
        for property in &metadata.properties {
            let range = match (property.min, property.max) {
                (Some(min), Some(max)) => format!(" range [{}, {}]", min, max),
                _ => String::new(),
            };
            println!(
                "  • {} = {}{}",
                property.name, property.default_value, range
            );
            if !property.description.is_empty() {
                println!("    {}", property.description);
            }
        }
    }
}

/// Build a small patch, run a few ticks, and print what the backend saw.
fn demo(sample_path: Option<&str>) -> Result<()> {
    let mut session = PatchSession::new(
        NodeTypeRegistry::with_builtins(),
        Box::new(InMemoryBackendFactory::new()),
    );

    println!("⚙️  Building patch: oscillator -> gain -> destination");
    let osc = session.add_node_at("oscillator", 0.0, 0.0)?;
    let gain = session.add_node_at("gain", 200.0, 0.0)?;
    let dest = session.add_node_at("destination", 400.0, 0.0)?;
    session.add_edge(osc, "out", gain, "in")?;
    session.add_edge(gain, "out", dest, "in")?;

    println!("⚙️  Modulating gain level from a step sequencer");
    let seq = session.add_node_at("sequencer", 200.0, 150.0)?;
    session.set_property(
        seq,
        "steps",
        Value::List(vec![
            Value::Float(0.2),
            Value::Float(0.5),
            Value::Float(0.8),
        ]),
    )?;
    session.add_edge(seq, "value", gain, "level")?;

    if let Some(path) = sample_path {
        println!("⚙️  Adding a sample player for {}", path);
        let player = session.add_node_at("sample-player", 0.0, 150.0)?;
        session.set_property(player, "path", Value::Text(path.to_string()))?;
        drive_pending(&mut session);
        match session.status(player).map(|s| s.load_state) {
            Some(LoadState::Loaded) => println!("   sample decoded"),
            Some(LoadState::Failed) => println!("   decode failed, player stays unloaded"),
            other => println!("   load state: {:?}", other),
        }
    }

    println!();
    println!("▶️  Running 4 ticks of 0.25s");
    for step in 0..4 {
        session.tick(0.25);
        let level = session
            .backend_handle(gain)
            .and_then(|h| session.backend().param(h, "level"))
            .unwrap_or(0.0);
        println!("   t={:.2}s  gain.level = {}", (step + 1) as f64 * 0.25, level);
    }

    println!();
    println!("↩️  Undoing the last edit and redoing it");
    session.undo()?;
    session.redo()?;

    let snapshot = session.save_snapshot()?;
    println!(
        "💾 Snapshot: {} nodes, {} connections, {} bytes of JSON",
        session.graph().node_count(),
        session.graph().connection_count(),
        snapshot.len()
    );

    let mut restored = PatchSession::new(
        NodeTypeRegistry::with_builtins(),
        Box::new(InMemoryBackendFactory::new()),
    );
    restored.load_snapshot(&snapshot)?;
    println!(
        "✅ Reloaded into a fresh session: {} nodes, {} connections",
        restored.graph().node_count(),
        restored.graph().connection_count()
    );
    Ok(())
}

/// Synchronously drive the session's pending resource operations.
///
/// A real embedding would run these on a worker; the demo resolves them
/// inline with the reference decoder.
fn drive_pending(session: &mut PatchSession) {
    let ops: Vec<_> = session.pending_operations().to_vec();
    for op in ops {
        match op.kind {
            PendingKind::Decode { path } => {
                let result = decode_file(&path);
                session.complete_decode(op.node_id, result);
            }
            PendingKind::DeviceAcquisition => {
                session.complete_device_acquisition(op.node_id, Ok(()));
            }
        }
    }
}
