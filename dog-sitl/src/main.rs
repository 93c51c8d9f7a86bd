// main.rs
//! Runs every node of the dog on its own thread over a shared, lossy
//! broadcast bus and plays a scripted session against them.
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, sleep};
use std::time::Duration;

use dog_core::config::TICK_PERIOD;
use dog_core::log::DROPPED_LOGS;
use dog_core::{ActuatorNode, CommanderNode, NODES, TickOutcome};
use embassy_time::Instant;

mod bus;
mod recorder;
mod scenario;
mod sim;

use bus::Bus;
use recorder::Recorder;
use scenario::{SCRIPT, Scenario};
use sim::{Device, SharedState, SimHub, SimState, lock};

const LOG_PATH: &str = "dog_sitl.csv";
const RUN_LIMIT: Duration = Duration::from_secs(12);
const POLL_PERIOD: Duration = Duration::from_millis(20);

// Every n-th reception attempt fails.
const ACTUATOR_MISS_EVERY: u32 = 7;
const COMMANDER_MISS_EVERY: u32 = 11;

static AIR: Bus = Bus::new();
static STOP: AtomicBool = AtomicBool::new(false);

fn spawn_node<F>(name: &'static str, mut tick: F) -> std::io::Result<JoinHandle<u64>>
where
    F: FnMut(Instant) -> TickOutcome + Send + 'static,
{
    let period = Duration::from_micros(TICK_PERIOD.as_micros());
    thread::Builder::new().name(name.into()).spawn(move || {
        let mut ticks = 0u64;
        while !STOP.load(Ordering::Relaxed) {
            ticks += 1;
            if tick(Instant::now()) == TickOutcome::Shutdown {
                log::info!("{name}: powered down after {ticks} ticks");
                break;
            }
            sleep(period);
        }
        ticks
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let states: Vec<SharedState> = NODES
        .iter()
        .map(|node| Arc::new(Mutex::new(SimState::for_node(node))))
        .collect();

    let mut workers = Vec::new();
    for (node, state) in NODES.iter().zip(&states) {
        let hub = SimHub::new(Arc::clone(state));
        let worker = if node.is_commander() {
            let radio = AIR.radio(node.address.channel(), Some(COMMANDER_MISS_EVERY));
            let mut commander = CommanderNode::new(hub, radio);
            spawn_node(node.name, move |now| commander.tick(now))?
        } else {
            let radio = AIR.radio(node.address.channel(), Some(ACTUATOR_MISS_EVERY));
            let mut actuator = ActuatorNode::new(node, hub, radio).map_err(|e| format!("{}: {:?}", node.name, e))?;
            spawn_node(node.name, move |now| actuator.tick(now))?
        };
        workers.push((node.name, worker));
    }
    println!("Started {} nodes, logging to {}", workers.len(), LOG_PATH);

    let mut recorder = Recorder::new(BufWriter::new(File::create(LOG_PATH)?), Duration::from_secs(1));
    let mut scenario = Scenario::new(SCRIPT);
    let start = std::time::Instant::now();
    loop {
        let elapsed = start.elapsed();
        let at = embassy_time::Duration::from_micros(elapsed.as_micros() as u64);
        scenario.apply_due(at, &states, &AIR);
        recorder.poll()?;

        if workers.iter().all(|(_, worker)| worker.is_finished()) {
            break;
        }
        if elapsed >= RUN_LIMIT {
            log::warn!("run limit reached, stopping the remaining nodes");
            break;
        }
        sleep(POLL_PERIOD);
    }
    STOP.store(true, Ordering::Relaxed);

    let mut ticks = Vec::new();
    for (name, worker) in workers {
        let count = worker.join().map_err(|_| format!("{name}: node thread panicked"))?;
        ticks.push((name, count));
    }
    let recorded = recorder.entries();
    recorder.finish()?;

    println!("\n{:<12} {:>6} {:>8} {:>6}  motor angles", "node", "ticks", "powered", "beeps");
    for ((name, count), state) in ticks.iter().zip(&states) {
        let state = lock(state);
        let angles: Vec<String> = state
            .ports
            .iter()
            .filter(|port| port.device == Some(Device::Motor))
            .map(|port| port.angle.to_string())
            .collect();
        println!(
            "{:<12} {:>6} {:>8} {:>6}  {}",
            name,
            count,
            state.powered,
            state.beeps,
            angles.join(" ")
        );
    }
    println!(
        "\nscript {}, {} log entries, {} dropped, {} datagrams missed",
        if scenario.is_done() { "complete" } else { "incomplete" },
        recorded,
        DROPPED_LOGS.load(Ordering::Relaxed),
        AIR.missed()
    );
    Ok(())
}
