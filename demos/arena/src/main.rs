//! `arena`: evasive agents choosing cover nodes while a player circles them.
//!
//! Every frame each idle agent asks for the farthest cover node from the
//! player that it can reach without crossing the player's line of sight.
//! Path queries run on the worker pool; the frame loop only polls.  Every
//! few frames the main thread opens or closes a door cell under the navmesh
//! write guard, which in-flight queries must yield to.
//!
//! Run with:
//!   cargo run -p arena --release [-- path/to/config.json]
//!
//! Set `RUST_LOG=debug` to watch individual selections.

// Same allocator as the other example binaries in this workspace.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod arena;

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::info;
use memory_stats::memory_stats;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use pf_batch::PathWorkers;
use pf_core::{AREA_NOT_WALKABLE, AREA_WALKABLE, AgentId, CandidateList, PathfindingConfig, PurposeId, Vec3};
use pf_navmesh::{AStarQuery, NavMeshLock};
use pf_select::{AgentState, AsyncDistancePathfinding, ChosenNode};

use arena::{SIZE, build_arena, walls_block};

// ── Memory helper ─────────────────────────────────────────────────────────────

fn mem_mb() -> f64 {
    memory_stats()
        .map(|s| s.physical_mem as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0)
}

// ── Constants ─────────────────────────────────────────────────────────────────

const AGENT_COUNT:    usize = 48;
const COVER_NODES:    usize = 64;
const SEED:           u64   = 42;
const FRAMES:         u32   = 900;
const FRAME_TIME:     Duration = Duration::from_millis(4);
/// Toggle the door every N frames.
const DOOR_INTERVAL:  u32   = 45;
/// One agent leaves the arena at this frame.
const DEPARTURE_FRAME: u32  = FRAMES / 2;
/// Distance an agent moves toward its chosen node per frame.
const AGENT_SPEED:    f32   = 0.15;
const PLAYER_RADIUS:  f32   = 10.0;
/// Player angular speed, radians per frame.
const PLAYER_SPEED:   f32   = 0.01;

const FLEE: PurposeId = PurposeId(1);

fn player_position(frame: u32) -> Vec3 {
    let centre = SIZE as f32 * 0.5;
    let angle = frame as f32 * PLAYER_SPEED;
    Vec3::new(centre + PLAYER_RADIUS * angle.cos(), 0.0, centre + PLAYER_RADIUS * angle.sin())
}

// ── Per-run tallies ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Tally {
    started:        usize,
    chosen:         usize,
    stayed_put:     usize,
    door_toggles:   usize,
    total_distance: f64,
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => PathfindingConfig::from_json_path(Path::new(&path))?,
        None => PathfindingConfig::default(),
    };

    println!("=== arena: async node selection ===");
    println!("Agents: {AGENT_COUNT}  |  Cover nodes: {COVER_NODES}  |  Frames: {FRAMES}  |  Seed: {SEED}");
    println!("Config:\n{}", serde_json::to_string_pretty(&config)?);
    println!();

    // 1. Navmesh.
    let (mesh, arena) = build_arena()?;
    println!("Navmesh: {} polys, {} links", mesh.poly_count(), mesh.link_count());
    let navmesh = Arc::new(NavMeshLock::new(mesh));

    // 2. Workers and registry.
    let workers = PathWorkers::<AStarQuery>::new(Arc::clone(&navmesh), &config)?;
    println!("Path workers: {}", workers.thread_count());
    let mut registry = AsyncDistancePathfinding::new(workers, config);

    // 3. Cover nodes (a few on the unreachable island) and agents.
    let mut rng = SmallRng::seed_from_u64(SEED);
    let mut cover: Vec<Vec3> = arena.open.choose_multiple(&mut rng, COVER_NODES).copied().collect();
    cover.extend((0..4).map(|i| arena.island + Vec3::new(i as f32 * 0.5 - 0.75, 0.0, 0.0)));
    let cover = CandidateList::from_positions(cover);

    let mut agents: Vec<Option<AgentState>> = (0..AGENT_COUNT)
        .map(|_| {
            let start = arena.open[rng.gen_range(0..arena.open.len())];
            Some(AgentState::new(start, cover.clone()))
        })
        .collect();
    let mut goals: Vec<Option<Vec3>> = vec![None; AGENT_COUNT];
    println!("Memory after setup: {:.1} MB", mem_mb());
    println!();

    // 4. Frame loop.
    let mut tally = Tally::default();
    let mut door_open = false;
    let t0 = Instant::now();

    for frame in 0..FRAMES {
        let player = player_position(frame);
        // A path is exposed if any of its corners is in the player's view.
        let los = move |_start: Vec3, end: Vec3, _mask: u32| !walls_block(player, end);

        if frame > 0 && frame % DOOR_INTERVAL == 0 {
            door_open = !door_open;
            let area = if door_open { AREA_WALKABLE } else { AREA_NOT_WALKABLE };
            navmesh.write().set_area(arena.door, area)?;
            tally.door_toggles += 1;
        }

        if frame == DEPARTURE_FRAME {
            agents[0] = None;
            goals[0] = None;
            info!("agent 0 left at frame {frame}");
        }

        for (i, slot) in agents.iter().enumerate() {
            let Some(agent) = slot else { continue };
            if goals[i].is_some() {
                continue;
            }
            let id = AgentId(i as u32);
            if registry.start_choosing_farthest_node_from_position(id, agent, FLEE, player, true, 0, None) {
                tally.started += 1;
            }
        }

        registry.update_all(&agents, &los);

        for (i, slot) in agents.iter_mut().enumerate() {
            let Some(agent) = slot else { continue };
            let got = registry.retrieve_chosen_node(AgentId(i as u32));
            match got.node {
                Some(ChosenNode::Candidate(c)) => {
                    tally.chosen += 1;
                    tally.total_distance += got.distance as f64;
                    goals[i] = Some(c.position);
                }
                Some(ChosenNode::SelfPosition(_)) => tally.stayed_put += 1,
                None => {}
            }

            if let Some(goal) = goals[i] {
                let step = (goal - agent.position).clamp_length_max(AGENT_SPEED);
                agent.position += step;
                if agent.position.distance_squared(goal) < 1e-4 {
                    goals[i] = None;
                }
            }
        }

        thread::sleep(FRAME_TIME);
    }
    let elapsed = t0.elapsed();

    // 5. Summary.
    let lock_stats = (navmesh.write_count(), navmesh.yield_count());
    let queries = registry.workers().queries().created();
    println!("Ran {FRAMES} frames in {:.3} s", elapsed.as_secs_f64());
    println!("  selections started : {}", tally.started);
    println!("  nodes chosen       : {}", tally.chosen);
    println!("  stayed put         : {}", tally.stayed_put);
    if tally.chosen > 0 {
        println!("  mean distance      : {:.2}", tally.total_distance / tally.chosen as f64);
    }
    println!("  door toggles       : {}", tally.door_toggles);
    println!("  navmesh writes     : {}", lock_stats.0);
    println!("  reader yields      : {}", lock_stats.1);
    println!("  query handles      : {queries}");
    println!("  memory             : {:.1} MB", mem_mb());
    println!();

    println!("{:<8} {:>8} {:>8}  {:<10}", "Agent", "x", "z", "Moving");
    println!("{}", "-".repeat(38));
    for (i, agent) in agents.iter().enumerate().take(8) {
        match agent {
            Some(a) => println!(
                "{:<8} {:>8.2} {:>8.2}  {:<10}",
                i,
                a.position.x,
                a.position.z,
                if goals[i].is_some() { "yes" } else { "no" }
            ),
            None => println!("{i:<8} {:>8} {:>8}  {:<10}", "-", "-", "gone"),
        }
    }

    Ok(())
}
