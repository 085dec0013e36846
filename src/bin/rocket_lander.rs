use std::time::Instant;

use clap::Parser;
use minifb::Key;
use rand::Rng;

use rocket_lander_gym::LanderError;
use rocket_lander_gym::box_2d::rocket_lander::{Action, RocketLander};
use rocket_lander_gym::rendering::{RenderCoordinator, Renderer};

#[derive(Parser, Debug)]
#[command(name = "rocket-lander", version, about = "Watch or fly rocket landings")]
struct Opts {
    /// Number of environments drawn on top of each other
    #[arg(long, default_value_t = 1)]
    envs: usize,

    /// Seed for the first environment; the others use seed + index
    #[arg(long)]
    seed: Option<u64>,

    /// Fly the first rocket with the arrow keys
    #[arg(long)]
    human: bool,

    /// Window width in pixels
    #[arg(long, default_value_t = 800)]
    width: usize,

    /// Window height in pixels
    #[arg(long, default_value_t = 800)]
    height: usize,
}

/// Longest frame time fed to the physics, so a stalled window does not
/// launch the rockets through the ground.
const MAX_FRAME_DT: f32 = 1.0 / 20.0;

/// Seed of the `index`-th environment; wraps instead of overflowing near
/// `u64::MAX`.
fn instance_seed(base: Option<u64>, index: usize) -> Option<u64> {
    base.map(|s| s.wrapping_add(index as u64))
}

/// Installs the `env_logger` backend, `info` level unless `RUST_LOG` says
/// otherwise. Returns false if a logger was already installed.
fn init_logging() -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init()
        .is_ok()
}

fn human_action(renderer: &Renderer) -> Action {
    if !renderer.is_key_down(Key::Up) {
        Action::NoOp
    } else if renderer.is_key_down(Key::Left) {
        Action::ThrustUpLeft
    } else if renderer.is_key_down(Key::Right) {
        Action::ThrustUpRight
    } else {
        Action::ThrustUp
    }
}

fn main() -> Result<(), LanderError> {
    init_logging();
    let opts = Opts::parse();

    let mut envs = (0..opts.envs.max(1))
        .map(|i| {
            RocketLander::builder()
                .maybe_seed(instance_seed(opts.seed, i))
                .build()
        })
        .collect::<Result<Vec<_>, _>>()?;
    for env in envs.iter_mut() {
        env.reset(None)?;
    }

    let mut coordinator = RenderCoordinator::new(opts.width, opts.height, 2.0)?;
    let mut rng = rand::rng();
    let mut last_frame = Instant::now();

    while coordinator.is_open() {
        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32().min(MAX_FRAME_DT);
        last_frame = now;
        if dt <= 0.0 {
            continue;
        }

        for (i, env) in envs.iter_mut().enumerate() {
            let action = if opts.human && i == 0 {
                human_action(coordinator.renderer())
            } else {
                Action::ALL[rng.random_range(0..Action::ALL.len())]
            };
            // Leg springs are integrated explicitly, so long frames are split
            // into ticks no longer than the configured one.
            let tick = env.config().tick;
            let mut remaining = dt;
            while remaining > 0.0 {
                let step_dt = remaining.min(tick);
                remaining -= step_dt;
                let transition = env.step_for(action, step_dt)?;
                if transition.terminated {
                    log::info!(
                        "env {i}: {:?} after {:.1}s",
                        transition.info.outcome, transition.info.elapsed
                    );
                    env.reset(None)?;
                    break;
                }
            }
        }

        let refs: Vec<&RocketLander> = envs.iter().collect();
        coordinator.draw(&refs)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_seeds_wrap_at_the_top_of_the_range() {
        assert_eq!(instance_seed(None, 3), None);
        assert_eq!(instance_seed(Some(10), 2), Some(12));
        assert_eq!(instance_seed(Some(u64::MAX), 0), Some(u64::MAX));
        assert_eq!(instance_seed(Some(u64::MAX), 1), Some(0));
        assert_eq!(instance_seed(Some(u64::MAX - 1), 3), Some(1));
    }

    #[test]
    fn logging_backend_installs_once() {
        let first = init_logging();
        assert!(!init_logging());
        if first && std::env::var_os("RUST_LOG").is_none() {
            assert_ne!(log::max_level(), log::LevelFilter::Off);
        }
    }
}
