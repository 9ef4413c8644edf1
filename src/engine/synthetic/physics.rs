use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use glam::Vec3;
use tracing::{debug, warn};

use super::graph::Spring;

const MIN_TEMPERATURE: f32 = 0.05;

pub(super) enum PhysicsPoll {
    Frame(Vec<Vec3>),
    Pending,
    Finished,
}

/// Spring embedder running on its own thread. Frames are handed over one
/// at a time; the simulation waits until the previous frame was taken.
pub(super) struct PhysicsWorker {
    frames: Option<Receiver<Vec<Vec3>>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PhysicsWorker {
    pub fn spawn(positions: Vec<Vec3>, springs: Vec<Spring>, max_iterations: usize) -> Self {
        let (tx, rx) = mpsc::sync_channel(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);

        let handle = thread::spawn(move || {
            let mut simulation = Simulation::new(positions, springs);
            for iteration in 0..max_iterations {
                if stop.load(Ordering::Relaxed) {
                    debug!(iteration, "physics stopped on request");
                    return;
                }
                simulation.relax();
                if tx.send(simulation.positions.clone()).is_err() {
                    return;
                }
                if simulation.temperature < MIN_TEMPERATURE {
                    debug!(iteration, "physics settled");
                    return;
                }
            }
        });

        Self {
            frames: Some(rx),
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn poll(&mut self) -> PhysicsPoll {
        let Some(frames) = &self.frames else {
            return PhysicsPoll::Finished;
        };
        match frames.try_recv() {
            Ok(frame) => PhysicsPoll::Frame(frame),
            Err(TryRecvError::Empty) => PhysicsPoll::Pending,
            Err(TryRecvError::Disconnected) => {
                self.stop();
                PhysicsPoll::Finished
            }
        }
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // unblocks a sender waiting on a full channel
        self.frames = None;
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("physics worker panicked");
        }
    }
}

impl Drop for PhysicsWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Simulation {
    positions: Vec<Vec3>,
    springs: Vec<Spring>,
    k: f32,
    temperature: f32,
}

impl Simulation {
    fn new(positions: Vec<Vec3>, springs: Vec<Spring>) -> Self {
        let k = if springs.is_empty() {
            10.0
        } else {
            springs.iter().map(|spring| spring.rest_length).sum::<f32>() / springs.len() as f32
        }
        .max(1.0);

        Self {
            positions,
            springs,
            k,
            temperature: (k * 5.5).max(140.0),
        }
    }

    fn relax(&mut self) {
        let n = self.positions.len();
        let mut disp = vec![Vec3::ZERO; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let delta = self.positions[i] - self.positions[j];
                let distance = delta.length().max(0.5);
                let direction = delta / distance;
                let force = (self.k * self.k) / distance;
                disp[i] += direction * force;
                disp[j] -= direction * force;
            }
        }

        for spring in &self.springs {
            if spring.a >= n || spring.b >= n || spring.a == spring.b {
                continue;
            }
            let delta = self.positions[spring.a] - self.positions[spring.b];
            let distance = delta.length().max(0.5);
            let direction = delta / distance;
            let stiffness = if spring.is_real { 0.18 } else { 0.05 };
            let force = (distance - spring.rest_length) * stiffness;
            disp[spring.a] -= direction * force;
            disp[spring.b] += direction * force;
        }

        for (d, position) in disp.iter_mut().zip(&self.positions) {
            *d -= *position * 0.0012;
        }

        for (position, d) in self.positions.iter_mut().zip(disp) {
            let length = d.length();
            if length > 0.0 {
                *position += d / length * length.min(self.temperature) * 0.92;
            }
        }

        self.temperature *= 0.965;
    }
}
