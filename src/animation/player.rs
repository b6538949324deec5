use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use super::driver::{AnimationDriver, CameraFrame, FrameSink, PlaybackState};
use crate::error::AnimationError;
use crate::geo::Route;

pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStatus {
    pub playback: PlaybackState,
    pub progress_km: f64,
    pub length_km: Option<f64>,
}

type Reply<T> = oneshot::Sender<Result<T, AnimationError>>;

enum Command {
    SetRoute(Arc<Route>, Reply<CameraFrame>),
    Play(Reply<()>),
    Pause(Reply<()>),
    Toggle(Reply<PlaybackState>),
    Seek(f64, Reply<CameraFrame>),
    Status(oneshot::Sender<PlayerStatus>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<Command>,
}

pub fn spawn<S>(driver: AnimationDriver<S>) -> (PlayerHandle, JoinHandle<()>)
where
    S: FrameSink + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);
    let task = tokio::spawn(run(driver, rx));
    (PlayerHandle { tx }, task)
}

impl PlayerHandle {
    pub async fn set_route(&self, route: Arc<Route>) -> Result<CameraFrame, AnimationError> {
        self.request(|reply| Command::SetRoute(route, reply)).await
    }

    pub async fn play(&self) -> Result<(), AnimationError> {
        self.request(Command::Play).await
    }

    pub async fn pause(&self) -> Result<(), AnimationError> {
        self.request(Command::Pause).await
    }

    pub async fn toggle(&self) -> Result<PlaybackState, AnimationError> {
        self.request(Command::Toggle).await
    }

    pub async fn seek(&self, distance_km: f64) -> Result<CameraFrame, AnimationError> {
        self.request(|reply| Command::Seek(distance_km, reply)).await
    }

    pub async fn status(&self) -> Result<PlayerStatus, AnimationError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Status(reply))
            .await
            .map_err(|_| AnimationError::PlayerStopped)?;
        rx.await.map_err(|_| AnimationError::PlayerStopped)
    }

    /// Stops the player task. Later calls on any clone of this handle fail
    /// with `PlayerStopped`.
    pub async fn shutdown(&self) -> Result<(), AnimationError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown(reply))
            .await
            .map_err(|_| AnimationError::PlayerStopped)?;
        rx.await.map_err(|_| AnimationError::PlayerStopped)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, AnimationError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| AnimationError::PlayerStopped)?;
        rx.await.map_err(|_| AnimationError::PlayerStopped)?
    }
}

async fn run<S: FrameSink>(mut driver: AnimationDriver<S>, mut rx: mpsc::Receiver<Command>) {
    let mut ticker = interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else {
                    tracing::debug!("Animation player shutting down");
                    break;
                };
                let was_playing = driver.is_playing();
                if handle(&mut driver, command).is_break() {
                    tracing::debug!("Animation player shut down");
                    break;
                }
                if driver.is_playing() && !was_playing {
                    ticker.reset();
                }
            }
            _ = ticker.tick(), if driver.is_playing() => {
                if let Err(err) = driver.tick(Instant::now()) {
                    tracing::error!("Animation tick failed: {}", err);
                    driver.pause();
                }
            }
        }
    }
}

fn handle<S: FrameSink>(driver: &mut AnimationDriver<S>, command: Command) -> ControlFlow<()> {
    // a dropped reply receiver means the caller stopped waiting
    match command {
        Command::SetRoute(route, reply) => {
            let _ = reply.send(driver.set_route(route));
        }
        Command::Play(reply) => {
            let _ = reply.send(driver.play(Instant::now()));
        }
        Command::Pause(reply) => {
            driver.pause();
            let _ = reply.send(Ok(()));
        }
        Command::Toggle(reply) => {
            let result = if driver.is_playing() {
                driver.pause();
                Ok(PlaybackState::Stopped)
            } else {
                driver.play(Instant::now()).map(|_| PlaybackState::Playing)
            };
            let _ = reply.send(result);
        }
        Command::Seek(distance_km, reply) => {
            let _ = reply.send(driver.seek(distance_km, Instant::now()));
        }
        Command::Status(reply) => {
            let _ = reply.send(PlayerStatus {
                playback: driver.playback(),
                progress_km: driver.progress_km(),
                length_km: driver.route().map(|route| route.length_km()),
            });
        }
        Command::Shutdown(reply) => {
            driver.pause();
            let _ = reply.send(());
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}
