use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use image::RgbImage;

use super::{Progress, RenderSession};
use crate::{scheduler::TimeSliceClient, source::WaveformSource, Result, SpectrographError};

/// Thread-safe handle over a [`RenderSession`].
///
/// One clone is handed to the scheduler while presentation code keeps
/// another and reads copy-on-read snapshots. Completion listeners run while
/// the session is locked and must not call back into the handle.
pub struct SharedSession<S> {
    shared: Arc<Mutex<RenderSession<S>>>,
}

impl<S> Clone for SharedSession<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S> SharedSession<S> {
    pub fn new(session: RenderSession<S>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(session)),
        }
    }

    /// Copies the current image.
    pub fn snapshot(&self) -> Result<RgbImage> {
        Ok(self.lock()?.snapshot())
    }

    pub fn progress(&self) -> Result<Progress> {
        Ok(self.lock()?.progress())
    }

    pub fn is_complete(&self) -> Result<bool> {
        Ok(self.lock()?.is_complete())
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut RenderSession<S>) -> R) -> Result<R> {
        let mut session = self.lock()?;
        Ok(f(&mut session))
    }

    fn lock(&self) -> Result<MutexGuard<'_, RenderSession<S>>> {
        self.shared
            .lock()
            .map_err(|_| SpectrographError::InvalidSequencing("render session has been poisoned"))
    }
}

impl<S: WaveformSource> SharedSession<S> {
    pub fn step(&self) -> Result<Duration> {
        self.lock()?.step()
    }
}

impl<S: WaveformSource> TimeSliceClient for SharedSession<S> {
    fn use_time_slice(&mut self) -> Result<Duration> {
        self.step()
    }

    fn is_finished(&self) -> bool {
        self.lock().map(|s| s.is_complete()).unwrap_or(true)
    }
}

impl<S> std::fmt::Debug for SharedSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSession").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{scheduler::TimeSliceScheduler, source::MemorySource};

    fn session(samples: usize) -> RenderSession<MemorySource> {
        let signal = (0..samples).map(|i| (i as f32 * 0.3).sin()).collect();
        let mut session = RenderSession::initialize(MemorySource::mono(signal), 256).unwrap();
        session.set_image_size(32, 16).unwrap();
        session
    }

    #[test]
    fn scheduler_drives_shared_session() {
        let handle = SharedSession::new(session(5000));
        let mut scheduler = TimeSliceScheduler::new();
        scheduler.add_client(Box::new(handle.clone()));

        let slices = scheduler.run_until_idle().unwrap();
        assert_eq!(slices, 10);
        assert!(handle.is_complete().unwrap());
        assert_eq!(handle.progress().unwrap().samples_consumed, 5000);
    }

    #[test]
    fn snapshots_can_be_read_from_another_thread() {
        let handle = SharedSession::new(session(2048));
        let reader = handle.clone();

        let worker = thread::spawn(move || {
            while !handle.is_complete().unwrap() {
                handle.step().unwrap();
            }
        });
        let partial = reader.snapshot().unwrap();
        worker.join().unwrap();

        assert_eq!(partial.dimensions(), (32, 16));
        assert_eq!(reader.progress().unwrap().blocks_processed, 4);
    }
}
