use std::time::{Duration, Instant};

use crate::Result;

/// Work that is performed in bounded slices by a cooperative scheduler.
pub trait TimeSliceClient {
    /// Performs one bounded unit of work and returns how long the scheduler
    /// should wait before calling again. [`Duration::ZERO`] means "as soon
    /// as possible".
    fn use_time_slice(&mut self) -> Result<Duration>;

    /// Finished clients are dropped by the scheduler.
    fn is_finished(&self) -> bool {
        false
    }
}

struct ScheduledClient {
    client: Box<dyn TimeSliceClient + Send>,
    due: Instant,
}

/// Single-threaded round-robin driver for [`TimeSliceClient`]s.
#[derive(Default)]
pub struct TimeSliceScheduler {
    clients: Vec<ScheduledClient>,
}

impl TimeSliceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&mut self, client: Box<dyn TimeSliceClient + Send>) {
        self.clients.push(ScheduledClient {
            client,
            due: Instant::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Gives one slice to every client that is due. Finished clients are
    /// removed. A client whose slice fails is removed and its error
    /// returned; the remaining clients are untouched.
    pub fn run_once(&mut self) -> Result<usize> {
        let now = Instant::now();
        let mut slices = 0;
        let mut index = 0;

        while index < self.clients.len() {
            let entry = &mut self.clients[index];
            if entry.client.is_finished() {
                self.clients.remove(index);
                continue;
            }
            if entry.due > now {
                index += 1;
                continue;
            }

            match entry.client.use_time_slice() {
                Ok(delay) => {
                    slices += 1;
                    entry.due = Instant::now() + delay;
                    if entry.client.is_finished() {
                        self.clients.remove(index);
                    } else {
                        index += 1;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "time slice client failed, removing it");
                    self.clients.remove(index);
                    return Err(err);
                }
            }
        }

        Ok(slices)
    }

    /// Runs slices until every client has finished, sleeping while none is
    /// due. Returns the total number of slices executed.
    pub fn run_until_idle(&mut self) -> Result<usize> {
        let mut total = 0;
        while !self.clients.is_empty() {
            let ran = self.run_once()?;
            total += ran;

            if ran == 0 {
                if let Some(next) = self.clients.iter().map(|c| c.due).min() {
                    std::thread::sleep(next.saturating_duration_since(Instant::now()));
                }
            }
        }
        Ok(total)
    }
}

impl std::fmt::Debug for TimeSliceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSliceScheduler")
            .field("clients", &self.clients.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpectrographError;

    struct Countdown {
        remaining: usize,
        delay: Duration,
    }

    impl TimeSliceClient for Countdown {
        fn use_time_slice(&mut self) -> Result<Duration> {
            self.remaining = self.remaining.saturating_sub(1);
            Ok(self.delay)
        }

        fn is_finished(&self) -> bool {
            self.remaining == 0
        }
    }

    struct Failing;

    impl TimeSliceClient for Failing {
        fn use_time_slice(&mut self) -> Result<Duration> {
            Err(SpectrographError::InvalidSequencing("always fails"))
        }
    }

    #[test]
    fn runs_clients_until_finished() {
        let mut scheduler = TimeSliceScheduler::new();
        scheduler.add_client(Box::new(Countdown {
            remaining: 3,
            delay: Duration::ZERO,
        }));
        scheduler.add_client(Box::new(Countdown {
            remaining: 5,
            delay: Duration::ZERO,
        }));

        assert_eq!(scheduler.run_until_idle().unwrap(), 8);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn delayed_client_waits_its_turn() {
        let mut scheduler = TimeSliceScheduler::new();
        scheduler.add_client(Box::new(Countdown {
            remaining: 2,
            delay: Duration::from_secs(60),
        }));

        assert_eq!(scheduler.run_once().unwrap(), 1);
        assert_eq!(scheduler.run_once().unwrap(), 0);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn failing_client_is_dropped() {
        let mut scheduler = TimeSliceScheduler::new();
        scheduler.add_client(Box::new(Failing));

        assert!(scheduler.run_once().is_err());
        assert!(scheduler.is_empty());
    }
}
