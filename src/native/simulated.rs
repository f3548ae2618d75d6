//! Simulated media-engine DTMF sender.
//!
//! Plays tone strings on a dedicated worker thread with the same timing
//! rules and observer callbacks as a real engine channel:
//!
//! ```text
//! insert_dtmf("12", 100, 50)
//!   worker: on_tone_change("1", "2")  ... 150 ms ...
//!           on_tone_change("2", "")   ... 150 ms ...
//!           on_tone_change("", "")
//! ```
//!
//! A `,` produces a tone-change event of its own and pauses for
//! `comma_delay_ms` instead of `duration + gap`. Every accepted insert,
//! including an empty one, restarts playback from the new buffer and ends
//! with `on_tone_change("", "")`.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::{validate_tones, DtmfSenderInterface, DtmfSenderObserver};
use crate::config::EngineConfig;
use crate::error::{log_dtmf_error, DtmfError};

struct SenderState {
    tones: String,
    duration_ms: i32,
    inter_tone_gap_ms: i32,
    observer: Option<Arc<dyn DtmfSenderObserver>>,
    can_insert: bool,
    /// Set by an accepted insert until the worker picks it up
    pending: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<SenderState>,
    wake: Condvar,
    config: EngineConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SimulatedDtmfSender {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    worker_id: Option<ThreadId>,
}

impl SimulatedDtmfSender {
    /// Spawn a sender and its tone worker thread
    pub fn new(config: EngineConfig) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(SenderState {
                tones: String::new(),
                duration_ms: 0,
                inter_tone_gap_ms: 0,
                observer: None,
                can_insert: true,
                pending: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
            config,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("dtmf-sender".to_string())
            .spawn(move || run_worker(worker_shared));

        let (worker, worker_id) = match worker {
            Ok(handle) => {
                let id = handle.thread().id();
                (Some(handle), Some(id))
            }
            Err(err) => {
                warn!("[DtmfSender] Failed to spawn tone worker: {}", err);
                shared.lock().can_insert = false;
                (None, None)
            }
        };

        Self {
            shared,
            worker,
            worker_id,
        }
    }

    /// Model a channel that is not (or no longer) able to send DTMF
    pub fn set_can_insert(&self, can_insert: bool) {
        self.shared.lock().can_insert = can_insert;
    }
}

impl Drop for SimulatedDtmfSender {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.shutdown = true;
            state.observer = None;
        }
        self.shared.wake.notify_all();

        if let Some(worker) = self.worker.take() {
            if Some(thread::current().id()) != self.worker_id {
                let _ = worker.join();
            }
        }
    }
}

impl DtmfSenderInterface for SimulatedDtmfSender {
    fn register_observer(&self, observer: Arc<dyn DtmfSenderObserver>) {
        self.shared.lock().observer = Some(observer);
    }

    fn unregister_observer(&self) {
        self.shared.lock().observer = None;
    }

    fn can_insert_dtmf(&self) -> bool {
        self.shared.lock().can_insert
    }

    fn insert_dtmf(
        &self,
        tones: &str,
        duration_ms: i32,
        inter_tone_gap_ms: i32,
    ) -> Result<(), DtmfError> {
        let limits = &self.shared.config;
        let result = if duration_ms < limits.min_duration_ms
            || duration_ms > limits.max_duration_ms
        {
            Err(DtmfError::InvalidDuration {
                duration_ms,
                min: limits.min_duration_ms,
                max: limits.max_duration_ms,
            })
        } else if inter_tone_gap_ms < limits.min_inter_tone_gap_ms {
            Err(DtmfError::InvalidInterToneGap {
                gap_ms: inter_tone_gap_ms,
                min: limits.min_inter_tone_gap_ms,
            })
        } else if !self.can_insert_dtmf() {
            Err(DtmfError::CannotInsert)
        } else {
            validate_tones(tones)
        };

        if let Err(err) = result {
            log_dtmf_error(&err, "insert_dtmf");
            return Err(err);
        }

        {
            let mut state = self.shared.lock();
            state.tones = tones.to_string();
            state.duration_ms = duration_ms;
            state.inter_tone_gap_ms = inter_tone_gap_ms;
            state.pending = true;
        }
        self.shared.wake.notify_all();
        debug!(
            "[DtmfSender] Queued {:?} (duration={}ms, gap={}ms)",
            tones, duration_ms, inter_tone_gap_ms
        );
        Ok(())
    }

    fn tones(&self) -> String {
        self.shared.lock().tones.clone()
    }

    fn duration(&self) -> i32 {
        self.shared.lock().duration_ms
    }

    fn inter_tone_gap(&self) -> i32 {
        self.shared.lock().inter_tone_gap_ms
    }
}

fn notify(observer: Option<Arc<dyn DtmfSenderObserver>>, tone: &str, tone_buffer: &str) {
    if let Some(observer) = observer {
        observer.on_tone_change(tone, tone_buffer);
    }
}

enum Wait {
    Elapsed,
    /// A new insert replaced the buffer
    Interrupted,
    Shutdown,
}

/// Sleep for `delay`, returning early on shutdown or a new insert.
fn wait_for(shared: &Shared, delay: Duration) -> Wait {
    let deadline = Instant::now() + delay;
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            return Wait::Shutdown;
        }
        if state.pending {
            return Wait::Interrupted;
        }
        let now = Instant::now();
        if now >= deadline {
            return Wait::Elapsed;
        }
        state = match shared.wake.wait_timeout(state, deadline - now) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        };
    }
}

/// Pause after `tone`, computed wide so no accepted timing can overflow
fn tone_delay(tone: char, state: &SenderState, config: &EngineConfig) -> Duration {
    let delay_ms = if tone == ',' {
        i64::from(config.comma_delay_ms)
    } else {
        i64::from(state.duration_ms) + i64::from(state.inter_tone_gap_ms)
    };
    Duration::from_millis(delay_ms.max(0) as u64)
}

fn run_worker(shared: Arc<Shared>) {
    info!("[DtmfSender] Tone worker started");

    'outer: loop {
        {
            let mut state = shared.lock();
            while !state.pending && !state.shutdown {
                state = shared
                    .wake
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if state.shutdown {
                break;
            }
        }

        loop {
            let (tone, remaining, delay, observer) = {
                let mut state = shared.lock();
                if state.shutdown {
                    break 'outer;
                }
                state.pending = false;
                let Some(tone) = state.tones.chars().next() else {
                    break;
                };
                let remaining = state.tones[tone.len_utf8()..].to_string();
                state.tones = remaining.clone();
                let delay = tone_delay(tone, &state, &shared.config);
                (tone, remaining, delay, state.observer.clone())
            };

            notify(observer, &tone.to_string(), &remaining);

            match wait_for(&shared, delay) {
                Wait::Elapsed | Wait::Interrupted => {}
                Wait::Shutdown => break 'outer,
            }
        }

        let observer = shared.lock().observer.clone();
        notify(observer, "", "");
    }

    info!("[DtmfSender] Tone worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct ChannelObserver(Mutex<mpsc::Sender<(String, String)>>);

    impl DtmfSenderObserver for ChannelObserver {
        fn on_tone_change(&self, tone: &str, tone_buffer: &str) {
            let _ = self
                .0
                .lock()
                .unwrap()
                .send((tone.to_string(), tone_buffer.to_string()));
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            comma_delay_ms: 60,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_rejects_out_of_range_timing() {
        let sender = SimulatedDtmfSender::new(EngineConfig::default());

        assert!(matches!(
            sender.insert_dtmf("1", 39, 50),
            Err(DtmfError::InvalidDuration { duration_ms: 39, .. })
        ));
        assert!(matches!(
            sender.insert_dtmf("1", 6001, 50),
            Err(DtmfError::InvalidDuration { .. })
        ));
        assert!(matches!(
            sender.insert_dtmf("1", 100, 29),
            Err(DtmfError::InvalidInterToneGap { gap_ms: 29, .. })
        ));
        assert!(matches!(
            sender.insert_dtmf("1x", 100, 50),
            Err(DtmfError::InvalidTones { .. })
        ));
        assert_eq!(sender.tones(), "");
    }

    #[test]
    fn test_cannot_insert_when_channel_not_ready() {
        let sender = SimulatedDtmfSender::new(EngineConfig::default());
        sender.set_can_insert(false);

        assert!(!sender.can_insert_dtmf());
        assert_eq!(
            sender.insert_dtmf("1", 100, 50),
            Err(DtmfError::CannotInsert)
        );
    }

    #[test]
    fn test_plays_tones_in_order_then_reports_empty() {
        let sender = SimulatedDtmfSender::new(fast_config());
        let (tx, rx) = mpsc::channel();
        sender.register_observer(Arc::new(ChannelObserver(Mutex::new(tx))));

        sender.insert_dtmf("1,2", 40, 30).unwrap();
        assert_eq!(sender.duration(), 40);
        assert_eq!(sender.inter_tone_gap(), 30);

        let timeout = Duration::from_secs(5);
        let events: Vec<(String, String)> = (0..4)
            .map(|_| rx.recv_timeout(timeout).expect("tone change"))
            .collect();

        assert_eq!(
            events,
            vec![
                ("1".to_string(), ",2".to_string()),
                (",".to_string(), "2".to_string()),
                ("2".to_string(), "".to_string()),
                ("".to_string(), "".to_string()),
            ]
        );
        assert_eq!(sender.tones(), "");
    }

    #[test]
    fn test_empty_insert_reports_empty_tone() {
        let sender = SimulatedDtmfSender::new(fast_config());
        let (tx, rx) = mpsc::channel();
        sender.register_observer(Arc::new(ChannelObserver(Mutex::new(tx))));

        sender.insert_dtmf("", 100, 50).unwrap();

        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("empty insert should report an empty tone");
        assert_eq!(event, ("".to_string(), "".to_string()));
    }

    #[test]
    fn test_huge_gap_keeps_worker_alive() {
        let sender = SimulatedDtmfSender::new(fast_config());
        let (tx, rx) = mpsc::channel();
        sender.register_observer(Arc::new(ChannelObserver(Mutex::new(tx))));
        let timeout = Duration::from_secs(5);

        sender.insert_dtmf("12", 100, i32::MAX).unwrap();
        assert_eq!(
            rx.recv_timeout(timeout).expect("first tone"),
            ("1".to_string(), "2".to_string())
        );

        // a new insert cuts the long pause short
        sender.insert_dtmf("3", 40, 30).unwrap();
        let events: Vec<(String, String)> = (0..2)
            .map(|_| rx.recv_timeout(timeout).expect("tone change"))
            .collect();
        assert_eq!(
            events,
            vec![
                ("3".to_string(), "".to_string()),
                ("".to_string(), "".to_string()),
            ]
        );
    }

    #[test]
    fn test_unregistered_observer_gets_nothing() {
        let sender = SimulatedDtmfSender::new(fast_config());
        let (tx, rx) = mpsc::channel();
        sender.register_observer(Arc::new(ChannelObserver(Mutex::new(tx))));
        sender.unregister_observer();

        sender.insert_dtmf("1", 40, 30).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_drop_stops_worker() {
        let sender = SimulatedDtmfSender::new(EngineConfig::default());
        sender.insert_dtmf("123456789", 6000, 50).unwrap();
        let started = Instant::now();
        drop(sender);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
