use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use super::state::Observation;
use crate::utils;

pub type UpdateCallback = Arc<dyn Fn(&Observation) + Send + Sync>;
pub type MatchCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone)]
pub enum DetectionEvent {
    Update(Observation),
    MatchFound,
}

#[derive(Default)]
struct Observers {
    update: Option<UpdateCallback>,
    match_found: Option<MatchCallback>,
}

/// Delivers observer callbacks on their own thread so a slow observer never
/// delays a tick. Queued updates collapse to the newest; `MatchFound` is
/// never dropped.
pub struct EventHub {
    observers: Arc<Mutex<Observers>>,
    tx: Option<Sender<DetectionEvent>>,
    thread: Option<JoinHandle<()>>,
}

impl EventHub {
    pub fn new() -> Self {
        let observers = Arc::new(Mutex::new(Observers::default()));
        let (tx, rx) = mpsc::channel();

        let thread = {
            let observers = Arc::clone(&observers);
            thread::Builder::new()
                .name("detection-events".to_string())
                .spawn(move || deliver(rx, observers))
        };
        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!("failed to spawn event thread, observers will not be called: {err}");
                None
            }
        };

        Self {
            observers,
            tx: thread.as_ref().map(|_| tx),
            thread,
        }
    }

    pub fn set_update_callback(&self, callback: UpdateCallback) {
        utils::lock(&self.observers).update = Some(callback);
    }

    pub fn set_match_callback(&self, callback: MatchCallback) {
        utils::lock(&self.observers).match_found = Some(callback);
    }

    /// A sender for the worker. Sending never blocks.
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventHub {
    fn drop(&mut self) {
        // closing our sender ends the thread once every worker sender is gone
        self.tx.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("detection event thread panicked");
            }
        }
    }
}

#[derive(Clone)]
pub struct EventSender {
    tx: Option<Sender<DetectionEvent>>,
}

impl EventSender {
    pub fn send(&self, event: DetectionEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                debug!("event thread gone; dropping event");
            }
        }
    }
}

fn deliver(rx: Receiver<DetectionEvent>, observers: Arc<Mutex<Observers>>) {
    while let Ok(first) = rx.recv() {
        let mut batch = vec![first];
        batch.extend(rx.try_iter());

        let latest_update = batch
            .iter()
            .rposition(|event| matches!(event, DetectionEvent::Update(_)));

        for (position, event) in batch.into_iter().enumerate() {
            match event {
                DetectionEvent::Update(observation) => {
                    if Some(position) != latest_update {
                        continue;
                    }
                    let callback = utils::lock(&observers).update.clone();
                    if let Some(callback) = callback {
                        callback(&observation);
                    }
                }
                DetectionEvent::MatchFound => {
                    let callback = utils::lock(&observers).match_found.clone();
                    if let Some(callback) = callback {
                        callback();
                    }
                }
            }
        }
    }
    debug!("detection event thread exiting");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use chrono::Utc;

    use super::*;
    use crate::capture::PixelBuffer;
    use crate::sensing::Label;

    fn observation(score: f64) -> Observation {
        Observation {
            frame: Arc::new(PixelBuffer::new(1, 1)),
            label: Label::None,
            score,
            monitor_index: 1,
            observed_at: Utc::now(),
        }
    }

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn every_match_is_delivered_and_updates_arrive() {
        let hub = EventHub::new();
        let matches = Arc::new(AtomicUsize::new(0));
        let last_score = Arc::new(Mutex::new(None));

        {
            let matches = Arc::clone(&matches);
            hub.set_match_callback(Arc::new(move || {
                matches.fetch_add(1, Ordering::SeqCst);
            }));
            let last_score = Arc::clone(&last_score);
            hub.set_update_callback(Arc::new(move |o: &Observation| {
                *last_score.lock().unwrap() = Some(o.score);
            }));
        }

        let sender = hub.sender();
        for i in 0..20 {
            sender.send(DetectionEvent::Update(observation(i as f64 / 100.0)));
        }
        sender.send(DetectionEvent::MatchFound);
        sender.send(DetectionEvent::MatchFound);

        assert!(wait_for(|| matches.load(Ordering::SeqCst) == 2));
        assert!(wait_for(|| *last_score.lock().unwrap() == Some(0.19)));
    }

    #[test]
    fn slow_observer_does_not_block_senders() {
        let hub = EventHub::new();
        hub.set_update_callback(Arc::new(|_: &Observation| {
            thread::sleep(Duration::from_millis(200));
        }));

        let sender = hub.sender();
        let started = Instant::now();
        for _ in 0..10 {
            sender.send(DetectionEvent::Update(observation(0.5)));
        }
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn events_without_observers_are_ignored() {
        let hub = EventHub::new();
        hub.sender().send(DetectionEvent::MatchFound);
        drop(hub);
    }
}
