use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUnit {
    Bytes,
    Profiles,
}

impl ProgressUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressUnit::Bytes => "bytes",
            ProgressUnit::Profiles => "HMM",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A pipeline step, rendered as `<verb> <message>`.
    Phase { verb: &'static str, message: String },
    TaskStarted {
        task: String,
        unit: ProgressUnit,
        total: Option<u64>,
    },
    TaskAdvanced { task: String, amount: u64 },
    TaskFinished { task: String, elapsed: Duration },
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub fn phase(sink: &dyn ProgressSink, verb: &'static str, message: impl Into<String>) {
    sink.event(ProgressEvent::Phase {
        verb,
        message: message.into(),
    });
}

/// A started task on a sink; finishing it reports the elapsed time.
pub struct Task<'a> {
    sink: &'a dyn ProgressSink,
    name: String,
    started: Instant,
}

impl<'a> Task<'a> {
    pub fn start(
        sink: &'a dyn ProgressSink,
        name: impl Into<String>,
        unit: ProgressUnit,
        total: Option<u64>,
    ) -> Self {
        let name = name.into();
        sink.event(ProgressEvent::TaskStarted {
            task: name.clone(),
            unit,
            total,
        });
        Self {
            sink,
            name,
            started: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn advance(&self, amount: u64) {
        if amount == 0 {
            return;
        }
        self.sink.event(ProgressEvent::TaskAdvanced {
            task: self.name.clone(),
            amount,
        });
    }

    pub fn finish(self) {
        self.sink.event(ProgressEvent::TaskFinished {
            task: self.name,
            elapsed: self.started.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for RecordingSink {
        fn event(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn task_reports_lifecycle() {
        let sink = RecordingSink::default();
        let task = Task::start(&sink, "Pfam", ProgressUnit::Profiles, Some(3));
        task.advance(1);
        task.advance(0);
        task.advance(2);
        task.finish();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            ProgressEvent::TaskStarted {
                task: "Pfam".to_string(),
                unit: ProgressUnit::Profiles,
                total: Some(3),
            }
        );
        assert_eq!(
            events[2],
            ProgressEvent::TaskAdvanced {
                task: "Pfam".to_string(),
                amount: 2,
            }
        );
        assert!(matches!(events[3], ProgressEvent::TaskFinished { .. }));
    }
}
