use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Resolving,
    Downloading,
    Extracting,
    Caching,
    CopyingFromCache,
}

impl InstallStage {
    pub fn label(self) -> &'static str {
        match self {
            InstallStage::Resolving => "Resolving dependencies",
            InstallStage::Downloading => "Downloading",
            InstallStage::Extracting => "Extracting",
            InstallStage::Caching => "Caching",
            InstallStage::CopyingFromCache => "Copying from cache",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Stage {
        full_name: String,
        stage: InstallStage,
    },
    Installed {
        full_name: String,
        from_cache: bool,
    },
    Failed {
        full_name: String,
        message: String,
    },
    Removed {
        name: String,
    },
    BatchCompleted {
        batch: usize,
        batches: usize,
        done: usize,
        total: usize,
    },
}

/// Sending half handed to the engine. Events are dropped when nobody listens.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<Sender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn stage(&self, full_name: &str, stage: InstallStage) {
        self.emit(ProgressEvent::Stage {
            full_name: full_name.to_string(),
            stage,
        });
    }
}
